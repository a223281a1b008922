use super::domain::ApplicationDetails;
use crate::workflows::funding::domain::StudentId;

/// Validation errors raised while accepting draft details.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntakeViolation {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("declared expenses leave no funding need after scholarships")]
    NoFundingNeed,
    #[error("currency must be a three letter code, got '{0}'")]
    InvalidCurrency(String),
}

/// External collaborator that knows whether a student's profile and documents are complete.
pub trait ProfileCompleteness: Send + Sync {
    /// Names of mandatory fields or documents still missing. Empty means complete.
    fn missing_items(&self, student: &StudentId) -> Result<Vec<String>, CompletenessError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CompletenessError {
    #[error("profile service unavailable: {0}")]
    Unavailable(String),
}

/// Normalized draft details ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedDetails {
    pub details: ApplicationDetails,
    pub currency: String,
    pub requested_amount: u64,
}

/// Guard responsible for turning raw details into storable draft data.
#[derive(Debug, Clone)]
pub struct IntakeGuard {
    default_currency: String,
}

impl IntakeGuard {
    pub fn new(default_currency: impl Into<String>) -> Self {
        Self {
            default_currency: default_currency.into(),
        }
    }

    pub fn accept(&self, mut details: ApplicationDetails) -> Result<AcceptedDetails, IntakeViolation> {
        details.institution = details.institution.trim().to_string();
        details.programme = details.programme.trim().to_string();
        details.term = details.term.trim().to_string();

        if details.institution.is_empty() {
            return Err(IntakeViolation::MissingField("institution"));
        }
        if details.programme.is_empty() {
            return Err(IntakeViolation::MissingField("programme"));
        }
        if details.term.is_empty() {
            return Err(IntakeViolation::MissingField("term"));
        }

        let currency = match details.currency.take() {
            Some(raw) => {
                let code = raw.trim().to_ascii_uppercase();
                if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(IntakeViolation::InvalidCurrency(raw));
                }
                code
            }
            None => self.default_currency.clone(),
        };
        details.currency = Some(currency.clone());

        let requested_amount = details.expenses.total_need();
        if requested_amount == 0 {
            return Err(IntakeViolation::NoFundingNeed);
        }

        Ok(AcceptedDetails {
            details,
            currency,
            requested_amount,
        })
    }
}

impl Default for IntakeGuard {
    fn default() -> Self {
        Self::new("PKR")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::funding::applications::domain::ExpenseBreakdown;

    fn details() -> ApplicationDetails {
        ApplicationDetails {
            institution: "  Government College University ".to_string(),
            programme: "BS Computer Science".to_string(),
            term: "2026-2027".to_string(),
            currency: None,
            expenses: ExpenseBreakdown {
                tuition: 700,
                hostel: 200,
                living: 150,
                other: 0,
                scholarship: 50,
            },
        }
    }

    #[test]
    fn accept_trims_and_defaults_currency() {
        let accepted = IntakeGuard::default().accept(details()).expect("accepted");
        assert_eq!(accepted.details.institution, "Government College University");
        assert_eq!(accepted.currency, "PKR");
        assert_eq!(accepted.requested_amount, 1000);
    }

    #[test]
    fn accept_rejects_blank_fields_and_zero_need() {
        let guard = IntakeGuard::new("USD");

        let mut blank = details();
        blank.term = "   ".to_string();
        assert_eq!(guard.accept(blank), Err(IntakeViolation::MissingField("term")));

        let mut covered = details();
        covered.expenses.scholarship = 5_000;
        assert_eq!(guard.accept(covered), Err(IntakeViolation::NoFundingNeed));

        let mut odd_currency = details();
        odd_currency.currency = Some("rupee".to_string());
        assert!(matches!(
            guard.accept(odd_currency),
            Err(IntakeViolation::InvalidCurrency(_))
        ));
    }
}
