use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::funding::domain::{ApplicationId, ReviewId, StudentId, VerifierId};

/// Lifecycle of one field verification cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,
    InProgress,
    Completed,
}

impl ReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::InProgress => "IN_PROGRESS",
            ReviewStatus::Completed => "COMPLETED",
        }
    }

    pub const fn is_active(self) -> bool {
        !matches!(self, ReviewStatus::Completed)
    }
}

/// Field officer's verdict after the home visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldRecommendation {
    Recommend,
    Conditional,
    DoNotRecommend,
}

impl FieldRecommendation {
    /// Recommendations that let a case worker approve the application.
    pub const fn clears_verification(self) -> bool {
        matches!(
            self,
            FieldRecommendation::Recommend | FieldRecommendation::Conditional
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            FieldRecommendation::Recommend => "RECOMMEND",
            FieldRecommendation::Conditional => "CONDITIONAL",
            FieldRecommendation::DoNotRecommend => "DO_NOT_RECOMMEND",
        }
    }
}

/// Observations captured during verification. Also used as a partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Findings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<FieldRecommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Findings {
    /// Overwrite every field the patch sets; unset fields keep their stored value.
    pub fn merge(&mut self, patch: Findings) {
        if patch.identity_verified.is_some() {
            self.identity_verified = patch.identity_verified;
        }
        if patch.income_verified.is_some() {
            self.income_verified = patch.income_verified;
        }
        if patch.documents_verified.is_some() {
            self.documents_verified = patch.documents_verified;
        }
        if patch.verification_score.is_some() {
            self.verification_score = patch.verification_score;
        }
        if patch.recommendation.is_some() {
            self.recommendation = patch.recommendation;
        }
        if patch.rationale.is_some() {
            self.rationale = patch.rationale;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingInfoRequest {
    pub items: Vec<String>,
    pub note: String,
    pub requested_at: DateTime<Utc>,
}

/// One verification cycle for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReview {
    pub id: ReviewId,
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub verifier_id: VerifierId,
    /// 1 for the first visit, incremented for every re-verification.
    pub cycle: u32,
    pub status: ReviewStatus,
    pub findings: Findings,
    /// Documents the student still owes.
    pub missing_documents: Vec<String>,
    pub info_requests: Vec<MissingInfoRequest>,
    pub version: u64,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_unset_fields() {
        let mut findings = Findings {
            identity_verified: Some(true),
            rationale: Some("household visited".to_string()),
            ..Findings::default()
        };

        findings.merge(Findings {
            income_verified: Some(false),
            rationale: Some("salary slip missing".to_string()),
            ..Findings::default()
        });

        assert_eq!(findings.identity_verified, Some(true));
        assert_eq!(findings.income_verified, Some(false));
        assert_eq!(findings.rationale.as_deref(), Some("salary slip missing"));
        assert_eq!(findings.documents_verified, None);
    }

    #[test]
    fn only_negative_recommendation_blocks_verification() {
        assert!(FieldRecommendation::Recommend.clears_verification());
        assert!(FieldRecommendation::Conditional.clears_verification());
        assert!(!FieldRecommendation::DoNotRecommend.clears_verification());
    }
}
