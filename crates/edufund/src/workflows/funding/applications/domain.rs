use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::funding::domain::{Actor, StudentId};

/// Cost of one academic term as declared by the student.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseBreakdown {
    #[serde(default)]
    pub tuition: u64,
    #[serde(default)]
    pub hostel: u64,
    #[serde(default)]
    pub living: u64,
    #[serde(default)]
    pub other: u64,
    /// Scholarships already secured elsewhere; offsets the gross cost.
    #[serde(default)]
    pub scholarship: u64,
}

impl ExpenseBreakdown {
    pub fn gross(&self) -> u64 {
        self.tuition
            .saturating_add(self.hostel)
            .saturating_add(self.living)
            .saturating_add(self.other)
    }

    pub fn total_need(&self) -> u64 {
        self.gross().saturating_sub(self.scholarship)
    }
}

/// Student-provided funding request captured while the application is a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDetails {
    pub institution: String,
    pub programme: String,
    pub term: String,
    #[serde(default)]
    pub currency: Option<String>,
    pub expenses: ExpenseBreakdown,
}

/// Lifecycle status of a funding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Draft,
    Pending,
    CaseWorkerApproved,
    InterviewStage,
    Approved,
    Rejected,
    Withdrawn,
    Sponsored,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 8] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Pending,
        ApplicationStatus::CaseWorkerApproved,
        ApplicationStatus::InterviewStage,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
        ApplicationStatus::Sponsored,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "DRAFT",
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::CaseWorkerApproved => "CASE_WORKER_APPROVED",
            ApplicationStatus::InterviewStage => "INTERVIEW_STAGE",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Withdrawn => "WITHDRAWN",
            ApplicationStatus::Sponsored => "SPONSORED",
        }
    }

    /// Terminal applications no longer count against the one-open-application rule.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected | ApplicationStatus::Withdrawn | ApplicationStatus::Sponsored
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of the audit trail kept on every application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: Option<ApplicationStatus>,
    pub to: ApplicationStatus,
    pub actor: Actor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// Query parameters accepted by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub student_id: Option<StudentId>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ApplicationFilter {
    pub fn with_status(status: ApplicationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, status: ApplicationStatus, student_id: &StudentId) -> bool {
        self.status.map_or(true, |wanted| wanted == status)
            && self
                .student_id
                .as_ref()
                .map_or(true, |wanted| wanted == student_id)
    }
}

/// Caller request for a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub target: ApplicationStatus,
    pub actor: Actor,
    /// Version the caller last observed; a mismatch fails with a conflict.
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub note: Option<String>,
}

impl TransitionRequest {
    pub fn new(target: ApplicationStatus, actor: Actor) -> Self {
        Self {
            target,
            actor,
            expected_version: None,
            note: None,
        }
    }

    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_need_subtracts_scholarship_and_saturates() {
        let expenses = ExpenseBreakdown {
            tuition: 600,
            hostel: 250,
            living: 200,
            other: 50,
            scholarship: 100,
        };
        assert_eq!(expenses.gross(), 1100);
        assert_eq!(expenses.total_need(), 1000);

        let covered = ExpenseBreakdown {
            tuition: 100,
            scholarship: 500,
            ..ExpenseBreakdown::default()
        };
        assert_eq!(covered.total_need(), 0);
    }

    #[test]
    fn statuses_serialize_screaming_snake_case() {
        let value = serde_json::to_value(ApplicationStatus::CaseWorkerApproved).expect("json");
        assert_eq!(value, serde_json::json!("CASE_WORKER_APPROVED"));
        assert!(ApplicationStatus::Sponsored.is_terminal());
        assert!(!ApplicationStatus::Approved.is_terminal());
    }
}
