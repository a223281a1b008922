use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::funding::domain::{AdminId, ApplicationId, InterviewId, PanelMemberId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterviewStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl InterviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InterviewStatus::Scheduled => "SCHEDULED",
            InterviewStatus::InProgress => "IN_PROGRESS",
            InterviewStatus::Completed => "COMPLETED",
            InterviewStatus::Cancelled => "CANCELLED",
        }
    }

    /// Panel members may still vote.
    pub const fn accepts_decisions(self) -> bool {
        matches!(self, InterviewStatus::Scheduled | InterviewStatus::InProgress)
    }
}

/// A single panel member's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
    Abstain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewDecision {
    pub interview_id: InterviewId,
    pub panel_member_id: PanelMemberId,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Board interview for an application that cleared field verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interview {
    pub id: InterviewId,
    pub application_id: ApplicationId,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub status: InterviewStatus,
    pub panel: Vec<PanelMemberId>,
    pub scheduled_by: AdminId,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Interview {
    pub fn has_panelist(&self, member: &PanelMemberId) -> bool {
        self.panel.iter().any(|candidate| candidate == member)
    }
}

/// Input for scheduling a board interview.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleRequest {
    pub scheduled_by: AdminId,
    pub scheduled_for: DateTime<Utc>,
    pub panel: Vec<PanelMemberId>,
    #[serde(default)]
    pub location: Option<String>,
}
