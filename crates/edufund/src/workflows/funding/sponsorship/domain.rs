use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::funding::domain::{
    AdminId, ApplicationId, DonorId, IntentId, SponsorshipId, StudentId,
};
use crate::workflows::funding::payments::Cadence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SponsorshipStatus {
    AwaitingPayment,
    Active,
    Completed,
    Cancelled,
}

impl SponsorshipStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SponsorshipStatus::AwaitingPayment => "AWAITING_PAYMENT",
            SponsorshipStatus::Active => "ACTIVE",
            SponsorshipStatus::Completed => "COMPLETED",
            SponsorshipStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledInstallment {
    pub index: u32,
    pub amount: u64,
    pub intent_id: IntentId,
    pub settled_at: DateTime<Utc>,
}

/// Binding between one donor and one student's outstanding need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sponsorship {
    pub id: SponsorshipId,
    pub student_id: StudentId,
    pub donor_id: DonorId,
    pub application_id: ApplicationId,
    pub amount: u64,
    pub currency: String,
    pub cadence: Cadence,
    pub status: SponsorshipStatus,
    pub settled: Vec<SettledInstallment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_by: Option<AdminId>,
    pub version: u64,
}

impl Sponsorship {
    /// Every status except `Cancelled` holds the student.
    pub fn is_live(&self) -> bool {
        self.status != SponsorshipStatus::Cancelled
    }

    pub fn settled_total(&self) -> u64 {
        self.settled.iter().map(|entry| entry.amount).sum()
    }

    pub fn outstanding(&self) -> u64 {
        self.amount.saturating_sub(self.settled_total())
    }

    pub fn is_settled(&self, index: u32) -> bool {
        self.settled.iter().any(|entry| entry.index == index)
    }

    pub fn settlement(&self, index: u32) -> Option<&SettledInstallment> {
        self.settled.iter().find(|entry| entry.index == index)
    }
}

/// Donor-visible entry for an approved student awaiting a sponsor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolListing {
    pub student_id: StudentId,
    pub application_id: ApplicationId,
    pub outstanding_need: u64,
    pub currency: String,
    pub listed_at: DateTime<Utc>,
}

/// Donor request to sponsor a listed student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub student_id: StudentId,
    pub donor_id: DonorId,
    pub amount: u64,
    pub cadence: Cadence,
}
