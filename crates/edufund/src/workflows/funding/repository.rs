use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::applications::ApplicationRepository;
use super::domain::{ApplicationId, DonorId, StudentId};
use super::interviews::InterviewRepository;
use super::sponsorship::SponsorshipRepository;
use super::verification::FieldReviewRepository;

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write: expected version {expected}, stored version {found}")]
    VersionMismatch { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Every durable collection the funding services read and write through.
#[derive(Clone)]
pub struct Repositories {
    pub applications: Arc<dyn ApplicationRepository>,
    pub reviews: Arc<dyn FieldReviewRepository>,
    pub interviews: Arc<dyn InterviewRepository>,
    pub sponsorships: Arc<dyn SponsorshipRepository>,
}

/// Outbound hook for the messaging layer. Delivery itself happens elsewhere.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Audience {
    Student(StudentId),
    Donor(DonorId),
    Administrators,
    Donors,
}

/// Payload handed to the messaging layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub audience: Audience,
    pub application_id: Option<ApplicationId>,
    pub details: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(template: &str, audience: Audience) -> Self {
        Self {
            template: template.to_string(),
            audience,
            application_id: None,
            details: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn for_application(mut self, application_id: &ApplicationId) -> Self {
        self.application_id = Some(application_id.clone());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
