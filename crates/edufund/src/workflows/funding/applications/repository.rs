use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationDetails, ApplicationFilter, ApplicationStatus, ExpenseBreakdown, StatusChange,
};
use crate::workflows::funding::domain::{ApplicationId, StudentId};
use crate::workflows::funding::repository::RepositoryError;

/// Repository record for one funding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub status: ApplicationStatus,
    pub institution: String,
    pub programme: String,
    pub term: String,
    pub currency: String,
    pub requested_amount: u64,
    pub expenses: ExpenseBreakdown,
    /// Bumped by the store on every successful write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<StatusChange>,
}

impl ApplicationRecord {
    pub fn details(&self) -> ApplicationDetails {
        ApplicationDetails {
            institution: self.institution.clone(),
            programme: self.programme.clone(),
            term: self.term.clone(),
            currency: Some(self.currency.clone()),
            expenses: self.expenses,
        }
    }

    /// Statuses in the order they were observed, starting with the creation status.
    pub fn status_path(&self) -> Vec<ApplicationStatus> {
        self.history.iter().map(|change| change.to).collect()
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.application_id.clone(),
            student_id: self.student_id.clone(),
            status: self.status.label(),
            requested_amount: self.requested_amount,
            currency: self.currency.clone(),
            term: self.term.clone(),
            version: self.version,
            submitted_at: self.submitted_at,
            updated_at: self.updated_at,
        }
    }
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    /// Fails with `Conflict` when the id exists or the student already has an open application.
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    /// Compare-and-swap on `version`; the stored copy comes back with the bumped version.
    fn update(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    fn open_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError>;
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub status: &'static str,
    pub requested_amount: u64,
    pub currency: String,
    pub term: String,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
