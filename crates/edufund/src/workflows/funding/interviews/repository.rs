use super::domain::{Interview, InterviewDecision};
use crate::workflows::funding::domain::{ApplicationId, InterviewId, PanelMemberId};
use crate::workflows::funding::repository::RepositoryError;

/// Storage for interviews and their append-only decision log.
pub trait InterviewRepository: Send + Sync {
    /// Fails with `Conflict` when the application already has an interview still taking votes.
    fn insert(&self, interview: Interview) -> Result<Interview, RepositoryError>;
    /// Compare-and-swap on `version`.
    fn update(&self, interview: Interview) -> Result<Interview, RepositoryError>;
    fn fetch(&self, id: &InterviewId) -> Result<Option<Interview>, RepositoryError>;
    fn for_application(&self, id: &ApplicationId) -> Result<Vec<Interview>, RepositoryError>;
    /// Appends a vote while the interview still has `expected_version`. A second vote from
    /// the same member fails with `Conflict`. The first vote moves the interview to
    /// `InProgress`; every vote bumps the version.
    fn append_decision(
        &self,
        decision: InterviewDecision,
        expected_version: u64,
    ) -> Result<Interview, RepositoryError>;
    fn decisions(&self, id: &InterviewId) -> Result<Vec<InterviewDecision>, RepositoryError>;
}

/// External roster of board members.
pub trait PanelDirectory: Send + Sync {
    fn is_active(&self, member: &PanelMemberId) -> bool;
}
