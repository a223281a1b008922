use super::domain::FieldReview;
use crate::workflows::funding::domain::{ApplicationId, ReviewId, VerifierId};
use crate::workflows::funding::repository::RepositoryError;

/// Storage for field reviews.
pub trait FieldReviewRepository: Send + Sync {
    /// Fails with `Conflict` while another review for the application is still active.
    fn insert(&self, review: FieldReview) -> Result<FieldReview, RepositoryError>;
    /// Compare-and-swap on `version`. Completed reviews are never overwritten.
    fn update(&self, review: FieldReview) -> Result<FieldReview, RepositoryError>;
    fn fetch(&self, id: &ReviewId) -> Result<Option<FieldReview>, RepositoryError>;
    fn for_application(&self, id: &ApplicationId) -> Result<Vec<FieldReview>, RepositoryError>;
    fn active_for_verifier(&self, verifier: &VerifierId) -> Result<Vec<FieldReview>, RepositoryError>;
}
