use super::domain::{PoolListing, Sponsorship};
use crate::workflows::funding::domain::{SponsorshipId, StudentId};
use crate::workflows::funding::repository::RepositoryError;

/// Failure of the atomic claim step.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("student already has a live sponsorship")]
    AlreadyBound,
    #[error("student is not listed in the sponsorship pool")]
    NotListed,
    #[error("offered {offered} does not match outstanding need {expected}")]
    AmountMismatch { expected: u64, offered: u64 },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Storage for sponsorships and the donor-visible pool.
///
/// The pool and the sponsorship records share one lock in every implementation so that
/// `bind` and `release` can move a student between them without a window in which two
/// donors both see the student as available.
pub trait SponsorshipRepository: Send + Sync {
    /// Adds or replaces the listing for a student.
    fn list_student(&self, listing: PoolListing) -> Result<(), RepositoryError>;
    fn delist_student(&self, student: &StudentId) -> Result<Option<PoolListing>, RepositoryError>;
    fn listing(&self, student: &StudentId) -> Result<Option<PoolListing>, RepositoryError>;
    /// Oldest listings first.
    fn pool(&self, limit: usize) -> Result<Vec<PoolListing>, RepositoryError>;
    /// Checks for a live sponsorship, the listing and its need, then inserts the record
    /// and removes the listing, all under one lock.
    fn bind(&self, sponsorship: Sponsorship) -> Result<Sponsorship, BindError>;
    /// Compare-and-swap write of a cancelled sponsorship plus relisting of the student.
    fn release(
        &self,
        sponsorship: Sponsorship,
        listing: PoolListing,
    ) -> Result<Sponsorship, RepositoryError>;
    /// Compare-and-swap on `version`.
    fn update(&self, sponsorship: Sponsorship) -> Result<Sponsorship, RepositoryError>;
    fn fetch(&self, id: &SponsorshipId) -> Result<Option<Sponsorship>, RepositoryError>;
    fn active_for_student(&self, student: &StudentId) -> Result<Option<Sponsorship>, RepositoryError>;
}
