//! Sponsorship pool and the one-donor-per-student claim.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{ClaimRequest, PoolListing, SettledInstallment, Sponsorship, SponsorshipStatus};
pub use repository::{BindError, SponsorshipRepository};
pub use router::sponsorship_router;
pub use service::{SponsorshipError, SponsorshipService};
