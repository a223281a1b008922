//! Field verification cycles: assignment, findings, missing-information requests, and the
//! advisory recommendation that backs case-worker approval.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{FieldRecommendation, FieldReview, Findings, MissingInfoRequest, ReviewStatus};
pub use repository::FieldReviewRepository;
pub use router::review_router;
pub use service::{FieldReviewError, FieldReviewService};
