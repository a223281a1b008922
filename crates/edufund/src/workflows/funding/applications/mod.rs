//! Funding application intake and the status lifecycle.
//!
//! Drafts are validated by the intake guard, submitted once the external profile check is
//! clean, and then moved along the permission table in [`lifecycle`] by whichever role
//! owns the next step.

pub mod domain;
pub(crate) mod intake;
pub mod lifecycle;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    ApplicationDetails, ApplicationFilter, ApplicationStatus, ExpenseBreakdown, StatusChange,
    TransitionRequest,
};
pub use intake::{CompletenessError, IntakeGuard, IntakeViolation, ProfileCompleteness};
pub use lifecycle::{AdvisoryContext, Edge, Guard, TransitionRejection, EDGES};
pub use repository::{ApplicationRecord, ApplicationRepository, ApplicationStatusView};
pub use router::application_router;
pub use service::{ApplicationError, ApplicationService};
