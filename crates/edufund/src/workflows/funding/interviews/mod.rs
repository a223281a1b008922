//! Board interviews and panel decision aggregation.

pub mod aggregate;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use aggregate::{aggregate, InterviewOutcome, OutcomeSummary, VoteTally};
pub use domain::{Decision, Interview, InterviewDecision, InterviewStatus, ScheduleRequest};
pub use repository::{InterviewRepository, PanelDirectory};
pub use router::interview_router;
pub use service::{InterviewError, InterviewService, InterviewView};
