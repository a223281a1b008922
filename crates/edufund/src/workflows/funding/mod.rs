//! Student education funding: application lifecycle, field verification, board
//! interviews, donor sponsorship and installment payments.

pub mod applications;
pub mod domain;
pub mod interviews;
pub mod memory;
pub mod payments;
pub mod repository;
pub mod router;
pub mod sponsorship;
pub mod verification;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::config::AppConfig;

pub use domain::{
    Actor, ActorRole, AdminId, ApplicationId, DonorId, IntentId, InterviewId, PanelMemberId,
    ReviewId, SponsorshipId, StudentId, VerifierId,
};
pub use repository::{
    Audience, Notification, NotificationError, NotificationPublisher, Repositories,
    RepositoryError,
};
pub use router::funding_router;

use applications::{ApplicationService, ProfileCompleteness};
use interviews::{InterviewService, PanelDirectory};
use payments::{PaymentProcessor, PaymentService};
use sponsorship::SponsorshipService;
use verification::FieldReviewService;

/// External systems the funding services talk to.
#[derive(Clone)]
pub struct FundingCollaborators {
    pub completeness: Arc<dyn ProfileCompleteness>,
    pub panel: Arc<dyn PanelDirectory>,
    pub processor: Arc<dyn PaymentProcessor>,
    pub notifications: Arc<dyn NotificationPublisher>,
}

/// All funding services wired against one set of repositories.
#[derive(Clone)]
pub struct FundingServices {
    pub applications: Arc<ApplicationService>,
    pub reviews: Arc<FieldReviewService>,
    pub interviews: Arc<InterviewService>,
    pub sponsorships: Arc<SponsorshipService>,
    pub payments: Arc<PaymentService>,
}

impl FundingServices {
    pub fn new(
        config: &AppConfig,
        repositories: Repositories,
        collaborators: FundingCollaborators,
    ) -> Self {
        let applications = Arc::new(ApplicationService::new(
            repositories.clone(),
            collaborators.completeness,
            collaborators.notifications.clone(),
            &config.funding,
        ));
        let reviews = Arc::new(FieldReviewService::new(
            repositories.clone(),
            collaborators.notifications.clone(),
        ));
        let interviews = Arc::new(InterviewService::new(
            repositories.clone(),
            applications.clone(),
            collaborators.panel,
        ));
        let sponsorships = Arc::new(SponsorshipService::new(
            repositories,
            applications.clone(),
            collaborators.notifications.clone(),
            &config.funding,
        ));
        let payments = Arc::new(PaymentService::new(
            sponsorships.clone(),
            collaborators.processor,
            collaborators.notifications,
            &config.payments,
        ));

        Self {
            applications,
            reviews,
            interviews,
            sponsorships,
            payments,
        }
    }
}
