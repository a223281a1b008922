use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{
    ClaimRequest, PoolListing, SettledInstallment, Sponsorship, SponsorshipStatus,
};
use super::repository::BindError;
use crate::config::FundingConfig;
use crate::workflows::funding::applications::{
    ApplicationError, ApplicationService, ApplicationStatus, TransitionRequest,
};
use crate::workflows::funding::domain::{
    Actor, IdSequence, IntentId, SponsorshipId, StudentId,
};
use crate::workflows::funding::payments::{PaymentPlan, PlanError};
use crate::workflows::funding::repository::{
    Audience, Notification, NotificationError, NotificationPublisher, Repositories,
    RepositoryError,
};

static SPONSORSHIP_SEQUENCE: IdSequence = IdSequence::new("spn");

/// Service matching donors to approved students.
pub struct SponsorshipService {
    repositories: Repositories,
    applications: Arc<ApplicationService>,
    notifications: Arc<dyn NotificationPublisher>,
    page_size: usize,
}

impl SponsorshipService {
    pub fn new(
        repositories: Repositories,
        applications: Arc<ApplicationService>,
        notifications: Arc<dyn NotificationPublisher>,
        config: &FundingConfig,
    ) -> Self {
        Self {
            repositories,
            applications,
            notifications,
            page_size: config.pool_page_size,
        }
    }

    /// Claim a listed student for one donor. Exactly one concurrent claim wins.
    pub fn claim(&self, request: ClaimRequest) -> Result<Sponsorship, SponsorshipError> {
        PaymentPlan::build(request.amount, request.cadence)?;

        let listing = match self.repositories.sponsorships.listing(&request.student_id)? {
            Some(listing) => listing,
            None => return Err(self.unavailable(&request.student_id)?),
        };
        let application = self.applications.get(&listing.application_id)?;
        if application.status != ApplicationStatus::Approved {
            warn!(
                student_id = %request.student_id,
                application_id = %application.application_id,
                status = application.status.label(),
                "stale pool listing, application is not approved"
            );
            return Err(SponsorshipError::NotEligible(request.student_id));
        }

        let now = Utc::now();
        let record = Sponsorship {
            id: SponsorshipId(SPONSORSHIP_SEQUENCE.next()),
            student_id: request.student_id.clone(),
            donor_id: request.donor_id.clone(),
            application_id: listing.application_id,
            amount: request.amount,
            currency: listing.currency,
            cadence: request.cadence,
            status: SponsorshipStatus::AwaitingPayment,
            settled: Vec::new(),
            created_at: now,
            updated_at: now,
            released_by: None,
            version: 0,
        };

        let stored = match self.repositories.sponsorships.bind(record) {
            Ok(stored) => stored,
            Err(BindError::AlreadyBound) => {
                warn!(student_id = %request.student_id, donor_id = %request.donor_id, "claim lost to another donor");
                return Err(SponsorshipError::AlreadySponsored(request.student_id));
            }
            Err(BindError::NotListed) => return Err(self.unavailable(&request.student_id)?),
            Err(BindError::AmountMismatch { expected, offered }) => {
                return Err(SponsorshipError::AmountMismatch { expected, offered })
            }
            Err(BindError::Repository(error)) => return Err(error.into()),
        };

        self.notifications.publish(
            Notification::new("sponsorship_claimed", Audience::Student(stored.student_id.clone()))
                .for_application(&stored.application_id)
                .with_detail("donor_id", stored.donor_id.to_string())
                .with_detail("amount", stored.amount.to_string())
                .with_detail("cadence", stored.cadence.label()),
        )?;
        info!(
            sponsorship_id = %stored.id,
            student_id = %stored.student_id,
            donor_id = %stored.donor_id,
            amount = stored.amount,
            cadence = %stored.cadence,
            "sponsorship claimed"
        );
        Ok(stored)
    }

    /// Administrative cancellation; the student returns to the pool with the unpaid need.
    pub fn release(
        &self,
        sponsorship_id: &SponsorshipId,
        actor: &Actor,
    ) -> Result<Sponsorship, SponsorshipError> {
        let Actor::Administrator(admin) = actor else {
            return Err(SponsorshipError::NotAuthorized(actor.clone()));
        };

        let mut sponsorship = self.get(sponsorship_id)?;
        if matches!(
            sponsorship.status,
            SponsorshipStatus::Completed | SponsorshipStatus::Cancelled
        ) {
            return Err(SponsorshipError::CannotRelease {
                sponsorship_id: sponsorship.id,
                status: sponsorship.status,
            });
        }

        let now = Utc::now();
        let listing = PoolListing {
            student_id: sponsorship.student_id.clone(),
            application_id: sponsorship.application_id.clone(),
            outstanding_need: sponsorship.outstanding(),
            currency: sponsorship.currency.clone(),
            listed_at: now,
        };
        sponsorship.status = SponsorshipStatus::Cancelled;
        sponsorship.released_by = Some(admin.clone());
        sponsorship.updated_at = now;

        let stored = self
            .repositories
            .sponsorships
            .release(sponsorship, listing)
            .map_err(conflict_or_repository)?;

        self.notifications.publish(
            Notification::new("sponsorship_released", Audience::Donor(stored.donor_id.clone()))
                .for_application(&stored.application_id)
                .with_detail("student_id", stored.student_id.to_string())
                .with_detail("released_by", admin.to_string()),
        )?;
        info!(sponsorship_id = %stored.id, student_id = %stored.student_id, released_by = %admin, "sponsorship released");
        Ok(stored)
    }

    /// Record a confirmed installment. Settling the same index twice only retries the
    /// SPONSORED transition if it is still owed.
    pub fn settle_installment(
        &self,
        sponsorship_id: &SponsorshipId,
        index: u32,
        amount: u64,
        intent_id: IntentId,
    ) -> Result<Sponsorship, SponsorshipError> {
        let mut sponsorship = self.get(sponsorship_id)?;
        if sponsorship.is_settled(index) {
            self.finish_if_completed(&sponsorship)?;
            return Ok(sponsorship);
        }
        if sponsorship.status == SponsorshipStatus::Cancelled {
            return Err(SponsorshipError::Inactive(sponsorship.id));
        }

        let plan = PaymentPlan::build(sponsorship.amount, sponsorship.cadence)?;
        let installment = plan
            .installment(index)
            .ok_or(SponsorshipError::UnknownInstallment(index))?;
        if installment.amount != amount {
            return Err(SponsorshipError::AmountMismatch {
                expected: installment.amount,
                offered: amount,
            });
        }

        let now = Utc::now();
        sponsorship.settled.push(SettledInstallment {
            index,
            amount,
            intent_id,
            settled_at: now,
        });
        sponsorship.status = if sponsorship.settled.len() == plan.len() {
            SponsorshipStatus::Completed
        } else {
            SponsorshipStatus::Active
        };
        sponsorship.updated_at = now;

        let stored = self
            .repositories
            .sponsorships
            .update(sponsorship)
            .map_err(conflict_or_repository)?;
        info!(
            sponsorship_id = %stored.id,
            index,
            amount,
            status = stored.status.label(),
            "installment settled"
        );

        self.finish_if_completed(&stored)?;
        Ok(stored)
    }

    /// Move the application to SPONSORED once every installment is paid.
    fn finish_if_completed(&self, sponsorship: &Sponsorship) -> Result<(), SponsorshipError> {
        if sponsorship.status != SponsorshipStatus::Completed {
            return Ok(());
        }
        let application = self.applications.get(&sponsorship.application_id)?;
        if application.status != ApplicationStatus::Approved {
            return Ok(());
        }
        self.applications.transition(
            &sponsorship.application_id,
            TransitionRequest::new(
                ApplicationStatus::Sponsored,
                Actor::Donor(sponsorship.donor_id.clone()),
            )
            .expecting(application.version),
        )?;
        Ok(())
    }

    /// Donor-visible listings, capped at the configured page size.
    pub fn pool(&self, limit: Option<usize>) -> Result<Vec<PoolListing>, SponsorshipError> {
        let limit = limit.unwrap_or(self.page_size).min(self.page_size);
        Ok(self.repositories.sponsorships.pool(limit)?)
    }

    pub fn get(&self, sponsorship_id: &SponsorshipId) -> Result<Sponsorship, SponsorshipError> {
        let sponsorship = self
            .repositories
            .sponsorships
            .fetch(sponsorship_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(sponsorship)
    }

    pub fn active_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<Sponsorship>, SponsorshipError> {
        Ok(self.repositories.sponsorships.active_for_student(student_id)?)
    }

    /// Why an unlisted student cannot be claimed.
    fn unavailable(&self, student_id: &StudentId) -> Result<SponsorshipError, SponsorshipError> {
        if self
            .repositories
            .sponsorships
            .active_for_student(student_id)?
            .is_some()
        {
            warn!(student_id = %student_id, "claim rejected, student already sponsored");
            return Ok(SponsorshipError::AlreadySponsored(student_id.clone()));
        }
        Ok(SponsorshipError::NotEligible(student_id.clone()))
    }
}

fn conflict_or_repository(error: RepositoryError) -> SponsorshipError {
    match error {
        RepositoryError::VersionMismatch { expected, found } => {
            SponsorshipError::Conflict { expected, found }
        }
        other => SponsorshipError::Repository(other),
    }
}

/// Error raised by the sponsorship service.
#[derive(Debug, thiserror::Error)]
pub enum SponsorshipError {
    #[error("student {0} already has a sponsor")]
    AlreadySponsored(StudentId),
    #[error("student {0} is not available for sponsorship")]
    NotEligible(StudentId),
    #[error("offered amount {offered} does not match the outstanding need {expected}")]
    AmountMismatch { expected: u64, offered: u64 },
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("sponsorship {sponsorship_id} is {} and cannot be released", .status.label())]
    CannotRelease {
        sponsorship_id: SponsorshipId,
        status: SponsorshipStatus,
    },
    #[error("{0} may not release sponsorships")]
    NotAuthorized(Actor),
    #[error("sponsorship {0} is cancelled")]
    Inactive(SponsorshipId),
    #[error("installment {0} is not part of the payment plan")]
    UnknownInstallment(u32),
    #[error("sponsorship changed concurrently (expected version {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl SponsorshipError {
    pub fn kind(&self) -> &'static str {
        match self {
            SponsorshipError::AlreadySponsored(_) => "already_sponsored",
            SponsorshipError::NotEligible(_) => "not_eligible",
            SponsorshipError::AmountMismatch { .. } => "amount_mismatch",
            SponsorshipError::Plan(error) => error.kind(),
            SponsorshipError::CannotRelease { .. } => "cannot_release",
            SponsorshipError::NotAuthorized(_) => "not_authorized",
            SponsorshipError::Inactive(_) => "sponsorship_inactive",
            SponsorshipError::UnknownInstallment(_) => "unknown_installment",
            SponsorshipError::Conflict { .. } => "conflict",
            SponsorshipError::Application(error) => error.kind(),
            SponsorshipError::Repository(RepositoryError::NotFound) => "not_found",
            SponsorshipError::Repository(_) => "repository_error",
            SponsorshipError::Notification(_) => "notification_error",
        }
    }
}
