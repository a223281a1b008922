use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::domain::{
    ApplicationDetails, ApplicationFilter, ApplicationStatus, StatusChange, TransitionRequest,
};
use super::intake::{CompletenessError, IntakeGuard, IntakeViolation, ProfileCompleteness};
use super::lifecycle::{self, AdvisoryContext, TransitionRejection};
use super::repository::ApplicationRecord;
use crate::config::FundingConfig;
use crate::workflows::funding::domain::{
    Actor, ActorRole, ApplicationId, IdSequence, StudentId,
};
use crate::workflows::funding::interviews::{aggregate, InterviewStatus};
use crate::workflows::funding::repository::{
    Audience, Notification, NotificationError, NotificationPublisher, Repositories,
    RepositoryError,
};
use crate::workflows::funding::sponsorship::{PoolListing, SponsorshipStatus};
use crate::workflows::funding::verification::ReviewStatus;

static APPLICATION_SEQUENCE: IdSequence = IdSequence::new("app");

const DEFAULT_LIST_LIMIT: usize = 100;

/// Service executing the application state machine against the record store.
pub struct ApplicationService {
    repositories: Repositories,
    completeness: Arc<dyn ProfileCompleteness>,
    notifications: Arc<dyn NotificationPublisher>,
    guard: IntakeGuard,
}

impl ApplicationService {
    pub fn new(
        repositories: Repositories,
        completeness: Arc<dyn ProfileCompleteness>,
        notifications: Arc<dyn NotificationPublisher>,
        config: &FundingConfig,
    ) -> Self {
        Self {
            repositories,
            completeness,
            notifications,
            guard: IntakeGuard::new(config.currency.clone()),
        }
    }

    /// Open a new draft for a student who has no other open application.
    pub fn create_draft(
        &self,
        student_id: StudentId,
        details: ApplicationDetails,
    ) -> Result<ApplicationRecord, ApplicationError> {
        let accepted = self.guard.accept(details)?;

        if self
            .repositories
            .applications
            .open_for_student(&student_id)?
            .is_some()
        {
            return Err(ApplicationError::DuplicateApplication(student_id));
        }

        let now = Utc::now();
        let details = accepted.details;
        let record = ApplicationRecord {
            application_id: ApplicationId(APPLICATION_SEQUENCE.next()),
            student_id: student_id.clone(),
            status: ApplicationStatus::Draft,
            institution: details.institution,
            programme: details.programme,
            term: details.term,
            currency: accepted.currency,
            requested_amount: accepted.requested_amount,
            expenses: details.expenses,
            version: 0,
            created_at: now,
            submitted_at: None,
            updated_at: now,
            history: vec![StatusChange {
                from: None,
                to: ApplicationStatus::Draft,
                actor: Actor::Student(student_id.clone()),
                note: None,
                at: now,
            }],
        };

        let stored = self
            .repositories
            .applications
            .insert(record)
            .map_err(|err| match err {
                RepositoryError::Conflict => ApplicationError::DuplicateApplication(student_id),
                other => ApplicationError::Repository(other),
            })?;
        info!(application_id = %stored.application_id, student_id = %stored.student_id, "draft application created");
        Ok(stored)
    }

    /// Submit a draft once the external profile check reports nothing missing.
    pub fn submit(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
    ) -> Result<ApplicationRecord, ApplicationError> {
        self.transition(
            application_id,
            TransitionRequest::new(ApplicationStatus::Pending, actor.clone()),
        )
    }

    /// Student withdrawal from any non-terminal, not yet approved status.
    pub fn withdraw(
        &self,
        application_id: &ApplicationId,
        student_id: &StudentId,
    ) -> Result<ApplicationRecord, ApplicationError> {
        self.transition(
            application_id,
            TransitionRequest::new(
                ApplicationStatus::Withdrawn,
                Actor::Student(student_id.clone()),
            ),
        )
    }

    /// Move an application along one edge of the lifecycle table.
    pub fn transition(
        &self,
        application_id: &ApplicationId,
        request: TransitionRequest,
    ) -> Result<ApplicationRecord, ApplicationError> {
        let mut record = self.get(application_id)?;

        if let Some(expected) = request.expected_version {
            if expected != record.version {
                return Err(ApplicationError::Conflict {
                    expected,
                    found: record.version,
                });
            }
        }

        let from = record.status;
        let to = request.target;
        let role = request.actor.role();

        if role == ActorRole::Student {
            if let Actor::Student(student) = &request.actor {
                if student != &record.student_id {
                    return Err(ApplicationError::NotOwner {
                        application_id: record.application_id,
                        actor: request.actor,
                    });
                }
            }
        }

        let advisory = self.advisory_for(&record)?;
        lifecycle::authorize(from, to, role, &advisory)
            .map_err(|rejection| ApplicationError::rejected(rejection, role))?;

        if from == ApplicationStatus::Draft && to == ApplicationStatus::Pending {
            let missing = self.completeness.missing_items(&record.student_id)?;
            if !missing.is_empty() {
                return Err(ApplicationError::IncompleteProfile { missing });
            }
        }

        let now = Utc::now();
        record.status = to;
        record.updated_at = now;
        if to == ApplicationStatus::Pending && record.submitted_at.is_none() {
            record.submitted_at = Some(now);
        }
        record.history.push(StatusChange {
            from: Some(from),
            to,
            actor: request.actor.clone(),
            note: request.note.clone(),
            at: now,
        });

        let stored = self
            .repositories
            .applications
            .update(record)
            .map_err(|err| match err {
                RepositoryError::VersionMismatch { expected, found } => {
                    ApplicationError::Conflict { expected, found }
                }
                other => ApplicationError::Repository(other),
            })?;

        info!(
            application_id = %stored.application_id,
            from = from.label(),
            to = to.label(),
            actor = %request.actor,
            version = stored.version,
            "application transitioned"
        );

        self.apply_side_effects(&stored, from, &request)?;
        Ok(stored)
    }

    /// Fetch an application and current status for API responses.
    pub fn get(&self, application_id: &ApplicationId) -> Result<ApplicationRecord, ApplicationError> {
        let record = self
            .repositories
            .applications
            .fetch(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, ApplicationError> {
        let mut filter = filter.clone();
        filter.limit = Some(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT));
        Ok(self.repositories.applications.list(&filter)?)
    }

    /// Advisory records currently attached to an application.
    pub fn advisory(&self, application_id: &ApplicationId) -> Result<AdvisoryContext, ApplicationError> {
        let record = self.get(application_id)?;
        self.advisory_for(&record)
    }

    fn advisory_for(&self, record: &ApplicationRecord) -> Result<AdvisoryContext, ApplicationError> {
        // Only the newest review cycle counts; an open cycle masks older recommendations.
        let field_recommendation = self
            .repositories
            .reviews
            .for_application(&record.application_id)?
            .into_iter()
            .max_by_key(|review| review.cycle)
            .filter(|review| review.status == ReviewStatus::Completed)
            .and_then(|review| review.findings.recommendation);

        let current_interview = self
            .repositories
            .interviews
            .for_application(&record.application_id)?
            .into_iter()
            .filter(|interview| interview.status != InterviewStatus::Cancelled)
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });

        let interview_outcome = match current_interview {
            Some(interview) => {
                let decisions = self.repositories.interviews.decisions(&interview.id)?;
                Some(aggregate(&decisions).outcome)
            }
            None => None,
        };

        let sponsorship_completed = self
            .repositories
            .sponsorships
            .active_for_student(&record.student_id)?
            .is_some_and(|sponsorship| {
                sponsorship.application_id == record.application_id
                    && sponsorship.status == SponsorshipStatus::Completed
            });

        debug!(
            application_id = %record.application_id,
            ?field_recommendation,
            ?interview_outcome,
            sponsorship_completed,
            "advisory context resolved"
        );

        Ok(AdvisoryContext {
            field_recommendation,
            interview_outcome,
            sponsorship_completed,
        })
    }

    fn apply_side_effects(
        &self,
        record: &ApplicationRecord,
        from: ApplicationStatus,
        request: &TransitionRequest,
    ) -> Result<(), ApplicationError> {
        if from == ApplicationStatus::Approved && record.status != ApplicationStatus::Approved {
            if self
                .repositories
                .sponsorships
                .delist_student(&record.student_id)?
                .is_some()
            {
                info!(student_id = %record.student_id, to = record.status.label(), "student removed from sponsorship pool");
            }
        }

        let student = Audience::Student(record.student_id.clone());
        let notification = match record.status {
            ApplicationStatus::Approved => {
                self.repositories.sponsorships.list_student(PoolListing {
                    student_id: record.student_id.clone(),
                    application_id: record.application_id.clone(),
                    outstanding_need: record.requested_amount,
                    currency: record.currency.clone(),
                    listed_at: record.updated_at,
                })?;
                info!(student_id = %record.student_id, need = record.requested_amount, "student listed for sponsorship");
                Some(
                    Notification::new("application_approved", student)
                        .with_detail("requested_amount", record.requested_amount.to_string())
                        .with_detail("currency", record.currency.clone()),
                )
            }
            ApplicationStatus::Rejected => Some(
                Notification::new("application_rejected", student)
                    .with_detail("previous_status", from.label())
                    .with_detail("note", request.note.clone().unwrap_or_default()),
            ),
            ApplicationStatus::Pending if from == ApplicationStatus::CaseWorkerApproved => Some(
                Notification::new("application_returned", student)
                    .with_detail("note", request.note.clone().unwrap_or_default()),
            ),
            ApplicationStatus::Pending => Some(
                Notification::new("application_submitted", Audience::Administrators)
                    .with_detail("student_id", record.student_id.to_string()),
            ),
            ApplicationStatus::Sponsored => Some(
                Notification::new("application_sponsored", student)
                    .with_detail("requested_amount", record.requested_amount.to_string()),
            ),
            _ => None,
        };

        if let Some(notification) = notification {
            self.notifications
                .publish(notification.for_application(&record.application_id))?;
        }
        Ok(())
    }
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Intake(#[from] IntakeViolation),
    #[error("profile incomplete, missing: {}", .missing.join(", "))]
    IncompleteProfile { missing: Vec<String> },
    #[error("student {0} already has an open application")]
    DuplicateApplication(StudentId),
    #[error("transition {from} -> {to} is not permitted for role {role}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
        role: ActorRole,
    },
    #[error("transition {from} -> {to} requires {requirement}")]
    AdvisoryNotSatisfied {
        from: ApplicationStatus,
        to: ApplicationStatus,
        requirement: &'static str,
    },
    #[error("application changed concurrently (expected version {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },
    #[error("{actor} does not own application {application_id}")]
    NotOwner {
        application_id: ApplicationId,
        actor: Actor,
    },
    #[error(transparent)]
    Completeness(#[from] CompletenessError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl ApplicationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApplicationError::Intake(_) => "invalid_application",
            ApplicationError::IncompleteProfile { .. } => "incomplete_profile",
            ApplicationError::DuplicateApplication(_) => "duplicate_application",
            ApplicationError::InvalidTransition { .. } => "invalid_transition",
            ApplicationError::AdvisoryNotSatisfied { .. } => "advisory_not_satisfied",
            ApplicationError::Conflict { .. } => "conflict",
            ApplicationError::NotOwner { .. } => "not_owner",
            ApplicationError::Completeness(_) => "profile_service_unavailable",
            ApplicationError::Repository(RepositoryError::NotFound) => "not_found",
            ApplicationError::Repository(_) => "repository_error",
            ApplicationError::Notification(_) => "notification_error",
        }
    }
}

impl ApplicationError {
    fn rejected(rejection: TransitionRejection, role: ActorRole) -> Self {
        match rejection {
            TransitionRejection::UndefinedEdge { from, to }
            | TransitionRejection::RoleNotPermitted { from, to, .. } => {
                ApplicationError::InvalidTransition { from, to, role }
            }
            TransitionRejection::AdvisoryMissing {
                from,
                to,
                requirement,
            } => ApplicationError::AdvisoryNotSatisfied {
                from,
                to,
                requirement,
            },
        }
    }
}
