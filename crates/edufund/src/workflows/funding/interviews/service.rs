use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::aggregate::{aggregate, InterviewOutcome, OutcomeSummary};
use super::domain::{
    Decision, Interview, InterviewDecision, InterviewStatus, ScheduleRequest,
};
use super::repository::PanelDirectory;
use crate::workflows::funding::applications::{
    ApplicationError, ApplicationService, ApplicationStatus, TransitionRequest,
};
use crate::workflows::funding::domain::{
    Actor, ApplicationId, IdSequence, InterviewId, PanelMemberId,
};
use crate::workflows::funding::repository::{Repositories, RepositoryError};

static INTERVIEW_SEQUENCE: IdSequence = IdSequence::new("int");

const DECISION_ATTEMPTS: usize = 3;

/// Interview together with its votes and the current aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewView {
    pub interview: Interview,
    pub decisions: Vec<InterviewDecision>,
    pub outcome: OutcomeSummary,
}

/// Service scheduling board interviews and collecting panel decisions.
pub struct InterviewService {
    repositories: Repositories,
    applications: Arc<ApplicationService>,
    panel: Arc<dyn PanelDirectory>,
}

impl InterviewService {
    pub fn new(
        repositories: Repositories,
        applications: Arc<ApplicationService>,
        panel: Arc<dyn PanelDirectory>,
    ) -> Self {
        Self {
            repositories,
            applications,
            panel,
        }
    }

    /// Schedule an interview for an application that cleared field verification.
    pub fn schedule(
        &self,
        application_id: &ApplicationId,
        request: ScheduleRequest,
    ) -> Result<Interview, InterviewError> {
        let application = self.applications.get(application_id)?;
        if !matches!(
            application.status,
            ApplicationStatus::CaseWorkerApproved | ApplicationStatus::InterviewStage
        ) {
            return Err(InterviewError::NotEligible(format!(
                "application {application_id} is {} and has not cleared field verification",
                application.status
            )));
        }

        self.validate_panel(&request.panel)?;

        let existing = self.repositories.interviews.for_application(application_id)?;
        for interview in existing
            .iter()
            .filter(|interview| interview.status != InterviewStatus::Cancelled)
        {
            // A deadlocked panel gets a new round; any other outcome stands.
            let deadlocked = interview.status == InterviewStatus::Completed
                && self.outcome(&interview.id)?.outcome == InterviewOutcome::Inconclusive;
            if !deadlocked {
                return Err(InterviewError::NotEligible(format!(
                    "application {application_id} already has an interview"
                )));
            }
        }

        if application.status == ApplicationStatus::CaseWorkerApproved {
            self.applications.transition(
                application_id,
                TransitionRequest::new(
                    ApplicationStatus::InterviewStage,
                    Actor::Administrator(request.scheduled_by.clone()),
                )
                .expecting(application.version),
            )?;
        }

        let now = Utc::now();
        let interview = Interview {
            id: InterviewId(INTERVIEW_SEQUENCE.next()),
            application_id: application_id.clone(),
            scheduled_for: request.scheduled_for,
            location: request.location,
            status: InterviewStatus::Scheduled,
            panel: request.panel,
            scheduled_by: request.scheduled_by,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .repositories
            .interviews
            .insert(interview)
            .map_err(|err| match err {
                RepositoryError::Conflict => InterviewError::NotEligible(format!(
                    "application {application_id} already has an interview"
                )),
                other => InterviewError::Repository(other),
            })?;
        info!(
            interview_id = %stored.id,
            application_id = %application_id,
            panel = stored.panel.len(),
            scheduled_for = %stored.scheduled_for,
            "interview scheduled"
        );
        Ok(stored)
    }

    /// Append one panel member's vote. Votes are never edited.
    pub fn record_decision(
        &self,
        interview_id: &InterviewId,
        member: &PanelMemberId,
        decision: Decision,
        comment: Option<String>,
    ) -> Result<InterviewView, InterviewError> {
        for attempt in 1..=DECISION_ATTEMPTS {
            let interview = self.fetch(interview_id)?;
            if !interview.status.accepts_decisions() {
                return Err(InterviewError::InterviewClosed(interview.id));
            }
            if !interview.has_panelist(member) {
                return Err(InterviewError::NotOnPanel {
                    interview_id: interview.id,
                    member: member.clone(),
                });
            }

            let decisions = self.repositories.interviews.decisions(interview_id)?;
            if decisions.iter().any(|entry| &entry.panel_member_id == member) {
                return Err(InterviewError::DuplicateDecision(member.clone()));
            }

            let entry = InterviewDecision {
                interview_id: interview_id.clone(),
                panel_member_id: member.clone(),
                decision,
                comment: comment.clone(),
                recorded_at: Utc::now(),
            };

            match self
                .repositories
                .interviews
                .append_decision(entry, interview.version)
            {
                Ok(_) => {
                    info!(interview_id = %interview_id, member = %member, ?decision, "panel decision recorded");
                    return self.get(interview_id);
                }
                Err(RepositoryError::Conflict) => {
                    return Err(InterviewError::DuplicateDecision(member.clone()))
                }
                Err(RepositoryError::VersionMismatch { .. }) if attempt < DECISION_ATTEMPTS => {
                    warn!(interview_id = %interview_id, attempt, "interview changed while voting, retrying");
                }
                Err(RepositoryError::VersionMismatch { expected, found }) => {
                    return Err(InterviewError::Conflict { expected, found })
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(InterviewError::Repository(RepositoryError::Unavailable(
            "decision retries exhausted".to_string(),
        )))
    }

    /// Swap the panel before anyone has voted.
    pub fn replace_panel(
        &self,
        interview_id: &InterviewId,
        panel: Vec<PanelMemberId>,
    ) -> Result<Interview, InterviewError> {
        let mut interview = self.fetch(interview_id)?;
        if !interview.status.accepts_decisions() {
            return Err(InterviewError::InterviewClosed(interview.id));
        }
        if !self.repositories.interviews.decisions(interview_id)?.is_empty() {
            return Err(InterviewError::PanelLocked(interview.id));
        }
        self.validate_panel(&panel)?;

        interview.panel = panel;
        interview.updated_at = Utc::now();
        self.store(interview)
    }

    /// Close voting. An inconclusive interview stays open while panel members have yet to vote.
    pub fn complete(&self, interview_id: &InterviewId) -> Result<InterviewView, InterviewError> {
        let mut interview = self.fetch(interview_id)?;
        if !interview.status.accepts_decisions() {
            return Err(InterviewError::InterviewClosed(interview.id));
        }
        let decisions = self.repositories.interviews.decisions(interview_id)?;
        let awaiting = interview.panel.len().saturating_sub(decisions.len());
        if awaiting > 0 && aggregate(&decisions).outcome == InterviewOutcome::Inconclusive {
            return Err(InterviewError::AwaitingVotes {
                interview_id: interview.id,
                awaiting,
            });
        }
        interview.status = InterviewStatus::Completed;
        interview.updated_at = Utc::now();
        let stored = self.store(interview)?;

        let view = self.get(&stored.id)?;
        info!(interview_id = %stored.id, outcome = ?view.outcome.outcome, "interview completed");
        Ok(view)
    }

    /// Cancellation is only possible before the interview starts.
    pub fn cancel(&self, interview_id: &InterviewId) -> Result<Interview, InterviewError> {
        let mut interview = self.fetch(interview_id)?;
        if interview.status != InterviewStatus::Scheduled {
            return Err(InterviewError::CannotCancel {
                interview_id: interview.id,
                status: interview.status,
            });
        }
        interview.status = InterviewStatus::Cancelled;
        interview.updated_at = Utc::now();
        let stored = self.store(interview)?;
        info!(interview_id = %stored.id, application_id = %stored.application_id, "interview cancelled");
        Ok(stored)
    }

    pub fn get(&self, interview_id: &InterviewId) -> Result<InterviewView, InterviewError> {
        let interview = self.fetch(interview_id)?;
        let decisions = self.repositories.interviews.decisions(interview_id)?;
        let outcome = aggregate(&decisions);
        Ok(InterviewView {
            interview,
            decisions,
            outcome,
        })
    }

    pub fn outcome(&self, interview_id: &InterviewId) -> Result<OutcomeSummary, InterviewError> {
        self.fetch(interview_id)?;
        let decisions = self.repositories.interviews.decisions(interview_id)?;
        Ok(aggregate(&decisions))
    }

    fn fetch(&self, interview_id: &InterviewId) -> Result<Interview, InterviewError> {
        let interview = self
            .repositories
            .interviews
            .fetch(interview_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(interview)
    }

    fn store(&self, interview: Interview) -> Result<Interview, InterviewError> {
        self.repositories
            .interviews
            .update(interview)
            .map_err(|err| match err {
                RepositoryError::VersionMismatch { expected, found } => {
                    InterviewError::Conflict { expected, found }
                }
                other => InterviewError::Repository(other),
            })
    }

    fn validate_panel(&self, panel: &[PanelMemberId]) -> Result<(), InterviewError> {
        if panel.is_empty() {
            return Err(InterviewError::NotEligible(
                "interview panel must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for member in panel {
            if !seen.insert(member) {
                return Err(InterviewError::NotEligible(format!(
                    "panel member {member} listed twice"
                )));
            }
            if !self.panel.is_active(member) {
                return Err(InterviewError::NotEligible(format!(
                    "panel member {member} is not active"
                )));
            }
        }
        Ok(())
    }
}

/// Error raised by the interview service.
#[derive(Debug, thiserror::Error)]
pub enum InterviewError {
    #[error("not eligible: {0}")]
    NotEligible(String),
    #[error("{member} is not on the panel of interview {interview_id}")]
    NotOnPanel {
        interview_id: InterviewId,
        member: PanelMemberId,
    },
    #[error("{0} already recorded a decision")]
    DuplicateDecision(PanelMemberId),
    #[error("interview {0} no longer accepts changes")]
    InterviewClosed(InterviewId),
    #[error("interview {interview_id} is {} and cannot be cancelled", .status.label())]
    CannotCancel {
        interview_id: InterviewId,
        status: InterviewStatus,
    },
    #[error("panel of interview {0} is locked once decisions exist")]
    PanelLocked(InterviewId),
    #[error("interview {interview_id} is inconclusive with {awaiting} vote(s) outstanding")]
    AwaitingVotes {
        interview_id: InterviewId,
        awaiting: usize,
    },
    #[error("interview changed concurrently (expected version {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl InterviewError {
    pub fn kind(&self) -> &'static str {
        match self {
            InterviewError::NotEligible(_) => "not_eligible",
            InterviewError::NotOnPanel { .. } => "not_on_panel",
            InterviewError::DuplicateDecision(_) => "duplicate_decision",
            InterviewError::InterviewClosed(_) => "interview_closed",
            InterviewError::CannotCancel { .. } => "cannot_cancel",
            InterviewError::PanelLocked(_) => "panel_locked",
            InterviewError::AwaitingVotes { .. } => "awaiting_votes",
            InterviewError::Conflict { .. } => "conflict",
            InterviewError::Application(error) => error.kind(),
            InterviewError::Repository(RepositoryError::NotFound) => "not_found",
            InterviewError::Repository(_) => "repository_error",
        }
    }
}
