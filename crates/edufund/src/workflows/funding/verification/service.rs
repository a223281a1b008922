use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{FieldRecommendation, FieldReview, Findings, MissingInfoRequest, ReviewStatus};
use crate::workflows::funding::applications::ApplicationStatus;
use crate::workflows::funding::domain::{
    ApplicationId, IdSequence, ReviewId, StudentId, VerifierId,
};
use crate::workflows::funding::repository::{
    Audience, Notification, NotificationError, NotificationPublisher, Repositories,
    RepositoryError,
};

static REVIEW_SEQUENCE: IdSequence = IdSequence::new("rev");

const MAX_SCORE: u8 = 100;

/// Service running field verification cycles for pending applications.
pub struct FieldReviewService {
    repositories: Repositories,
    notifications: Arc<dyn NotificationPublisher>,
}

impl FieldReviewService {
    pub fn new(repositories: Repositories, notifications: Arc<dyn NotificationPublisher>) -> Self {
        Self {
            repositories,
            notifications,
        }
    }

    /// Open a new verification cycle for a pending application.
    pub fn assign(
        &self,
        application_id: &ApplicationId,
        verifier_id: VerifierId,
    ) -> Result<FieldReview, FieldReviewError> {
        let application = self
            .repositories
            .applications
            .fetch(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        if application.status != ApplicationStatus::Pending {
            return Err(FieldReviewError::NotInVerification {
                application_id: application_id.clone(),
                status: application.status,
            });
        }

        let existing = self.repositories.reviews.for_application(application_id)?;
        if existing.iter().any(|review| review.status.is_active()) {
            return Err(FieldReviewError::AlreadyAssigned(application_id.clone()));
        }
        let cycle = existing.iter().map(|review| review.cycle).max().unwrap_or(0) + 1;

        let now = Utc::now();
        let review = FieldReview {
            id: ReviewId(REVIEW_SEQUENCE.next()),
            application_id: application_id.clone(),
            student_id: application.student_id,
            verifier_id,
            cycle,
            status: ReviewStatus::Pending,
            findings: Findings::default(),
            missing_documents: Vec::new(),
            info_requests: Vec::new(),
            version: 0,
            assigned_at: now,
            updated_at: now,
            completed_at: None,
        };

        let stored = self
            .repositories
            .reviews
            .insert(review)
            .map_err(|err| match err {
                RepositoryError::Conflict => FieldReviewError::AlreadyAssigned(application_id.clone()),
                other => FieldReviewError::Repository(other),
            })?;
        info!(review_id = %stored.id, application_id = %application_id, verifier_id = %stored.verifier_id, cycle, "field review assigned");
        Ok(stored)
    }

    /// Merge observations into an open review. The first write starts the visit.
    pub fn record_findings(
        &self,
        review_id: &ReviewId,
        verifier_id: &VerifierId,
        patch: Findings,
    ) -> Result<FieldReview, FieldReviewError> {
        let mut review = self.open_review(review_id, verifier_id)?;
        if let Some(score) = patch.verification_score {
            validate_score(score)?;
        }

        review.findings.merge(patch);
        if review.status == ReviewStatus::Pending {
            review.status = ReviewStatus::InProgress;
        }
        review.updated_at = Utc::now();
        self.store(review)
    }

    /// Ask the student for outstanding documents. The review status does not change.
    pub fn request_missing_info(
        &self,
        review_id: &ReviewId,
        verifier_id: &VerifierId,
        items: Vec<String>,
        note: impl Into<String>,
    ) -> Result<FieldReview, FieldReviewError> {
        let items: Vec<String> = items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            return Err(FieldReviewError::EmptyRequest);
        }

        let mut review = self.open_review(review_id, verifier_id)?;
        let note = note.into();
        let now = Utc::now();

        for item in &items {
            if !review.missing_documents.contains(item) {
                review.missing_documents.push(item.clone());
            }
        }
        review.info_requests.push(MissingInfoRequest {
            items: items.clone(),
            note: note.clone(),
            requested_at: now,
        });
        review.updated_at = now;

        let stored = self.store(review)?;
        self.notifications.publish(
            Notification::new(
                "missing_information_requested",
                Audience::Student(stored.student_id.clone()),
            )
            .for_application(&stored.application_id)
            .with_detail("items", items.join(", "))
            .with_detail("note", note)
            .with_detail("review_id", stored.id.to_string()),
        )?;
        info!(review_id = %stored.id, items = items.len(), "missing information requested");
        Ok(stored)
    }

    /// Student resubmission of documents previously requested.
    pub fn resolve_missing(
        &self,
        review_id: &ReviewId,
        student_id: &StudentId,
        documents: &[String],
    ) -> Result<FieldReview, FieldReviewError> {
        let mut review = self.get(review_id)?;
        if review.status == ReviewStatus::Completed {
            return Err(FieldReviewError::ReviewClosed(review.id));
        }
        if &review.student_id != student_id {
            return Err(FieldReviewError::NotOwner {
                review_id: review.id,
                student_id: student_id.clone(),
            });
        }

        review
            .missing_documents
            .retain(|item| !documents.iter().any(|doc| doc.trim() == item));
        review.updated_at = Utc::now();
        self.store(review)
    }

    /// Close the cycle with a recommendation. Nothing can be written afterwards.
    pub fn complete(
        &self,
        review_id: &ReviewId,
        verifier_id: &VerifierId,
        recommendation: FieldRecommendation,
        score: u8,
        rationale: Option<String>,
    ) -> Result<FieldReview, FieldReviewError> {
        validate_score(score)?;
        let mut review = self.open_review(review_id, verifier_id)?;

        let now = Utc::now();
        review.findings.recommendation = Some(recommendation);
        review.findings.verification_score = Some(score);
        if rationale.is_some() {
            review.findings.rationale = rationale;
        }
        review.status = ReviewStatus::Completed;
        review.completed_at = Some(now);
        review.updated_at = now;

        let stored = self.store(review)?;
        self.notifications.publish(
            Notification::new("field_review_completed", Audience::Administrators)
                .for_application(&stored.application_id)
                .with_detail("recommendation", recommendation.label())
                .with_detail("score", score.to_string()),
        )?;
        info!(
            review_id = %stored.id,
            application_id = %stored.application_id,
            recommendation = recommendation.label(),
            score,
            "field review completed"
        );
        Ok(stored)
    }

    pub fn get(&self, review_id: &ReviewId) -> Result<FieldReview, FieldReviewError> {
        let review = self
            .repositories
            .reviews
            .fetch(review_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(review)
    }

    /// Active reviews for a verifier, oldest assignment first.
    pub fn pending_for(&self, verifier_id: &VerifierId) -> Result<Vec<FieldReview>, FieldReviewError> {
        let mut reviews = self.repositories.reviews.active_for_verifier(verifier_id)?;
        reviews.sort_by_key(|review| review.assigned_at);
        Ok(reviews)
    }

    fn open_review(
        &self,
        review_id: &ReviewId,
        verifier_id: &VerifierId,
    ) -> Result<FieldReview, FieldReviewError> {
        let review = self.get(review_id)?;
        if review.status == ReviewStatus::Completed {
            return Err(FieldReviewError::ReviewClosed(review.id));
        }
        if &review.verifier_id != verifier_id {
            return Err(FieldReviewError::NotAssignedVerifier {
                review_id: review.id,
                verifier_id: verifier_id.clone(),
            });
        }
        Ok(review)
    }

    fn store(&self, review: FieldReview) -> Result<FieldReview, FieldReviewError> {
        let review_id = review.id.clone();
        self.repositories
            .reviews
            .update(review)
            .map_err(|err| match err {
                RepositoryError::Conflict => FieldReviewError::ReviewClosed(review_id),
                RepositoryError::VersionMismatch { expected, found } => {
                    FieldReviewError::Conflict { expected, found }
                }
                other => FieldReviewError::Repository(other),
            })
    }
}

fn validate_score(score: u8) -> Result<(), FieldReviewError> {
    if score > MAX_SCORE {
        return Err(FieldReviewError::InvalidScore(score));
    }
    Ok(())
}

/// Error raised by the field verification service.
#[derive(Debug, thiserror::Error)]
pub enum FieldReviewError {
    #[error("application {0} already has an active field review")]
    AlreadyAssigned(ApplicationId),
    #[error("field review {0} is completed")]
    ReviewClosed(ReviewId),
    #[error("missing information request must name at least one item")]
    EmptyRequest,
    #[error("verification score {0} is outside 0..=100")]
    InvalidScore(u8),
    #[error("verifier {verifier_id} is not assigned to review {review_id}")]
    NotAssignedVerifier {
        review_id: ReviewId,
        verifier_id: VerifierId,
    },
    #[error("application {application_id} is {status}, not awaiting verification")]
    NotInVerification {
        application_id: ApplicationId,
        status: ApplicationStatus,
    },
    #[error("student {student_id} does not own review {review_id}")]
    NotOwner {
        review_id: ReviewId,
        student_id: StudentId,
    },
    #[error("review changed concurrently (expected version {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl FieldReviewError {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldReviewError::AlreadyAssigned(_) => "already_assigned",
            FieldReviewError::ReviewClosed(_) => "review_closed",
            FieldReviewError::EmptyRequest => "empty_request",
            FieldReviewError::InvalidScore(_) => "invalid_score",
            FieldReviewError::NotAssignedVerifier { .. } => "not_assigned_verifier",
            FieldReviewError::NotInVerification { .. } => "not_in_verification",
            FieldReviewError::NotOwner { .. } => "not_owner",
            FieldReviewError::Conflict { .. } => "conflict",
            FieldReviewError::Repository(RepositoryError::NotFound) => "not_found",
            FieldReviewError::Repository(_) => "repository_error",
            FieldReviewError::Notification(_) => "notification_error",
        }
    }
}
