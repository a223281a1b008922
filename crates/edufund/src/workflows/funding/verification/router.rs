use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use super::domain::{FieldRecommendation, Findings};
use super::service::{FieldReviewError, FieldReviewService};
use crate::workflows::funding::domain::{ApplicationId, ReviewId, StudentId, VerifierId};
use crate::workflows::funding::repository::RepositoryError;
use crate::workflows::funding::router::error_response;

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub verifier_id: VerifierId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindingsRequest {
    pub verifier_id: VerifierId,
    #[serde(flatten)]
    pub findings: Findings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MissingInfoBody {
    pub verifier_id: VerifierId,
    pub items: Vec<String>,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResubmissionRequest {
    pub student_id: StudentId,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteReviewRequest {
    pub verifier_id: VerifierId,
    pub recommendation: FieldRecommendation,
    pub score: u8,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Router builder exposing field verification endpoints.
pub fn review_router(service: Arc<FieldReviewService>) -> Router {
    Router::new()
        .route(
            "/api/v1/applications/:application_id/reviews",
            post(assign_handler),
        )
        .route("/api/v1/reviews/:review_id", get(review_handler))
        .route("/api/v1/reviews/:review_id/findings", post(findings_handler))
        .route(
            "/api/v1/reviews/:review_id/missing-info",
            post(missing_info_handler),
        )
        .route(
            "/api/v1/reviews/:review_id/resubmissions",
            post(resubmission_handler),
        )
        .route("/api/v1/reviews/:review_id/complete", post(complete_handler))
        .route(
            "/api/v1/verifiers/:verifier_id/reviews",
            get(pending_handler),
        )
        .with_state(service)
}

pub(crate) async fn assign_handler(
    State(service): State<Arc<FieldReviewService>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<AssignRequest>,
) -> Response {
    match service.assign(&ApplicationId(application_id), request.verifier_id) {
        Ok(review) => (StatusCode::CREATED, axum::Json(review)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn review_handler(
    State(service): State<Arc<FieldReviewService>>,
    Path(review_id): Path<String>,
) -> Response {
    match service.get(&ReviewId(review_id)) {
        Ok(review) => (StatusCode::OK, axum::Json(review)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn findings_handler(
    State(service): State<Arc<FieldReviewService>>,
    Path(review_id): Path<String>,
    axum::Json(request): axum::Json<FindingsRequest>,
) -> Response {
    match service.record_findings(&ReviewId(review_id), &request.verifier_id, request.findings) {
        Ok(review) => (StatusCode::OK, axum::Json(review)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn missing_info_handler(
    State(service): State<Arc<FieldReviewService>>,
    Path(review_id): Path<String>,
    axum::Json(request): axum::Json<MissingInfoBody>,
) -> Response {
    match service.request_missing_info(
        &ReviewId(review_id),
        &request.verifier_id,
        request.items,
        request.note,
    ) {
        Ok(review) => (StatusCode::OK, axum::Json(review)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn resubmission_handler(
    State(service): State<Arc<FieldReviewService>>,
    Path(review_id): Path<String>,
    axum::Json(request): axum::Json<ResubmissionRequest>,
) -> Response {
    match service.resolve_missing(&ReviewId(review_id), &request.student_id, &request.documents) {
        Ok(review) => (StatusCode::OK, axum::Json(review)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn complete_handler(
    State(service): State<Arc<FieldReviewService>>,
    Path(review_id): Path<String>,
    axum::Json(request): axum::Json<CompleteReviewRequest>,
) -> Response {
    match service.complete(
        &ReviewId(review_id),
        &request.verifier_id,
        request.recommendation,
        request.score,
        request.rationale,
    ) {
        Ok(review) => (StatusCode::OK, axum::Json(review)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn pending_handler(
    State(service): State<Arc<FieldReviewService>>,
    Path(verifier_id): Path<String>,
) -> Response {
    match service.pending_for(&VerifierId(verifier_id)) {
        Ok(reviews) => (StatusCode::OK, axum::Json(reviews)).into_response(),
        Err(error) => review_error_response(error),
    }
}

fn review_error_response(error: FieldReviewError) -> Response {
    let status = match &error {
        FieldReviewError::AlreadyAssigned(_)
        | FieldReviewError::ReviewClosed(_)
        | FieldReviewError::Conflict { .. } => StatusCode::CONFLICT,
        FieldReviewError::EmptyRequest | FieldReviewError::InvalidScore(_) => {
            StatusCode::BAD_REQUEST
        }
        FieldReviewError::NotAssignedVerifier { .. } | FieldReviewError::NotOwner { .. } => {
            StatusCode::FORBIDDEN
        }
        FieldReviewError::NotInVerification { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FieldReviewError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        FieldReviewError::Repository(_) | FieldReviewError::Notification(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, error.kind(), error.to_string())
}
