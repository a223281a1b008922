use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use super::domain::{Decision, ScheduleRequest};
use super::service::{InterviewError, InterviewService};
use crate::workflows::funding::applications::ApplicationError;
use crate::workflows::funding::domain::{ApplicationId, InterviewId, PanelMemberId};
use crate::workflows::funding::repository::RepositoryError;
use crate::workflows::funding::router::error_response;

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionRequest {
    pub panel_member_id: PanelMemberId,
    pub decision: Decision,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelRequest {
    pub panel: Vec<PanelMemberId>,
}

/// Router builder exposing interview scheduling and voting endpoints.
pub fn interview_router(service: Arc<InterviewService>) -> Router {
    Router::new()
        .route(
            "/api/v1/applications/:application_id/interviews",
            post(schedule_handler),
        )
        .route("/api/v1/interviews/:interview_id", get(interview_handler))
        .route(
            "/api/v1/interviews/:interview_id/decisions",
            post(decision_handler),
        )
        .route("/api/v1/interviews/:interview_id/panel", post(panel_handler))
        .route(
            "/api/v1/interviews/:interview_id/complete",
            post(complete_handler),
        )
        .route("/api/v1/interviews/:interview_id/cancel", post(cancel_handler))
        .with_state(service)
}

pub(crate) async fn schedule_handler(
    State(service): State<Arc<InterviewService>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<ScheduleRequest>,
) -> Response {
    match service.schedule(&ApplicationId(application_id), request) {
        Ok(interview) => (StatusCode::CREATED, axum::Json(interview)).into_response(),
        Err(error) => interview_error_response(error),
    }
}

pub(crate) async fn interview_handler(
    State(service): State<Arc<InterviewService>>,
    Path(interview_id): Path<String>,
) -> Response {
    match service.get(&InterviewId(interview_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => interview_error_response(error),
    }
}

pub(crate) async fn decision_handler(
    State(service): State<Arc<InterviewService>>,
    Path(interview_id): Path<String>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response {
    match service.record_decision(
        &InterviewId(interview_id),
        &request.panel_member_id,
        request.decision,
        request.comment,
    ) {
        Ok(view) => (StatusCode::CREATED, axum::Json(view)).into_response(),
        Err(error) => interview_error_response(error),
    }
}

pub(crate) async fn panel_handler(
    State(service): State<Arc<InterviewService>>,
    Path(interview_id): Path<String>,
    axum::Json(request): axum::Json<PanelRequest>,
) -> Response {
    match service.replace_panel(&InterviewId(interview_id), request.panel) {
        Ok(interview) => (StatusCode::OK, axum::Json(interview)).into_response(),
        Err(error) => interview_error_response(error),
    }
}

pub(crate) async fn complete_handler(
    State(service): State<Arc<InterviewService>>,
    Path(interview_id): Path<String>,
) -> Response {
    match service.complete(&InterviewId(interview_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => interview_error_response(error),
    }
}

pub(crate) async fn cancel_handler(
    State(service): State<Arc<InterviewService>>,
    Path(interview_id): Path<String>,
) -> Response {
    match service.cancel(&InterviewId(interview_id)) {
        Ok(interview) => (StatusCode::OK, axum::Json(interview)).into_response(),
        Err(error) => interview_error_response(error),
    }
}

fn interview_error_response(error: InterviewError) -> Response {
    let status = match &error {
        InterviewError::NotEligible(_) | InterviewError::NotOnPanel { .. } => {
            StatusCode::BAD_REQUEST
        }
        InterviewError::DuplicateDecision(_)
        | InterviewError::InterviewClosed(_)
        | InterviewError::CannotCancel { .. }
        | InterviewError::PanelLocked(_)
        | InterviewError::AwaitingVotes { .. }
        | InterviewError::Conflict { .. } => StatusCode::CONFLICT,
        InterviewError::Application(ApplicationError::Repository(RepositoryError::NotFound))
        | InterviewError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        InterviewError::Application(ApplicationError::Conflict { .. }) => StatusCode::CONFLICT,
        InterviewError::Application(_) | InterviewError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, error.kind(), error.to_string())
}
