use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ApplicationDetails, ApplicationFilter, TransitionRequest};
use super::lifecycle;
use super::service::{ApplicationError, ApplicationService};
use crate::workflows::funding::domain::{Actor, ApplicationId, StudentId};
use crate::workflows::funding::repository::RepositoryError;
use crate::workflows::funding::router::error_response;

/// Body of the draft creation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftRequest {
    pub student_id: StudentId,
    #[serde(flatten)]
    pub details: ApplicationDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActorRequest {
    pub actor: Actor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub student_id: StudentId,
}

/// Router builder exposing the application lifecycle endpoints.
pub fn application_router(service: Arc<ApplicationService>) -> Router {
    Router::new()
        .route(
            "/api/v1/applications",
            post(create_handler).get(list_handler),
        )
        .route("/api/v1/applications/:application_id", get(status_handler))
        .route(
            "/api/v1/applications/:application_id/submit",
            post(submit_handler),
        )
        .route(
            "/api/v1/applications/:application_id/transitions",
            post(transition_handler),
        )
        .route(
            "/api/v1/applications/:application_id/withdraw",
            post(withdraw_handler),
        )
        .with_state(service)
}

pub(crate) async fn create_handler(
    State(service): State<Arc<ApplicationService>>,
    axum::Json(request): axum::Json<DraftRequest>,
) -> Response {
    match service.create_draft(request.student_id, request.details) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record.status_view())).into_response(),
        Err(error) => application_error_response(error),
    }
}

pub(crate) async fn list_handler(
    State(service): State<Arc<ApplicationService>>,
    Query(filter): Query<ApplicationFilter>,
) -> Response {
    match service.list(&filter) {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(|record| record.status_view()).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => application_error_response(error),
    }
}

pub(crate) async fn status_handler(
    State(service): State<Arc<ApplicationService>>,
    Path(application_id): Path<String>,
) -> Response {
    let id = ApplicationId(application_id);
    match service.get(&id) {
        Ok(record) => {
            let payload = json!({
                "application": record.status_view(),
                "history": record.history,
                "next_statuses": lifecycle::targets_from(record.status),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => application_error_response(error),
    }
}

pub(crate) async fn submit_handler(
    State(service): State<Arc<ApplicationService>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response {
    let id = ApplicationId(application_id);
    match service.submit(&id, &request.actor) {
        Ok(record) => (StatusCode::ACCEPTED, axum::Json(record.status_view())).into_response(),
        Err(error) => application_error_response(error),
    }
}

pub(crate) async fn transition_handler(
    State(service): State<Arc<ApplicationService>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response {
    let id = ApplicationId(application_id);
    match service.transition(&id, request) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => application_error_response(error),
    }
}

pub(crate) async fn withdraw_handler(
    State(service): State<Arc<ApplicationService>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<WithdrawRequest>,
) -> Response {
    let id = ApplicationId(application_id);
    match service.withdraw(&id, &request.student_id) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => application_error_response(error),
    }
}

fn application_error_response(error: ApplicationError) -> Response {
    let status = match &error {
        ApplicationError::Intake(_) => StatusCode::BAD_REQUEST,
        ApplicationError::IncompleteProfile { .. }
        | ApplicationError::InvalidTransition { .. }
        | ApplicationError::AdvisoryNotSatisfied { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ApplicationError::DuplicateApplication(_) | ApplicationError::Conflict { .. } => {
            StatusCode::CONFLICT
        }
        ApplicationError::NotOwner { .. } => StatusCode::FORBIDDEN,
        ApplicationError::Completeness(_) => StatusCode::SERVICE_UNAVAILABLE,
        ApplicationError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ApplicationError::Repository(_) | ApplicationError::Notification(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if let ApplicationError::IncompleteProfile { missing } = &error {
        let payload = json!({
            "error": error.to_string(),
            "kind": error.kind(),
            "missing": missing,
        });
        return (status, axum::Json(payload)).into_response();
    }

    error_response(status, error.kind(), error.to_string())
}
