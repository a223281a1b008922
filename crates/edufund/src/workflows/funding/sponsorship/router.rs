use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use super::domain::ClaimRequest;
use super::service::{SponsorshipError, SponsorshipService};
use crate::workflows::funding::applications::ApplicationError;
use crate::workflows::funding::domain::{Actor, SponsorshipId, StudentId};
use crate::workflows::funding::payments::PlanError;
use crate::workflows::funding::repository::RepositoryError;
use crate::workflows::funding::router::error_response;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseRequest {
    pub actor: Actor,
}

/// Router builder exposing the sponsorship pool and claim endpoints.
pub fn sponsorship_router(service: Arc<SponsorshipService>) -> Router {
    Router::new()
        .route("/api/v1/sponsorships", post(claim_handler))
        .route("/api/v1/sponsorships/pool", get(pool_handler))
        .route(
            "/api/v1/sponsorships/:sponsorship_id",
            get(sponsorship_handler),
        )
        .route(
            "/api/v1/sponsorships/:sponsorship_id/release",
            post(release_handler),
        )
        .route(
            "/api/v1/students/:student_id/sponsorship",
            get(student_sponsorship_handler),
        )
        .with_state(service)
}

pub(crate) async fn claim_handler(
    State(service): State<Arc<SponsorshipService>>,
    axum::Json(request): axum::Json<ClaimRequest>,
) -> Response {
    match service.claim(request) {
        Ok(sponsorship) => (StatusCode::CREATED, axum::Json(sponsorship)).into_response(),
        Err(error) => sponsorship_error_response(error),
    }
}

pub(crate) async fn pool_handler(
    State(service): State<Arc<SponsorshipService>>,
    Query(query): Query<PoolQuery>,
) -> Response {
    match service.pool(query.limit) {
        Ok(listings) => (StatusCode::OK, axum::Json(listings)).into_response(),
        Err(error) => sponsorship_error_response(error),
    }
}

pub(crate) async fn sponsorship_handler(
    State(service): State<Arc<SponsorshipService>>,
    Path(sponsorship_id): Path<String>,
) -> Response {
    match service.get(&SponsorshipId(sponsorship_id)) {
        Ok(sponsorship) => (StatusCode::OK, axum::Json(sponsorship)).into_response(),
        Err(error) => sponsorship_error_response(error),
    }
}

pub(crate) async fn release_handler(
    State(service): State<Arc<SponsorshipService>>,
    Path(sponsorship_id): Path<String>,
    axum::Json(request): axum::Json<ReleaseRequest>,
) -> Response {
    match service.release(&SponsorshipId(sponsorship_id), &request.actor) {
        Ok(sponsorship) => (StatusCode::OK, axum::Json(sponsorship)).into_response(),
        Err(error) => sponsorship_error_response(error),
    }
}

pub(crate) async fn student_sponsorship_handler(
    State(service): State<Arc<SponsorshipService>>,
    Path(student_id): Path<String>,
) -> Response {
    match service.active_for_student(&StudentId(student_id)) {
        Ok(Some(sponsorship)) => (StatusCode::OK, axum::Json(sponsorship)).into_response(),
        Ok(None) => sponsorship_error_response(SponsorshipError::Repository(
            RepositoryError::NotFound,
        )),
        Err(error) => sponsorship_error_response(error),
    }
}

fn sponsorship_error_response(error: SponsorshipError) -> Response {
    let status = match &error {
        SponsorshipError::AlreadySponsored(_)
        | SponsorshipError::CannotRelease { .. }
        | SponsorshipError::Conflict { .. } => StatusCode::CONFLICT,
        SponsorshipError::NotEligible(_)
        | SponsorshipError::AmountMismatch { .. }
        | SponsorshipError::UnknownInstallment(_)
        | SponsorshipError::Inactive(_) => StatusCode::BAD_REQUEST,
        SponsorshipError::Plan(PlanError::InvalidAmount { .. })
        | SponsorshipError::Plan(PlanError::UnknownCadence(_)) => StatusCode::BAD_REQUEST,
        SponsorshipError::NotAuthorized(_) => StatusCode::FORBIDDEN,
        SponsorshipError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        SponsorshipError::Application(ApplicationError::InvalidTransition { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SponsorshipError::Plan(_)
        | SponsorshipError::Application(_)
        | SponsorshipError::Repository(_)
        | SponsorshipError::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, error.kind(), error.to_string())
}
