use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use serde_json::json;

use super::applications::application_router;
use super::interviews::interview_router;
use super::payments::payment_router;
use super::sponsorship::sponsorship_router;
use super::verification::review_router;
use super::FundingServices;

/// Every funding endpoint merged into one router.
pub fn funding_router(services: &FundingServices) -> Router {
    Router::new()
        .merge(application_router(services.applications.clone()))
        .merge(review_router(services.reviews.clone()))
        .merge(interview_router(services.interviews.clone()))
        .merge(sponsorship_router(services.sponsorships.clone()))
        .merge(payment_router(services.payments.clone()))
}

/// JSON error body shared by every funding handler.
pub(crate) fn error_response(status: StatusCode, kind: &str, message: String) -> Response {
    let payload = json!({
        "error": message,
        "kind": kind,
    });
    (status, axum::Json(payload)).into_response()
}
