use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::plan::{Cadence, PlanError};
use super::service::{ConfirmRequest, CreateIntentRequest, PaymentError, PaymentService};
use crate::workflows::funding::repository::RepositoryError;
use crate::workflows::funding::router::error_response;
use crate::workflows::funding::sponsorship::SponsorshipError;

#[derive(Debug, Clone, Deserialize)]
pub struct PlanQuery {
    pub total_need: u64,
    pub cadence: Cadence,
    #[serde(default)]
    pub start: Option<NaiveDate>,
}

/// Router builder exposing plan previews and the processor-backed payment flow.
pub fn payment_router(service: Arc<PaymentService>) -> Router {
    Router::new()
        .route("/api/v1/payment-plans", get(plan_handler))
        .route("/api/v1/payments/intents", post(intent_handler))
        .route("/api/v1/payments/confirm", post(confirm_handler))
        .with_state(service)
}

pub(crate) async fn plan_handler(
    State(service): State<Arc<PaymentService>>,
    Query(query): Query<PlanQuery>,
) -> Response {
    let plan = match service.plan(query.total_need, query.cadence) {
        Ok(plan) => plan,
        Err(error) => return payment_error_response(error),
    };

    let schedule = match query.start.map(|start| plan.schedule_from(start)).transpose() {
        Ok(schedule) => schedule,
        Err(error) => return payment_error_response(error.into()),
    };

    let payload = json!({
        "total": plan.total,
        "cadence": plan.cadence,
        "installments": plan.installments(),
        "schedule": schedule,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn intent_handler(
    State(service): State<Arc<PaymentService>>,
    axum::Json(request): axum::Json<CreateIntentRequest>,
) -> Response {
    match service.create_intent(request).await {
        Ok(receipt) => (StatusCode::CREATED, axum::Json(receipt)).into_response(),
        Err(error) => payment_error_response(error),
    }
}

pub(crate) async fn confirm_handler(
    State(service): State<Arc<PaymentService>>,
    axum::Json(request): axum::Json<ConfirmRequest>,
) -> Response {
    match service
        .confirm(&request.intent_id, &request.sponsorship_id)
        .await
    {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(error) => payment_error_response(error),
    }
}

fn payment_error_response(error: PaymentError) -> Response {
    let status = match &error {
        PaymentError::PaymentFailed { .. } => StatusCode::PAYMENT_REQUIRED,
        PaymentError::NoActiveSponsorship(_)
        | PaymentError::UnknownIntent(_)
        | PaymentError::Sponsorship(SponsorshipError::Repository(RepositoryError::NotFound)) => {
            StatusCode::NOT_FOUND
        }
        PaymentError::PlanMismatch { .. }
        | PaymentError::IntentMismatch { .. }
        | PaymentError::Plan(PlanError::InvalidAmount { .. })
        | PaymentError::Plan(PlanError::UnknownCadence(_))
        | PaymentError::Plan(PlanError::DateOutOfRange(_))
        | PaymentError::Sponsorship(SponsorshipError::AmountMismatch { .. }) => {
            StatusCode::BAD_REQUEST
        }
        PaymentError::NothingOutstanding(_)
        | PaymentError::ConfirmationInProgress(_)
        | PaymentError::Sponsorship(SponsorshipError::Conflict { .. })
        | PaymentError::Sponsorship(SponsorshipError::Inactive(_)) => StatusCode::CONFLICT,
        PaymentError::LedgerUnavailable
        | PaymentError::Plan(_)
        | PaymentError::Sponsorship(_)
        | PaymentError::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, error.kind(), error.to_string())
}
