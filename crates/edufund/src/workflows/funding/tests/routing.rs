use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::funding::payments::Cadence;
use crate::workflows::funding::sponsorship::ClaimRequest;
use crate::workflows::funding::{funding_router, DonorId};
use crate::workflows::funding::verification::router::review_handler;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

fn draft_body(student_id: &str) -> Value {
    json!({
        "student_id": student_id,
        "institution": "Government College University",
        "programme": "BS Physics",
        "term": "2026-2027",
        "expenses": {
            "tuition": 900,
            "hostel": 100,
            "scholarship": 0
        }
    })
}

#[tokio::test]
async fn draft_submission_and_status_round_trip_over_http() {
    let fixture = fixture();

    let created = funding_router(&fixture.services)
        .oneshot(post_json("/api/v1/applications", draft_body("stu-http")))
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::CREATED);
    let draft = read_json_body(created).await;
    assert_eq!(draft["status"], "DRAFT");
    assert_eq!(draft["requested_amount"], 1_000);
    let application_id = draft["application_id"]
        .as_str()
        .expect("application id")
        .to_string();

    let submitted = funding_router(&fixture.services)
        .oneshot(post_json(
            &format!("/api/v1/applications/{application_id}/submit"),
            json!({ "actor": { "role": "student", "id": "stu-http" } }),
        ))
        .await
        .expect("route executes");
    assert_eq!(submitted.status(), StatusCode::ACCEPTED);

    let status = funding_router(&fixture.services)
        .oneshot(get(&format!("/api/v1/applications/{application_id}")))
        .await
        .expect("route executes");
    assert_eq!(status.status(), StatusCode::OK);
    let payload = read_json_body(status).await;
    assert_eq!(payload["application"]["status"], "PENDING");
    assert_eq!(payload["history"].as_array().map(Vec::len), Some(2));
    assert!(payload["next_statuses"]
        .as_array()
        .expect("next statuses")
        .contains(&json!("CASE_WORKER_APPROVED")));
}

#[tokio::test]
async fn incomplete_profile_lists_missing_items() {
    let fixture = fixture();
    fixture
        .completeness
        .set_missing(&student("http-missing"), &["Domicile certificate"]);
    let draft = fixture
        .services
        .applications
        .create_draft(student("http-missing"), details(600))
        .expect("draft");

    let response = funding_router(&fixture.services)
        .oneshot(post_json(
            &format!("/api/v1/applications/{}/submit", draft.application_id),
            json!({ "actor": { "role": "student", "id": "stu-http-missing" } }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], "incomplete_profile");
    assert_eq!(payload["missing"], json!(["Domicile certificate"]));
}

#[tokio::test]
async fn duplicate_drafts_conflict() {
    let fixture = fixture();
    let first = funding_router(&fixture.services)
        .oneshot(post_json("/api/v1/applications", draft_body("stu-twice")))
        .await
        .expect("route executes");
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = funding_router(&fixture.services)
        .oneshot(post_json("/api/v1/applications", draft_body("stu-twice")))
        .await
        .expect("route executes");
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let payload = read_json_body(second).await;
    assert_eq!(payload["kind"], "duplicate_application");
}

#[tokio::test]
async fn losing_claim_returns_conflict() {
    let fixture = fixture();
    approved(&fixture, &student("http-claim"), 1_000);
    let claim = |donor: &str| {
        json!({
            "student_id": "stu-http-claim",
            "donor_id": donor,
            "amount": 1_000,
            "cadence": "quarterly"
        })
    };

    let winner = funding_router(&fixture.services)
        .oneshot(post_json("/api/v1/sponsorships", claim("don-1")))
        .await
        .expect("route executes");
    assert_eq!(winner.status(), StatusCode::CREATED);
    let sponsorship = read_json_body(winner).await;
    assert_eq!(sponsorship["status"], "AWAITING_PAYMENT");

    let loser = funding_router(&fixture.services)
        .oneshot(post_json("/api/v1/sponsorships", claim("don-2")))
        .await
        .expect("route executes");
    assert_eq!(loser.status(), StatusCode::CONFLICT);
    let payload = read_json_body(loser).await;
    assert_eq!(payload["kind"], "already_sponsored");
}

#[tokio::test]
async fn payment_plan_preview_splits_and_schedules() {
    let fixture = fixture();

    let response = funding_router(&fixture.services)
        .oneshot(get(
            "/api/v1/payment-plans?total_need=1000&cadence=monthly&start=2026-01-31",
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let installments = payload["installments"].as_array().expect("installments");
    assert_eq!(installments.len(), 24);
    assert_eq!(installments[0]["amount"], 42);
    assert_eq!(installments[23]["amount"], 34);
    assert_eq!(payload["schedule"][1]["due_on"], "2026-02-28");

    let invalid = funding_router(&fixture.services)
        .oneshot(get("/api/v1/payment-plans?total_need=0&cadence=annual"))
        .await
        .expect("route executes");
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(invalid).await;
    assert_eq!(payload["kind"], "invalid_amount");
}

#[tokio::test]
async fn declined_confirmation_is_payment_required() {
    let fixture = fixture();
    approved(&fixture, &student("http-pay"), 800);
    let sponsorship = fixture
        .services
        .sponsorships
        .claim(ClaimRequest {
            student_id: student("http-pay"),
            donor_id: DonorId::new("don-1"),
            amount: 800,
            cadence: Cadence::OneTime,
        })
        .expect("claimed");

    let intent = funding_router(&fixture.services)
        .oneshot(post_json(
            "/api/v1/payments/intents",
            json!({ "student_id": "stu-http-pay", "amount": 800, "cadence": "one_time" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(intent.status(), StatusCode::CREATED);
    let receipt = read_json_body(intent).await;
    assert_eq!(receipt["amount"], 800);

    fixture
        .processor
        .push(Step::Decline("card expired".to_string()));
    let confirm = funding_router(&fixture.services)
        .oneshot(post_json(
            "/api/v1/payments/confirm",
            json!({
                "intent_id": receipt["intent_id"],
                "sponsorship_id": sponsorship.id.as_str(),
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(confirm.status(), StatusCode::PAYMENT_REQUIRED);
    let payload = read_json_body(confirm).await;
    assert_eq!(payload["kind"], "payment_failed");
}

#[tokio::test]
async fn unknown_review_is_not_found() {
    let fixture = fixture();
    let response = review_handler(
        State(fixture.services.reviews.clone()),
        Path("rev-999999".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], "not_found");
}
