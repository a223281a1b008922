use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::config::AppConfig;
use crate::workflows::funding::applications::{
    ApplicationDetails, ApplicationRecord, ApplicationStatus, CompletenessError,
    ExpenseBreakdown, ProfileCompleteness, TransitionRequest,
};
use crate::workflows::funding::domain::{
    Actor, AdminId, IntentId, PanelMemberId, StudentId, VerifierId,
};
use crate::workflows::funding::interviews::PanelDirectory;
use crate::workflows::funding::memory::InMemoryOutbox;
use crate::workflows::funding::payments::{
    ConfirmationStatus, IntentRequest, PaymentIntent, PaymentProcessor, ProcessorError,
};
use crate::workflows::funding::verification::FieldRecommendation;
use crate::workflows::funding::{FundingCollaborators, FundingServices, Repositories};

pub(super) struct Fixture {
    pub(super) services: FundingServices,
    pub(super) repositories: Repositories,
    pub(super) outbox: InMemoryOutbox,
    pub(super) completeness: Arc<StubCompleteness>,
    pub(super) processor: Arc<ScriptedProcessor>,
}

pub(super) fn fixture() -> Fixture {
    fixture_with_timeout(Duration::from_millis(200))
}

pub(super) fn fixture_with_timeout(timeout: Duration) -> Fixture {
    let mut config = AppConfig::default();
    config.payments.timeout = timeout;

    let repositories = Repositories::in_memory();
    let outbox = InMemoryOutbox::default();
    let completeness = Arc::new(StubCompleteness::default());
    let processor = Arc::new(ScriptedProcessor::default());
    let panel = Arc::new(StaticPanel::new(&["panel-a", "panel-b", "panel-c"]));

    let services = FundingServices::new(
        &config,
        repositories.clone(),
        FundingCollaborators {
            completeness: completeness.clone(),
            panel,
            processor: processor.clone(),
            notifications: Arc::new(outbox.clone()),
        },
    );

    Fixture {
        services,
        repositories,
        outbox,
        completeness,
        processor,
    }
}

pub(super) fn student(suffix: &str) -> StudentId {
    StudentId::new(format!("stu-{suffix}"))
}

pub(super) fn admin() -> AdminId {
    AdminId::new("admin-1")
}

pub(super) fn verifier() -> VerifierId {
    VerifierId::new("ver-1")
}

pub(super) fn panelist(name: &str) -> PanelMemberId {
    PanelMemberId::new(name)
}

/// Details whose need after scholarship is exactly `need`.
pub(super) fn details(need: u64) -> ApplicationDetails {
    ApplicationDetails {
        institution: "University of Engineering and Technology".to_string(),
        programme: "BSc Electrical Engineering".to_string(),
        term: "2026-2027".to_string(),
        currency: None,
        expenses: ExpenseBreakdown {
            tuition: need,
            hostel: 120,
            living: 80,
            other: 0,
            scholarship: 200,
        },
    }
}

pub(super) fn submitted(fixture: &Fixture, student_id: &StudentId, need: u64) -> ApplicationRecord {
    let draft = fixture
        .services
        .applications
        .create_draft(student_id.clone(), details(need))
        .expect("draft created");
    fixture
        .services
        .applications
        .submit(&draft.application_id, &Actor::Student(student_id.clone()))
        .expect("submitted")
}

/// Walk an application to CASE_WORKER_APPROVED through a recommending field review.
pub(super) fn case_worker_approved(
    fixture: &Fixture,
    student_id: &StudentId,
    need: u64,
) -> ApplicationRecord {
    let record = submitted(fixture, student_id, need);
    let review = fixture
        .services
        .reviews
        .assign(&record.application_id, verifier())
        .expect("review assigned");
    fixture
        .services
        .reviews
        .complete(
            &review.id,
            &verifier(),
            FieldRecommendation::Recommend,
            85,
            Some("household income confirmed".to_string()),
        )
        .expect("review completed");
    fixture
        .services
        .applications
        .transition(
            &record.application_id,
            TransitionRequest::new(
                ApplicationStatus::CaseWorkerApproved,
                Actor::FieldVerifier(verifier()),
            ),
        )
        .expect("case worker approval")
}

/// Approved and listed in the sponsorship pool.
pub(super) fn approved(fixture: &Fixture, student_id: &StudentId, need: u64) -> ApplicationRecord {
    let record = case_worker_approved(fixture, student_id, need);
    fixture
        .services
        .applications
        .transition(
            &record.application_id,
            TransitionRequest::new(ApplicationStatus::Approved, Actor::Administrator(admin())),
        )
        .expect("approved")
}

#[derive(Default)]
pub(super) struct StubCompleteness {
    missing: Mutex<HashMap<StudentId, Vec<String>>>,
}

impl StubCompleteness {
    pub(super) fn set_missing(&self, student_id: &StudentId, items: &[&str]) {
        self.missing.lock().expect("completeness mutex poisoned").insert(
            student_id.clone(),
            items.iter().map(|item| item.to_string()).collect(),
        );
    }
}

impl ProfileCompleteness for StubCompleteness {
    fn missing_items(&self, student: &StudentId) -> Result<Vec<String>, CompletenessError> {
        Ok(self
            .missing
            .lock()
            .expect("completeness mutex poisoned")
            .get(student)
            .cloned()
            .unwrap_or_default())
    }
}

pub(super) struct StaticPanel {
    active: HashSet<PanelMemberId>,
}

impl StaticPanel {
    pub(super) fn new(members: &[&str]) -> Self {
        Self {
            active: members.iter().map(|name| PanelMemberId::new(*name)).collect(),
        }
    }
}

impl PanelDirectory for StaticPanel {
    fn is_active(&self, member: &PanelMemberId) -> bool {
        self.active.contains(member)
    }
}

/// Scripted response for one processor call.
#[derive(Debug, Clone)]
pub(super) enum Step {
    Fail(ProcessorError),
    Decline(String),
    Stall(Duration),
}

/// Processor double that honors idempotency keys and replays scripted failures.
#[derive(Default)]
pub(super) struct ScriptedProcessor {
    script: Mutex<VecDeque<Step>>,
    intents: Mutex<HashMap<String, PaymentIntent>>,
    pub(super) create_calls: AtomicUsize,
    pub(super) confirm_calls: AtomicUsize,
    pub(super) keys: Mutex<Vec<String>>,
}

impl ScriptedProcessor {
    pub(super) fn push(&self, step: Step) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .push_back(step);
    }

    pub(super) fn confirms(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub(super) fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Option<Step> {
        self.script.lock().expect("script mutex poisoned").pop_front()
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedProcessor {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, ProcessorError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Some(Step::Fail(error)) => return Err(error),
            Some(Step::Stall(delay)) => tokio::time::sleep(delay).await,
            Some(Step::Decline(reason)) => return Err(ProcessorError::Rejected(reason)),
            None => {}
        }

        self.keys
            .lock()
            .expect("keys mutex poisoned")
            .push(request.idempotency_key.clone());
        let mut intents = self.intents.lock().expect("intent mutex poisoned");
        let next = intents.len() + 1;
        let intent = intents
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| PaymentIntent {
                intent_id: IntentId::new(format!("pi_{next:04}")),
                client_secret: format!("pi_{next:04}_secret"),
                amount: request.amount,
            });
        Ok(intent.clone())
    }

    async fn confirm_intent(&self, _intent_id: &IntentId) -> Result<ConfirmationStatus, ProcessorError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Decline(reason)) => Ok(ConfirmationStatus::Declined { reason }),
            Some(Step::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(ConfirmationStatus::Succeeded)
            }
            None => Ok(ConfirmationStatus::Succeeded),
        }
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
