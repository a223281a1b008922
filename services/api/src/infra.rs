use async_trait::async_trait;
use chrono::NaiveDate;
use edufund::config::AppConfig;
use edufund::workflows::funding::applications::{CompletenessError, ProfileCompleteness};
use edufund::workflows::funding::interviews::PanelDirectory;
use edufund::workflows::funding::memory::InMemoryOutbox;
use edufund::workflows::funding::payments::{
    ConfirmationStatus, IntentRequest, PaymentIntent, PaymentProcessor, ProcessorError,
};
use edufund::workflows::funding::{
    FundingCollaborators, FundingServices, IntentId, PanelMemberId, Repositories, StudentId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub(crate) const DEFAULT_PANEL: [&str; 3] = ["board-1", "board-2", "board-3"];

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Profile check used until the student profile service is wired in.
#[derive(Default, Clone)]
pub(crate) struct PermissiveCompleteness;

impl ProfileCompleteness for PermissiveCompleteness {
    fn missing_items(&self, _student: &StudentId) -> Result<Vec<String>, CompletenessError> {
        Ok(Vec::new())
    }
}

#[derive(Clone)]
pub(crate) struct StaticPanelDirectory {
    members: HashSet<PanelMemberId>,
}

impl StaticPanelDirectory {
    pub(crate) fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members
                .into_iter()
                .map(|member| PanelMemberId::new(member))
                .collect(),
        }
    }
}

impl Default for StaticPanelDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_PANEL)
    }
}

impl PanelDirectory for StaticPanelDirectory {
    fn is_active(&self, member: &PanelMemberId) -> bool {
        self.members.contains(member)
    }
}

/// Local stand-in for the card processor. Intents are keyed by idempotency key and every
/// confirmation succeeds.
#[derive(Default, Clone)]
pub(crate) struct SimulatedProcessor {
    intents: Arc<Mutex<HashMap<String, PaymentIntent>>>,
}

#[async_trait]
impl PaymentProcessor for SimulatedProcessor {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, ProcessorError> {
        let mut intents = self
            .intents
            .lock()
            .map_err(|_| ProcessorError::Transient("simulated processor unavailable".to_string()))?;
        let next = intents.len() + 1;
        let intent = intents
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| PaymentIntent {
                intent_id: IntentId::new(format!("pi_sim_{next:06}")),
                client_secret: format!("pi_sim_{next:06}_secret"),
                amount: request.amount,
            })
            .clone();
        debug!(key = %request.idempotency_key, intent_id = %intent.intent_id, "simulated intent");
        Ok(intent)
    }

    async fn confirm_intent(&self, intent_id: &IntentId) -> Result<ConfirmationStatus, ProcessorError> {
        let known = self
            .intents
            .lock()
            .map_err(|_| ProcessorError::Transient("simulated processor unavailable".to_string()))?
            .values()
            .any(|intent| &intent.intent_id == intent_id);
        if !known {
            return Err(ProcessorError::Rejected(format!("no such intent {intent_id}")));
        }
        Ok(ConfirmationStatus::Succeeded)
    }
}

/// Funding services over fresh in-memory stores and local collaborators.
pub(crate) fn in_memory_services(
    config: &AppConfig,
    panel: StaticPanelDirectory,
) -> (FundingServices, InMemoryOutbox) {
    let outbox = InMemoryOutbox::default();
    let services = FundingServices::new(
        config,
        Repositories::in_memory(),
        FundingCollaborators {
            completeness: Arc::new(PermissiveCompleteness),
            panel: Arc::new(panel),
            processor: Arc::new(SimulatedProcessor::default()),
            notifications: Arc::new(outbox.clone()),
        },
    );
    (services, outbox)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn request(key: &str) -> IntentRequest {
        IntentRequest {
            amount: 250,
            currency: "PKR".to_string(),
            idempotency_key: key.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn simulated_processor_honors_idempotency_keys() {
        let processor = SimulatedProcessor::default();
        let first = processor.create_intent(request("spn-1:1")).await.expect("intent");
        let again = processor.create_intent(request("spn-1:1")).await.expect("intent");
        let other = processor.create_intent(request("spn-1:2")).await.expect("intent");

        assert_eq!(first, again);
        assert_ne!(first.intent_id, other.intent_id);
        assert_eq!(
            processor.confirm_intent(&first.intent_id).await,
            Ok(ConfirmationStatus::Succeeded)
        );
        assert!(matches!(
            processor.confirm_intent(&IntentId::new("pi_unknown")).await,
            Err(ProcessorError::Rejected(_))
        ));
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert_eq!(
            parse_date(" 2026-03-01 "),
            Ok(NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid"))
        );
        assert!(parse_date("01/03/2026").is_err());
    }
}
