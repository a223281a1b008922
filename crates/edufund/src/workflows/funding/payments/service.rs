use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::plan::{Cadence, PaymentPlan, PlanError};
use super::processor::{
    ConfirmationStatus, IntentRequest, PaymentIntent, PaymentProcessor, ProcessorError,
};
use crate::config::PaymentConfig;
use crate::workflows::funding::domain::{IntentId, SponsorshipId, StudentId};
use crate::workflows::funding::repository::{
    Audience, Notification, NotificationError, NotificationPublisher,
};
use crate::workflows::funding::sponsorship::{
    SponsorshipError, SponsorshipService, SponsorshipStatus,
};

const PROCESSOR_ATTEMPTS: u32 = 2;

/// Donor request for the next installment's payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateIntentRequest {
    pub student_id: StudentId,
    pub amount: u64,
    pub cadence: Cadence,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfirmRequest {
    pub intent_id: IntentId,
    pub sponsorship_id: SponsorshipId,
}

/// What the client needs to complete the card step for one installment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentReceipt {
    pub intent_id: IntentId,
    pub client_secret: String,
    pub sponsorship_id: SponsorshipId,
    pub installment_index: u32,
    pub installment_count: usize,
    pub amount: u64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub sponsorship_id: SponsorshipId,
    pub intent_id: IntentId,
    pub installment_index: u32,
    pub amount: u64,
    pub sponsorship_status: SponsorshipStatus,
    pub outstanding: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntentState {
    Open,
    Confirming,
    /// The processor took the money but the installment is not recorded yet.
    Charged,
    Settled,
    Failed,
    /// The sponsorship was cancelled before the charge.
    Voided,
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    receipt: IntentReceipt,
    key: String,
    state: IntentState,
}

/// Intents issued by this service, keyed by intent id and by installment key.
#[derive(Debug, Default)]
struct IntentLedger {
    entries: HashMap<IntentId, LedgerEntry>,
    current: HashMap<String, IntentId>,
    declined: HashMap<String, u32>,
}

/// Service driving installment charges through the external processor.
pub struct PaymentService {
    sponsorships: Arc<SponsorshipService>,
    processor: Arc<dyn PaymentProcessor>,
    notifications: Arc<dyn NotificationPublisher>,
    timeout: Duration,
    ledger: Mutex<IntentLedger>,
}

impl PaymentService {
    pub fn new(
        sponsorships: Arc<SponsorshipService>,
        processor: Arc<dyn PaymentProcessor>,
        notifications: Arc<dyn NotificationPublisher>,
        config: &PaymentConfig,
    ) -> Self {
        Self {
            sponsorships,
            processor,
            notifications,
            timeout: config.timeout,
            ledger: Mutex::new(IntentLedger::default()),
        }
    }

    /// Open (or reuse) the payment intent for the next unpaid installment.
    pub async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<IntentReceipt, PaymentError> {
        let sponsorship = self
            .sponsorships
            .active_for_student(&request.student_id)?
            .ok_or_else(|| PaymentError::NoActiveSponsorship(request.student_id.clone()))?;

        if sponsorship.amount != request.amount || sponsorship.cadence != request.cadence {
            return Err(PaymentError::PlanMismatch {
                amount: sponsorship.amount,
                cadence: sponsorship.cadence,
            });
        }

        let plan = PaymentPlan::build(sponsorship.amount, sponsorship.cadence)?;
        let installment = plan
            .installments()
            .iter()
            .find(|installment| !sponsorship.is_settled(installment.index))
            .copied()
            .ok_or_else(|| PaymentError::NothingOutstanding(sponsorship.id.clone()))?;

        let key = format!("{}:{}", sponsorship.id, installment.index);
        let idempotency_key = {
            let ledger = self.ledger()?;
            if let Some(entry) = ledger
                .current
                .get(&key)
                .and_then(|intent_id| ledger.entries.get(intent_id))
            {
                if matches!(
                    entry.state,
                    IntentState::Open | IntentState::Confirming | IntentState::Charged
                ) {
                    return Ok(entry.receipt.clone());
                }
            }
            match ledger.declined.get(&key) {
                // A declined intent is final, so the next attempt needs a fresh key.
                Some(attempt) => format!("{key}#{}", attempt + 1),
                None => key.clone(),
            }
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("sponsorship_id".to_string(), sponsorship.id.to_string());
        metadata.insert("student_id".to_string(), sponsorship.student_id.to_string());
        metadata.insert("donor_id".to_string(), sponsorship.donor_id.to_string());
        metadata.insert("installment".to_string(), installment.index.to_string());

        let intent_request = IntentRequest {
            amount: installment.amount,
            currency: sponsorship.currency.clone(),
            idempotency_key,
            metadata,
        };
        let intent: PaymentIntent = self
            .with_retry("create_intent", || {
                self.processor.create_intent(intent_request.clone())
            })
            .await
            .map_err(|error| PaymentError::PaymentFailed {
                reason: error.to_string(),
            })?;

        let receipt = IntentReceipt {
            intent_id: intent.intent_id.clone(),
            client_secret: intent.client_secret,
            sponsorship_id: sponsorship.id.clone(),
            installment_index: installment.index,
            installment_count: plan.len(),
            amount: installment.amount,
            currency: sponsorship.currency.clone(),
        };

        let mut ledger = self.ledger()?;
        ledger
            .entries
            .entry(intent.intent_id.clone())
            .or_insert_with(|| LedgerEntry {
                receipt: receipt.clone(),
                key: key.clone(),
                state: IntentState::Open,
            });
        ledger.current.insert(key, intent.intent_id.clone());
        drop(ledger);

        info!(
            intent_id = %receipt.intent_id,
            sponsorship_id = %receipt.sponsorship_id,
            installment = receipt.installment_index,
            amount = receipt.amount,
            "payment intent created"
        );
        Ok(receipt)
    }

    /// Confirm an intent and settle its installment. Confirmed intents are never re-charged.
    pub async fn confirm(
        &self,
        intent_id: &IntentId,
        sponsorship_id: &SponsorshipId,
    ) -> Result<PaymentReceipt, PaymentError> {
        let entry = {
            let mut ledger = self.ledger()?;
            let entry = ledger
                .entries
                .get_mut(intent_id)
                .ok_or_else(|| PaymentError::UnknownIntent(intent_id.clone()))?;
            if &entry.receipt.sponsorship_id != sponsorship_id {
                return Err(PaymentError::IntentMismatch {
                    intent_id: intent_id.clone(),
                    sponsorship_id: sponsorship_id.clone(),
                });
            }
            let state = entry.state;
            match state {
                IntentState::Settled => {
                    let entry = entry.clone();
                    drop(ledger);
                    return self.settled_receipt(&entry);
                }
                IntentState::Charged => {
                    entry.state = IntentState::Confirming;
                    let entry = entry.clone();
                    drop(ledger);
                    // Already paid; only the bookkeeping is retried.
                    return self.settle(&entry);
                }
                IntentState::Confirming => {
                    return Err(PaymentError::ConfirmationInProgress(intent_id.clone()))
                }
                IntentState::Failed => {
                    return Err(PaymentError::PaymentFailed {
                        reason: format!("intent {intent_id} was already declined"),
                    })
                }
                IntentState::Voided => {
                    return Err(SponsorshipError::Inactive(sponsorship_id.clone()).into())
                }
                IntentState::Open => {
                    entry.state = IntentState::Confirming;
                    entry.clone()
                }
            }
        };

        let sponsorship = match self.sponsorships.get(sponsorship_id) {
            Ok(sponsorship) => sponsorship,
            Err(error) => {
                self.mark(intent_id, IntentState::Open)?;
                return Err(error.into());
            }
        };
        if !sponsorship.is_live() {
            self.mark(intent_id, IntentState::Voided)?;
            warn!(intent_id = %intent_id, sponsorship_id = %sponsorship_id, "intent voided, sponsorship was released");
            return Err(SponsorshipError::Inactive(sponsorship.id).into());
        }

        let confirmation = self
            .with_retry("confirm_intent", || self.processor.confirm_intent(intent_id))
            .await;

        match confirmation {
            Ok(ConfirmationStatus::Succeeded) => self.settle(&entry),
            Ok(ConfirmationStatus::Declined { reason }) => {
                self.decline(&entry, &reason)?;
                Err(PaymentError::PaymentFailed { reason })
            }
            Err(ProcessorError::Rejected(reason)) => {
                self.decline(&entry, &reason)?;
                Err(PaymentError::PaymentFailed { reason })
            }
            Err(ProcessorError::Transient(reason)) => {
                // Outcome unknown; the intent stays open so the client can confirm again.
                self.mark(intent_id, IntentState::Open)?;
                Err(PaymentError::PaymentFailed { reason })
            }
        }
    }

    /// Record a charge the processor has accepted. On failure the intent stays `Charged`
    /// so a later confirm retries the bookkeeping without charging again.
    fn settle(&self, entry: &LedgerEntry) -> Result<PaymentReceipt, PaymentError> {
        let intent_id = &entry.receipt.intent_id;
        let settled = self.sponsorships.settle_installment(
            &entry.receipt.sponsorship_id,
            entry.receipt.installment_index,
            entry.receipt.amount,
            intent_id.clone(),
        );
        let sponsorship = match settled {
            Ok(sponsorship) => sponsorship,
            Err(error) => {
                self.mark(intent_id, IntentState::Charged)?;
                warn!(
                    intent_id = %intent_id,
                    sponsorship_id = %entry.receipt.sponsorship_id,
                    amount = entry.receipt.amount,
                    %error,
                    "charge captured but installment not recorded"
                );
                return Err(error.into());
            }
        };
        self.mark(intent_id, IntentState::Settled)?;
        info!(
            intent_id = %intent_id,
            sponsorship_id = %sponsorship.id,
            installment = entry.receipt.installment_index,
            "payment confirmed"
        );
        Ok(PaymentReceipt {
            sponsorship_id: sponsorship.id.clone(),
            intent_id: intent_id.clone(),
            installment_index: entry.receipt.installment_index,
            amount: entry.receipt.amount,
            sponsorship_status: sponsorship.status,
            outstanding: sponsorship.outstanding(),
        })
    }

    pub fn plan(&self, total: u64, cadence: Cadence) -> Result<PaymentPlan, PaymentError> {
        Ok(PaymentPlan::build(total, cadence)?)
    }

    fn decline(&self, entry: &LedgerEntry, reason: &str) -> Result<(), PaymentError> {
        {
            let mut ledger = self.ledger()?;
            if let Some(stored) = ledger.entries.get_mut(&entry.receipt.intent_id) {
                stored.state = IntentState::Failed;
            }
            *ledger.declined.entry(entry.key.clone()).or_insert(0) += 1;
        }

        let sponsorship = self.sponsorships.get(&entry.receipt.sponsorship_id)?;
        warn!(
            intent_id = %entry.receipt.intent_id,
            sponsorship_id = %sponsorship.id,
            reason,
            "payment declined"
        );
        self.notifications.publish(
            Notification::new("payment_failed", Audience::Donor(sponsorship.donor_id.clone()))
                .for_application(&sponsorship.application_id)
                .with_detail("sponsorship_id", sponsorship.id.to_string())
                .with_detail("installment", entry.receipt.installment_index.to_string())
                .with_detail("reason", reason),
        )?;
        Ok(())
    }

    fn settled_receipt(&self, entry: &LedgerEntry) -> Result<PaymentReceipt, PaymentError> {
        let sponsorship = self.sponsorships.get(&entry.receipt.sponsorship_id)?;
        Ok(PaymentReceipt {
            sponsorship_id: sponsorship.id.clone(),
            intent_id: entry.receipt.intent_id.clone(),
            installment_index: entry.receipt.installment_index,
            amount: entry.receipt.amount,
            sponsorship_status: sponsorship.status,
            outstanding: sponsorship.outstanding(),
        })
    }

    fn mark(&self, intent_id: &IntentId, state: IntentState) -> Result<(), PaymentError> {
        if let Some(entry) = self.ledger()?.entries.get_mut(intent_id) {
            entry.state = state;
        }
        Ok(())
    }

    fn ledger(&self) -> Result<MutexGuard<'_, IntentLedger>, PaymentError> {
        self.ledger
            .lock()
            .map_err(|_| PaymentError::LedgerUnavailable)
    }

    /// Bounded processor call, retried once on a transient error or timeout.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, ProcessorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProcessorError>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ProcessorError::Transient(format!(
                    "{operation} timed out after {}ms",
                    self.timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(ProcessorError::Transient(reason)) if attempt < PROCESSOR_ATTEMPTS => {
                    warn!(operation, attempt, %reason, "payment processor call failed, retrying");
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Error raised by the payment service.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("student {0} has no live sponsorship")]
    NoActiveSponsorship(StudentId),
    #[error("request does not match the sponsorship plan of {amount} paid {cadence}")]
    PlanMismatch { amount: u64, cadence: Cadence },
    #[error("sponsorship {0} has no unpaid installments")]
    NothingOutstanding(SponsorshipId),
    #[error("unknown payment intent {0}")]
    UnknownIntent(IntentId),
    #[error("intent {intent_id} does not belong to sponsorship {sponsorship_id}")]
    IntentMismatch {
        intent_id: IntentId,
        sponsorship_id: SponsorshipId,
    },
    #[error("intent {0} is already being confirmed")]
    ConfirmationInProgress(IntentId),
    #[error("payment failed: {reason}")]
    PaymentFailed { reason: String },
    #[error("payment ledger unavailable")]
    LedgerUnavailable,
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Sponsorship(#[from] SponsorshipError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl PaymentError {
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentError::NoActiveSponsorship(_) => "no_active_sponsorship",
            PaymentError::PlanMismatch { .. } => "plan_mismatch",
            PaymentError::NothingOutstanding(_) => "nothing_outstanding",
            PaymentError::UnknownIntent(_) => "unknown_intent",
            PaymentError::IntentMismatch { .. } => "intent_mismatch",
            PaymentError::ConfirmationInProgress(_) => "confirmation_in_progress",
            PaymentError::PaymentFailed { .. } => "payment_failed",
            PaymentError::LedgerUnavailable => "ledger_unavailable",
            PaymentError::Plan(error) => error.kind(),
            PaymentError::Sponsorship(error) => error.kind(),
            PaymentError::Notification(_) => "notification_error",
        }
    }
}
