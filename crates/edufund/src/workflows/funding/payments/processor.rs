use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::workflows::funding::domain::IntentId;

/// Charge request handed to the external processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentRequest {
    pub amount: u64,
    pub currency: String,
    /// Stable per installment so a retried request never creates a second charge.
    pub idempotency_key: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: IntentId,
    pub client_secret: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Succeeded,
    Declined { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessorError {
    /// Worth one more attempt.
    #[error("payment processor temporarily unavailable: {0}")]
    Transient(String),
    #[error("payment processor rejected the request: {0}")]
    Rejected(String),
}

/// External card processor. Implementations must honor `idempotency_key`.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, ProcessorError>;

    async fn confirm_intent(&self, intent_id: &IntentId) -> Result<ConfirmationStatus, ProcessorError>;
}
