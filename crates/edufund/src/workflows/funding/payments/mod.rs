//! Installment plans and the processor-backed charge flow.

pub mod plan;
pub mod processor;
pub mod router;
pub mod service;

pub use plan::{Cadence, Installment, PaymentPlan, PlanError, ScheduledInstallment};
pub use processor::{
    ConfirmationStatus, IntentRequest, PaymentIntent, PaymentProcessor, ProcessorError,
};
pub use router::payment_router;
pub use service::{
    ConfirmRequest, CreateIntentRequest, IntentReceipt, PaymentError, PaymentReceipt,
    PaymentService,
};
