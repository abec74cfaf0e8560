//! Human notification channel. Settlement never depends on delivery: every
//! implementation swallows its own errors.

pub mod telegram;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::config::Provider;

pub use telegram::TelegramNotifier;

/// Context for a settled payment announcement.
#[derive(Debug, Clone)]
pub struct SuccessContext {
    pub provider: Provider,
    pub callsign: String,
    pub original_amount: Decimal,
    pub topup_amount: Decimal,
    pub currency: String,
    pub driver_id: Option<String>,
    pub provider_txn_id: Option<String>,
}

/// Context for a failed (or informational non-)settlement announcement.
#[derive(Debug, Clone, Default)]
pub struct FailureContext {
    pub title: String,
    pub error: String,
    pub provider: Option<String>,
    pub callsign: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: String,
    pub provider_txn_id: Option<String>,
    pub context: Option<String>,
    pub payload_excerpt: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_success(&self, ctx: SuccessContext);
    async fn notify_failure(&self, ctx: FailureContext);
}

/// No-op notifier for deployments without a configured channel.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify_success(&self, _ctx: SuccessContext) {}
    async fn notify_failure(&self, _ctx: FailureContext) {}
}
