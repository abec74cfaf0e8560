//! Settlement orchestrator - drives one candidate transaction through the
//! ledger, driver resolution, the fee engine and the remote credit, leaving
//! the row in a terminal state and the human channel informed either way.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::{CategoryDefaults, ParkContext};
use crate::error::AppResult;
use crate::fees;
use crate::fleet::{FleetApi, TopupOrder};
use crate::ledger::{LedgerRepository, NewPayment, Payment, PaymentStatus, UpsertOutcome};
use crate::notify::{FailureContext, Notifier, SuccessContext};
use crate::settlement::category::resolve_category_id;

const PAYLOAD_EXCERPT_LIMIT: usize = 500;

/// One extracted, confirmed, complete candidate transaction.
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub provider_txn_id: String,
    pub callsign: String,
    pub gross_amount: Decimal,
    /// Opaque audit blob (original text plus chat context).
    pub raw_payload: serde_json::Value,
}

/// Final state of one settlement run.
#[derive(Debug)]
pub struct SettlementOutcome {
    pub ok: bool,
    pub payment: Payment,
    pub reason: &'static str,
}

pub struct SettlementOrchestrator {
    ledger: Arc<LedgerRepository>,
    fleet: Arc<dyn FleetApi>,
    notifier: Arc<dyn Notifier>,
    categories: CategoryDefaults,
}

impl SettlementOrchestrator {
    pub fn new(
        ledger: Arc<LedgerRepository>,
        fleet: Arc<dyn FleetApi>,
        notifier: Arc<dyn Notifier>,
        categories: CategoryDefaults,
    ) -> Self {
        Self {
            ledger,
            fleet,
            notifier,
            categories,
        }
    }

    /// Settle one transaction for one park. Exactly-once crediting rests on
    /// the ledger's idempotent upsert; every failure after the row exists
    /// leaves it in a terminal `failed` state for reconciliation.
    pub async fn settle(
        &self,
        request: SettlementRequest,
        park: &ParkContext,
    ) -> AppResult<SettlementOutcome> {
        let category_id = resolve_category_id(park, &self.categories);

        // 1. Idempotent sighting in the ledger.
        let payment = match self
            .ledger
            .upsert_created(NewPayment {
                provider: park.provider,
                provider_txn_id: &request.provider_txn_id,
                callsign: &request.callsign,
                amount: request.gross_amount,
                currency: &park.currency,
                category_id: &category_id,
                raw_payload: &request.raw_payload,
            })
            .await?
        {
            UpsertOutcome::Created(payment) => payment,
            UpsertOutcome::Duplicate { payment, reason } => {
                info!(
                    txn = %request.provider_txn_id,
                    park = %park.name,
                    %reason,
                    "duplicate delivery short-circuited"
                );
                return Ok(SettlementOutcome {
                    ok: false,
                    payment,
                    reason,
                });
            }
        };

        // 2. Resolve the driver behind the call sign.
        let Some(driver) = self
            .fleet
            .find_driver_by_callsign(park, &request.callsign)
            .await
        else {
            return self
                .fail(
                    payment,
                    None,
                    "driver not found by callsign",
                    FailureContext {
                        title: "Haydovchi topilmadi".into(),
                        error: "Bu Pazivnoyda haydovchi topilmadi".into(),
                        provider: Some(park.provider.to_string()),
                        callsign: Some(request.callsign.clone()),
                        amount: Some(request.gross_amount),
                        currency: park.currency.clone(),
                        provider_txn_id: Some(request.provider_txn_id.clone()),
                        context: None,
                        payload_excerpt: Some(payload_excerpt(&request.raw_payload)),
                    },
                )
                .await;
        };

        // 3. Fee-adjusted top-up against the remote platform.
        let topup_amount = fees::net_amount(request.gross_amount, park.fee_rate_raw.as_deref());
        let order = TopupOrder {
            driver_profile_id: driver.driver_profile_id.clone(),
            category_id: category_id.clone(),
            amount: topup_amount,
        };
        let credited = match self.fleet.credit_balance(park, &order).await {
            Ok(credited) => credited,
            Err(err) => {
                warn!(txn = %request.provider_txn_id, error = %err, "balance credit errored");
                false
            }
        };
        if !credited {
            return self
                .fail(
                    payment,
                    Some(driver.driver_profile_id.as_str()),
                    "fleet topup failed",
                    FailureContext {
                        title: "Fleet top-up xatosi".into(),
                        error: "fleet topup failed".into(),
                        provider: Some(park.provider.to_string()),
                        callsign: Some(request.callsign.clone()),
                        amount: Some(request.gross_amount),
                        currency: park.currency.clone(),
                        provider_txn_id: Some(request.provider_txn_id.clone()),
                        context: Some(format!(
                            "category_id={category_id}, driver_id={}, topup_amount={topup_amount}",
                            driver.driver_profile_id
                        )),
                        payload_excerpt: Some(payload_excerpt(&request.raw_payload)),
                    },
                )
                .await;
        }

        // 4. Terminal success.
        self.ledger
            .mark_status(
                payment.id,
                PaymentStatus::Performed,
                Some(&driver.driver_profile_id),
                Some(Utc::now()),
            )
            .await?;
        self.notifier
            .notify_success(SuccessContext {
                provider: park.provider,
                callsign: request.callsign.clone(),
                original_amount: request.gross_amount,
                topup_amount,
                currency: park.currency.clone(),
                driver_id: Some(driver.driver_profile_id.clone()),
                provider_txn_id: Some(request.provider_txn_id.clone()),
            })
            .await;

        let payment = self.refreshed(payment).await?;
        info!(
            txn = %request.provider_txn_id,
            park = %park.name,
            driver = %driver.driver_profile_id,
            %topup_amount,
            "payment settled"
        );
        Ok(SettlementOutcome {
            ok: true,
            payment,
            reason: "ok",
        })
    }

    async fn fail(
        &self,
        payment: Payment,
        driver_profile_id: Option<&str>,
        reason: &'static str,
        note: FailureContext,
    ) -> AppResult<SettlementOutcome> {
        self.ledger
            .mark_status(payment.id, PaymentStatus::Failed, driver_profile_id, None)
            .await?;
        self.notifier.notify_failure(note).await;
        let payment = self.refreshed(payment).await?;
        Ok(SettlementOutcome {
            ok: false,
            payment,
            reason,
        })
    }

    async fn refreshed(&self, payment: Payment) -> AppResult<Payment> {
        Ok(self.ledger.get(payment.id).await?.unwrap_or(payment))
    }
}

fn payload_excerpt(payload: &serde_json::Value) -> String {
    let text = payload.to_string();
    match text.char_indices().nth(PAYLOAD_EXCERPT_LIMIT) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    }
}
