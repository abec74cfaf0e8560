//! Inbound chat transport: a Telegram webhook. Thin by design - it resolves
//! the park, runs the extractor and hands complete candidates to a worker
//! task; everything with invariants lives behind the orchestrator.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::extractor;
use crate::notify::{FailureContext, Notifier};
use crate::settlement::{SettlementOrchestrator, SettlementRequest};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<SettlementOrchestrator>,
    pub notifier: Arc<dyn Notifier>,
}

/// Subset of the Telegram `Update` payload the pipeline needs.
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: Option<i64>,
    pub message: Option<TelegramMessage>,
    pub channel_post: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    pub title: Option<String>,
}

pub async fn health_check() -> &'static str {
    "ok"
}

/// Always answers 200: Telegram re-delivers on anything else, and genuine
/// re-deliveries are already safe behind the ledger's idempotent upsert.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Json(update): Json<TelegramUpdate>,
) -> StatusCode {
    let Some(message) = update.message.or(update.channel_post) else {
        return StatusCode::OK;
    };
    let text = message.text.or(message.caption).unwrap_or_default();
    let group_id = message.chat.id.to_string();

    let Some(park) = state.config.park_for_group(&group_id).cloned() else {
        debug!(%group_id, "message from unmapped chat ignored");
        return StatusCode::OK;
    };

    let candidate = extractor::extract(&text);
    if !candidate.confirmed {
        info!(park = %park.name, "unconfirmed payment message ignored");
        state
            .notifier
            .notify_failure(FailureContext {
                title: "To'lov muvaffaqiyatsiz".into(),
                error: "To'lov tasdiqlanmagan yoki bekor qilingan".into(),
                provider: Some(park.provider.to_string()),
                currency: park.currency.clone(),
                context: Some("confirmation marker missing".into()),
                payload_excerpt: Some(truncate(&text, 500)),
                ..FailureContext::default()
            })
            .await;
        return StatusCode::OK;
    }

    let (Some(provider_txn_id), Some(callsign)) =
        (candidate.provider_txn_id, candidate.callsign)
    else {
        warn!(park = %park.name, "incomplete candidate dropped (missing txn id or callsign)");
        return StatusCode::OK;
    };
    if candidate.gross_amount <= Decimal::ZERO {
        warn!(park = %park.name, txn = %provider_txn_id, "candidate with no amount dropped");
        return StatusCode::OK;
    }

    let request = SettlementRequest {
        provider_txn_id,
        callsign,
        gross_amount: candidate.gross_amount,
        raw_payload: json!({
            "raw_text": text,
            "group_id": group_id,
            "group_title": message.chat.title,
        }),
    };

    // One worker task per message; each run isolates its own failure.
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        match orchestrator.settle(request, &park).await {
            Ok(outcome) => info!(
                park = %park.name,
                ok = outcome.ok,
                reason = %outcome.reason,
                "settlement finished"
            ),
            Err(err) => error!(park = %park.name, error = %err, "settlement errored"),
        }
    });

    StatusCode::OK
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
