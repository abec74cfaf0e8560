use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;
use tracing::warn;

use super::{FailureContext, Notifier, SuccessContext};
use crate::config::TelegramConfig;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram Bot API notifier: optional sticker plus an HTML message.
pub struct TelegramNotifier {
    http: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    async fn post(&self, method: &str, payload: serde_json::Value) {
        let url = format!(
            "https://api.telegram.org/bot{}/{}",
            self.config.bot_token, method
        );
        match self
            .http
            .post(&url)
            .timeout(NOTIFY_TIMEOUT)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if !response.status().is_success() => {
                warn!(%method, status = %response.status(), "telegram API rejected notification");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%method, error = %err, "telegram notification failed");
            }
        }
    }

    async fn send_sticker(&self, sticker: &str) {
        self.post(
            "sendSticker",
            json!({ "chat_id": self.config.chat_id, "sticker": sticker }),
        )
        .await;
    }

    async fn send_html(&self, html: String) {
        self.post(
            "sendMessage",
            json!({
                "chat_id": self.config.chat_id,
                "text": html,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }),
        )
        .await;
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify_success(&self, ctx: SuccessContext) {
        if !self.config.is_configured() {
            return;
        }
        if let Some(sticker) = &self.config.sticker_success {
            self.send_sticker(sticker).await;
        }

        let mut rows = vec![
            "✅ <b>To‘lov qabul qilindi</b>".to_string(),
            kv("📝 Provider", ctx.provider.as_str()),
            kv("🔸 Pazivnoy", &ctx.callsign),
            kv(
                "🧾 Haydovchi tashladi",
                &format!("{} {}", format_amount(ctx.original_amount), ctx.currency),
            ),
            kv(
                "💳 Haydovchiga tashlandi",
                &format!("{} {}", format_amount(ctx.topup_amount), ctx.currency),
            ),
        ];
        if let Some(txn_id) = &ctx.provider_txn_id {
            rows.push(kv("🧾 To'lov IDsi", txn_id));
        }
        if let Some(driver_id) = &ctx.driver_id {
            rows.push(kv("🔍 Haydovchi IDsi", driver_id));
        }
        self.send_html(rows.join("\n")).await;
    }

    async fn notify_failure(&self, ctx: FailureContext) {
        if !self.config.is_configured() {
            return;
        }
        if let Some(sticker) = &self.config.sticker_error {
            self.send_sticker(sticker).await;
        }

        let mut rows = vec![
            format!("❌ <b>{}</b>", escape_html(&ctx.title)),
            kv("Xato", &ctx.error),
        ];
        if let Some(provider) = &ctx.provider {
            rows.push(kv("Provider", provider));
        }
        if let Some(callsign) = &ctx.callsign {
            rows.push(kv("Pazivnoy", callsign));
        }
        if let Some(amount) = ctx.amount {
            rows.push(kv(
                "Summa",
                &format!("{} {}", format_amount(amount), ctx.currency),
            ));
        }
        if let Some(txn_id) = &ctx.provider_txn_id {
            rows.push(kv("To'lov IDsi", txn_id));
        }
        if let Some(context) = &ctx.context {
            rows.push(kv("Context", context));
        }
        if let Some(excerpt) = &ctx.payload_excerpt {
            rows.push(kv("Payload excerpt", excerpt));
        }
        self.send_html(rows.join("\n")).await;
    }
}

fn kv(key: &str, value: &str) -> String {
    format!("<b>{}:</b> {}", escape_html(key), escape_html(value))
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Format an amount as `20 000.00`: space as thousands separator, two
/// decimals, round-half-up.
pub(crate) fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{rounded:.2}");
    let (int_part, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{frac}")
}
