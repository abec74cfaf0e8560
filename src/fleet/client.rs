use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use super::models::*;
use super::retry::retry_transient;
use crate::config::ParkContext;
use crate::error::{AppResult, FleetError};

/// Bounded retry horizon for transport-level failures.
pub const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOPUP_DESCRIPTION: &str = "Авто пополнение баланса через систему";

/// Seam between the orchestrator and the remote fleet platform.
#[async_trait]
pub trait FleetApi: Send + Sync {
    /// Resolve a driver by call sign within the park's fleet. Empty result
    /// sets and failed calls both resolve to `None`.
    async fn find_driver_by_callsign(
        &self,
        park: &ParkContext,
        callsign: &str,
    ) -> Option<DriverIdentity>;

    /// Issue a balance-increase transaction. `Ok(true)` only on an explicit
    /// success status from the remote side; a formed rejection is terminal
    /// (`Ok(false)`), transport exhaustion is an error.
    async fn credit_balance(&self, park: &ParkContext, order: &TopupOrder) -> AppResult<bool>;
}

/// HTTP client for the fleet platform, scoped per call to a park's
/// credentials.
pub struct FleetClient {
    http: Client,
    base_url: String,
}

impl FleetClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn driver_search_url(&self) -> String {
        format!("{}/v1/parks/driver-profiles/list", self.base_url)
    }

    fn balance_url(&self) -> String {
        format!("{}/v2/parks/driver-profiles/transactions", self.base_url)
    }

    /// POST with park credentials, retrying transport failures up to
    /// MAX_ATTEMPTS. Mutating calls get a fresh idempotency token on every
    /// attempt so the remote side can collapse accidental duplicates.
    async fn post_json<B: Serialize>(
        &self,
        park: &ParkContext,
        url: &str,
        body: &B,
        with_idempotency_token: bool,
    ) -> Result<reqwest::Response, reqwest::Error> {
        retry_transient(MAX_ATTEMPTS, is_transient, |_attempt| {
            let mut request = self
                .http
                .post(url)
                .timeout(REQUEST_TIMEOUT)
                .header("X-API-Key", &park.api_key)
                .header("X-Client-ID", &park.client_id)
                .header("Accept-Language", "ru-RU")
                .json(body);
            if with_idempotency_token {
                request = request.header("X-Idempotency-Token", Uuid::new_v4().to_string());
            }
            request.send()
        })
        .await
    }
}

/// Only transport-level failures are worth another attempt; a formed
/// response, whatever its status, is an answer.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[async_trait]
impl FleetApi for FleetClient {
    async fn find_driver_by_callsign(
        &self,
        park: &ParkContext,
        callsign: &str,
    ) -> Option<DriverIdentity> {
        let callsign = callsign.trim();
        if callsign.is_empty() {
            return None;
        }

        let body = DriverSearchRequest {
            fields: SearchFields::default(),
            query: SearchQuery {
                park: ParkRef {
                    id: park.park_id.clone(),
                },
                text: callsign.to_string(),
            },
            limit: 50,
        };

        let response = match self
            .post_json(park, &self.driver_search_url(), &body, false)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(%callsign, error = %err, "driver search failed at the transport layer");
                return None;
            }
        };

        if !response.status().is_success() {
            error!(%callsign, status = %response.status(), "fleet API rejected driver search");
            return None;
        }

        let parsed: DriverSearchResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(%callsign, error = %err, "driver search response could not be decoded");
                return None;
            }
        };

        // Prefer an exact case-insensitive callsign match; the free-text
        // search can return loosely related drivers.
        let wanted = callsign.to_uppercase();
        parsed
            .driver_profiles
            .iter()
            .find(|entry| {
                entry
                    .callsign()
                    .map(|c| c.trim().to_uppercase() == wanted)
                    .unwrap_or(false)
            })
            .or_else(|| parsed.driver_profiles.first())
            .and_then(DriverEntry::identity)
    }

    async fn credit_balance(&self, park: &ParkContext, order: &TopupOrder) -> AppResult<bool> {
        let body = BalanceTransactionRequest {
            park_id: park.park_id.clone(),
            driver_profile_id: order.driver_profile_id.clone(),
            category_id: order.category_id.clone(),
            amount: format!("{:.2}", order.amount),
            currency: park.currency.clone(),
            event_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            description: TOPUP_DESCRIPTION.to_string(),
        };

        let response = self
            .post_json(park, &self.balance_url(), &body, true)
            .await
            .map_err(FleetError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(
                driver = %order.driver_profile_id,
                %status,
                body = %text,
                "fleet API rejected balance transaction"
            );
            return Ok(false);
        }

        Ok(true)
    }
}
