use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::config::Provider;
use crate::error::{AppError, LedgerError};

/// Payment status state machine: `created` (initial) → `performed` (terminal)
/// or `failed`. Only `performed` blocks further writes; a `failed` row can be
/// re-attempted by a later delivery of the same txn id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Performed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Performed => "performed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(PaymentStatus::Created),
            "performed" => Ok(PaymentStatus::Performed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(LedgerError::UnknownStatus(other.to_string())),
        }
    }
}

/// Raw row shape as stored; amounts and statuses live as TEXT in SQLite and
/// are converted at this boundary.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: i64,
    pub provider: String,
    pub provider_txn_id: String,
    pub callsign: String,
    pub driver_profile_id: Option<String>,
    pub amount: String,
    pub currency: String,
    pub category_id: String,
    pub status: String,
    pub raw_payload: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub performed_at: Option<DateTime<Utc>>,
}

/// Durable settlement record, owned exclusively by the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: i64,
    pub provider: String,
    pub provider_txn_id: String,
    pub callsign: String,
    pub driver_profile_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub category_id: String,
    pub status: PaymentStatus,
    pub raw_payload: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub performed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let amount = Decimal::from_str(&row.amount).map_err(|_| LedgerError::CorruptAmount {
            id: row.id,
            raw: row.amount.clone(),
        })?;
        let status: PaymentStatus = row.status.parse()?;
        Ok(Payment {
            id: row.id,
            provider: row.provider,
            provider_txn_id: row.provider_txn_id,
            callsign: row.callsign,
            driver_profile_id: row.driver_profile_id,
            amount,
            currency: row.currency,
            category_id: row.category_id,
            status,
            raw_payload: row.raw_payload,
            created_at: row.created_at,
            updated_at: row.updated_at,
            performed_at: row.performed_at,
        })
    }
}

/// Fields required to sight a new transaction in the ledger.
#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub provider: Provider,
    pub provider_txn_id: &'a str,
    pub callsign: &'a str,
    pub amount: Decimal,
    pub currency: &'a str,
    pub category_id: &'a str,
    pub raw_payload: &'a serde_json::Value,
}

/// Outcome of the idempotent upsert.
#[derive(Debug)]
pub enum UpsertOutcome {
    /// Row inserted fresh, or a non-`performed` row reclaimed for a new attempt.
    Created(Payment),
    /// The txn must not be (re-)settled right now; `reason` says why.
    Duplicate {
        payment: Payment,
        reason: &'static str,
    },
}
