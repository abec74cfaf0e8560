use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::info;

use super::models::{NewPayment, Payment, PaymentRow, PaymentStatus, UpsertOutcome};
use crate::error::AppResult;

const PAYMENT_COLUMNS: &str = "id, provider, provider_txn_id, callsign, driver_profile_id, \
     amount, currency, category_id, status, raw_payload, created_at, updated_at, performed_at";

/// How long an in-flight `created` row blocks concurrent duplicates before
/// it is considered abandoned (crashed worker) and reclaimable.
const DEFAULT_CLAIM_TTL_SECS: i64 = 600;

/// Ledger repository - the source of truth for settlement state
pub struct LedgerRepository {
    pool: SqlitePool,
    claim_ttl: Duration,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            claim_ttl: Duration::seconds(DEFAULT_CLAIM_TTL_SECS),
        }
    }

    pub fn with_claim_ttl(mut self, claim_ttl: Duration) -> Self {
        self.claim_ttl = claim_ttl;
        self
    }

    /// Idempotent sighting of a transaction keyed by (provider, provider_txn_id).
    ///
    /// - no existing row → insert with status `created`;
    /// - existing `performed` row → `Duplicate("already performed")`, untouched;
    /// - existing `created` row refreshed within the claim TTL → another
    ///   worker owns it, `Duplicate("in progress")`;
    /// - existing `failed` or stale `created` row → refreshed back to
    ///   `created` for a fresh attempt.
    ///
    /// The whole check-then-write runs in one storage transaction; the insert
    /// race itself is closed by `ON CONFLICT DO NOTHING`.
    pub async fn upsert_created(&self, new: NewPayment<'_>) -> AppResult<UpsertOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let inserted: Option<PaymentRow> = sqlx::query_as(&format!(
            "INSERT INTO payments \
                 (provider, provider_txn_id, callsign, amount, currency, category_id, \
                  status, raw_payload, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 'created', ?, ?, ?) \
             ON CONFLICT (provider, provider_txn_id) DO NOTHING \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(new.provider.as_str())
        .bind(new.provider_txn_id)
        .bind(new.callsign)
        .bind(new.amount.to_string())
        .bind(new.currency)
        .bind(new.category_id)
        .bind(new.raw_payload.to_string())
        .bind(now)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = inserted {
            tx.commit().await?;
            return Ok(UpsertOutcome::Created(row.try_into()?));
        }

        let existing: PaymentRow = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE provider = ? AND provider_txn_id = ?"
        ))
        .bind(new.provider.as_str())
        .bind(new.provider_txn_id)
        .fetch_one(&mut *tx)
        .await?;

        let status: PaymentStatus = existing.status.parse()?;
        match status {
            PaymentStatus::Performed => {
                tx.commit().await?;
                Ok(UpsertOutcome::Duplicate {
                    payment: existing.try_into()?,
                    reason: "already performed",
                })
            }
            PaymentStatus::Created if now - existing.updated_at < self.claim_ttl => {
                tx.commit().await?;
                Ok(UpsertOutcome::Duplicate {
                    payment: existing.try_into()?,
                    reason: "in progress",
                })
            }
            _ => {
                info!(
                    id = existing.id,
                    previous = %existing.status,
                    "reclaiming payment row for a fresh attempt"
                );
                let refreshed: Option<PaymentRow> = sqlx::query_as(&format!(
                    "UPDATE payments SET \
                         callsign = ?, amount = ?, currency = ?, category_id = ?, \
                         status = 'created', raw_payload = ?, driver_profile_id = NULL, \
                         performed_at = NULL, updated_at = ? \
                     WHERE id = ? AND status != 'performed' \
                     RETURNING {PAYMENT_COLUMNS}"
                ))
                .bind(new.callsign)
                .bind(new.amount.to_string())
                .bind(new.currency)
                .bind(new.category_id)
                .bind(new.raw_payload.to_string())
                .bind(now)
                .bind(existing.id)
                .fetch_optional(&mut *tx)
                .await?;
                tx.commit().await?;

                match refreshed {
                    Some(row) => Ok(UpsertOutcome::Created(row.try_into()?)),
                    // Lost a race to a commit that performed the row.
                    None => {
                        let row: PaymentRow = sqlx::query_as(&format!(
                            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?"
                        ))
                        .bind(existing.id)
                        .fetch_one(&self.pool)
                        .await?;
                        Ok(UpsertOutcome::Duplicate {
                            payment: row.try_into()?,
                            reason: "already performed",
                        })
                    }
                }
            }
        }
    }

    /// Transition a row's status. `performed` without an explicit timestamp
    /// stamps the current time. Returns false when no row matched (or the row
    /// is already in the terminal `performed` state).
    pub async fn mark_status(
        &self,
        id: i64,
        status: PaymentStatus,
        driver_profile_id: Option<&str>,
        performed_at: Option<chrono::DateTime<Utc>>,
    ) -> AppResult<bool> {
        let now = Utc::now();
        let performed_at = match status {
            PaymentStatus::Performed => Some(performed_at.unwrap_or(now)),
            _ => performed_at,
        };

        let result = sqlx::query(
            "UPDATE payments SET \
                 status = ?, \
                 driver_profile_id = COALESCE(?, driver_profile_id), \
                 performed_at = COALESCE(?, performed_at), \
                 updated_at = ? \
             WHERE id = ? AND status != 'performed'",
        )
        .bind(status.as_str())
        .bind(driver_profile_id)
        .bind(performed_at)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, id: i64) -> AppResult<Option<Payment>> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Payment::try_from).transpose()
    }

    /// Reconciliation lookup over the callsign index.
    pub async fn find_by_callsign(&self, callsign: &str) -> AppResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE callsign = ? ORDER BY created_at"
        ))
        .bind(callsign)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    /// Reconciliation lookup over the status index.
    pub async fn find_by_status(&self, status: PaymentStatus) -> AppResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE status = ? ORDER BY created_at"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;
    use rust_decimal_macros::dec;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_ledger() -> LedgerRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
        LedgerRepository::new(pool)
    }

    fn new_payment<'a>(txn_id: &'a str, payload: &'a serde_json::Value) -> NewPayment<'a> {
        NewPayment {
            provider: Provider::Payme,
            provider_txn_id: txn_id,
            callsign: "AB-123",
            amount: dec!(1000.00),
            currency: "UZS",
            category_id: "manual",
            raw_payload: payload,
        }
    }

    #[tokio::test]
    async fn fresh_insert_creates_row() {
        let ledger = test_ledger().await;
        let payload = serde_json::json!({"raw_text": "t"});

        let outcome = ledger.upsert_created(new_payment("1", &payload)).await.unwrap();
        let UpsertOutcome::Created(payment) = outcome else {
            panic!("expected Created");
        };
        assert_eq!(payment.status, PaymentStatus::Created);
        assert_eq!(payment.amount, dec!(1000.00));
        assert_eq!(payment.provider, "payme");
        assert!(payment.performed_at.is_none());
    }

    #[tokio::test]
    async fn performed_row_blocks_duplicates() {
        let ledger = test_ledger().await;
        let payload = serde_json::json!({});

        let UpsertOutcome::Created(payment) =
            ledger.upsert_created(new_payment("2", &payload)).await.unwrap()
        else {
            panic!("expected Created");
        };
        assert!(ledger
            .mark_status(payment.id, PaymentStatus::Performed, Some("drv-1"), None)
            .await
            .unwrap());

        let outcome = ledger.upsert_created(new_payment("2", &payload)).await.unwrap();
        let UpsertOutcome::Duplicate { payment: dup, reason } = outcome else {
            panic!("expected Duplicate");
        };
        assert_eq!(reason, "already performed");
        assert_eq!(dup.status, PaymentStatus::Performed);
        assert_eq!(dup.driver_profile_id.as_deref(), Some("drv-1"));
        assert!(dup.performed_at.is_some());
    }

    #[tokio::test]
    async fn in_flight_row_blocks_concurrent_duplicates() {
        let ledger = test_ledger().await;
        let payload = serde_json::json!({});

        assert!(matches!(
            ledger.upsert_created(new_payment("3", &payload)).await.unwrap(),
            UpsertOutcome::Created(_)
        ));
        let outcome = ledger.upsert_created(new_payment("3", &payload)).await.unwrap();
        assert!(matches!(
            outcome,
            UpsertOutcome::Duplicate { reason: "in progress", .. }
        ));
    }

    #[tokio::test]
    async fn stale_created_row_is_reclaimable() {
        let ledger = test_ledger().await.with_claim_ttl(Duration::zero());
        let payload = serde_json::json!({});

        assert!(matches!(
            ledger.upsert_created(new_payment("4", &payload)).await.unwrap(),
            UpsertOutcome::Created(_)
        ));
        assert!(matches!(
            ledger.upsert_created(new_payment("4", &payload)).await.unwrap(),
            UpsertOutcome::Created(_)
        ));
    }

    #[tokio::test]
    async fn failed_row_is_reattemptable() {
        let ledger = test_ledger().await;
        let payload = serde_json::json!({});

        let UpsertOutcome::Created(payment) =
            ledger.upsert_created(new_payment("5", &payload)).await.unwrap()
        else {
            panic!("expected Created");
        };
        assert!(ledger
            .mark_status(payment.id, PaymentStatus::Failed, None, None)
            .await
            .unwrap());

        let outcome = ledger.upsert_created(new_payment("5", &payload)).await.unwrap();
        let UpsertOutcome::Created(refreshed) = outcome else {
            panic!("failed row should be reclaimable");
        };
        assert_eq!(refreshed.id, payment.id);
        assert_eq!(refreshed.status, PaymentStatus::Created);
        assert!(refreshed.driver_profile_id.is_none());
    }

    #[tokio::test]
    async fn mark_status_stamps_performed_at() {
        let ledger = test_ledger().await;
        let payload = serde_json::json!({});

        let UpsertOutcome::Created(payment) =
            ledger.upsert_created(new_payment("6", &payload)).await.unwrap()
        else {
            panic!("expected Created");
        };
        let before = Utc::now();
        assert!(ledger
            .mark_status(payment.id, PaymentStatus::Performed, Some("drv-9"), None)
            .await
            .unwrap());

        let stored = ledger.get(payment.id).await.unwrap().expect("row exists");
        assert_eq!(stored.status, PaymentStatus::Performed);
        let performed_at = stored.performed_at.expect("stamped");
        assert!(performed_at >= before && performed_at <= Utc::now());
    }

    #[tokio::test]
    async fn mark_status_unknown_id_returns_false() {
        let ledger = test_ledger().await;
        assert!(!ledger
            .mark_status(12345, PaymentStatus::Failed, None, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn performed_is_terminal_for_mark_status() {
        let ledger = test_ledger().await;
        let payload = serde_json::json!({});

        let UpsertOutcome::Created(payment) =
            ledger.upsert_created(new_payment("7", &payload)).await.unwrap()
        else {
            panic!("expected Created");
        };
        assert!(ledger
            .mark_status(payment.id, PaymentStatus::Performed, None, None)
            .await
            .unwrap());
        // Second transition must not rewrite the terminal state.
        assert!(!ledger
            .mark_status(payment.id, PaymentStatus::Failed, None, None)
            .await
            .unwrap());
        let stored = ledger.get(payment.id).await.unwrap().expect("row exists");
        assert_eq!(stored.status, PaymentStatus::Performed);
    }

    #[tokio::test]
    async fn reconciliation_lookups() {
        let ledger = test_ledger().await;
        let payload = serde_json::json!({});

        for txn in ["10", "11"] {
            ledger.upsert_created(new_payment(txn, &payload)).await.unwrap();
        }

        let by_callsign = ledger.find_by_callsign("AB-123").await.unwrap();
        assert_eq!(by_callsign.len(), 2);

        let created = ledger.find_by_status(PaymentStatus::Created).await.unwrap();
        assert_eq!(created.len(), 2);
        assert!(ledger
            .find_by_status(PaymentStatus::Performed)
            .await
            .unwrap()
            .is_empty());
    }
}
