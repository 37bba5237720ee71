//! # Payment Repository
//!
//! Payment transactions and the webhook audit log.
//!
//! ## Guarded Status Updates
//! The transaction status column is never assigned directly. Callers run the
//! pure state machine (`orderly_core::payment::apply`) to decide the target
//! status, then call [`transition_status`], which re-checks the expected
//! current status in the UPDATE's WHERE clause. If a concurrent webhook got
//! there first, `rows_affected == 0` and the caller re-reads and re-applies.
//!
//! [`transition_status`]: PaymentRepository::transition_status

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use orderly_core::types::{PaymentTransaction, TransactionStatus, WebhookLog};

use crate::error::{DbError, DbResult};

/// Repository for payment transactions and webhook logs.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new payment repository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    // =========================================================================
    // Payment Transactions
    // =========================================================================

    /// Inserts a new payment transaction.
    ///
    /// The UNIQUE constraint on `order_id` enforces at most one transaction
    /// per order; a duplicate insert surfaces as
    /// [`DbError::UniqueViolation`].
    pub async fn insert(&self, txn: &PaymentTransaction) -> DbResult<PaymentTransaction> {
        let id = if txn.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            txn.id.clone()
        };
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO payment_transactions
                (id, order_id, transaction_id, amount_cents, currency, status,
                 checkout_url, success_url, cancel_url, webhook_url,
                 verified_at, callback_data, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&id)
        .bind(&txn.order_id)
        .bind(&txn.transaction_id)
        .bind(txn.amount_cents)
        .bind(&txn.currency)
        .bind(txn.status)
        .bind(&txn.checkout_url)
        .bind(&txn.success_url)
        .bind(&txn.cancel_url)
        .bind(&txn.webhook_url)
        .bind(txn.verified_at)
        .bind(&txn.callback_data)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(payment_id = %id, order_id = %txn.order_id, "Payment transaction inserted");

        self.get_by_id(&id).await
    }

    /// Fetches a payment transaction by its row ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<PaymentTransaction> {
        sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM payment_transactions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("PaymentTransaction", id))
    }

    /// Fetches the payment transaction for an order, if one exists.
    pub async fn by_order_id(&self, order_id: &str) -> DbResult<Option<PaymentTransaction>> {
        let txn = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM payment_transactions WHERE order_id = ?1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(txn)
    }

    /// Fetches a payment transaction by the gateway-assigned transaction ID.
    pub async fn by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> DbResult<Option<PaymentTransaction>> {
        let txn = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM payment_transactions WHERE transaction_id = ?1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(txn)
    }

    /// Records the gateway's transaction ID and checkout URL after checkout
    /// creation succeeds.
    pub async fn record_checkout(
        &self,
        id: &str,
        transaction_id: &str,
        checkout_url: &str,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
               SET transaction_id = ?1, checkout_url = ?2, updated_at = ?3
             WHERE id = ?4
            "#,
        )
        .bind(transaction_id)
        .bind(checkout_url)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PaymentTransaction", id));
        }
        Ok(())
    }

    /// Applies a status transition guarded by the expected current status.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// row no longer has status `from` (a concurrent update won). The
    /// optional callback payload is attached in the same statement.
    pub async fn transition_status(
        &self,
        id: &str,
        from: TransactionStatus,
        to: TransactionStatus,
        callback_data: Option<&str>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
               SET status = ?1,
                   callback_data = COALESCE(?2, callback_data),
                   updated_at = ?3
             WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(to)
        .bind(callback_data)
        .bind(Utc::now())
        .bind(id)
        .bind(from)
        .execute(&self.pool)
        .await?;

        let transitioned = result.rows_affected() == 1;
        if transitioned {
            info!(payment_id = %id, ?from, ?to, "Payment status transitioned");
        } else {
            warn!(payment_id = %id, ?from, ?to, "Payment transition lost a race");
        }
        Ok(transitioned)
    }

    /// Stamps the verification time after an authoritative gateway verify.
    pub async fn mark_verified(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE payment_transactions SET verified_at = ?1, updated_at = ?1 WHERE id = ?2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PaymentTransaction", id));
        }
        Ok(())
    }

    // =========================================================================
    // Webhook Audit Log
    // =========================================================================

    /// Durably logs a raw webhook payload before any processing.
    /// Returns the log row ID so processing errors can be attached later.
    pub async fn log_webhook(
        &self,
        transaction_id: Option<&str>,
        payload: &str,
    ) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO webhook_logs (id, transaction_id, payload, processing_error, received_at)
            VALUES (?1, ?2, ?3, NULL, ?4)
            "#,
        )
        .bind(&id)
        .bind(transaction_id)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(log_id = %id, "Webhook payload logged");
        Ok(id)
    }

    /// Attaches a processing error to a webhook log row. The payload itself
    /// is never modified.
    pub async fn record_webhook_error(&self, log_id: &str, error: &str) -> DbResult<()> {
        sqlx::query("UPDATE webhook_logs SET processing_error = ?1 WHERE id = ?2")
            .bind(error)
            .bind(log_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns the webhook history for a gateway transaction, oldest first.
    pub async fn webhook_logs_for(&self, transaction_id: &str) -> DbResult<Vec<WebhookLog>> {
        let logs = sqlx::query_as::<_, WebhookLog>(
            "SELECT * FROM webhook_logs WHERE transaction_id = ?1 ORDER BY received_at",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn sample_txn(order_id: &str) -> PaymentTransaction {
        PaymentTransaction {
            id: String::new(),
            order_id: order_id.to_string(),
            transaction_id: None,
            amount_cents: 270_00,
            currency: "USD".to_string(),
            status: TransactionStatus::Pending,
            checkout_url: None,
            success_url: "https://shop.test/payment/success".to_string(),
            cancel_url: "https://shop.test/payment/cancel".to_string(),
            webhook_url: "https://shop.test/payment/webhook".to_string(),
            verified_at: None,
            callback_data: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_one_transaction_per_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.payments();

        repo.insert(&sample_txn("order-1")).await.unwrap();
        let err = repo.insert(&sample_txn("order-1")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_guarded_transition() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.payments();
        let txn = repo.insert(&sample_txn("order-1")).await.unwrap();

        let ok = repo
            .transition_status(
                &txn.id,
                TransactionStatus::Pending,
                TransactionStatus::Completed,
                Some(r#"{"status":"COMPLETED"}"#),
            )
            .await
            .unwrap();
        assert!(ok);

        // Second attempt with a stale `from` loses
        let ok = repo
            .transition_status(
                &txn.id,
                TransactionStatus::Pending,
                TransactionStatus::Failed,
                None,
            )
            .await
            .unwrap();
        assert!(!ok);

        let after = repo.get_by_id(&txn.id).await.unwrap();
        assert_eq!(after.status, TransactionStatus::Completed);
        assert!(after.callback_data.is_some());
    }

    #[tokio::test]
    async fn test_record_checkout_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.payments();
        let txn = repo.insert(&sample_txn("order-1")).await.unwrap();

        repo.record_checkout(&txn.id, "GTX-42", "https://gateway.test/pay/GTX-42")
            .await
            .unwrap();

        let found = repo.by_transaction_id("GTX-42").await.unwrap().unwrap();
        assert_eq!(found.id, txn.id);
        assert_eq!(
            found.checkout_url.as_deref(),
            Some("https://gateway.test/pay/GTX-42")
        );
    }

    #[tokio::test]
    async fn test_webhook_log_append_and_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.payments();

        let log_id = repo
            .log_webhook(Some("GTX-42"), r#"{"status":"COMPLETED"}"#)
            .await
            .unwrap();
        repo.log_webhook(Some("GTX-42"), r#"{"status":"COMPLETED"}"#)
            .await
            .unwrap();
        repo.record_webhook_error(&log_id, "signature mismatch")
            .await
            .unwrap();

        let logs = repo.webhook_logs_for("GTX-42").await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].processing_error.as_deref(), Some("signature mismatch"));
        assert!(logs[1].processing_error.is_none());
    }
}
