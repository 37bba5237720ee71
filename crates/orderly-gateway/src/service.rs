//! # Payment Service
//!
//! Orchestrates the payment lifecycle for settled orders:
//!
//! 1. [`create_payment`] - open a checkout session (idempotent per order)
//! 2. [`handle_webhook`] - ingest gateway notifications (log, verify, apply)
//! 3. [`verify_payment`] - pull the authoritative state from the gateway
//! 4. [`confirm_success`] / [`cancel_payment`] - browser redirect handlers
//!
//! Every observed outcome, regardless of channel, funnels through
//! `orderly_core::payment::apply` and a status-guarded UPDATE, so a
//! webhook and a redirect racing each other resolve to one winner and one
//! harmless no-op.
//!
//! [`create_payment`]: PaymentService::create_payment
//! [`handle_webhook`]: PaymentService::handle_webhook
//! [`verify_payment`]: PaymentService::verify_payment
//! [`confirm_success`]: PaymentService::confirm_success
//! [`cancel_payment`]: PaymentService::cancel_payment

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use orderly_core::payment::{self, PaymentEvent, Transition};
use orderly_core::types::{PaymentMethod, PaymentStatus, PaymentTransaction, TransactionStatus};
use orderly_db::{Database, DbError};

use crate::client::{CheckoutSession, PaymentGatewayClient};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::webhook;

/// Bound on CAS retries when concurrent updates keep winning; in practice
/// one retry suffices because the state space is tiny.
const MAX_TRANSITION_ATTEMPTS: u32 = 3;

// =============================================================================
// Wire Types
// =============================================================================

/// What the webhook endpoint returns to the gateway. Processing outcomes
/// are recorded in the audit log, not in the acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// The fields this service reads from a webhook payload. Everything else
/// is preserved verbatim in the audit log and `callback_data`.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(alias = "txn_id", alias = "transactionId")]
    transaction_id: String,
    status: String,
}

// =============================================================================
// Service
// =============================================================================

/// Payment orchestration over the gateway client and the database.
#[derive(Debug, Clone)]
pub struct PaymentService {
    db: Database,
    client: PaymentGatewayClient,
    config: GatewayConfig,
}

impl PaymentService {
    /// Creates a new payment service.
    pub fn new(db: Database, client: PaymentGatewayClient, config: GatewayConfig) -> Self {
        PaymentService { db, client, config }
    }

    // =========================================================================
    // Checkout Creation
    // =========================================================================

    /// Opens (or re-opens) a checkout session for a settled order.
    ///
    /// Idempotent: if a live transaction with a checkout URL already exists
    /// for this order, the stored session is returned without touching the
    /// gateway, so a buyer refreshing the payment page doesn't mint
    /// duplicate gateway transactions.
    #[instrument(skip(self))]
    pub async fn create_payment(&self, order_id: &str) -> GatewayResult<CheckoutSession> {
        let order = self
            .db
            .orders()
            .get_by_id(order_id)
            .await
            .map_err(|_| GatewayError::OrderNotPayable(order_id.to_string()))?;

        if order.payment_method != PaymentMethod::Gateway {
            return Err(GatewayError::OrderNotPayable(format!(
                "{order_id}: not a gateway order"
            )));
        }
        if order.payment_status == PaymentStatus::Paid {
            return Err(GatewayError::OrderNotPayable(format!(
                "{order_id}: already paid"
            )));
        }
        // A fully discounted order clamps to a zero total; there is nothing
        // for the gateway to collect.
        if order.total_cents == 0 {
            return Err(GatewayError::OrderNotPayable(format!(
                "{order_id}: nothing to charge"
            )));
        }

        let payments = self.db.payments();

        // Idempotent re-entry: reuse a live session when we have one.
        let existing = payments.by_order_id(order_id).await?;
        let row_id = match existing {
            Some(txn) if txn.status.is_terminal() => {
                return Err(GatewayError::OrderNotPayable(format!(
                    "{order_id}: payment already {:?}",
                    txn.status
                )));
            }
            Some(txn) => {
                if let (Some(url), Some(gateway_id)) = (&txn.checkout_url, &txn.transaction_id) {
                    info!(order_id, "Reusing existing checkout session");
                    return Ok(CheckoutSession {
                        checkout_url: url.clone(),
                        transaction_id: gateway_id.clone(),
                    });
                }
                // Row exists but the first gateway call never completed;
                // finish the job against the same row.
                txn.id
            }
            None => {
                let insert = payments
                    .insert(&PaymentTransaction {
                        id: String::new(),
                        order_id: order_id.to_string(),
                        transaction_id: None,
                        amount_cents: order.total_cents,
                        currency: self.config.currency.clone(),
                        status: TransactionStatus::Pending,
                        checkout_url: None,
                        success_url: self.config.success_url.clone(),
                        cancel_url: self.config.cancel_url.clone(),
                        webhook_url: self.config.webhook_url.clone(),
                        verified_at: None,
                        callback_data: None,
                        created_at: chrono::Utc::now(),
                        updated_at: chrono::Utc::now(),
                    })
                    .await;
                match insert {
                    Ok(inserted) => inserted.id,
                    // A concurrent create_payment inserted first (order_id
                    // is UNIQUE); reuse the winner's row instead of
                    // surfacing the violation.
                    Err(DbError::UniqueViolation { .. }) => {
                        let txn = payments.by_order_id(order_id).await?.ok_or_else(|| {
                            GatewayError::OrderNotPayable(format!(
                                "{order_id}: payment row vanished mid-creation"
                            ))
                        })?;
                        if let (Some(url), Some(gateway_id)) =
                            (&txn.checkout_url, &txn.transaction_id)
                        {
                            info!(order_id, "Reusing checkout session created concurrently");
                            return Ok(CheckoutSession {
                                checkout_url: url.clone(),
                                transaction_id: gateway_id.clone(),
                            });
                        }
                        txn.id
                    }
                    Err(other) => return Err(other.into()),
                }
            }
        };

        let customer = order.customer().map_err(|e| {
            GatewayError::OrderNotPayable(format!("{order_id}: corrupt customer snapshot: {e}"))
        })?;

        let session = self
            .client
            .create_checkout(
                &customer.name,
                &customer.email,
                order.total_cents,
                serde_json::json!({
                    "order_id": order.id,
                    "order_number": order.order_number,
                }),
            )
            .await?;

        payments
            .record_checkout(&row_id, &session.transaction_id, &session.checkout_url)
            .await?;

        info!(
            order_id,
            transaction_id = %session.transaction_id,
            "Checkout session created"
        );
        Ok(session)
    }

    // =========================================================================
    // Webhook Intake
    // =========================================================================

    /// Ingests a raw gateway webhook.
    ///
    /// ## Order of operations
    /// 1. Log the raw payload (append-only, before anything can fail)
    /// 2. Verify the HMAC signature when a secret is configured
    /// 3. Parse, run the state machine, apply side effects
    ///
    /// A bad signature is rejected. Processing problems after a valid
    /// signature (unknown transaction, illegal transition, malformed body)
    /// are recorded on the log row and acknowledged anyway, because the
    /// gateway retrying the same payload cannot fix them.
    #[instrument(skip(self, raw_body, signature))]
    pub async fn handle_webhook(
        &self,
        raw_body: &str,
        signature: Option<&str>,
    ) -> GatewayResult<WebhookAck> {
        let payments = self.db.payments();

        // Best-effort transaction ID extraction so even unparseable or
        // forged payloads land in the audit log under the right key.
        let claimed_txn_id = serde_json::from_str::<serde_json::Value>(raw_body)
            .ok()
            .and_then(|v| {
                v.get("transaction_id")
                    .or_else(|| v.get("txn_id"))
                    .or_else(|| v.get("transactionId"))
                    .and_then(|id| id.as_str().map(str::to_string))
            });

        let log_id = payments
            .log_webhook(claimed_txn_id.as_deref(), raw_body)
            .await?;

        if let Some(secret) = &self.config.webhook_secret {
            let valid = signature
                .map(|sig| webhook::verify(secret, raw_body.as_bytes(), sig))
                .unwrap_or(false);
            if !valid {
                warn!(%log_id, "Webhook signature verification failed");
                payments
                    .record_webhook_error(&log_id, "signature verification failed")
                    .await?;
                return Err(GatewayError::InvalidSignature);
            }
        }

        let payload: WebhookPayload = match serde_json::from_str(raw_body) {
            Ok(p) => p,
            Err(e) => {
                payments
                    .record_webhook_error(&log_id, &format!("malformed payload: {e}"))
                    .await?;
                return Ok(WebhookAck { received: true });
            }
        };

        let Some(txn) = payments.by_transaction_id(&payload.transaction_id).await? else {
            payments
                .record_webhook_error(
                    &log_id,
                    &format!("unknown transaction: {}", payload.transaction_id),
                )
                .await?;
            return Ok(WebhookAck { received: true });
        };

        let event = PaymentEvent::from_gateway_status(&payload.status);
        match self.apply_event(&txn, event, Some(raw_body)).await {
            Ok(_) => {}
            Err(GatewayError::State(e)) => {
                // Conflicting terminal outcome: keep the evidence, keep the
                // existing state.
                warn!(%log_id, error = %e, "Webhook reported an illegal transition");
                payments.record_webhook_error(&log_id, &e.to_string()).await?;
            }
            Err(other) => return Err(other),
        }

        Ok(WebhookAck { received: true })
    }

    // =========================================================================
    // Verification & Redirects
    // =========================================================================

    /// Pulls the authoritative transaction state from the gateway and
    /// applies it. Returns the (possibly unchanged) final status.
    #[instrument(skip(self))]
    pub async fn verify_payment(&self, transaction_id: &str) -> GatewayResult<TransactionStatus> {
        let txn = self
            .db
            .payments()
            .by_transaction_id(transaction_id)
            .await?
            .ok_or_else(|| GatewayError::TransactionNotFound(transaction_id.to_string()))?;

        let outcome = self.client.verify(transaction_id).await?;
        let event = PaymentEvent::from_gateway_status(&outcome.status);

        let status = self
            .apply_event(&txn, event, Some(&outcome.details.to_string()))
            .await?;
        self.db.payments().mark_verified(&txn.id).await?;

        Ok(status)
    }

    /// Success-redirect handler. The redirect itself proves nothing (the
    /// buyer controls their browser), so this just triggers a server-side
    /// verification.
    pub async fn confirm_success(&self, transaction_id: &str) -> GatewayResult<TransactionStatus> {
        self.verify_payment(transaction_id).await
    }

    /// Cancel-redirect handler: the buyer abandoned checkout.
    ///
    /// Only legal before the gateway starts processing; a cancel redirect
    /// arriving after completion is rejected by the state machine.
    #[instrument(skip(self))]
    pub async fn cancel_payment(&self, transaction_id: &str) -> GatewayResult<TransactionStatus> {
        let txn = self
            .db
            .payments()
            .by_transaction_id(transaction_id)
            .await?
            .ok_or_else(|| GatewayError::TransactionNotFound(transaction_id.to_string()))?;

        self.apply_event(&txn, PaymentEvent::Cancelled, None).await
    }

    // =========================================================================
    // State Machine Driver
    // =========================================================================

    /// Runs one event through the transition table and persists the result
    /// with a status-guarded UPDATE. Retries on a lost CAS by re-reading
    /// the row, since the concurrent winner changes what is legal.
    async fn apply_event(
        &self,
        txn: &PaymentTransaction,
        event: PaymentEvent,
        callback_data: Option<&str>,
    ) -> GatewayResult<TransactionStatus> {
        let payments = self.db.payments();
        let mut current = txn.status;

        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            match payment::apply(current, event)? {
                Transition::Unchanged => return Ok(current),
                Transition::Changed(to) => {
                    let won = payments
                        .transition_status(&txn.id, current, to, callback_data)
                        .await?;
                    if won {
                        if to == TransactionStatus::Completed {
                            self.db.orders().mark_confirmed_and_paid(&txn.order_id).await?;
                        }
                        return Ok(to);
                    }
                    // Lost the race: re-read and re-decide from the new state.
                    current = payments.get_by_id(&txn.id).await?.status;
                }
            }
        }

        // Only reachable under pathological contention on one row.
        Err(GatewayError::Db(DbError::TransactionFailed(format!(
            "payment {} transition kept losing races",
            txn.id
        ))))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orderly_core::types::{CartLine, Coupon, CustomerInfo, DiscountType, OrderStatus, Product};
    use orderly_db::{DbConfig, SettlementRequest};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "whsec_test";

    async fn settle_gateway_order(db: &Database) -> String {
        let product = db
            .products()
            .insert(&Product {
                id: String::new(),
                sku: "WIDGET-01".to_string(),
                name: "Widget".to_string(),
                price_cents: 135_00,
                stock_quantity: 10,
                is_active: true,
                image: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let settled = db
            .settlement()
            .settle(SettlementRequest {
                user_id: "u1".to_string(),
                customer: CustomerInfo {
                    name: "Ada Lovelace".to_string(),
                    phone: "+1-555-0100".to_string(),
                    email: "ada@example.com".to_string(),
                },
                items: vec![CartLine {
                    product_id: product.id,
                    quantity: 2,
                    image: None,
                    unit_price_cents: None,
                }],
                discount_code: None,
                payment_method: PaymentMethod::Gateway,
                shipping_address: serde_json::json!({"city": "London"}),
            })
            .await
            .unwrap();

        settled.order.id
    }

    async fn service(server: &MockServer) -> (PaymentService, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = GatewayConfig::new(
            server.uri(),
            "key-123",
            "https://shop.test/payment/success",
            "https://shop.test/payment/cancel",
            "https://shop.test/payment/webhook",
        )
        .webhook_secret(SECRET);
        let client = PaymentGatewayClient::new(config.clone()).unwrap();
        (PaymentService::new(db.clone(), client, config), db)
    }

    fn mock_checkout(transaction_id: &str) -> Mock {
        Mock::given(method("POST"))
            .and(path("/checkout"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "payment_url": format!("https://gateway.test/pay/{transaction_id}"),
                "transaction_id": transaction_id,
            })))
    }

    #[tokio::test]
    async fn test_create_payment_is_idempotent() {
        let server = MockServer::start().await;
        // expect(1): the second create_payment must NOT hit the gateway
        mock_checkout("GTX-42").expect(1).mount(&server).await;

        let (service, db) = service(&server).await;
        let order_id = settle_gateway_order(&db).await;

        let first = service.create_payment(&order_id).await.unwrap();
        let second = service.create_payment(&order_id).await.unwrap();

        assert_eq!(first.transaction_id, "GTX-42");
        assert_eq!(second.checkout_url, first.checkout_url);

        let txn = db.payments().by_order_id(&order_id).await.unwrap().unwrap();
        assert_eq!(txn.amount_cents, 270_00);
        assert_eq!(txn.status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_cod_order_is_not_payable() {
        let server = MockServer::start().await;
        let (service, db) = service(&server).await;

        let product = db
            .products()
            .insert(&Product {
                id: String::new(),
                sku: "W-1".to_string(),
                name: "Widget".to_string(),
                price_cents: 10_00,
                stock_quantity: 5,
                is_active: true,
                image: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        let settled = db
            .settlement()
            .settle(SettlementRequest {
                user_id: "u1".to_string(),
                customer: CustomerInfo {
                    name: "Ada".to_string(),
                    phone: "+1".to_string(),
                    email: "ada@example.com".to_string(),
                },
                items: vec![CartLine {
                    product_id: product.id,
                    quantity: 1,
                    image: None,
                    unit_price_cents: None,
                }],
                discount_code: None,
                payment_method: PaymentMethod::CashOnDelivery,
                shipping_address: serde_json::json!({}),
            })
            .await
            .unwrap();

        let err = service.create_payment(&settled.order.id).await.unwrap_err();
        assert!(matches!(err, GatewayError::OrderNotPayable(_)));
    }

    #[tokio::test]
    async fn test_zero_total_order_is_not_payable() {
        let server = MockServer::start().await;
        let (service, db) = service(&server).await;

        // A fixed coupon covering the whole subtotal clamps the total to 0
        let product = db
            .products()
            .insert(&Product {
                id: String::new(),
                sku: "W-1".to_string(),
                name: "Widget".to_string(),
                price_cents: 10_00,
                stock_quantity: 5,
                is_active: true,
                image: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        let now = Utc::now();
        db.coupons()
            .insert(&Coupon {
                id: String::new(),
                code: "FREEBIE".to_string(),
                discount_type: DiscountType::Fixed,
                discount_value: 50_00,
                min_order_cents: None,
                max_discount_cents: None,
                usage_limit: None,
                used_count: 0,
                valid_from: now - chrono::Duration::days(1),
                valid_until: now + chrono::Duration::days(30),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let settled = db
            .settlement()
            .settle(SettlementRequest {
                user_id: "u1".to_string(),
                customer: CustomerInfo {
                    name: "Ada".to_string(),
                    phone: "+1".to_string(),
                    email: "ada@example.com".to_string(),
                },
                items: vec![CartLine {
                    product_id: product.id,
                    quantity: 1,
                    image: None,
                    unit_price_cents: None,
                }],
                discount_code: Some("FREEBIE".to_string()),
                payment_method: PaymentMethod::Gateway,
                shipping_address: serde_json::json!({}),
            })
            .await
            .unwrap();
        assert_eq!(settled.order.total_cents, 0);

        // Nothing to charge: rejected before any gateway call or insert
        let err = service.create_payment(&settled.order.id).await.unwrap_err();
        assert!(matches!(err, GatewayError::OrderNotPayable(_)));
        assert!(db
            .payments()
            .by_order_id(&settled.order.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_create_payment_stays_idempotent() {
        let server = MockServer::start().await;
        mock_checkout("GTX-42").mount(&server).await;

        // File-backed pool so the two calls can genuinely interleave
        let path = std::env::temp_dir().join(format!(
            "orderly-payrace-{}-{}.db",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let config = GatewayConfig::new(
            server.uri(),
            "key-123",
            "https://shop.test/payment/success",
            "https://shop.test/payment/cancel",
            "https://shop.test/payment/webhook",
        )
        .webhook_secret(SECRET);
        let client = PaymentGatewayClient::new(config.clone()).unwrap();
        let service = PaymentService::new(db.clone(), client, config);
        let order_id = settle_gateway_order(&db).await;

        let (a, b) = tokio::join!(
            service.create_payment(&order_id),
            service.create_payment(&order_id),
        );

        // Neither call surfaces the unique-constraint race; both get the
        // same session against the single payment row
        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a.transaction_id, "GTX-42");
        assert_eq!(b.transaction_id, "GTX-42");

        let txn = db.payments().by_order_id(&order_id).await.unwrap().unwrap();
        assert_eq!(txn.transaction_id.as_deref(), Some("GTX-42"));
        assert_eq!(txn.status, TransactionStatus::Pending);

        db.close().await;
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[tokio::test]
    async fn test_signed_completed_webhook_marks_order_paid() {
        let server = MockServer::start().await;
        mock_checkout("GTX-42").mount(&server).await;

        let (service, db) = service(&server).await;
        let order_id = settle_gateway_order(&db).await;
        service.create_payment(&order_id).await.unwrap();

        let body = r#"{"transaction_id":"GTX-42","status":"COMPLETED"}"#;
        let signature = webhook::sign(SECRET, body.as_bytes());

        let ack = service.handle_webhook(body, Some(&signature)).await.unwrap();
        assert!(ack.received);

        let txn = db.payments().by_order_id(&order_id).await.unwrap().unwrap();
        assert_eq!(txn.status, TransactionStatus::Completed);
        assert!(txn.callback_data.is_some());

        let order = db.orders().get_by_id(&order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        let invoice = db.orders().invoice_for_order(&order_id).await.unwrap();
        assert_eq!(invoice.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_webhook_replay_is_harmless() {
        let server = MockServer::start().await;
        mock_checkout("GTX-42").mount(&server).await;

        let (service, db) = service(&server).await;
        let order_id = settle_gateway_order(&db).await;
        service.create_payment(&order_id).await.unwrap();

        let body = r#"{"transaction_id":"GTX-42","status":"COMPLETED"}"#;
        let signature = webhook::sign(SECRET, body.as_bytes());

        service.handle_webhook(body, Some(&signature)).await.unwrap();
        // Same payload delivered again (gateway retry)
        let ack = service.handle_webhook(body, Some(&signature)).await.unwrap();
        assert!(ack.received);

        let txn = db.payments().by_order_id(&order_id).await.unwrap().unwrap();
        assert_eq!(txn.status, TransactionStatus::Completed);
        // Both deliveries are in the audit log
        assert_eq!(db.payments().webhook_logs_for("GTX-42").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_forged_webhook_rejected_but_logged() {
        let server = MockServer::start().await;
        mock_checkout("GTX-42").mount(&server).await;

        let (service, db) = service(&server).await;
        let order_id = settle_gateway_order(&db).await;
        service.create_payment(&order_id).await.unwrap();

        let body = r#"{"transaction_id":"GTX-42","status":"COMPLETED"}"#;
        let err = service
            .handle_webhook(body, Some("deadbeef"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature));

        // Payment state untouched, evidence preserved
        let txn = db.payments().by_order_id(&order_id).await.unwrap().unwrap();
        assert_eq!(txn.status, TransactionStatus::Pending);
        let logs = db.payments().webhook_logs_for("GTX-42").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].processing_error.is_some());
    }

    #[tokio::test]
    async fn test_conflicting_terminal_webhook_recorded_not_applied() {
        let server = MockServer::start().await;
        mock_checkout("GTX-42").mount(&server).await;

        let (service, db) = service(&server).await;
        let order_id = settle_gateway_order(&db).await;
        service.create_payment(&order_id).await.unwrap();

        let completed = r#"{"transaction_id":"GTX-42","status":"COMPLETED"}"#;
        service
            .handle_webhook(completed, Some(&webhook::sign(SECRET, completed.as_bytes())))
            .await
            .unwrap();

        // A contradictory FAILED notification afterwards
        let failed = r#"{"transaction_id":"GTX-42","status":"FAILED"}"#;
        let ack = service
            .handle_webhook(failed, Some(&webhook::sign(SECRET, failed.as_bytes())))
            .await
            .unwrap();
        assert!(ack.received);

        let txn = db.payments().by_order_id(&order_id).await.unwrap().unwrap();
        assert_eq!(txn.status, TransactionStatus::Completed);
        let logs = db.payments().webhook_logs_for("GTX-42").await.unwrap();
        assert!(logs[1].processing_error.as_deref().unwrap().contains("Illegal"));
    }

    #[tokio::test]
    async fn test_verify_payment_pulls_gateway_truth() {
        let server = MockServer::start().await;
        mock_checkout("GTX-42").mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "COMPLETED",
            })))
            .mount(&server)
            .await;

        let (service, db) = service(&server).await;
        let order_id = settle_gateway_order(&db).await;
        service.create_payment(&order_id).await.unwrap();

        let status = service.verify_payment("GTX-42").await.unwrap();
        assert_eq!(status, TransactionStatus::Completed);

        let txn = db.payments().by_order_id(&order_id).await.unwrap().unwrap();
        assert!(txn.verified_at.is_some());
        let order = db.orders().get_by_id(&order_id).await.unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_cancel_before_processing() {
        let server = MockServer::start().await;
        mock_checkout("GTX-42").mount(&server).await;

        let (service, db) = service(&server).await;
        let order_id = settle_gateway_order(&db).await;
        service.create_payment(&order_id).await.unwrap();

        let status = service.cancel_payment("GTX-42").await.unwrap();
        assert_eq!(status, TransactionStatus::Cancelled);

        // Order is NOT confirmed; payment stayed unconfirmed
        let order = db.orders().get_by_id(&order_id).await.unwrap();
        assert_eq!(order.payment_status, PaymentStatus::AwaitingPayment);
    }

    #[tokio::test]
    async fn test_unknown_transaction_webhook_acked_and_logged() {
        let server = MockServer::start().await;
        let (service, db) = service(&server).await;

        let body = r#"{"transaction_id":"GTX-GHOST","status":"COMPLETED"}"#;
        let ack = service
            .handle_webhook(body, Some(&webhook::sign(SECRET, body.as_bytes())))
            .await
            .unwrap();
        assert!(ack.received);

        let logs = db.payments().webhook_logs_for("GTX-GHOST").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0]
            .processing_error
            .as_deref()
            .unwrap()
            .contains("unknown transaction"));
    }
}
