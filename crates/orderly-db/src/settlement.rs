//! # Order Settlement Coordinator
//!
//! The ONE place where a cart becomes a durable order. Everything between
//! `begin` and `commit` either all happens or none of it does.
//!
//! ## Settlement Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       settle(request)                                   │
//! │                                                                         │
//! │  Phase 1: validate (pure, no tx)                                       │
//! │  ├── cart shape, quantities                                            │
//! │  └── customer contact fields                                           │
//! │                                                                         │
//! │  Phase 2: BEGIN ─────────────────────────────────────────────┐         │
//! │  ├── fetch product rows, reprice every line (server prices)  │         │
//! │  ├── resolve + evaluate coupon (pure, no counter touched)    │         │
//! │  ├── total = max(0, subtotal - discount)                     │         │
//! │  ├── write order + items + invoice + invoice items           │         │
//! │  ├── conditional stock decrement per line  ──fail──► ROLLBACK│         │
//! │  ├── conditional coupon consume            ──fail──► ROLLBACK│         │
//! │  ├── clear the buyer's cart                                  │         │
//! │  └── COMMIT ─────────────────────────────────────────────────┘         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional updates come LAST so a settlement that fails validation
//! or pricing never touches the shared counters, and the write-time
//! re-check means two settlements racing for the last unit of stock (or
//! the last coupon use) cannot both commit.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use orderly_core::coupon::{self, Discount};
use orderly_core::pricing::{self, PricedCart};
use orderly_core::types::{
    CartLine, CustomerInfo, Invoice, InvoiceItem, Order, OrderLineItem, OrderStatus,
    PaymentMethod, PaymentStatus,
};
use orderly_core::validation;
use orderly_core::{SettlementError, SettlementResult};

use crate::repository::cart::CartRepository;
use crate::repository::coupon::CouponRepository;
use crate::repository::order::OrderRepository;
use crate::repository::product::ProductRepository;

// =============================================================================
// Request / Response
// =============================================================================

/// A settlement request: the buyer's cart plus checkout details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRequest {
    pub user_id: String,
    pub customer: CustomerInfo,
    pub items: Vec<CartLine>,
    /// Raw coupon code as typed by the buyer; normalized before lookup.
    #[serde(default)]
    pub discount_code: Option<String>,
    pub payment_method: PaymentMethod,
    /// Opaque shipping address document, frozen onto the order as-is.
    pub shipping_address: serde_json::Value,
}

/// A committed settlement: the order, its frozen line items, and the
/// invoice written in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledOrder {
    pub order: Order,
    pub items: Vec<OrderLineItem>,
    pub invoice: Invoice,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Runs the settlement pipeline. Stateless; cheap to clone.
#[derive(Debug, Clone)]
pub struct SettlementCoordinator {
    pool: SqlitePool,
}

impl SettlementCoordinator {
    /// Creates a new settlement coordinator.
    pub fn new(pool: SqlitePool) -> Self {
        SettlementCoordinator { pool }
    }

    /// Settles a cart into a durable order + invoice.
    ///
    /// On any error the transaction is rolled back: no order row, no stock
    /// movement, no coupon consumption, and the buyer's cart is untouched.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn settle(&self, request: SettlementRequest) -> SettlementResult<SettledOrder> {
        // Phase 1: pure validation, before any connection is taken
        validation::validate_cart(&request.items)?;
        validation::validate_customer(&request.customer)?;

        let code = validation::normalize_coupon_code(request.discount_code.as_deref());

        // Phase 2: everything below shares one transaction
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SettlementError::Persistence(e.to_string()))?;

        // Reprice every line from the catalog rows as they exist inside
        // this transaction. Client prices never enter the computation.
        let mut products = HashMap::with_capacity(request.items.len());
        for line in &request.items {
            if let Some(product) = ProductRepository::fetch_in_tx(&mut tx, &line.product_id).await?
            {
                products.insert(product.id.clone(), product);
            }
        }
        let priced: PricedCart = pricing::price_cart(&products, &request.items)?;

        let discount = match &code {
            Some(code) => {
                let coupon = CouponRepository::find_by_code_in_tx(&mut tx, code)
                    .await?
                    .ok_or_else(|| SettlementError::CouponNotFound(code.clone()))?;
                coupon::evaluate(&coupon, Utc::now(), priced.subtotal)?
            }
            None => Discount::none(),
        };

        let total = (priced.subtotal - discount.amount).clamp_non_negative();

        debug!(
            subtotal = priced.subtotal.cents(),
            discount = discount.amount.cents(),
            total = total.cents(),
            "Cart priced"
        );

        // Build the order + invoice snapshots
        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();
        let invoice_id = Uuid::new_v4().to_string();
        let order_number = generate_order_number();

        let order = Order {
            id: order_id.clone(),
            user_id: request.user_id.clone(),
            order_number: order_number.clone(),
            status: OrderStatus::Processing,
            payment_method: request.payment_method,
            payment_status: PaymentStatus::initial_for(request.payment_method),
            subtotal_cents: priced.subtotal.cents(),
            discount_cents: discount.amount.cents(),
            total_cents: total.cents(),
            discount_code: discount.code.clone(),
            customer_info: serde_json::to_string(&request.customer)
                .map_err(|e| SettlementError::Persistence(e.to_string()))?,
            shipping_address: request.shipping_address.to_string(),
            invoice_number: order_number.clone(),
            created_at: now,
            updated_at: now,
        };

        let items: Vec<OrderLineItem> = priced
            .lines
            .iter()
            .map(|line| OrderLineItem {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: line.product_id.clone(),
                name_snapshot: line.name.clone(),
                unit_price_cents: line.unit_price_cents,
                quantity: line.quantity,
                image: line.image.clone(),
                line_total_cents: line.line_total_cents,
                created_at: now,
            })
            .collect();

        let invoice = Invoice {
            id: invoice_id.clone(),
            invoice_number: order_number.clone(),
            order_id: order_id.clone(),
            subtotal_cents: priced.subtotal.cents(),
            discount_cents: discount.amount.cents(),
            total_cents: total.cents(),
            discount_code: discount.code.clone(),
            payment_method: request.payment_method,
            payment_status: PaymentStatus::initial_for(request.payment_method),
            created_at: now,
            updated_at: now,
        };

        let invoice_items: Vec<InvoiceItem> = items
            .iter()
            .map(|item| InvoiceItem {
                id: Uuid::new_v4().to_string(),
                invoice_id: invoice_id.clone(),
                product_id: item.product_id.clone(),
                name_snapshot: item.name_snapshot.clone(),
                unit_price_cents: item.unit_price_cents,
                quantity: item.quantity,
                image: item.image.clone(),
                line_total_cents: item.line_total_cents,
                created_at: now,
            })
            .collect();

        OrderRepository::insert_order(&mut tx, &order).await?;
        OrderRepository::insert_items(&mut tx, &items).await?;
        OrderRepository::insert_invoice(&mut tx, &invoice).await?;
        OrderRepository::insert_invoice_items(&mut tx, &invoice_items).await?;

        // Atomic phase: conditional updates on the shared counters. A lost
        // race drops the transaction, rolling back every write above.
        for line in &priced.lines {
            let reserved =
                ProductRepository::try_reserve(&mut tx, &line.product_id, line.quantity).await?;
            if !reserved {
                warn!(product = %line.name, "Settlement aborted: stock race lost");
                return Err(SettlementError::StockRaceLost {
                    name: line.name.clone(),
                });
            }
        }

        if let Some(coupon_id) = &discount.coupon_id {
            let consumed = CouponRepository::try_consume(&mut tx, coupon_id).await?;
            if !consumed {
                let code = discount.code.clone().unwrap_or_default();
                warn!(%code, "Settlement aborted: coupon race lost");
                return Err(SettlementError::CouponRaceLost { code });
            }
        }

        CartRepository::clear_for_user(&mut tx, &request.user_id).await?;

        tx.commit()
            .await
            .map_err(|e| SettlementError::Persistence(e.to_string()))?;

        info!(
            order_number = %order.order_number,
            total_cents = order.total_cents,
            "Order settled"
        );

        Ok(SettledOrder {
            order,
            items,
            invoice,
        })
    }
}

// =============================================================================
// Order Number Generation
// =============================================================================

/// Generates a human-readable order number: `ORD-YYMMDD-HHMMSS-XXXX`.
///
/// The timestamp makes numbers sortable at a glance; the random suffix
/// (drawn from a fresh UUID) disambiguates settlements in the same second.
/// The UNIQUE constraint on `orders.order_number` backstops the
/// (vanishingly unlikely) collision.
fn generate_order_number() -> String {
    let now = Utc::now();
    let random = Uuid::new_v4();
    let bytes = random.as_bytes();
    let suffix = (u32::from(bytes[0]) << 8 | u32::from(bytes[1])) % 10000;
    format!("ORD-{}-{:04}", now.format("%y%m%d-%H%M%S"), suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use orderly_core::types::{Coupon, DiscountType, Product};

    fn customer() -> CustomerInfo {
        CustomerInfo {
            name: "Ada Lovelace".to_string(),
            phone: "+1-555-0100".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    fn request(product_id: &str, quantity: i64, code: Option<&str>) -> SettlementRequest {
        SettlementRequest {
            user_id: "u1".to_string(),
            customer: customer(),
            items: vec![CartLine {
                product_id: product_id.to_string(),
                quantity,
                image: None,
                unit_price_cents: None,
            }],
            discount_code: code.map(str::to_string),
            payment_method: PaymentMethod::CashOnDelivery,
            shipping_address: serde_json::json!({"street": "12 Analytical Way", "city": "London"}),
        }
    }

    async fn seed_product(db: &Database, price_cents: i64, stock: i64) -> Product {
        db.products()
            .insert(&Product {
                id: String::new(),
                sku: "WIDGET-01".to_string(),
                name: "Widget".to_string(),
                price_cents,
                stock_quantity: stock,
                is_active: true,
                image: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    async fn seed_save10(db: &Database) -> Coupon {
        let now = Utc::now();
        db.coupons()
            .insert(&Coupon {
                id: String::new(),
                code: "SAVE10".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: 10,
                min_order_cents: Some(200_00),
                max_discount_cents: Some(50_00),
                usage_limit: Some(100),
                used_count: 0,
                valid_from: now - chrono::Duration::days(1),
                valid_until: now + chrono::Duration::days(30),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_settlement_with_coupon() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = seed_product(&db, 100_00, 5).await;
        let coupon = seed_save10(&db).await;

        let settled = db
            .settlement()
            .settle(request(&product.id, 3, Some("save10")))
            .await
            .unwrap();

        // 3 × $100.00 = $300.00, 10% off = $30.00, total $270.00
        assert_eq!(settled.order.subtotal_cents, 300_00);
        assert_eq!(settled.order.discount_cents, 30_00);
        assert_eq!(settled.order.total_cents, 270_00);
        assert_eq!(settled.order.discount_code.as_deref(), Some("SAVE10"));
        assert_eq!(settled.order.status, OrderStatus::Processing);
        assert_eq!(settled.order.payment_status, PaymentStatus::Pending);

        // Line item snapshot frozen from the catalog
        assert_eq!(settled.items.len(), 1);
        assert_eq!(settled.items[0].unit_price_cents, 100_00);
        assert_eq!(settled.items[0].name_snapshot, "Widget");

        // Invoice mirrors the order totals and shares the number
        assert_eq!(settled.invoice.total_cents, 270_00);
        assert_eq!(settled.invoice.invoice_number, settled.order.order_number);

        // Counters moved exactly once
        let product_after = db.products().get_by_id(&product.id).await.unwrap();
        assert_eq!(product_after.stock_quantity, 2);
        let coupon_after = db.coupons().get_by_id(&coupon.id).await.unwrap();
        assert_eq!(coupon_after.used_count, 1);

        // Everything is durably readable
        let fetched = db
            .orders()
            .get_by_order_number(&settled.order.order_number)
            .await
            .unwrap();
        assert_eq!(fetched.total_cents, 270_00);
        assert_eq!(db.orders().items_for_order(&fetched.id).await.unwrap().len(), 1);
        db.orders().invoice_for_order(&fetched.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_gateway_orders_await_payment() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = seed_product(&db, 50_00, 5).await;

        let mut req = request(&product.id, 1, None);
        req.payment_method = PaymentMethod::Gateway;

        let settled = db.settlement().settle(req).await.unwrap();
        assert_eq!(settled.order.payment_status, PaymentStatus::AwaitingPayment);
        assert_ne!(settled.order.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_insufficient_stock_names_the_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = seed_product(&db, 100_00, 2).await;

        let err = db
            .settlement()
            .settle(request(&product.id, 3, None))
            .await
            .unwrap_err();

        match err {
            SettlementError::InsufficientStock {
                name,
                available,
                requested,
            } => {
                assert_eq!(name, "Widget");
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing was written
        let after = db.products().get_by_id(&product.id).await.unwrap();
        assert_eq!(after.stock_quantity, 2);
        assert!(db.orders().list_for_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_oversell_on_sequential_settlements() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = seed_product(&db, 100_00, 1).await;

        let first = db.settlement().settle(request(&product.id, 1, None)).await;
        assert!(first.is_ok());

        let second = db
            .settlement()
            .settle(request(&product.id, 1, None))
            .await
            .unwrap_err();
        assert!(matches!(second, SettlementError::InsufficientStock { .. }));

        let after = db.products().get_by_id(&product.id).await.unwrap();
        assert_eq!(after.stock_quantity, 0);
        assert_eq!(db.orders().list_for_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_oversell_under_concurrent_settlements() {
        // A file-backed pool: in-memory SQLite is capped at one connection,
        // which would serialize the two attempts before they could contend.
        let path = std::env::temp_dir().join(format!("orderly-oversell-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let product = seed_product(&db, 100_00, 1).await;

        let settlement_a = db.settlement();
        let settlement_b = db.settlement();
        let (a, b) = tokio::join!(
            settlement_a.settle(request(&product.id, 1, None)),
            settlement_b.settle(request(&product.id, 1, None)),
        );

        // Exactly one settlement commits the last unit
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

        // The loser gets a clean rejection: insufficient stock if it read
        // after the winner committed, otherwise a retryable race/conflict
        // error from losing the conditional decrement or the commit
        let loser = if a.is_ok() { b.unwrap_err() } else { a.unwrap_err() };
        match &loser {
            SettlementError::InsufficientStock { .. } => {}
            other => assert!(other.is_retryable(), "unexpected loser error: {other}"),
        }

        let after = db.products().get_by_id(&product.id).await.unwrap();
        assert_eq!(after.stock_quantity, 0);
        assert_eq!(db.orders().list_for_user("u1").await.unwrap().len(), 1);

        db.close().await;
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[tokio::test]
    async fn test_aborted_settlement_leaves_coupon_untouched() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        // Coupon is fine, but the stock check fails after pricing
        let product = seed_product(&db, 300_00, 1).await;
        let coupon = seed_save10(&db).await;

        let err = db
            .settlement()
            .settle(request(&product.id, 2, Some("SAVE10")))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InsufficientStock { .. }));

        let coupon_after = db.coupons().get_by_id(&coupon.id).await.unwrap();
        assert_eq!(coupon_after.used_count, 0);
    }

    #[tokio::test]
    async fn test_forged_client_price_is_ignored() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = seed_product(&db, 100_00, 5).await;

        let mut req = request(&product.id, 2, None);
        req.items[0].unit_price_cents = Some(1); // client claims 1 cent

        let settled = db.settlement().settle(req).await.unwrap();
        assert_eq!(settled.order.subtotal_cents, 200_00);
        assert_eq!(settled.items[0].unit_price_cents, 100_00);
    }

    #[tokio::test]
    async fn test_unknown_coupon_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = seed_product(&db, 100_00, 5).await;

        let err = db
            .settlement()
            .settle(request(&product.id, 1, Some("GHOST")))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::CouponNotFound(code) if code == "GHOST"));
    }

    #[tokio::test]
    async fn test_blank_coupon_code_means_no_coupon() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = seed_product(&db, 100_00, 5).await;

        let settled = db
            .settlement()
            .settle(request(&product.id, 1, Some("   ")))
            .await
            .unwrap();
        assert_eq!(settled.order.discount_cents, 0);
        assert!(settled.order.discount_code.is_none());
    }

    #[tokio::test]
    async fn test_empty_cart_rejected_before_any_write() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let req = SettlementRequest {
            user_id: "u1".to_string(),
            customer: customer(),
            items: vec![],
            discount_code: None,
            payment_method: PaymentMethod::CashOnDelivery,
            shipping_address: serde_json::json!({}),
        };

        let err = db.settlement().settle(req).await.unwrap_err();
        assert!(matches!(err, SettlementError::EmptyCart));
    }

    #[tokio::test]
    async fn test_settlement_clears_the_cart() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = seed_product(&db, 100_00, 5).await;
        db.carts()
            .upsert_item("u1", &product.id, 2, None)
            .await
            .unwrap();

        db.settlement()
            .settle(request(&product.id, 2, None))
            .await
            .unwrap();

        assert_eq!(db.carts().count_for_user("u1").await.unwrap(), 0);
    }

    #[test]
    fn test_order_number_format() {
        let n = generate_order_number();
        assert!(n.starts_with("ORD-"));
        // ORD-YYMMDD-HHMMSS-XXXX
        assert_eq!(n.len(), "ORD-260830-120000-0000".len());
    }

    #[test]
    fn test_order_number_suffix_varies_within_a_second() {
        // Random suffix: 5 draws in the same instant collide with
        // probability ~10^-16, so at least two must differ
        let numbers: std::collections::HashSet<String> =
            (0..5).map(|_| generate_order_number()).collect();
        assert!(numbers.len() > 1);
    }
}
