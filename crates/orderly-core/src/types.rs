//! # Domain Types
//!
//! Core domain types used throughout the Orderly settlement engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │    Product      │   │     Coupon      │   │       Order         │   │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────────  │   │
//! │  │  id (UUID)      │   │  code (UNIQUE)  │   │  order_number       │   │
//! │  │  price_cents    │   │  discount_type  │   │  status             │   │
//! │  │  stock_quantity │   │  used_count     │   │  payment_status     │   │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │  OrderLineItem  │   │    Invoice      │   │ PaymentTransaction  │   │
//! │  │  (snapshot)     │   │  (independent   │   │  (one per order,    │   │
//! │  │                 │   │   aggregate)    │   │   state machine)    │   │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! `OrderLineItem` and `InvoiceItem` freeze the product name, unit price and
//! image at settlement time. Later catalog edits never rewrite history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// `stock_quantity` is authoritative and never negative. It is only mutated
/// through the inventory ledger's conditional decrement/increment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown on order line items.
    pub name: String,

    /// Authoritative price in cents. Client-submitted prices are ignored.
    pub price_cents: i64,

    /// Current stock level (>= 0).
    pub stock_quantity: i64,

    /// Whether product can be sold (soft delete / unlisted).
    pub is_active: bool,

    /// Primary product image URL.
    pub image: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether the requested quantity is currently in stock.
    ///
    /// This is the *validation-time* check. The authoritative check is the
    /// conditional decrement at reservation time, which can still fail if a
    /// concurrent settlement consumed the stock in between.
    #[inline]
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.stock_quantity >= quantity
    }
}

// =============================================================================
// Coupon
// =============================================================================

/// How a coupon's discount is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` is a whole percentage of the subtotal (10 = 10%).
    Percentage,
    /// `discount_value` is a fixed amount in cents.
    Fixed,
    /// Waives the delivery fee. Delivery fees are handled outside the
    /// settlement core, so this contributes zero to the order discount.
    FreeDelivery,
}

/// A discount coupon.
///
/// Invariants: `used_count <= usage_limit` when a limit is set, and
/// `valid_from < valid_until`. `code` is stored uppercase; lookups normalize
/// before querying.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Coupon {
    pub id: String,

    /// Unique, case-normalized (uppercase) code.
    pub code: String,

    pub discount_type: DiscountType,

    /// Percentage (whole percent) or fixed amount in cents, per `discount_type`.
    pub discount_value: i64,

    /// Minimum subtotal (cents) required to apply the coupon.
    pub min_order_cents: Option<i64>,

    /// Cap on the computed discount (cents), for percentage coupons.
    pub max_discount_cents: Option<i64>,

    /// Maximum number of redemptions; None = unlimited.
    pub usage_limit: Option<i64>,

    /// Redemptions so far. Only mutated via the coupon ledger's
    /// conditional increment.
    pub used_count: i64,

    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Checks whether the usage limit has been reached.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        matches!(self.usage_limit, Some(limit) if self.used_count >= limit)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A client-submitted cart line. **Not trusted for price.**
///
/// The optional `unit_price_cents` is whatever the storefront displayed when
/// the buyer added the item; it is carried for diagnostics only and ignored
/// by pricing. The committed line item always uses the product's
/// authoritative price at settlement time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    /// Optional image override for the line item snapshot.
    pub image: Option<String>,
    /// Display-time price from the client. Ignored by the settlement core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price_cents: Option<i64>,
}

/// A persisted cart row (one per user/product pair).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartItem {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Customer
// =============================================================================

/// Buyer contact details captured on the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub email: String,
}

// =============================================================================
// Order
// =============================================================================

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Settled and awaiting fulfilment/payment confirmation.
    Processing,
    /// Payment confirmed by the gateway.
    Confirmed,
    /// Cancelled by admin action (out of core scope).
    Cancelled,
}

/// Payment state as recorded on the order/invoice.
///
/// Note: gateway orders start as `AwaitingPayment`, not `Paid`. The order is
/// only marked paid once the payment state machine confirms completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Cash on delivery: payment collected at the door.
    Pending,
    /// Gateway payment initialized but not yet confirmed.
    AwaitingPayment,
    /// Payment confirmed.
    Paid,
}

/// How the buyer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Gateway,
}

impl PaymentStatus {
    /// Initial payment status for a freshly settled order.
    pub fn initial_for(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::CashOnDelivery => PaymentStatus::Pending,
            PaymentMethod::Gateway => PaymentStatus::AwaitingPayment,
        }
    }
}

/// A settled order.
///
/// `customer_info` and `shipping_address` are JSON documents, frozen as
/// submitted. Line items live in their own table (see [`OrderLineItem`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub user_id: String,
    /// Human-readable, unique (timestamp + random suffix).
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub discount_code: Option<String>,
    /// JSON-encoded [`CustomerInfo`].
    pub customer_info: String,
    /// JSON-encoded shipping address, opaque to the core.
    pub shipping_address: String,
    /// Equals `order_number` at creation time.
    pub invoice_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the order total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Decodes the frozen customer info snapshot.
    pub fn customer(&self) -> serde_json::Result<CustomerInfo> {
        serde_json::from_str(&self.customer_info)
    }
}

/// A line item in an order.
/// Uses the snapshot pattern to freeze product data at settlement time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLineItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product name at settlement time (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at settlement time (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub image: Option<String>,
    /// unit_price × quantity.
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderLineItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// An invoice, created atomically with its order.
///
/// Invoice and Order are independent aggregates correlated by id: admin
/// edits to one never implicitly rewrite the other, which is why payment
/// reconciliation updates both explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: String,
    /// Equals the order number at creation.
    pub invoice_number: String,
    /// Weak back-reference for lookups; no ownership.
    pub order_id: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub discount_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item copied onto an invoice at settlement time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub image: Option<String>,
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment Transaction
// =============================================================================

/// Lifecycle status of a payment transaction.
///
/// Transitions are governed exclusively by [`crate::payment::apply`];
/// nothing else may assign this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    /// Terminal states do not transition further.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
    }
}

/// A payment transaction against the external gateway. One per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentTransaction {
    pub id: String,
    /// Unique: at most one transaction per order.
    pub order_id: String,
    /// Assigned by the gateway at checkout creation.
    pub transaction_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: TransactionStatus,
    /// Gateway checkout URL, stored so idempotent re-entry can return it
    /// without a second gateway call.
    pub checkout_url: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub webhook_url: String,
    pub verified_at: Option<DateTime<Utc>>,
    /// Opaque JSON captured from the last gateway callback.
    pub callback_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Webhook Log
// =============================================================================

/// An append-only record of a received gateway webhook.
///
/// Every payload is durably logged before any processing, and a processing
/// failure is recorded on the row rather than failing the acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WebhookLog {
    pub id: String,
    pub transaction_id: Option<String>,
    /// Raw payload exactly as received.
    pub payload: String,
    pub processing_error: Option<String>,
    pub received_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
