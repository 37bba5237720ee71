//! # Error Types
//!
//! The settlement error taxonomy.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  orderly-core errors (this file)                                       │
//! │  ├── SettlementError  - Why a settlement was rejected or aborted       │
//! │  └── ValidationError  - Malformed request fields                       │
//! │                                                                         │
//! │  orderly-db errors                                                     │
//! │  └── DbError          - Storage failures (mapped into                  │
//! │                         SettlementError::Persistence by the            │
//! │                         coordinator)                                   │
//! │                                                                         │
//! │  orderly-gateway errors                                                │
//! │  └── GatewayError     - Payment gateway failures (never abort an       │
//! │                         already-committed order)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Every rejection names the offending product/coupon/field
//! 3. Errors are enum variants, never String
//! 4. Race losses are retryable; the caller may simply resubmit

use thiserror::Error;

// =============================================================================
// Settlement Error
// =============================================================================

/// Why a settlement attempt was rejected or aborted.
///
/// A settlement either commits completely or returns exactly one of these
/// with no partial writes observable.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The submitted cart has no items.
    #[error("Cannot settle an empty cart")]
    EmptyCart,

    /// A required customer contact field is missing.
    #[error("Missing customer info: {field}")]
    MissingCustomerInfo { field: &'static str },

    /// Product referenced by the cart does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product exists but is not currently sold.
    #[error("Product is not available: {name}")]
    ProductInactive { name: String },

    /// Requested quantity exceeds current stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart requests 5 × COKE-330
    ///      │
    ///      ▼
    /// Validation reads stock: 3
    ///      │
    ///      ▼
    /// InsufficientStock { name: "Coca-Cola 330ml", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Storefront shows: "Only 3 of Coca-Cola 330ml in stock"
    /// ```
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        name: String,
        available: i64,
        requested: i64,
    },

    /// Coupon code does not exist (or is inactive, which is reported
    /// identically so codes cannot be probed).
    #[error("Coupon not found: {0}")]
    CouponNotFound(String),

    /// Coupon validity window has not opened yet.
    #[error("Coupon {code} is not valid yet")]
    CouponNotYetValid { code: String },

    /// Coupon validity window has closed.
    #[error("Coupon {code} has expired")]
    CouponExpired { code: String },

    /// Coupon usage limit has been reached.
    #[error("Coupon {code} has reached its usage limit")]
    CouponExhausted { code: String },

    /// Order subtotal is below the coupon's minimum.
    #[error("Coupon {code} requires a minimum order of {minimum_cents} cents (subtotal {subtotal_cents})")]
    MinimumOrderNotMet {
        code: String,
        minimum_cents: i64,
        subtotal_cents: i64,
    },

    /// A concurrent settlement consumed the remaining stock between
    /// validation and reservation. The whole transaction was rolled back;
    /// retrying is safe.
    #[error("Stock for {name} was taken by a concurrent order, please retry")]
    StockRaceLost { name: String },

    /// A concurrent settlement consumed the coupon's last use between
    /// validation and consumption. The whole transaction was rolled back.
    #[error("Coupon {code} was exhausted by a concurrent order")]
    CouponRaceLost { code: String },

    /// Request-level validation failure.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The underlying store failed or the transaction could not commit.
    /// No partial state is observable; the caller may resubmit.
    #[error("Settlement could not be committed: {0}")]
    Persistence(String),
}

impl SettlementError {
    /// Whether the caller can safely retry the identical request.
    ///
    /// Race losses and persistence failures leave no partial state behind,
    /// so resubmitting is always safe. Validation-class errors will fail
    /// the same way again until the request changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SettlementError::StockRaceLost { .. }
                | SettlementError::CouponRaceLost { .. }
                | SettlementError::Persistence(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur before any business logic runs, and never cause writes.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for settlement results.
pub type SettlementResult<T> = Result<T, SettlementError>;

// =============================================================================
// Unit Tests
// =============================================================================
