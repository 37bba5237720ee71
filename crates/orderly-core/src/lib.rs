//! # orderly-core: Pure Settlement Logic for Orderly
//!
//! This crate is the **heart** of the Orderly settlement engine. It contains
//! all correctness-critical business logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Orderly Settlement Flow                            │
//! │                                                                         │
//! │  Storefront (out of scope) submits a cart                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ orderly-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │  coupon   │  │   │
//! │  │   │  Product  │  │   Money   │  │ authorit. │  │  window / │  │   │
//! │  │   │  Order    │  │  (cents)  │  │  pricing  │  │  limits   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐                                 │   │
//! │  │   │ validation│  │  payment  │                                 │   │
//! │  │   │   rules   │  │ state m/c │                                 │   │
//! │  │   └───────────┘  └───────────┘                                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  orderly-db: runs the pure logic inside one SQLite transaction         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  orderly-gateway: reconciles payment status with the external gateway  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Coupon, Order, PaymentTransaction, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Settlement error taxonomy
//! - [`validation`] - Request-level validation
//! - [`pricing`] - Authoritative pricing of a submitted cart
//! - [`coupon`] - Coupon evaluation (window, limits, discount math)
//! - [`payment`] - Payment transaction state machine
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod coupon;
pub mod error;
pub mod money;
pub mod payment;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{SettlementError, SettlementResult, ValidationError};
pub use money::Money;
pub use payment::{PaymentEvent, Transition, TransitionError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of distinct line items in one settlement request.
///
/// ## Business Reason
/// Prevents runaway carts and keeps the settlement transaction bounded.
pub const MAX_ORDER_ITEMS: usize = 100;

/// Maximum quantity of a single item in one settlement request.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Default currency for payment transactions.
pub const DEFAULT_CURRENCY: &str = "USD";
