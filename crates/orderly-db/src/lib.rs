//! # orderly-db: Database Layer for Orderly
//!
//! This crate provides SQLite persistence for the settlement engine and
//! owns the one place where a settlement becomes durable: the multi-table
//! transaction in [`settlement`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Orderly Data Flow                                │
//! │                                                                         │
//! │  Settlement request                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     orderly-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐  │   │
//! │  │   │   Database    │   │  Repositories  │   │  Migrations   │  │   │
//! │  │   │   (pool.rs)   │   │  product       │   │  (embedded)   │  │   │
//! │  │   │               │   │  coupon        │   │               │  │   │
//! │  │   │ SqlitePool    │◄──│  cart/order    │   │ 001_init.sql  │  │   │
//! │  │   │ WAL mode      │   │  payment       │   │               │  │   │
//! │  │   └───────────────┘   └────────────────┘   └───────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────────────────────────────────────────────────────┐  │   │
//! │  │   │ settlement.rs - ONE transaction: price → discount →     │  │   │
//! │  │   │ order+invoice → reserve stock → consume coupon →        │  │   │
//! │  │   │ clear cart → commit                                     │  │   │
//! │  │   └─────────────────────────────────────────────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Ledger and aggregate repositories
//! - [`settlement`] - The order settlement coordinator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orderly_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/orderly.db")).await?;
//! let settled = db.settlement().settle(request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod settlement;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::DbError;
pub use pool::{Database, DbConfig};
pub use settlement::{SettledOrder, SettlementCoordinator, SettlementRequest};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::coupon::CouponRepository;
pub use repository::order::OrderRepository;
pub use repository::payment::PaymentRepository;
pub use repository::product::ProductRepository;
