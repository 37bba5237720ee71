//! # Repository Layer
//!
//! One repository per aggregate:
//!
//! - [`product`] - catalog rows + the inventory ledger's conditional
//!   decrement/increment
//! - [`coupon`] - coupon rows + the conditional use-consumption
//! - [`cart`] - per-user cart rows, cleared atomically by settlement
//! - [`order`] - orders, line-item snapshots, invoices
//! - [`payment`] - payment transactions and the webhook audit log
//!
//! ## Transaction Participation
//! Methods that must run inside the settlement transaction take a
//! `&mut SqliteConnection` so the caller controls the transaction scope.
//! Pool-based convenience methods exist for standalone reads and admin
//! writes. The two shared mutable counters (`products.stock_quantity`,
//! `coupons.used_count`) have NO unconditional write path anywhere in
//! this crate.

pub mod cart;
pub mod coupon;
pub mod order;
pub mod payment;
pub mod product;
