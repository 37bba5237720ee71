//! # orderly-gateway: Payment Gateway Integration
//!
//! Drives the hosted-checkout payment flow for settled orders and feeds
//! every observed outcome through the payment state machine.
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Gateway Payment Flow                              │
//! │                                                                         │
//! │  Settled order (awaiting_payment)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  create_payment ──► POST /checkout ──► checkout_url for the buyer      │
//! │       │                                                                 │
//! │       │   buyer pays on the gateway's hosted page                       │
//! │       ▼                                                                 │
//! │  ┌───────────────┐      ┌────────────────┐     ┌───────────────────┐  │
//! │  │ webhook (push)│      │ verify (pull)  │     │ redirect handlers │  │
//! │  └───────┬───────┘      └───────┬────────┘     └─────────┬─────────┘  │
//! │          └──────────────────────┼────────────────────────┘            │
//! │                                 ▼                                      │
//! │              payment state machine (orderly-core)                      │
//! │                                 │                                      │
//! │               Completed ──► order confirmed + paid                     │
//! │                                                                         │
//! │  All three channels converge on the same transition table, so          │
//! │  duplicates and out-of-order delivery are harmless.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Gateway endpoint, credentials, callback URLs
//! - [`client`] - HTTP client for the gateway API
//! - [`webhook`] - HMAC-SHA256 signature verification
//! - [`service`] - Orchestration: checkout, verify, webhook intake
//! - [`error`] - Gateway error types

pub mod client;
pub mod config;
pub mod error;
pub mod service;
pub mod webhook;

pub use client::{CheckoutSession, PaymentGatewayClient, VerifyOutcome};
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use service::{PaymentService, WebhookAck};
