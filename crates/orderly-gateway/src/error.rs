//! # Gateway Error Types
//!
//! Failures in the payment flow. A failed gateway call never unwinds a
//! committed settlement: the order stays `awaiting_payment` and the flow
//! can be retried or abandoned.

use thiserror::Error;

use orderly_core::payment::TransitionError;
use orderly_db::DbError;

/// Payment gateway operation errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway could not be reached (DNS, connect, timeout).
    #[error("Payment gateway unreachable: {0}")]
    Unreachable(String),

    /// The gateway answered with a non-success HTTP status.
    #[error("Payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The gateway answered 2xx but the body was not what we expect.
    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),

    /// Webhook signature did not match the shared secret.
    #[error("Webhook signature verification failed")]
    InvalidSignature,

    /// No order with this ID, or the order does not take gateway payment.
    #[error("No payable order: {0}")]
    OrderNotPayable(String),

    /// No payment transaction matches the given gateway transaction ID.
    #[error("Unknown payment transaction: {0}")]
    TransactionNotFound(String),

    /// The reported outcome is illegal from the transaction's current
    /// status (e.g. COMPLETED after failed). Surfaced, never overwritten.
    #[error(transparent)]
    State(#[from] TransitionError),

    /// Database failure while recording the payment state.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
