//! # Payment Settlement State Machine
//!
//! The single authoritative transition table for payment transactions.
//!
//! ## States and Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 PaymentTransaction Lifecycle                            │
//! │                                                                         │
//! │                 ┌──────────┐                                            │
//! │      create ──► │ pending  │                                            │
//! │                 └────┬─────┘                                            │
//! │         ┌───────────┼────────────┬─────────────┐                       │
//! │         ▼           ▼            ▼             ▼                       │
//! │  ┌────────────┐ ┌───────────┐ ┌─────────┐ ┌───────────┐               │
//! │  │ processing │ │ completed │ │ failed  │ │ cancelled │               │
//! │  └─────┬──────┘ └───────────┘ └─────────┘ └───────────┘               │
//! │        │ ▲           ▲            ▲                                    │
//! │        │ └stale──────┤            │         completed / failed /       │
//! │        └─────────────┴────────────┘         cancelled are TERMINAL     │
//! │                                                                         │
//! │  Replays of the same terminal event are no-ops (Unchanged).            │
//! │  Conflicting terminal events are rejected (Illegal), never silently    │
//! │  overwritten. Stale "processing" notifications after a terminal        │
//! │  state are tolerated as no-ops: the gateway delivers webhooks and      │
//! │  redirects concurrently and in any order.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call site (webhook handler, verify endpoint, redirect handlers)
//! goes through [`apply`]; none of them assign `TransactionStatus` directly.

use thiserror::Error;

use crate::types::TransactionStatus;

// =============================================================================
// Events
// =============================================================================

/// An observed payment outcome, from any source (webhook, verify call,
/// browser redirect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEvent {
    /// Gateway reports the payment succeeded.
    GatewayCompleted,
    /// Gateway reports the payment failed.
    GatewayFailed,
    /// Gateway reports the payment is still in flight.
    GatewayProcessing,
    /// Buyer abandoned checkout via the cancel redirect.
    Cancelled,
}

impl PaymentEvent {
    /// Maps a gateway status string to an event.
    ///
    /// `COMPLETED` → completed, `FAILED` → failed, anything else the
    /// gateway says is treated as still processing.
    pub fn from_gateway_status(status: &str) -> PaymentEvent {
        match status.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" => PaymentEvent::GatewayCompleted,
            "FAILED" => PaymentEvent::GatewayFailed,
            _ => PaymentEvent::GatewayProcessing,
        }
    }

    /// The status this event drives a live transaction towards.
    pub const fn target_status(&self) -> TransactionStatus {
        match self {
            PaymentEvent::GatewayCompleted => TransactionStatus::Completed,
            PaymentEvent::GatewayFailed => TransactionStatus::Failed,
            PaymentEvent::GatewayProcessing => TransactionStatus::Processing,
            PaymentEvent::Cancelled => TransactionStatus::Cancelled,
        }
    }
}

// =============================================================================
// Transition Outcome
// =============================================================================

/// The result of applying an event to a transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The transaction moves to a new status; callers must persist it and
    /// run the associated side effects (e.g., mark the order paid).
    Changed(TransactionStatus),
    /// Idempotent replay or stale notification; nothing to do.
    Unchanged,
}

/// An event that is not legal from the current status.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// E.g. a `COMPLETED` webhook for a transaction already `failed`.
    /// The conflict is surfaced instead of overwriting terminal state.
    #[error("Illegal payment transition: {from:?} cannot accept {event:?}")]
    Illegal {
        from: TransactionStatus,
        event: PaymentEvent,
    },
}

// =============================================================================
// Transition Table
// =============================================================================

/// Applies an event to the current status.
///
/// This is the only place transition legality is decided.
pub fn apply(
    current: TransactionStatus,
    event: PaymentEvent,
) -> Result<Transition, TransitionError> {
    use PaymentEvent::*;
    use TransactionStatus::*;

    let outcome = match (current, event) {
        // From pending, every event is legal.
        (Pending, _) => Transition::Changed(event.target_status()),

        // Processing can only resolve to a gateway-reported terminal state.
        (Processing, GatewayCompleted) => Transition::Changed(Completed),
        (Processing, GatewayFailed) => Transition::Changed(Failed),
        (Processing, GatewayProcessing) => Transition::Unchanged,
        (Processing, PaymentEvent::Cancelled) => {
            return Err(TransitionError::Illegal {
                from: current,
                event,
            })
        }

        // Terminal states: replaying the same outcome is a no-op, a stale
        // "processing" notification is a no-op, anything else is illegal.
        (Completed, GatewayCompleted) => Transition::Unchanged,
        (Failed, GatewayFailed) => Transition::Unchanged,
        (TransactionStatus::Cancelled, PaymentEvent::Cancelled) => Transition::Unchanged,
        (Completed | Failed | TransactionStatus::Cancelled, GatewayProcessing) => Transition::Unchanged,
        (Completed | Failed | TransactionStatus::Cancelled, _) => {
            return Err(TransitionError::Illegal {
                from: current,
                event,
            })
        }
    };

    Ok(outcome)
}

// =============================================================================
// Unit Tests
// =============================================================================
