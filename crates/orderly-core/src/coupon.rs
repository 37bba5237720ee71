//! # Coupon Evaluation
//!
//! Validates a coupon against its time window, usage limit and minimum
//! order amount, and computes the discount.
//!
//! ## Evaluation vs Consumption
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Coupon Lifecycle In A Settlement                      │
//! │                                                                         │
//! │  1. EVALUATE (this module, pure)                                       │
//! │     └── window open? limit not reached? minimum met? → discount        │
//! │                                                                         │
//! │  2. CONSUME (coupon ledger, inside the settlement transaction)         │
//! │     └── conditional increment of used_count, guarded by usage_limit    │
//! │                                                                         │
//! │  Consumption is deferred so a settlement that aborts for ANY reason    │
//! │  never burns a coupon use.                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::{SettlementError, SettlementResult};
use crate::money::Money;
use crate::types::{Coupon, DiscountType};

// =============================================================================
// Discount
// =============================================================================

/// The outcome of coupon evaluation: a discount amount plus the coupon's
/// identity, so the coordinator can consume a use at commit time.
#[derive(Debug, Clone)]
pub struct Discount {
    pub amount: Money,
    /// Id of the coupon to consume, None when no code was supplied.
    pub coupon_id: Option<String>,
    /// Normalized code, recorded on the order/invoice.
    pub code: Option<String>,
}

impl Discount {
    /// Zero discount; used when the settlement carries no coupon code.
    pub fn none() -> Self {
        Discount {
            amount: Money::zero(),
            coupon_id: None,
            code: None,
        }
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Evaluates a looked-up coupon against the computed subtotal.
///
/// The caller resolves the normalized code to a `Coupon` row first; an
/// absent row is `CouponNotFound`, and so is an inactive one (reported
/// identically so codes cannot be probed).
///
/// ## Checks (in order)
/// 1. `is_active` - inactive reports as not found
/// 2. `valid_from <= now <= valid_until`
/// 3. usage limit not yet reached
/// 4. subtotal >= minimum order amount (when set)
///
/// ## Discount math
/// - percentage: `round(subtotal × value / 100)`, clamped to
///   `max_discount_cents` when set
/// - fixed: `discount_value` cents
/// - free_delivery: 0 (delivery fees are settled outside this core)
///
/// No mutation: consumption happens later, inside the atomic phase.
pub fn evaluate(coupon: &Coupon, now: DateTime<Utc>, subtotal: Money) -> SettlementResult<Discount> {
    if !coupon.is_active {
        return Err(SettlementError::CouponNotFound(coupon.code.clone()));
    }

    if now < coupon.valid_from {
        return Err(SettlementError::CouponNotYetValid {
            code: coupon.code.clone(),
        });
    }

    if now > coupon.valid_until {
        return Err(SettlementError::CouponExpired {
            code: coupon.code.clone(),
        });
    }

    if coupon.is_exhausted() {
        return Err(SettlementError::CouponExhausted {
            code: coupon.code.clone(),
        });
    }

    if let Some(minimum) = coupon.min_order_cents {
        if subtotal.cents() < minimum {
            return Err(SettlementError::MinimumOrderNotMet {
                code: coupon.code.clone(),
                minimum_cents: minimum,
                subtotal_cents: subtotal.cents(),
            });
        }
    }

    let amount = match coupon.discount_type {
        DiscountType::Percentage => {
            let raw = subtotal.percentage(coupon.discount_value);
            match coupon.max_discount_cents {
                Some(cap) => raw.min(Money::from_cents(cap)),
                None => raw,
            }
        }
        DiscountType::Fixed => Money::from_cents(coupon.discount_value),
        DiscountType::FreeDelivery => Money::zero(),
    };

    Ok(Discount {
        amount,
        coupon_id: Some(coupon.id.clone()),
        code: Some(coupon.code.clone()),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
