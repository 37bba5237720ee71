//! # Validation Module
//!
//! Request-level validation for settlement input.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE - shape of the request                           │
//! │  ├── Non-empty cart, sane quantities                                   │
//! │  └── Required customer contact fields                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: pricing / coupon modules - business rules                    │
//! │  ├── Product exists, is active, has stock                              │
//! │  └── Coupon window, limits, minimum order                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database - CHECK / UNIQUE constraints, conditional updates   │
//! │                                                                         │
//! │  Defense in depth: the conditional stock decrement is the final word   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{SettlementError, ValidationError};
use crate::types::{CartLine, CustomerInfo};
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Quantity / Cart Validators
// =============================================================================

/// Validates a requested line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates the submitted cart lines.
///
/// ## Rules
/// - Cart must not be empty (`SettlementError::EmptyCart`)
/// - At most MAX_ORDER_ITEMS distinct lines
/// - Every line has a product id and a valid quantity
pub fn validate_cart(items: &[CartLine]) -> Result<(), SettlementError> {
    if items.is_empty() {
        return Err(SettlementError::EmptyCart);
    }

    if items.len() > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        }
        .into());
    }

    for line in items {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "productId".to_string(),
            }
            .into());
        }
        validate_quantity(line.quantity)?;
    }

    Ok(())
}

// =============================================================================
// Customer Validators
// =============================================================================

/// Validates customer contact fields.
///
/// All three contact fields are required before any write is attempted;
/// the email additionally gets a minimal shape check.
pub fn validate_customer(customer: &CustomerInfo) -> Result<(), SettlementError> {
    if customer.name.trim().is_empty() {
        return Err(SettlementError::MissingCustomerInfo { field: "name" });
    }
    if customer.phone.trim().is_empty() {
        return Err(SettlementError::MissingCustomerInfo { field: "phone" });
    }
    let email = customer.email.trim();
    if email.is_empty() {
        return Err(SettlementError::MissingCustomerInfo { field: "email" });
    }

    // Minimal shape check; full RFC validation is a storefront concern.
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like an email address".to_string(),
        }
        .into());
    }

    Ok(())
}

// =============================================================================
// Coupon Code Normalization
// =============================================================================

/// Normalizes a coupon code for lookup: trimmed and uppercased.
///
/// Returns None for blank input so `discountCode: ""` behaves like no code.
///
/// ## Example
/// ```rust
/// use orderly_core::validation::normalize_coupon_code;
///
/// assert_eq!(normalize_coupon_code(Some(" save10 ")), Some("SAVE10".to_string()));
/// assert_eq!(normalize_coupon_code(Some("   ")), None);
/// assert_eq!(normalize_coupon_code(None), None);
/// ```
pub fn normalize_coupon_code(code: Option<&str>) -> Option<String> {
    let code = code?.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_uppercase())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
