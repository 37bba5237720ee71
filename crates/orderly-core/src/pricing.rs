//! # Pricing Module
//!
//! Recomputes order pricing from authoritative product records, ignoring
//! anything the client said about prices.
//!
//! ## Why Server-Side Pricing?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE TAMPERED-PRICE PROBLEM                                             │
//! │                                                                         │
//! │  Client submits: { productId: "A", quantity: 3, unitPrice: 1¢ }        │
//! │                                                                         │
//! │  A naive core sums the client's numbers and sells $300 of goods        │
//! │  for 3 cents. This core NEVER reads the client's price: every line     │
//! │  is repriced from the product record inside the settlement             │
//! │  transaction, so stale caches and forged requests are both harmless.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module is a pure read: the caller (the settlement coordinator)
//! fetches the product rows inside the transaction scope and passes them in.

use std::collections::HashMap;

use crate::error::{SettlementError, SettlementResult};
use crate::money::Money;
use crate::types::{CartLine, Product};

// =============================================================================
// Priced Cart
// =============================================================================

/// A cart line after authoritative pricing.
///
/// This is the in-memory precursor of an `OrderLineItem` snapshot: name,
/// price and image are frozen here and never re-read from the catalog.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub image: Option<String>,
    pub line_total_cents: i64,
}

/// The validated, repriced cart.
#[derive(Debug, Clone)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
}

// =============================================================================
// Pricing
// =============================================================================

/// Validates and prices a submitted cart against authoritative products.
///
/// For each requested line:
/// - `ProductNotFound` if the product id is absent from `products`
/// - `ProductInactive` if the product is not currently sold
/// - `InsufficientStock` if stock < requested quantity (validation-time
///   check; the conditional decrement at reservation remains authoritative)
///
/// The unit price always comes from the product record. A client-supplied
/// `unit_price_cents` on the cart line is ignored. The line image prefers
/// the client's override (a variant the buyer picked) over the catalog image.
///
/// No side effects; pure function over pre-fetched rows.
pub fn price_cart(
    products: &HashMap<String, Product>,
    requested: &[CartLine],
) -> SettlementResult<PricedCart> {
    let mut lines = Vec::with_capacity(requested.len());
    let mut subtotal = Money::zero();

    for line in requested {
        let product = products
            .get(&line.product_id)
            .ok_or_else(|| SettlementError::ProductNotFound(line.product_id.clone()))?;

        if !product.is_active {
            return Err(SettlementError::ProductInactive {
                name: product.name.clone(),
            });
        }

        if !product.can_fulfill(line.quantity) {
            return Err(SettlementError::InsufficientStock {
                name: product.name.clone(),
                available: product.stock_quantity,
                requested: line.quantity,
            });
        }

        let line_total = product.price().multiply_quantity(line.quantity);
        subtotal += line_total;

        lines.push(PricedLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity: line.quantity,
            image: line.image.clone().or_else(|| product.image.clone()),
            line_total_cents: line_total.cents(),
        });
    }

    Ok(PricedCart { lines, subtotal })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: &str, name: &str, price_cents: i64, stock: i64, active: bool) -> Product {
        Product {
            id: id.to_string(),
            sku: format!("SKU-{id}"),
            name: name.to_string(),
            price_cents,
            stock_quantity: stock,
            is_active: active,
            image: Some(format!("/img/{id}.jpg")),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<String, Product> {
        products.into_iter().map(|p| (p.id.clone(), p)).collect()
    }

    fn line(product_id: &str, qty: i64) -> CartLine {
        CartLine {
            product_id: product_id.to_string(),
            quantity: qty,
            image: None,
            unit_price_cents: None,
        }
    }

    #[test]
    fn test_prices_from_catalog_and_sums_subtotal() {
        let products = catalog(vec![
            product("a", "Widget", 10_000, 5, true),
            product("b", "Gadget", 2_500, 9, true),
        ]);

        let cart = price_cart(&products, &[line("a", 3), line("b", 2)]).unwrap();

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0].line_total_cents, 30_000);
        assert_eq!(cart.lines[1].line_total_cents, 5_000);
        assert_eq!(cart.subtotal.cents(), 35_000);
    }

    #[test]
    fn test_client_price_is_ignored() {
        let products = catalog(vec![product("a", "Widget", 10_000, 5, true)]);

        // Forged request: client claims the widget costs 1 cent
        let forged = CartLine {
            product_id: "a".to_string(),
            quantity: 3,
            image: None,
            unit_price_cents: Some(1),
        };

        let cart = price_cart(&products, &[forged]).unwrap();
        assert_eq!(cart.lines[0].unit_price_cents, 10_000);
        assert_eq!(cart.subtotal.cents(), 30_000);
    }

    #[test]
    fn test_missing_product() {
        let products = catalog(vec![]);
        let err = price_cart(&products, &[line("ghost", 1)]).unwrap_err();
        assert!(matches!(err, SettlementError::ProductNotFound(id) if id == "ghost"));
    }

    #[test]
    fn test_inactive_product() {
        let products = catalog(vec![product("a", "Retired", 1_000, 5, false)]);
        let err = price_cart(&products, &[line("a", 1)]).unwrap_err();
        assert!(matches!(err, SettlementError::ProductInactive { name } if name == "Retired"));
    }

    #[test]
    fn test_insufficient_stock_names_the_product() {
        let products = catalog(vec![product("b", "Scarce", 1_000, 2, true)]);
        let err = price_cart(&products, &[line("b", 3)]).unwrap_err();

        match err {
            SettlementError::InsufficientStock {
                name,
                available,
                requested,
            } => {
                assert_eq!(name, "Scarce");
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_image_override_wins() {
        let products = catalog(vec![product("a", "Widget", 1_000, 5, true)]);

        let with_override = CartLine {
            product_id: "a".to_string(),
            quantity: 1,
            image: Some("/img/custom.jpg".to_string()),
            unit_price_cents: None,
        };

        let cart = price_cart(&products, &[with_override, line("a", 1)]).unwrap();
        assert_eq!(cart.lines[0].image.as_deref(), Some("/img/custom.jpg"));
        assert_eq!(cart.lines[1].image.as_deref(), Some("/img/a.jpg"));
    }
}
