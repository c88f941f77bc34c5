//! # Cart
//!
//! The in-progress sale: a list of product lines pending checkout.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Caller Action            Cart Change                                   │
//! │  ─────────────            ───────────                                   │
//! │  Scan/click product ────► add_line(product, qty)   (merge or push)      │
//! │  Change quantity ───────► update_quantity(id, n)   (n <= 0 removes)     │
//! │  Remove line ───────────► remove_line(id)                               │
//! │  Cancel sale ───────────► clear()                                       │
//! │  Checkout ──────────────► snapshot read by the checkout engine          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices and names are frozen into the line at add time (snapshot
//! pattern); a later product edit does not change what the cashier quoted.
//! Stock is checked twice: here against the product snapshot, and
//! authoritatively inside the checkout transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Product;
use crate::validation;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// One product line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,

    /// SKU at time of adding (frozen).
    pub sku: String,

    /// Product name at time of adding (frozen).
    pub name: String,

    /// Unit price in minor units at time of adding (frozen).
    pub unit_price_cents: i64,

    pub quantity: i64,
}

impl CartLine {
    /// Creates a line from a product snapshot and quantity.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity,
        }
    }

    /// Line total: unit price × quantity.
    #[inline]
    pub fn total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The pending sale.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding the same product merges).
/// - Every line quantity is in `1..=MAX_LINE_QUANTITY`.
/// - At most MAX_CART_LINES lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,

    /// When the cart was created or last cleared.
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart {
            lines: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds a product to the cart, merging into an existing line.
    ///
    /// Fails with [`CoreError::InsufficientStock`] when the product's stock
    /// snapshot cannot cover the line's resulting quantity. This is the
    /// first of the two stock gates; the checkout transaction re-checks
    /// against authoritative stock.
    pub fn add_line(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validation::validate_quantity(quantity)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_LINE_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_LINE_QUANTITY,
                });
            }
            if !product.can_cover(new_qty) {
                return Err(CoreError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock_quantity,
                    requested: new_qty,
                });
            }
            line.quantity = new_qty;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_LINES {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_LINES,
            });
        }

        if !product.can_cover(quantity) {
            return Err(CoreError::InsufficientStock {
                name: product.name.clone(),
                available: product.stock_quantity,
                requested: quantity,
            });
        }

        self.lines.push(CartLine::from_product(product, quantity));
        Ok(())
    }

    /// Sets the quantity of a line; a quantity of zero or less removes it.
    pub fn update_quantity(&mut self, product_id: i64, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            return self.remove_line(product_id);
        }

        if quantity > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_LINE_QUANTITY,
            });
        }

        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::ProductNotInCart(product_id)),
        }
    }

    /// Removes a line by product id.
    pub fn remove_line(&mut self, product_id: i64) -> CoreResult<()> {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);

        if self.lines.len() == initial_len {
            Err(CoreError::ProductNotInCart(product_id))
        } else {
            Ok(())
        }
    }

    /// Clears all lines.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.created_at = Utc::now();
    }

    /// Number of distinct product lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Subtotal across all lines, in minor units.
    pub fn subtotal_cents(&self) -> i64 {
        self.lines.iter().map(|l| l.total_cents()).sum()
    }

    /// Checks if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for Cart {
    fn default() -> Self {
        Cart::new()
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Totals summary handed to the display layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartTotals {
    pub line_count: usize,
    pub total_quantity: i64,
    pub subtotal_cents: i64,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            line_count: cart.line_count(),
            total_quantity: cart.total_quantity(),
            subtotal_cents: cart.subtotal_cents(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_product(id: i64, price_cents: i64, stock: i64) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            sku: format!("SKU-{}", id),
            barcode: None,
            category: None,
            supplier_id: None,
            price_cents,
            cost_price_cents: None,
            stock_quantity: stock,
            low_stock_threshold: 5,
            expiry_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_line() {
        let mut cart = Cart::new();
        let product = test_product(1, 999, 10);

        cart.add_line(&product, 2).unwrap();

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.total_quantity(), 2);
        assert_eq!(cart.subtotal_cents(), 1998);
    }

    #[test]
    fn test_add_same_product_merges() {
        let mut cart = Cart::new();
        let product = test_product(1, 999, 10);

        cart.add_line(&product, 2).unwrap();
        cart.add_line(&product, 3).unwrap();

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_add_rejects_insufficient_stock() {
        let mut cart = Cart::new();
        let product = test_product(1, 999, 3);

        let err = cart.add_line(&product, 5).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 3,
                requested: 5,
                ..
            }
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_merge_rejects_insufficient_stock_on_combined_quantity() {
        let mut cart = Cart::new();
        let product = test_product(1, 999, 4);

        cart.add_line(&product, 3).unwrap();
        // 3 already in cart; 2 more would need 5 against stock of 4
        let err = cart.add_line(&product, 2).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));
        assert_eq!(cart.total_quantity(), 3);
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = Cart::new();
        let product = test_product(1, 999, 10);

        cart.add_line(&product, 2).unwrap();
        cart.update_quantity(1, 0).unwrap();

        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_unknown_product() {
        let mut cart = Cart::new();
        let err = cart.update_quantity(99, 1).unwrap_err();
        assert!(matches!(err, CoreError::ProductNotInCart(99)));
    }

    #[test]
    fn test_price_frozen_at_add_time() {
        let mut cart = Cart::new();
        let mut product = test_product(1, 1000, 10);

        cart.add_line(&product, 1).unwrap();
        product.price_cents = 9999;

        assert_eq!(cart.lines[0].unit_price_cents, 1000);
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new();
        let product = test_product(1, 999, 10);

        cart.add_line(&product, 2).unwrap();
        cart.clear();

        assert!(cart.is_empty());
        assert_eq!(cart.subtotal_cents(), 0);
    }
}
