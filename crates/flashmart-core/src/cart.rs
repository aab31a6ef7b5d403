//! # Cart
//!
//! Pure cart rules. The database crate loads a [`Cart`], applies one of these
//! operations, and persists whatever line changed.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  POST /api/cart ─────────► add_item() ─────────► merge or push line    │
//! │                              │                                          │
//! │                              └─ price resolved NOW, frozen on the line  │
//! │                                                                         │
//! │  PUT /api/cart/:id ──────► update_quantity() ──► qty = n (n < 1: drop) │
//! │                                                                         │
//! │  DELETE /api/cart/:id ───► remove_item() ──────► drop line if present  │
//! │                                                                         │
//! │  POST /api/orders ───────► clear() ────────────► (inside checkout tx)  │
//! │                                                                         │
//! │  GET /api/cart ──────────► CartSummary::from() ─► frozen price × qty   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by product: adding a product already in the cart sums
//!   the quantities and keeps the price frozen by the first add
//! - Every line has quantity ≥ 1
//! - Totals never re-resolve prices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing;
use crate::types::Product;
use crate::validation::{validate_price_cents, validate_quantity};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// One product in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    /// Line identifier used by `PUT/DELETE /api/cart/:itemId`.
    pub id: String,

    pub product_id: String,

    /// Display name, refreshed from the catalog on every read.
    pub product_name: String,

    pub quantity: i64,

    /// Effective price when the product was first added. Never re-resolved.
    pub price_at_add: Money,

    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Freezes the effective price of `product` at `now`.
    pub fn from_product(product: &Product, quantity: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            price_at_add: pricing::effective_price(product, now),
            added_at: now,
        }
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.price_at_add.multiply_quantity(self.quantity)
    }
}

/// What [`Cart::update_quantity`] did to the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    Updated(CartLine),
    Removed(String),
}

// =============================================================================
// Cart
// =============================================================================

/// A user's cart. One per user, created lazily on first add.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub user_id: String,
    pub lines: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            lines: Vec::new(),
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, line_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    /// Adds `quantity` of `product`, or merges into the existing line.
    ///
    /// The resulting line quantity is checked against current stock, so a
    /// shopper can never hold more in one line than the ledger has on hand.
    /// Returns the line as it should now be persisted.
    pub fn add_item(
        &mut self,
        product: &Product,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> CoreResult<CartLine> {
        validate_quantity(quantity)?;
        validate_price_cents("price", pricing::effective_price(product, now).cents())?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let merged = line.quantity + quantity;
            if merged > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: merged,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            ensure_stock(product, merged)?;
            line.quantity = merged;
            self.updated_at = now;
            return Ok(line.clone());
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }
        ensure_stock(product, quantity)?;

        let line = CartLine::from_product(product, quantity, now);
        self.lines.push(line.clone());
        self.updated_at = now;
        Ok(line)
    }

    /// Sets a line's quantity; anything below 1 removes the line.
    ///
    /// `product` is the current catalog row for the line, used for the stock
    /// check. Fails with `CartItemNotFound` when the line is not in this cart.
    pub fn update_quantity(
        &mut self,
        line_id: &str,
        quantity: i64,
        product: &Product,
        now: DateTime<Utc>,
    ) -> CoreResult<LineChange> {
        let Some(idx) = self.lines.iter().position(|l| l.id == line_id) else {
            return Err(CoreError::CartItemNotFound(line_id.to_string()));
        };

        if quantity < 1 {
            let line = self.lines.remove(idx);
            self.updated_at = now;
            return Ok(LineChange::Removed(line.id));
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        ensure_stock(product, quantity)?;

        let line = &mut self.lines[idx];
        line.quantity = quantity;
        self.updated_at = now;
        Ok(LineChange::Updated(line.clone()))
    }

    /// Removes a line. Removing a line that is not there is not an error.
    ///
    /// Returns whether anything was removed.
    pub fn remove_item(&mut self, line_id: &str, now: DateTime<Utc>) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != line_id);
        let removed = self.lines.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }

    /// Empties the cart.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.updated_at = now;
    }

    /// Sum of frozen price × quantity.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

fn ensure_stock(product: &Product, requested: i64) -> CoreResult<()> {
    if product.has_stock(requested) {
        Ok(())
    } else {
        Err(CoreError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock,
            requested,
        })
    }
}

// =============================================================================
// Cart Summary
// =============================================================================

/// The cart as returned by `GET /api/cart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartSummary {
    pub items: Vec<CartLine>,
    pub total_amount: Money,
    pub item_count: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl From<&Cart> for CartSummary {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.lines.clone(),
            total_amount: cart.total(),
            item_count: cart.item_count(),
            updated_at: cart.updated_at,
        }
    }
}

/// Totals without the lines, for badges and checkout previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    pub line_count: usize,
    pub item_count: i64,
    pub total_amount: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        Self {
            line_count: cart.lines.len(),
            item_count: cart.item_count(),
            total_amount: cart.total(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, FlashSale};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn test_product(id: &str, price: i64, stock: i64) -> Product {
        let mut product = Product::new(
            format!("Product {}", id),
            Category::Home,
            Money::from_cents(price),
            stock,
            now(),
        );
        product.id = id.to_string();
        product
    }

    #[test]
    fn test_add_item_freezes_effective_price() {
        let mut product = test_product("p1", 10000, 10);
        product.flash_sale = FlashSale::live(Money::from_cents(6000), now() + Duration::hours(1));

        let mut cart = Cart::new("u1", now());
        let line = cart.add_item(&product, 2, now()).unwrap();
        assert_eq!(line.price_at_add.cents(), 6000);

        // Sale ends; the cart keeps the captured price
        product.flash_sale.is_active = false;
        assert_eq!(cart.total().cents(), 12000);
    }

    #[test]
    fn test_add_same_product_merges_quantities() {
        let product = test_product("p1", 500, 10);
        let mut cart = Cart::new("u1", now());

        let first = cart.add_item(&product, 2, now()).unwrap();
        let merged = cart.add_item(&product, 3, now()).unwrap();

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(merged.id, first.id);
        assert_eq!(merged.quantity, 5);
    }

    #[test]
    fn test_merge_keeps_first_frozen_price() {
        let mut product = test_product("p1", 1000, 10);
        let mut cart = Cart::new("u1", now());
        cart.add_item(&product, 1, now()).unwrap();

        product.flash_sale = FlashSale::live(Money::from_cents(100), now() + Duration::hours(1));
        let merged = cart.add_item(&product, 1, now()).unwrap();
        assert_eq!(merged.price_at_add.cents(), 1000);
    }

    #[test]
    fn test_add_rejects_quantity_over_stock() {
        let product = test_product("p1", 500, 3);
        let mut cart = Cart::new("u1", now());

        let err = cart.add_item(&product, 4, now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 3, requested: 4, .. }
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_merge_checks_combined_quantity_against_stock() {
        let product = test_product("p1", 500, 3);
        let mut cart = Cart::new("u1", now());
        cart.add_item(&product, 2, now()).unwrap();

        let err = cart.add_item(&product, 2, now()).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { requested: 4, .. }));
        assert_eq!(cart.lines[0].quantity, 2);
    }

    #[test]
    fn test_add_rejects_non_positive_quantity() {
        let product = test_product("p1", 500, 3);
        let mut cart = Cart::new("u1", now());
        assert!(matches!(
            cart.add_item(&product, 0, now()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_add_rejects_price_above_ceiling() {
        let product = test_product("p1", i64::MAX / 2, 10);

        let mut cart = Cart::new("u1", now());
        let err = cart.add_item(&product, 3, now()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(cart.is_empty());
        assert!(cart.total().is_zero());
    }

    #[test]
    fn test_total_at_price_ceiling_is_exact() {
        let product = test_product("p1", crate::MAX_PRICE_CENTS, MAX_ITEM_QUANTITY);

        let mut cart = Cart::new("u1", now());
        cart.add_item(&product, MAX_ITEM_QUANTITY, now()).unwrap();
        assert_eq!(
            cart.total().cents(),
            crate::MAX_PRICE_CENTS * MAX_ITEM_QUANTITY
        );
    }

    #[test]
    fn test_cart_size_limit() {
        let mut cart = Cart::new("u1", now());
        for i in 0..MAX_CART_ITEMS {
            cart.add_item(&test_product(&format!("p{}", i), 100, 5), 1, now())
                .unwrap();
        }
        let err = cart
            .add_item(&test_product("one-too-many", 100, 5), 1, now())
            .unwrap_err();
        assert!(matches!(err, CoreError::CartTooLarge { .. }));
    }

    #[test]
    fn test_update_quantity() {
        let product = test_product("p1", 500, 10);
        let mut cart = Cart::new("u1", now());
        let line = cart.add_item(&product, 1, now()).unwrap();

        let change = cart.update_quantity(&line.id, 4, &product, now()).unwrap();
        assert!(matches!(change, LineChange::Updated(ref l) if l.quantity == 4));
        assert_eq!(cart.total().cents(), 2000);
    }

    #[test]
    fn test_update_quantity_below_one_removes() {
        let product = test_product("p1", 500, 10);
        let mut cart = Cart::new("u1", now());
        let line = cart.add_item(&product, 1, now()).unwrap();

        let change = cart.update_quantity(&line.id, 0, &product, now()).unwrap();
        assert_eq!(change, LineChange::Removed(line.id));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_missing_line_is_not_found() {
        let product = test_product("p1", 500, 10);
        let mut cart = Cart::new("u1", now());
        let err = cart.update_quantity("nope", 2, &product, now()).unwrap_err();
        assert!(matches!(err, CoreError::CartItemNotFound(_)));
    }

    #[test]
    fn test_update_checks_stock() {
        let product = test_product("p1", 500, 2);
        let mut cart = Cart::new("u1", now());
        let line = cart.add_item(&product, 1, now()).unwrap();
        let err = cart.update_quantity(&line.id, 3, &product, now()).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));
    }

    #[test]
    fn test_remove_missing_line_is_noop() {
        let product = test_product("p1", 500, 10);
        let mut cart = Cart::new("u1", now());
        cart.add_item(&product, 1, now()).unwrap();

        assert!(!cart.remove_item("missing", now()));
        assert_eq!(cart.lines.len(), 1);
    }

    #[test]
    fn test_summary_is_stable_across_reads() {
        let mut cart = Cart::new("u1", now());
        cart.add_item(&test_product("p1", 250, 10), 2, now()).unwrap();
        cart.add_item(&test_product("p2", 100, 10), 3, now()).unwrap();

        let first = CartSummary::from(&cart);
        let second = CartSummary::from(&cart);
        assert_eq!(first, second);
        assert_eq!(first.total_amount.cents(), 800);
        assert_eq!(first.item_count, 5);

        let totals = CartTotals::from(&cart);
        assert_eq!(totals.line_count, 2);
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new("u1", now());
        cart.add_item(&test_product("p1", 250, 10), 2, now()).unwrap();
        cart.clear(now() + Duration::minutes(1));
        assert!(cart.is_empty());
        assert!(cart.total().is_zero());
        assert_eq!(cart.updated_at, now() + Duration::minutes(1));
    }
}
