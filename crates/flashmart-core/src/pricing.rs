//! # Pricing Resolver
//!
//! Decides what a shopper pays for a product *right now*.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  effective_price(product, now)                                          │
//! │                                                                         │
//! │    flash_sale.is_active? ──no──────────────────────► base_price         │
//! │           │ yes                                                         │
//! │           ▼                                                             │
//! │    end_time present AND now < end_time? ──no───────► base_price         │
//! │           │ yes                                                         │
//! │           ▼                                                             │
//! │       sale_price                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here caches: the catalog view and add-to-cart each resolve against
//! their own `now`, so a sale that ends between two calls is seen as ended by
//! the second one. At exactly `now == end_time` the sale is over.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Category, FlashSale, Product};

/// True while the promotion applies at `now`.
pub fn is_sale_live(sale: &FlashSale, now: DateTime<Utc>) -> bool {
    sale.is_active && sale.end_time.is_some_and(|end| now < end)
}

/// The unit price a buyer pays at `now`.
pub fn effective_price(product: &Product, now: DateTime<Utc>) -> Money {
    if is_sale_live(&product.flash_sale, now) {
        product.flash_sale.sale_price
    } else {
        product.base_price
    }
}

/// Whole seconds until the sale ends, or `None` when it is not live.
pub fn seconds_remaining(sale: &FlashSale, now: DateTime<Utc>) -> Option<i64> {
    match sale.end_time {
        Some(end) if is_sale_live(sale, now) => Some((end - now).num_seconds()),
        _ => None,
    }
}

// =============================================================================
// Priced View
// =============================================================================

/// Countdown metadata shown next to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FlashSaleView {
    pub is_active: bool,
    pub sale_price: Money,
    #[ts(as = "Option<String>")]
    pub end_time: Option<DateTime<Utc>>,
    /// Present only while the sale is live.
    pub seconds_remaining: Option<i64>,
}

/// A product as the catalog presents it at one instant.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedProduct {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub base_price: Money,
    pub stock: i64,
    pub effective_price: Money,
    pub on_sale: bool,
    pub flash_sale: FlashSaleView,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl PricedProduct {
    /// Resolves price and countdown for `product` at `now`.
    pub fn at(product: Product, now: DateTime<Utc>) -> Self {
        let effective_price = effective_price(&product, now);
        let sale = &product.flash_sale;
        let flash_sale = FlashSaleView {
            is_active: sale.is_active,
            sale_price: sale.sale_price,
            end_time: sale.end_time,
            seconds_remaining: seconds_remaining(sale, now),
        };

        Self {
            on_sale: is_sale_live(sale, now),
            effective_price,
            flash_sale,
            id: product.id,
            name: product.name,
            description: product.description,
            category: product.category,
            base_price: product.base_price,
            stock: product.stock,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
