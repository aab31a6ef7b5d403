//! # Domain Types
//!
//! Catalog and identity types used throughout Flashmart.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   FlashSale     │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  is_active      │   │  id (token sub) │       │
//! │  │  name           │   │  sale_price     │   │  email          │       │
//! │  │  category       │   │  end_time?      │   │  name           │       │
//! │  │  base_price     │   └─────────────────┘   └─────────────────┘       │
//! │  │  stock          │                                                    │
//! │  └─────────────────┘   ┌─────────────────┐                             │
//! │                        │    Category     │                             │
//! │                        │  Food / Home /  │                             │
//! │                        │  Beauty / Other │                             │
//! │                        └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Orders, carts and notifications have their own modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Category
// =============================================================================

/// Catalog category. Serialized with its display name (`"Food"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum Category {
    Food,
    Home,
    Beauty,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Food,
        Category::Home,
        Category::Beauty,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Home => "Home",
            Category::Beauty => "Beauty",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    /// Case-insensitive, so `?category=food` works from a query string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "category".to_string(),
                allowed: Category::ALL.iter().map(|c| c.to_string()).collect(),
            })
    }
}

// =============================================================================
// Flash Sale
// =============================================================================

/// Time-boxed promotional price override.
///
/// A sale only applies while `is_active` is set AND the clock is strictly
/// before `end_time`. Expiry is never written back; it is recomputed on every
/// read (see [`crate::pricing`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FlashSale {
    pub is_active: bool,

    /// Promotional price. Expected to undercut the base price but not enforced.
    pub sale_price: Money,

    /// End of the sale window. A missing end time means "not on sale".
    #[ts(as = "Option<String>")]
    pub end_time: Option<DateTime<Utc>>,
}

impl FlashSale {
    /// No promotion.
    pub fn inactive() -> Self {
        Self {
            is_active: false,
            sale_price: Money::zero(),
            end_time: None,
        }
    }

    /// An active promotion ending at `end_time`.
    pub fn live(sale_price: Money, end_time: DateTime<Utc>) -> Self {
        Self {
            is_active: true,
            sale_price,
            end_time: Some(end_time),
        }
    }
}

impl Default for FlashSale {
    fn default() -> Self {
        FlashSale::inactive()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// `stock` is owned by the inventory ledger: it only moves through guarded
/// decrements at checkout or explicit admin edits.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub name: String,

    pub description: String,

    pub category: Category,

    /// Price outside of any promotion.
    pub base_price: Money,

    /// Units on hand. Never negative.
    pub stock: i64,

    pub flash_sale: FlashSale,

    /// False once an admin deletes the product (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates an active product with no promotion.
    pub fn new(
        name: impl Into<String>,
        category: Category,
        base_price: Money,
        stock: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            category,
            base_price,
            stock,
            flash_sale: FlashSale::inactive(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Checks if the ledger currently holds `quantity` units.
    #[inline]
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

// =============================================================================
// Customer
// =============================================================================

/// The authenticated shopper, as asserted by the identity collaborator.
///
/// Captured onto each order so status-update emails can be addressed without
/// a user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl Customer {
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!("food".parse::<Category>().unwrap(), Category::Food);
        assert_eq!(" Beauty ".parse::<Category>().unwrap(), Category::Beauty);
        assert!("Electronics".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serializes_with_display_name() {
        let json = serde_json::to_string(&Category::Home).unwrap();
        assert_eq!(json, "\"Home\"");
    }

    #[test]
    fn test_product_json_is_camel_case() {
        let now = Utc::now();
        let product = Product::new("Chai", Category::Food, Money::from_cents(100), 3, now);
        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["basePrice"], 100);
        assert_eq!(value["flashSale"]["isActive"], false);
        assert!(value["flashSale"]["endTime"].is_null());
    }

    #[test]
    fn test_has_stock() {
        let product = Product::new("Chai", Category::Food, Money::from_cents(100), 2, Utc::now());
        assert!(product.has_stock(2));
        assert!(!product.has_stock(3));
    }
}
