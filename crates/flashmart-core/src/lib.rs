//! # flashmart-core: Pure Business Logic for the Flashmart Storefront
//!
//! Everything that decides *what* happens in the storefront lives here as
//! plain functions over plain data. The database crate decides *how* it is
//! stored; the API app decides *who* may ask for it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Flashmart Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    /api/products, /api/cart, /api/orders, /api/admin/...        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ flashmart-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │ pricing  │ │   cart   │ │  order   │ │ notification     │  │   │
//! │  │   │ resolver │ │   math   │ │ numbering│ │ expiry, events   │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • CLOCK IS INJECTED        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                flashmart-db (Database Layer)                    │   │
//! │  │      SQLite, inventory ledger, checkout transaction, outbox     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog and identity types (Product, FlashSale, Customer)
//! - [`pricing`] - Effective price resolution against a clock instant
//! - [`cart`] - Cart lines with frozen prices and totals
//! - [`order`] - Orders, statuses and human-readable order numbers
//! - [`notification`] - In-app notifications and their expiry
//! - [`event`] - Post-commit events that drive best-effort email
//! - [`clock`] - Injectable time source
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use flashmart_core::{pricing, Category, FlashSale, Money, Product};
//!
//! let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
//! let mut product = Product::new("Masala Chai", Category::Food, Money::from_cents(10000), 5, now);
//! product.flash_sale = FlashSale::live(Money::from_cents(5000), now + Duration::hours(1));
//!
//! assert_eq!(pricing::effective_price(&product, now).cents(), 5000);
//! assert_eq!(pricing::effective_price(&product, now + Duration::hours(1)).cents(), 10000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod clock;
pub mod error;
pub mod event;
pub mod money;
pub mod notification;
pub mod order;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use flashmart_core::Money` instead of
// `use flashmart_core::money::Money`

pub use cart::{Cart, CartLine, CartSummary, CartTotals, LineChange};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationError};
pub use event::OrderEvent;
pub use money::Money;
pub use notification::{Notification, NotificationKind};
pub use order::{Order, OrderItem, OrderNumber, OrderStatus, PaymentStatus, ShippingAddress};
pub use pricing::{FlashSaleView, PricedProduct};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in the cart.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest base or sale price an admin can set, in minor units (₹10 crore).
///
/// A full cart at this price stays far inside `i64`:
/// 10^10 × 999 × 100 lines ≈ 10^15.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000;

/// Products at or below this stock level show up in the admin low-stock view.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Notifications disappear this many days after they are created.
pub const NOTIFICATION_TTL_DAYS: i64 = 30;
