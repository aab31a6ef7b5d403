//! # Repository Module
//!
//! Database repository implementations for Flashmart.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.orders().place_order(&customer, &address, now)             │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── one write transaction                                             │
//! │  ├── calls InventoryLedger::decrement_in(&mut tx, ..)                  │
//! │  ├── calls cart::clear_in(&mut tx, ..)                                 │
//! │  ├── calls notification::insert_in(&mut tx, ..)                        │
//! │  └── calls outbox::enqueue_in(&mut tx, ..)                             │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories own a pool clone. Steps that must join a caller's
//! transaction are exposed as `*_in` functions taking `&mut SqliteConnection`.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog CRUD, search and flash sales
//! - [`inventory::InventoryLedger`] - Stock reads and guarded decrements
//! - [`cart::CartRepository`] - Per-user carts
//! - [`order::OrderRepository`] - Checkout transaction and status lifecycle
//! - [`notification::NotificationRepository`] - In-app notifications
//! - [`outbox::MailOutboxRepository`] - Pending email queue
//! - [`report::ReportRepository`] - Admin analytics

pub mod cart;
pub mod inventory;
pub mod notification;
pub mod order;
pub mod outbox;
pub mod product;
pub mod report;

use chrono::{DateTime, Utc};

/// Shared test fixtures.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;
    use flashmart_core::{Category, Customer, Money, Product, ShippingAddress};

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn seed_product(db: &Database, name: &str, price: i64, stock: i64) -> Product {
        let product = Product::new(name, Category::Food, Money::from_cents(price), stock, now())
            .with_description(format!("{} description", name));
        db.products().insert(&product).await.unwrap()
    }

    pub fn customer(id: &str) -> Customer {
        Customer::new(id, format!("{}@example.com", id), format!("Shopper {}", id))
    }

    pub fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Asha Rao".into(),
            phone: "9800000000".into(),
            street: "12 MG Road".into(),
            city: "Bengaluru".into(),
            state: "KA".into(),
            pincode: "560001".into(),
        }
    }
}

/// Helper to generate a new row ID.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Year used for order numbering.
pub(crate) fn order_year(now: DateTime<Utc>) -> i32 {
    use chrono::Datelike;
    now.year()
}
