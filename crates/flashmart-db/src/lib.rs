//! # flashmart-db: Database Layer for Flashmart
//!
//! This crate provides database access for the Flashmart storefront.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Flashmart Data Flow                              │
//! │                                                                         │
//! │  HTTP handler (POST /api/orders)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   flashmart-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │    │ InventoryLedg │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │◄───│ CartRepo      │    │ 002_fts.sql  │  │   │
//! │  │   │ Management    │    │ OrderRepo     │    │              │  │   │
//! │  │   │               │    │ Notification  │    │              │  │   │
//! │  │   │               │    │ MailOutbox    │    │              │  │   │
//! │  │   │               │    │ ReportRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, cart, order, etc.)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use flashmart_db::{Database, DbConfig};
//!
//! // Create database (migrations run on connect)
//! let db = Database::new(DbConfig::new("path/to/flashmart.db")).await?;
//!
//! // Use repositories
//! let order = db.orders().place_order(&customer, &address, clock.now()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::inventory::InventoryLedger;
pub use repository::notification::NotificationRepository;
pub use repository::order::OrderRepository;
pub use repository::outbox::{MailOutboxEntry, MailOutboxRepository};
pub use repository::product::{ProductFilter, ProductPatch, ProductRepository};
pub use repository::report::{
    CategorySales, DailySales, LeaderboardEntry, ReportRepository, SalesSummary, TopProduct,
};
