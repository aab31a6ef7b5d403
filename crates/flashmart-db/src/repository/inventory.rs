//! # Inventory Ledger
//!
//! The authoritative stock count per product.
//!
//! ## Guarded Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: read, compare in Rust, write back                           │
//! │     SELECT stock ...; if stock >= n { UPDATE ... SET stock = 7 }       │
//! │     Two checkouts both read 1, both write 0, two units sold.           │
//! │                                                                         │
//! │  ✅ CORRECT: one conditional statement                                 │
//! │     UPDATE products SET stock = stock - ?n                             │
//! │     WHERE id = ?id AND stock >= ?n                                     │
//! │     RETURNING stock                                                    │
//! │                                                                         │
//! │  No row back → nothing changed. Look up the product once more only     │
//! │  to tell "missing" apart from "not enough".                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `CHECK (stock >= 0)` constraint on the table backs this up.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use flashmart_core::CoreError;

/// Stock reads and guarded decrements.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
}

impl InventoryLedger {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLedger { pool }
    }

    /// Current stock of an active product, or `None` when it is not listed.
    pub async fn stock_of(&self, product_id: &str) -> DbResult<Option<i64>> {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1 AND is_active = 1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(stock)
    }

    /// Whether `quantity` units are on hand right now.
    ///
    /// Advisory only: the answer can be stale by the time the caller acts.
    /// Checkout relies on [`decrement`](Self::decrement) instead.
    pub async fn check_availability(&self, product_id: &str, quantity: i64) -> DbResult<bool> {
        let stock = self
            .stock_of(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        Ok(stock >= quantity)
    }

    /// Atomically removes `quantity` units. Returns the remaining stock.
    pub async fn decrement(
        &self,
        product_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        decrement_in(&mut conn, product_id, quantity, now).await
    }
}

/// Guarded decrement on a caller-owned connection or transaction.
///
/// ## Errors
/// * `CoreError::ProductNotFound` - no such product, or it was delisted
/// * `CoreError::InsufficientStock` - fewer than `quantity` units on hand
pub(crate) async fn decrement_in(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    debug!(product = %product_id, quantity, "Decrementing stock");

    let remaining: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET stock = stock - ?2, updated_at = ?3
        WHERE id = ?1 AND is_active = 1 AND stock >= ?2
        RETURNING stock
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(remaining) = remaining {
        return Ok(remaining);
    }

    let current: Option<(String, i64)> =
        sqlx::query_as("SELECT name, stock FROM products WHERE id = ?1 AND is_active = 1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    let err = match current {
        None => CoreError::ProductNotFound(product_id.to_string()),
        Some((name, available)) => CoreError::InsufficientStock {
            product: name,
            available,
            requested: quantity,
        },
    };
    Err(DbError::Domain(err))
}

// =============================================================================
// Unit Tests
// =============================================================================
