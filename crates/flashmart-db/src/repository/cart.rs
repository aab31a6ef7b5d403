//! # Cart Repository
//!
//! Persists carts. The rules (merging, frozen prices, stock checks) live in
//! [`flashmart_core::Cart`]; this module loads a cart, applies one rule, and
//! writes back the line that changed.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    touch/create the carts row        ← first statement is a write,      │
//! │    load lines + product                so the lock is taken up front   │
//! │    Cart::add_item / update_quantity  ← pure, may reject                │
//! │    upsert or delete the one line                                       │
//! │  COMMIT  (any error above drops the transaction = rollback)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::generate_id;
use crate::repository::product::{ProductRow, PRODUCT_COLUMNS};
use flashmart_core::{Cart, CartLine, CoreError, LineChange, Money, Product};

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: String,
    product_id: String,
    product_name: String,
    quantity: i64,
    price_at_add: Money,
    added_at: DateTime<Utc>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        CartLine {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            price_at_add: row.price_at_add,
            added_at: row.added_at,
        }
    }
}

/// Repository for per-user carts.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// The user's cart. A user who never added anything gets an empty cart;
    /// nothing is written.
    pub async fn get_cart(&self, user_id: &str, now: DateTime<Utc>) -> DbResult<Cart> {
        let mut conn = self.pool.acquire().await?;
        let cart = load_cart_in(&mut conn, user_id).await?;
        Ok(cart.map(|(_, cart)| cart).unwrap_or_else(|| Cart::new(user_id, now)))
    }

    /// Adds a product at its effective price right now, merging into an
    /// existing line for the same product.
    ///
    /// ## Errors
    /// * `ProductNotFound` - unknown or delisted product
    /// * `InsufficientStock` - the resulting line quantity exceeds stock
    /// * `Validation` - quantity below 1 or above the per-line maximum
    pub async fn add_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<CartLine> {
        let mut tx = self.pool.begin().await?;

        let cart_id: String = sqlx::query_scalar(
            r#"
            INSERT INTO carts (id, user_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(generate_id())
        .bind(user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let product = product_in(&mut tx, product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let mut cart = Cart::new(user_id, now);
        cart.lines = load_lines_in(&mut tx, &cart_id).await?;

        let line = cart.add_item(&product, quantity, now)?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, price_at_add, added_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (id) DO UPDATE SET quantity = excluded.quantity
            "#,
        )
        .bind(&line.id)
        .bind(&cart_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.price_at_add)
        .bind(line.added_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            user = %user_id,
            product = %product_id,
            quantity = line.quantity,
            price = %line.price_at_add,
            "Cart line saved"
        );
        Ok(line)
    }

    /// Sets a line's quantity; below 1 removes the line.
    ///
    /// ## Errors
    /// * `CartItemNotFound` - the line is not in this user's cart
    /// * `InsufficientStock` - the new quantity exceeds stock
    pub async fn update_quantity(
        &self,
        user_id: &str,
        line_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<LineChange> {
        let mut tx = self.pool.begin().await?;

        let Some(cart_id) = touch_cart_in(&mut tx, user_id, now).await? else {
            return Err(CoreError::CartItemNotFound(line_id.to_string()).into());
        };

        let mut cart = Cart::new(user_id, now);
        cart.lines = load_lines_in(&mut tx, &cart_id).await?;

        let Some(line) = cart.line(line_id) else {
            return Err(CoreError::CartItemNotFound(line_id.to_string()).into());
        };
        let product_id = line.product_id.clone();

        let product = product_in(&mut tx, &product_id)
            .await?
            .filter(|p| p.is_active || quantity < 1)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;

        let change = cart.update_quantity(line_id, quantity, &product, now)?;

        match &change {
            LineChange::Updated(line) => {
                sqlx::query("UPDATE cart_items SET quantity = ?2 WHERE id = ?1")
                    .bind(&line.id)
                    .bind(line.quantity)
                    .execute(&mut *tx)
                    .await?;
            }
            LineChange::Removed(id) => {
                sqlx::query("DELETE FROM cart_items WHERE id = ?1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        debug!(user = %user_id, line = %line_id, quantity, "Cart line updated");
        Ok(change)
    }

    /// Removes a line. Returns whether anything was removed; removing a line
    /// that is not there succeeds and leaves the cart untouched.
    pub async fn remove_item(
        &self,
        user_id: &str,
        line_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let Some(cart_id) = touch_cart_in(&mut tx, user_id, now).await? else {
            return Ok(false);
        };

        let result = sqlx::query("DELETE FROM cart_items WHERE id = ?1 AND cart_id = ?2")
            .bind(line_id)
            .bind(&cart_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // Keep updated_at as it was
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;

        debug!(user = %user_id, line = %line_id, "Cart line removed");
        Ok(true)
    }

    /// Empties the cart. Returns how many lines were dropped.
    pub async fn clear(&self, user_id: &str, now: DateTime<Utc>) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = clear_in(&mut tx, user_id, now).await?;
        tx.commit().await?;
        Ok(removed)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Bumps `updated_at` and returns the cart id, or `None` if the user has no
/// cart yet.
async fn touch_cart_in(
    conn: &mut SqliteConnection,
    user_id: &str,
    now: DateTime<Utc>,
) -> DbResult<Option<String>> {
    let id: Option<String> =
        sqlx::query_scalar("UPDATE carts SET updated_at = ?2 WHERE user_id = ?1 RETURNING id")
            .bind(user_id)
            .bind(now)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(id)
}

async fn product_in(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Option<Product>> {
    let row: Option<ProductRow> = sqlx::query_as(&format!(
        "SELECT {} FROM products WHERE id = ?1",
        PRODUCT_COLUMNS
    ))
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Product::from))
}

/// Lines in insertion order, with names refreshed from the catalog.
async fn load_lines_in(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<Vec<CartLine>> {
    let rows: Vec<CartLineRow> = sqlx::query_as(
        r#"
        SELECT
            ci.id,
            ci.product_id,
            p.name AS product_name,
            ci.quantity,
            ci.price_at_add,
            ci.added_at
        FROM cart_items ci
        INNER JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = ?1
        ORDER BY ci.rowid
        "#,
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(CartLine::from).collect())
}

/// Loads the user's cart as `(cart_id, cart)`.
pub(crate) async fn load_cart_in(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> DbResult<Option<(String, Cart)>> {
    let header: Option<(String, DateTime<Utc>)> =
        sqlx::query_as("SELECT id, updated_at FROM carts WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

    let Some((cart_id, updated_at)) = header else {
        return Ok(None);
    };

    let lines = load_lines_in(conn, &cart_id).await?;
    let cart = Cart {
        user_id: user_id.to_string(),
        lines,
        updated_at,
    };
    Ok(Some((cart_id, cart)))
}

/// Deletes every line of the user's cart inside the caller's transaction.
pub(crate) async fn clear_in(
    conn: &mut SqliteConnection,
    user_id: &str,
    now: DateTime<Utc>,
) -> DbResult<u64> {
    let Some(cart_id) = touch_cart_in(conn, user_id, now).await? else {
        return Ok(0);
    };

    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
        .bind(&cart_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::*;
    use chrono::Duration;
    use flashmart_core::{CartSummary, FlashSale};

    #[tokio::test]
    async fn test_get_cart_without_cart_is_empty() {
        let db = test_db().await;
        let cart = db.carts().get_cart("u1", now()).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.user_id, "u1");
    }

    #[tokio::test]
    async fn test_add_item_creates_cart_lazily() {
        let db = test_db().await;
        let product = seed_product(&db, "Masala Chai", 250, 10).await;

        let line = db.carts().add_item("u1", &product.id, 2, now()).await.unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.price_at_add.cents(), 250);

        let cart = db.carts().get_cart("u1", now()).await.unwrap();
        assert_eq!(cart.lines, vec![line]);
        assert_eq!(cart.total().cents(), 500);
    }

    #[tokio::test]
    async fn test_add_same_product_merges() {
        let db = test_db().await;
        let product = seed_product(&db, "Masala Chai", 250, 10).await;

        let first = db.carts().add_item("u1", &product.id, 2, now()).await.unwrap();
        let second = db.carts().add_item("u1", &product.id, 3, now()).await.unwrap();
        assert_eq!(first.id, second.id);

        let cart = db.carts().get_cart("u1", now()).await.unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_add_unknown_product() {
        let db = test_db().await;
        let err = db.carts().add_item("u1", "missing", 1, now()).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::ProductNotFound(_))));

        // The lazily created cart row was rolled back with the failure
        let carts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM carts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(carts, 0);
    }

    #[tokio::test]
    async fn test_add_more_than_stock() {
        let db = test_db().await;
        let product = seed_product(&db, "Masala Chai", 250, 1).await;

        let err = db.carts().add_item("u1", &product.id, 2, now()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));
        assert!(db.carts().get_cart("u1", now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_is_frozen_when_sale_ends() {
        let db = test_db().await;
        let product = seed_product(&db, "Masala Chai", 200, 10).await;
        let end = now() + Duration::minutes(30);
        db.products()
            .set_flash_sale(&product.id, &FlashSale::live(Money::from_cents(100), end), now())
            .await
            .unwrap();

        db.carts().add_item("u1", &product.id, 1, now()).await.unwrap();

        let after_sale = end + Duration::minutes(1);
        let cart = db.carts().get_cart("u1", after_sale).await.unwrap();
        assert_eq!(cart.total().cents(), 100);
    }

    #[tokio::test]
    async fn test_update_quantity_and_remove_below_one() {
        let db = test_db().await;
        let product = seed_product(&db, "Masala Chai", 250, 10).await;
        let line = db.carts().add_item("u1", &product.id, 1, now()).await.unwrap();

        let change = db
            .carts()
            .update_quantity("u1", &line.id, 4, now())
            .await
            .unwrap();
        assert!(matches!(change, LineChange::Updated(ref l) if l.quantity == 4));

        let change = db
            .carts()
            .update_quantity("u1", &line.id, 0, now())
            .await
            .unwrap();
        assert_eq!(change, LineChange::Removed(line.id));
        assert!(db.carts().get_cart("u1", now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_line() {
        let db = test_db().await;
        let err = db
            .carts()
            .update_quantity("u1", "missing", 2, now())
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::CartItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_cannot_touch_another_users_line() {
        let db = test_db().await;
        let product = seed_product(&db, "Masala Chai", 250, 10).await;
        let line = db.carts().add_item("u1", &product.id, 1, now()).await.unwrap();
        db.carts().add_item("u2", &product.id, 1, now()).await.unwrap();

        let err = db
            .carts()
            .update_quantity("u2", &line.id, 3, now())
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::CartItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_missing_item_is_noop() {
        let db = test_db().await;
        let product = seed_product(&db, "Masala Chai", 250, 10).await;
        db.carts().add_item("u1", &product.id, 1, now()).await.unwrap();

        let later = now() + Duration::minutes(5);
        assert!(!db.carts().remove_item("u1", "missing", later).await.unwrap());
        assert!(!db.carts().remove_item("nobody", "missing", later).await.unwrap());

        let cart = db.carts().get_cart("u1", later).await.unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.updated_at, now());
    }

    #[tokio::test]
    async fn test_remove_item() {
        let db = test_db().await;
        let product = seed_product(&db, "Masala Chai", 250, 10).await;
        let line = db.carts().add_item("u1", &product.id, 1, now()).await.unwrap();

        assert!(db.carts().remove_item("u1", &line.id, now()).await.unwrap());
        assert!(db.carts().get_cart("u1", now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_cart_twice_gives_identical_totals() {
        let db = test_db().await;
        let a = seed_product(&db, "Masala Chai", 250, 10).await;
        let b = seed_product(&db, "Filter Coffee", 400, 10).await;
        db.carts().add_item("u1", &a.id, 2, now()).await.unwrap();
        db.carts().add_item("u1", &b.id, 1, now()).await.unwrap();

        let first = CartSummary::from(&db.carts().get_cart("u1", now()).await.unwrap());
        let second = CartSummary::from(&db.carts().get_cart("u1", now()).await.unwrap());
        assert_eq!(first, second);
        assert_eq!(first.total_amount.cents(), 900);
    }

    #[tokio::test]
    async fn test_clear() {
        let db = test_db().await;
        let product = seed_product(&db, "Masala Chai", 250, 10).await;
        db.carts().add_item("u1", &product.id, 1, now()).await.unwrap();

        assert_eq!(db.carts().clear("u1", now()).await.unwrap(), 1);
        assert!(db.carts().get_cart("u1", now()).await.unwrap().is_empty());
        assert_eq!(db.carts().clear("nobody", now()).await.unwrap(), 0);
    }
}
