//! # Product Repository
//!
//! Database operations for the catalog.
//!
//! ## Key Operations
//! - Listing with category filter and full-text search (FTS5)
//! - Admin CRUD (soft delete only)
//! - Flash-sale updates
//! - Low-stock report
//!
//! Stock is read here but only ever *decremented* by the
//! [`InventoryLedger`](super::inventory::InventoryLedger).
//!
//! ## FTS5 Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How FTS5 Search Works                                │
//! │                                                                         │
//! │  Shopper types: "mas ch"                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  fts_query() → "mas"* "ch"*   (every term is a prefix, all must match) │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │ products_fts (name, description)        │                           │
//! │  │                                         │                           │
//! │  │ Masala Chai      | Strong CTC blend...  │ ← MATCH!                  │
//! │  │ Masala Chai Mix  | Cardamom, ginger...  │ ← MATCH!                  │
//! │  │ Rose Face Mist   | Steam-distilled...   │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  JOIN products ON rowid, filter is_active/category, ORDER BY rank      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::notification;
use flashmart_core::validation::{
    validate_description, validate_price_cents, validate_product_name, validate_stock,
};
use flashmart_core::{
    pricing, Category, CoreResult, FlashSale, Money, Notification, NotificationKind, Product,
};

// =============================================================================
// Row Mapping
// =============================================================================

/// One `products` row. The flash-sale columns are flattened in storage.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: String,
    name: String,
    description: String,
    category: Category,
    base_price: Money,
    stock: i64,
    flash_active: bool,
    flash_sale_price: Money,
    flash_end_time: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row.category,
            base_price: row.base_price,
            stock: row.stock,
            flash_sale: FlashSale {
                is_active: row.flash_active,
                sale_price: row.flash_sale_price,
                end_time: row.flash_end_time,
            },
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, description, category, base_price, stock, \
     flash_active, flash_sale_price, flash_end_time, is_active, created_at, updated_at";

// =============================================================================
// Query Inputs
// =============================================================================

/// Filters for `GET /api/products`.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<Category>,
    /// Free text; matched as prefixes against name and description.
    pub search: Option<String>,
}

/// Partial admin edit. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub base_price: Option<Money>,
    pub stock: Option<i64>,
}

impl ProductPatch {
    /// Validates whichever fields are present.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(name) = &self.name {
            validate_product_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(price) = self.base_price {
            validate_price_cents("basePrice", price.cents())?;
        }
        if let Some(stock) = self.stock {
            validate_stock(stock)?;
        }
        Ok(())
    }
}

/// Builds an FTS5 query where every whitespace-separated term is a quoted
/// prefix. Punctuation is dropped so user input cannot inject FTS syntax.
///
/// Returns `None` when nothing searchable is left.
fn fts_query(search: &str) -> Option<String> {
    let terms: Vec<String> = search
        .split_whitespace()
        .map(|term| term.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{}\"*", term))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let filter = ProductFilter { category: Some(Category::Food), search: None };
/// let products = repo.list(&filter, 50).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists active products, newest first, or by relevance when searching.
    ///
    /// ## Arguments
    /// * `filter` - Optional category and search text
    /// * `limit` - Maximum results to return
    pub async fn list(&self, filter: &ProductFilter, limit: u32) -> DbResult<Vec<Product>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        debug!(category = ?filter.category, search = ?search, limit, "Listing products");

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT p.* FROM products p ");

        let searching = match search {
            Some(text) => {
                let Some(fts) = fts_query(text) else {
                    return Ok(Vec::new());
                };
                qb.push("INNER JOIN products_fts ON p.rowid = products_fts.rowid ");
                qb.push("WHERE products_fts MATCH ");
                qb.push_bind(fts);
                qb.push(" AND p.is_active = 1");
                true
            }
            None => {
                qb.push("WHERE p.is_active = 1");
                false
            }
        };

        if let Some(category) = filter.category {
            qb.push(" AND p.category = ");
            qb.push_bind(category);
        }

        if searching {
            qb.push(" ORDER BY products_fts.rank");
        } else {
            qb.push(" ORDER BY p.created_at DESC, p.rowid DESC");
        }
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows: Vec<ProductRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        debug!(count = rows.len(), "Listing returned products");
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Active products whose flash sale is live at `now`.
    ///
    /// The flag narrows the scan in SQL; liveness itself is decided by the
    /// pricing resolver so expiry has exactly one definition.
    pub async fn list_flash_sales(&self, now: DateTime<Utc>) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products \
             WHERE is_active = 1 AND flash_active = 1 \
             ORDER BY flash_end_time ASC",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(Product::from)
            .filter(|p| pricing::is_sale_live(&p.flash_sale, now))
            .collect())
    }

    /// Gets a product by its ID, including soft-deleted ones.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE id = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Gets a product only if it is still listed.
    pub async fn find_active(&self, id: &str) -> DbResult<Option<Product>> {
        Ok(self.get_by_id(id).await?.filter(|p| p.is_active))
    }

    /// Inserts a new product.
    ///
    /// ## Arguments
    /// * `product` - Product to insert (id generated by `Product::new`)
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, category, base_price, stock,
                flash_active, flash_sale_price, flash_end_time,
                is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9,
                ?10, ?11, ?12
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category)
        .bind(product.base_price)
        .bind(product.stock)
        .bind(product.flash_sale.is_active)
        .bind(product.flash_sale.sale_price)
        .bind(product.flash_sale.end_time)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Applies an admin edit in a single statement.
    ///
    /// An explicit `stock` overwrites the ledger value (restock or correction).
    pub async fn update(
        &self,
        id: &str,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> DbResult<Product> {
        patch.validate()?;

        debug!(id = %id, "Updating product");

        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r#"
            UPDATE products SET
                name = COALESCE(?2, name),
                description = COALESCE(?3, description),
                category = COALESCE(?4, category),
                base_price = COALESCE(?5, base_price),
                stock = COALESCE(?6, stock),
                updated_at = ?7
            WHERE id = ?1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(patch.name.as_deref().map(str::trim))
        .bind(patch.description.as_deref())
        .bind(patch.category)
        .bind(patch.base_price)
        .bind(patch.stock)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::from)
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Replaces a product's flash-sale state.
    ///
    /// Turning a sale on also notifies every shopper who currently holds the
    /// product in their cart, in the same transaction.
    pub async fn set_flash_sale(
        &self,
        id: &str,
        sale: &FlashSale,
        now: DateTime<Utc>,
    ) -> DbResult<Product> {
        validate_price_cents("salePrice", sale.sale_price.cents())
            .map_err(flashmart_core::CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r#"
            UPDATE products SET
                flash_active = ?2,
                flash_sale_price = ?3,
                flash_end_time = ?4,
                updated_at = ?5
            WHERE id = ?1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(sale.is_active)
        .bind(sale.sale_price)
        .bind(sale.end_time)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let product = row
            .map(Product::from)
            .ok_or_else(|| DbError::not_found("Product", id))?;

        if sale.is_active && sale.sale_price > product.base_price {
            warn!(
                product = %product.id,
                sale_price = %sale.sale_price,
                base_price = %product.base_price,
                "Flash sale price is above base price"
            );
        }

        let mut notified = 0usize;
        if pricing::is_sale_live(&product.flash_sale, now) {
            let holders: Vec<String> = sqlx::query_scalar(
                r#"
                SELECT DISTINCT c.user_id
                FROM carts c
                INNER JOIN cart_items ci ON ci.cart_id = c.id
                WHERE ci.product_id = ?1
                "#,
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

            for user_id in holders {
                let n = Notification::new(
                    user_id,
                    NotificationKind::FlashSale,
                    format!(
                        "Flash sale on {}! Get it at {}",
                        product.name, product.flash_sale.sale_price
                    ),
                    Some(format!("/products/{}", product.id)),
                    now,
                );
                notification::insert_in(&mut tx, &n).await?;
                notified += 1;
            }
        }

        tx.commit().await?;

        info!(
            product = %product.id,
            active = sale.is_active,
            notified,
            "Flash sale updated"
        );
        Ok(product)
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// - Placed orders still reference this product
    /// - Can be restored by an edit if deleted by mistake
    pub async fn soft_delete(&self, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_active = 0, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Active products with `stock <= threshold`, emptiest first.
    pub async fn low_stock(&self, threshold: i64) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products \
             WHERE is_active = 1 AND stock <= ?1 \
             ORDER BY stock ASC, name ASC",
            PRODUCT_COLUMNS
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Counts listed products (for diagnostics and seeding).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
