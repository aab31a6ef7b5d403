//! # Order Repository
//!
//! Checkout and the order status lifecycle.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    place_order (ONE transaction)                        │
//! │                                                                         │
//! │  1. Number   UPSERT order_sequences(year) → last_value + 1             │
//! │              (first statement is a write: takes the write lock, so     │
//! │               concurrent checkouts queue here and never share a number)│
//! │  2. Load     cart lines with product names        ── EmptyCart         │
//! │  3. Validate every line against CURRENT stock     ── InsufficientStock │
//! │  4. Snapshot Order::from_cart (frozen prices, no re-resolution)        │
//! │  5. Commit   INSERT orders + order_items                               │
//! │              guarded stock decrement per line                          │
//! │              DELETE cart_items                                         │
//! │              INSERT notification                                       │
//! │              INSERT mail_outbox (OrderPlaced)                          │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction: no order, no stock     │
//! │  change, cart untouched, sequence value not consumed.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Email is never sent from here. The outbox row is picked up after commit.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{cart, inventory, notification, order_year, outbox};
use flashmart_core::validation::validate_shipping_address;
use flashmart_core::{
    CoreError, Customer, Money, Notification, Order, OrderEvent, OrderItem, OrderNumber,
    OrderStatus, PaymentStatus, ShippingAddress,
};

// =============================================================================
// Row Mapping
// =============================================================================

const ORDER_COLUMNS: &str = "id, order_number, user_id, customer_email, customer_name, \
     total_amount, shipping_address, status, payment_status, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    user_id: String,
    customer_email: String,
    customer_name: String,
    total_amount: Money,
    shipping_address: Json<ShippingAddress>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> DbResult<Order> {
        let order_number: OrderNumber = self
            .order_number
            .parse()
            .map_err(|e| DbError::Serialization(format!("order_number: {}", e)))?;

        Ok(Order {
            id: self.id,
            order_number,
            user_id: self.user_id,
            customer_email: self.customer_email,
            customer_name: self.customer_name,
            items,
            total_amount: self.total_amount,
            shipping_address: self.shipping_address.0,
            status: self.status,
            payment_status: self.payment_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: String,
    product_id: String,
    name: String,
    quantity: i64,
    unit_price: Money,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            product_id: row.product_id,
            name: row.name,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders.
///
/// ## Usage
/// ```rust,ignore
/// let order = db.orders().place_order(&customer, &address, clock.now()).await?;
/// assert_eq!(order.order_number.to_string(), "ORD-2026-00001");
/// ```
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Turns the customer's cart into an order.
    ///
    /// ## Errors
    /// * `Validation` - incomplete shipping address (nothing is written)
    /// * `EmptyCart` - no cart or no lines
    /// * `InsufficientStock` - some line exceeds current stock; names the product
    /// * `ProductNotFound` - a line's product was delisted since it was added
    pub async fn place_order(
        &self,
        customer: &Customer,
        shipping_address: &ShippingAddress,
        now: DateTime<Utc>,
    ) -> DbResult<Order> {
        validate_shipping_address(shipping_address).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        // 1. Number
        let year = order_year(now);
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_sequences (year, last_value) VALUES (?1, 1)
            ON CONFLICT (year) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(year)
        .fetch_one(&mut *tx)
        .await?;

        // 2. Load
        let cart = cart::load_cart_in(&mut tx, &customer.id)
            .await?
            .map(|(_, cart)| cart)
            .filter(|cart| !cart.is_empty())
            .ok_or(CoreError::EmptyCart)?;

        // 3. Validate
        for line in &cart.lines {
            ensure_available(&mut tx, &line.product_id, line.quantity).await?;
        }

        // 4. Snapshot
        let order = Order::from_cart(
            &cart,
            customer,
            shipping_address.clone(),
            OrderNumber::new(year, sequence),
            now,
        )?;

        // 5. Commit
        insert_order_in(&mut tx, &order).await?;
        for item in &order.items {
            inventory::decrement_in(&mut tx, &item.product_id, item.quantity, now).await?;
        }
        cart::clear_in(&mut tx, &customer.id, now).await?;
        notification::insert_in(&mut tx, &Notification::order_placed(&order, now)).await?;
        outbox::enqueue_in(
            &mut tx,
            &OrderEvent::OrderPlaced {
                order_id: order.id.clone(),
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!(
            order = %order.order_number,
            user = %customer.id,
            items = order.items.len(),
            total = %order.total_amount,
            "Order placed"
        );
        Ok(order)
    }

    /// Sets an order's status. Any status may follow any other; setting the
    /// current status again is still recorded.
    ///
    /// `order_ref` is the UUID or the order number.
    pub async fn set_status(
        &self,
        order_ref: &str,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"
            UPDATE orders SET status = ?2, updated_at = ?3
            WHERE id = ?1 OR order_number = ?1
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(order_ref)
        .bind(status)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let row = row.ok_or_else(|| CoreError::OrderNotFound(order_ref.to_string()))?;
        let mut items = load_items_in(&mut tx, &[row.id.as_str()]).await?;
        let order = row_with_items(row, &mut items)?;

        notification::insert_in(&mut tx, &Notification::status_changed(&order, status, now))
            .await?;
        outbox::enqueue_in(
            &mut tx,
            &OrderEvent::StatusChanged {
                order_id: order.id.clone(),
                status,
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!(order = %order.order_number, status = %status, "Order status updated");
        Ok(order)
    }

    /// Looks an order up by UUID or by order number.
    pub async fn find(&self, order_ref: &str) -> DbResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE id = ?1 OR order_number = ?1",
            ORDER_COLUMNS
        ))
        .bind(order_ref)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut conn = self.pool.acquire().await?;
        let mut items = load_items_in(&mut conn, &[row.id.as_str()]).await?;
        Ok(Some(row_with_items(row, &mut items)?))
    }

    /// Looks an order up by UUID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        Ok(self.find(id).await?.filter(|o| o.id == id))
    }

    /// A user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.with_items(rows).await
    }

    /// Every order, newest first (admin view).
    pub async fn list_all(&self, limit: u32) -> DbResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            ORDER_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        self.with_items(rows).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn with_items(&self, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let mut conn = self.pool.acquire().await?;
        let mut items = load_items_in(&mut conn, &ids).await?;

        rows.into_iter()
            .map(|row| row_with_items(row, &mut items))
            .collect()
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Fails with the offending product when a line cannot be filled right now.
async fn ensure_available(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let current: Option<(String, i64)> =
        sqlx::query_as("SELECT name, stock FROM products WHERE id = ?1 AND is_active = 1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    match current {
        None => Err(CoreError::ProductNotFound(product_id.to_string()).into()),
        Some((name, available)) if available < quantity => {
            debug!(product = %product_id, available, quantity, "Checkout blocked by stock");
            Err(CoreError::InsufficientStock {
                product: name,
                available,
                requested: quantity,
            }
            .into())
        }
        Some(_) => Ok(()),
    }
}

async fn insert_order_in(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, user_id, customer_email, customer_name,
            total_amount, shipping_address, status, payment_status,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11
        )
        "#,
    )
    .bind(&order.id)
    .bind(order.order_number.to_string())
    .bind(&order.user_id)
    .bind(&order.customer_email)
    .bind(&order.customer_name)
    .bind(order.total_amount)
    .bind(Json(&order.shipping_address))
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for (line_no, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, line_no, product_id, name, quantity, unit_price)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&order.id)
        .bind(line_no as i64)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Items for the given orders, grouped by order id in line order.
async fn load_items_in(
    conn: &mut SqliteConnection,
    order_ids: &[&str],
) -> DbResult<HashMap<String, Vec<OrderItem>>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT order_id, product_id, name, quantity, unit_price FROM order_items WHERE order_id IN (",
    );
    let mut separated = qb.separated(", ");
    for id in order_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY order_id, line_no");

    let rows: Vec<OrderItemRow> = qb.build_query_as().fetch_all(&mut *conn).await?;

    let mut grouped: HashMap<String, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        grouped
            .entry(row.order_id.clone())
            .or_default()
            .push(OrderItem::from(row));
    }
    Ok(grouped)
}

fn row_with_items(
    row: OrderRow,
    items: &mut HashMap<String, Vec<OrderItem>>,
) -> DbResult<Order> {
    let lines = items.remove(&row.id).unwrap_or_default();
    row.into_order(lines)
}

// =============================================================================
// Unit Tests
// =============================================================================
