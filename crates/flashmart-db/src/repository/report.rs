//! # Report Repository
//!
//! Read-only aggregates for the admin dashboard. Cancelled orders are
//! excluded from every sales figure.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::error::DbResult;
use flashmart_core::{Category, Money};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub total_orders: i64,
    pub total_sales: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: String,
    /// Name as sold (snapshot on the order line).
    pub name: String,
    pub total_quantity: i64,
    pub total_revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategorySales {
    pub category: Category,
    pub total_products: i64,
    pub total_stock: i64,
}

/// One calendar day (UTC) of sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    pub day: NaiveDate,
    pub sales: Money,
    pub orders: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub total_spent: Money,
    pub total_orders: i64,
    pub last_order_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub average_order_value: Money,
}

/// Repository for admin reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Order count and revenue.
    pub async fn sales_summary(&self) -> DbResult<SalesSummary> {
        let summary: SalesSummary = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total_orders,
                COALESCE(SUM(total_amount), 0) AS total_sales
            FROM orders
            WHERE status != 'cancelled'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    /// Best sellers by units sold.
    pub async fn top_products(&self, limit: u32) -> DbResult<Vec<TopProduct>> {
        let rows: Vec<TopProduct> = sqlx::query_as(
            r#"
            SELECT
                oi.product_id,
                MAX(oi.name) AS name,
                SUM(oi.quantity) AS total_quantity,
                SUM(oi.quantity * oi.unit_price) AS total_revenue
            FROM order_items oi
            INNER JOIN orders o ON o.id = oi.order_id
            WHERE o.status != 'cancelled'
            GROUP BY oi.product_id
            ORDER BY total_quantity DESC, total_revenue DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Listed products and stock on hand per category.
    pub async fn category_breakdown(&self) -> DbResult<Vec<CategorySales>> {
        let rows: Vec<CategorySales> = sqlx::query_as(
            r#"
            SELECT
                category,
                COUNT(*) AS total_products,
                COALESCE(SUM(stock), 0) AS total_stock
            FROM products
            WHERE is_active = 1
            GROUP BY category
            ORDER BY category
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sales for each of the last `days` days up to and including today.
    /// Days without orders are reported as zero.
    pub async fn sales_trend(&self, now: DateTime<Utc>, days: u32) -> DbResult<Vec<DailySales>> {
        let today = now.date_naive();
        let first_day = today - Duration::days(i64::from(days.saturating_sub(1)));
        let since = first_day
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);

        let rows: Vec<(String, Money, i64)> = sqlx::query_as(
            r#"
            SELECT
                substr(created_at, 1, 10) AS day,
                COALESCE(SUM(total_amount), 0) AS sales,
                COUNT(*) AS orders
            FROM orders
            WHERE created_at >= ?1 AND status != 'cancelled'
            GROUP BY day
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let by_day: HashMap<String, (Money, i64)> = rows
            .into_iter()
            .map(|(day, sales, orders)| (day, (sales, orders)))
            .collect();

        Ok(first_day
            .iter_days()
            .take_while(|day| *day <= today)
            .map(|day| {
                let (sales, orders) = by_day
                    .get(&day.format("%Y-%m-%d").to_string())
                    .copied()
                    .unwrap_or((Money::zero(), 0));
                DailySales { day, sales, orders }
            })
            .collect())
    }

    /// Top customers by spend.
    pub async fn leaderboard(&self, limit: u32) -> DbResult<Vec<LeaderboardEntry>> {
        let mut rows: Vec<LeaderboardEntry> = sqlx::query_as(
            r#"
            SELECT
                user_id,
                MAX(customer_name) AS name,
                MAX(customer_email) AS email,
                SUM(total_amount) AS total_spent,
                COUNT(*) AS total_orders,
                MAX(created_at) AS last_order_at
            FROM orders
            WHERE status != 'cancelled'
            GROUP BY user_id
            ORDER BY total_spent DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        for row in &mut rows {
            if row.total_orders > 0 {
                row.average_order_value = Money::from_cents(row.total_spent.cents() / row.total_orders);
            }
        }

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use flashmart_core::OrderStatus;

    #[tokio::test]
    async fn test_reports_exclude_cancelled_orders() {
        let db = test_db().await;
        let chai = seed_product(&db, "Masala Chai", 100, 50).await;
        let coffee = seed_product(&db, "Filter Coffee", 300, 50).await;

        db.carts().add_item("u1", &chai.id, 3, now()).await.unwrap();
        db.orders().place_order(&customer("u1"), &address(), now()).await.unwrap();

        db.carts().add_item("u2", &coffee.id, 1, now()).await.unwrap();
        db.orders().place_order(&customer("u2"), &address(), now()).await.unwrap();

        db.carts().add_item("u2", &coffee.id, 10, now()).await.unwrap();
        let cancelled = db
            .orders()
            .place_order(&customer("u2"), &address(), now())
            .await
            .unwrap();
        db.orders()
            .set_status(&cancelled.id, OrderStatus::Cancelled, now())
            .await
            .unwrap();

        let reports = db.reports();
        let summary = reports.sales_summary().await.unwrap();
        assert_eq!(summary.total_orders, 2);
        assert_eq!(summary.total_sales.cents(), 600);

        let top = reports.top_products(10).await.unwrap();
        assert_eq!(top[0].name, "Masala Chai");
        assert_eq!(top[0].total_quantity, 3);
        assert_eq!(top[1].total_quantity, 1);

        let board = reports.leaderboard(10).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].total_spent.cents(), 300);
        assert_eq!(board[0].average_order_value.cents(), 300);
    }

    #[tokio::test]
    async fn test_sales_trend_fills_missing_days() {
        let db = test_db().await;
        let chai = seed_product(&db, "Masala Chai", 100, 50).await;
        db.carts().add_item("u1", &chai.id, 2, now()).await.unwrap();
        db.orders().place_order(&customer("u1"), &address(), now()).await.unwrap();

        let trend = db.reports().sales_trend(now(), 7).await.unwrap();
        assert_eq!(trend.len(), 7);
        assert_eq!(trend[6].day, now().date_naive());
        assert_eq!(trend[6].sales.cents(), 200);
        assert!(trend[..6].iter().all(|d| d.orders == 0));
    }

    #[tokio::test]
    async fn test_category_breakdown() {
        let db = test_db().await;
        seed_product(&db, "Masala Chai", 100, 4).await;
        seed_product(&db, "Filter Coffee", 100, 6).await;

        let breakdown = db.reports().category_breakdown().await.unwrap();
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].category, Category::Food);
        assert_eq!(breakdown[0].total_products, 2);
        assert_eq!(breakdown[0].total_stock, 10);
    }
}
