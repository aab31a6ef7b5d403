//! # Mail Outbox Repository
//!
//! Queue of emails to send after an order change commits.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  ORDER OPERATION (place_order / set_status)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. INSERT INTO orders ... / UPDATE orders SET status = ?      │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT INTO mail_outbox (kind, order_id, payload)          │   │
//! │  │     VALUES ('order_placed', ?, <OrderEvent JSON>)              │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← the email is queued iff the order change happened            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            MAIL DISPATCHER (api app, async)                     │   │
//! │  │                                                                 │   │
//! │  │  1. get_pending(batch, max_attempts)                           │   │
//! │  │  2. For each entry:                                            │   │
//! │  │     a. Render + hand to the Mailer                             │   │
//! │  │     b. On success: mark_sent                                   │   │
//! │  │     c. On failure: mark_failed (attempts += 1, last_error)     │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  A mail failure never reaches the shopper's request: by the time the   │
//! │  dispatcher runs, the order response has already been sent.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::generate_id;
use flashmart_core::OrderEvent;

/// One queued email.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MailOutboxEntry {
    pub id: String,
    /// `OrderEvent::kind()`, e.g. `order_placed`.
    pub kind: String,
    pub order_id: String,
    /// JSON-encoded [`OrderEvent`].
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl MailOutboxEntry {
    /// Decodes the payload.
    pub fn event(&self) -> serde_json::Result<OrderEvent> {
        serde_json::from_str(&self.payload)
    }
}

/// Repository for the mail outbox.
#[derive(Debug, Clone)]
pub struct MailOutboxRepository {
    pool: SqlitePool,
}

impl MailOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MailOutboxRepository { pool }
    }

    /// Unsent entries below the retry limit, oldest first.
    pub async fn get_pending(&self, limit: u32, max_attempts: u32) -> DbResult<Vec<MailOutboxEntry>> {
        self.get_pending_excluding(limit, max_attempts, &[]).await
    }

    /// Like [`get_pending`](Self::get_pending), skipping the given ids.
    pub async fn get_pending_excluding(
        &self,
        limit: u32,
        max_attempts: u32,
        exclude: &[String],
    ) -> DbResult<Vec<MailOutboxEntry>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                id, kind, order_id, payload, attempts, last_error,
                created_at, attempted_at, sent_at
            FROM mail_outbox
            WHERE sent_at IS NULL AND attempts < "#,
        );
        qb.push_bind(i64::from(max_attempts));

        if !exclude.is_empty() {
            qb.push(" AND id NOT IN (");
            let mut ids = qb.separated(", ");
            for id in exclude {
                ids.push_bind(id.clone());
            }
            ids.push_unseparated(")");
        }

        qb.push(" ORDER BY created_at ASC, rowid ASC LIMIT ");
        qb.push_bind(i64::from(limit));

        let entries: Vec<MailOutboxEntry> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(entries)
    }

    /// Marks an entry as delivered to the mailer.
    pub async fn mark_sent(&self, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE mail_outbox SET
                sent_at = ?2,
                attempted_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a delivery failure.
    pub async fn mark_failed(&self, id: &str, error: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE mail_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts unsent entries, including abandoned ones.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mail_outbox WHERE sent_at IS NULL")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// All entries for an order, oldest first.
    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<MailOutboxEntry>> {
        let entries: Vec<MailOutboxEntry> = sqlx::query_as(
            r#"
            SELECT
                id, kind, order_id, payload, attempts, last_error,
                created_at, attempted_at, sent_at
            FROM mail_outbox
            WHERE order_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Deletes entries sent more than `days_old` days before `now`.
    pub async fn cleanup_sent(&self, days_old: i64, now: DateTime<Utc>) -> DbResult<u64> {
        let cutoff = now - Duration::days(days_old);

        let result = sqlx::query("DELETE FROM mail_outbox WHERE sent_at IS NOT NULL AND sent_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Queues an event inside the caller's transaction.
pub(crate) async fn enqueue_in(
    conn: &mut SqliteConnection,
    event: &OrderEvent,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let id = generate_id();
    let payload = serde_json::to_string(event)?;

    debug!(kind = event.kind(), order = %event.order_id(), "Queuing mail");

    sqlx::query(
        r#"
        INSERT INTO mail_outbox (id, kind, order_id, payload, attempts, created_at)
        VALUES (?1, ?2, ?3, ?4, 0, ?5)
        "#,
    )
    .bind(&id)
    .bind(event.kind())
    .bind(event.order_id())
    .bind(&payload)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;

    #[tokio::test]
    async fn test_retry_bookkeeping() {
        let db = test_db().await;
        let product = seed_product(&db, "Masala Chai", 100, 5).await;
        db.carts().add_item("u1", &product.id, 1, now()).await.unwrap();
        let order = db
            .orders()
            .place_order(&customer("u1"), &address(), now())
            .await
            .unwrap();

        let outbox = db.mail_outbox();
        let pending = outbox.get_pending(10, 3).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].event().unwrap(),
            OrderEvent::OrderPlaced {
                order_id: order.id.clone()
            }
        );

        for _ in 0..3 {
            outbox.mark_failed(&pending[0].id, "relay down", now()).await.unwrap();
        }
        // Past the retry limit: abandoned but still counted as unsent
        assert!(outbox.get_pending(10, 3).await.unwrap().is_empty());
        assert_eq!(outbox.count_pending().await.unwrap(), 1);

        let entry = &outbox.for_order(&order.id).await.unwrap()[0];
        assert_eq!(entry.attempts, 3);
        assert_eq!(entry.last_error.as_deref(), Some("relay down"));
    }

    #[tokio::test]
    async fn test_mark_sent_and_cleanup() {
        let db = test_db().await;
        let product = seed_product(&db, "Masala Chai", 100, 5).await;
        db.carts().add_item("u1", &product.id, 1, now()).await.unwrap();
        db.orders()
            .place_order(&customer("u1"), &address(), now())
            .await
            .unwrap();

        let outbox = db.mail_outbox();
        let entry = outbox.get_pending(10, 3).await.unwrap().remove(0);
        outbox.mark_sent(&entry.id, now()).await.unwrap();
        assert_eq!(outbox.count_pending().await.unwrap(), 0);

        assert_eq!(outbox.cleanup_sent(7, now()).await.unwrap(), 0);
        assert_eq!(
            outbox
                .cleanup_sent(7, now() + Duration::days(8))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_get_pending_excluding_skips_ids() {
        let db = test_db().await;
        for user in ["u1", "u2", "u3"] {
            let product = seed_product(&db, "Masala Chai", 100, 5).await;
            db.carts().add_item(user, &product.id, 1, now()).await.unwrap();
            db.orders()
                .place_order(&customer(user), &address(), now())
                .await
                .unwrap();
        }

        let outbox = db.mail_outbox();
        let all = outbox.get_pending(10, 3).await.unwrap();
        assert_eq!(all.len(), 3);

        let skip = vec![all[0].id.clone(), all[2].id.clone()];
        let rest = outbox.get_pending_excluding(10, 3, &skip).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, all[1].id);

        let limited = outbox.get_pending_excluding(1, 3, &skip[..1]).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, all[1].id);
    }
}
