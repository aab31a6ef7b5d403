//! # Notification Repository
//!
//! In-app notifications. Rows are written by the order transaction and by
//! flash-sale updates; shoppers poll for them.
//!
//! Expiry is evaluated at read-time (`expires_at > now`), so an expired row
//! is invisible even before [`purge_expired`](NotificationRepository::purge_expired)
//! removes it.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use flashmart_core::{Notification, NotificationKind};

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: String,
    user_id: String,
    kind: NotificationKind,
    message: String,
    is_read: bool,
    link: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            message: row.message,
            is_read: row.is_read,
            link: row.link,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

/// Repository for notifications.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NotificationRepository { pool }
    }

    pub async fn insert(&self, notification: &Notification) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_in(&mut conn, notification).await
    }

    /// Unexpired notifications for a user, newest first.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, kind, message, is_read, link, created_at, expires_at
            FROM notifications
            WHERE user_id = ?1 AND expires_at > ?2
            ORDER BY created_at DESC, rowid DESC
            LIMIT 50
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }

    pub async fn unread_count(&self, user_id: &str, now: DateTime<Utc>) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0 AND expires_at > ?2",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Marks one of the user's notifications read.
    pub async fn mark_read(&self, user_id: &str, id: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }
        Ok(())
    }

    /// Returns how many notifications changed.
    pub async fn mark_all_read(&self, user_id: &str) -> DbResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0")
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    /// Deletes one of the user's notifications. Other users' rows are
    /// reported as not found.
    pub async fn delete(&self, user_id: &str, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }
        Ok(())
    }

    /// Deletes rows whose expiry has passed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, "Purged expired notifications");
        }
        Ok(purged)
    }

    /// Counts a user's notifications of one kind, expired or not.
    pub async fn count_for_user(&self, user_id: &str, kind: NotificationKind) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND kind = ?2")
                .bind(user_id)
                .bind(kind)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

/// Inserts inside the caller's transaction.
pub(crate) async fn insert_in(
    conn: &mut SqliteConnection,
    notification: &Notification,
) -> DbResult<()> {
    debug!(
        user = %notification.user_id,
        kind = ?notification.kind,
        "Inserting notification"
    );

    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, kind, message, is_read, link, created_at, expires_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&notification.id)
    .bind(&notification.user_id)
    .bind(notification.kind)
    .bind(&notification.message)
    .bind(notification.is_read)
    .bind(&notification.link)
    .bind(notification.created_at)
    .bind(notification.expires_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use chrono::Duration;

    fn note(user: &str, message: &str, at: DateTime<Utc>) -> Notification {
        Notification::new(user, NotificationKind::General, message, None, at)
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_scoped_to_user() {
        let db = test_db().await;
        let repo = db.notifications();
        repo.insert(&note("u1", "first", now())).await.unwrap();
        repo.insert(&note("u1", "second", now() + Duration::minutes(1)))
            .await
            .unwrap();
        repo.insert(&note("u2", "other", now())).await.unwrap();

        let list = repo.list_for_user("u1", now() + Duration::minutes(2)).await.unwrap();
        let messages: Vec<_> = list.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_expired_notifications_are_hidden_then_purged() {
        let db = test_db().await;
        let repo = db.notifications();
        repo.insert(&note("u1", "old", now())).await.unwrap();

        let later = now() + Duration::days(30);
        assert!(repo.list_for_user("u1", later).await.unwrap().is_empty());
        assert_eq!(repo.unread_count("u1", later).await.unwrap(), 0);

        assert_eq!(repo.purge_expired(later).await.unwrap(), 1);
        assert_eq!(
            repo.count_for_user("u1", NotificationKind::General).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_mark_read_and_mark_all_read() {
        let db = test_db().await;
        let repo = db.notifications();
        let a = note("u1", "a", now());
        repo.insert(&a).await.unwrap();
        repo.insert(&note("u1", "b", now())).await.unwrap();

        repo.mark_read("u1", &a.id).await.unwrap();
        assert_eq!(repo.unread_count("u1", now()).await.unwrap(), 1);

        assert_eq!(repo.mark_all_read("u1").await.unwrap(), 1);
        assert_eq!(repo.unread_count("u1", now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cannot_touch_other_users_notifications() {
        let db = test_db().await;
        let repo = db.notifications();
        let a = note("u1", "a", now());
        repo.insert(&a).await.unwrap();

        assert!(matches!(
            repo.mark_read("u2", &a.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            repo.delete("u2", &a.id).await,
            Err(DbError::NotFound { .. })
        ));

        repo.delete("u1", &a.id).await.unwrap();
        assert!(repo.list_for_user("u1", now()).await.unwrap().is_empty());
    }
}
