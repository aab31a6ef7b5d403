//! Schema migrations, embedded from `migrations/sqlite` at compile time.
//!
//! ```text
//! 001_initial_schema.sql   products, carts, orders, order_sequences,
//!                          notifications, mail_outbox
//! 002_product_search.sql   products_fts + sync triggers
//! ```
//!
//! New files take the next number. Applied files are checksummed by sqlx and
//! must not be edited afterwards.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// How far the connected database is behind the embedded schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub applied: usize,
    pub total: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.total
    }
}

/// Applies pending migrations in filename order.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(total = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// Counts applied migrations against the embedded set.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let total = MIGRATOR.migrations.len();

    let tracked: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    if !tracked {
        return Ok(MigrationStatus { applied: 0, total });
    }

    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    Ok(MigrationStatus {
        applied: applied as usize,
        total,
    })
}
