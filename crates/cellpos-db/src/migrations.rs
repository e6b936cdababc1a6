//! Embedded schema migrations.
//!
//! Files live in `migrations/sqlite/` and are compiled into the binary, so a
//! fresh shop database is usable without shipping SQL alongside it:
//!
//! - `0001_initial_schema.sql`: tables, CHECK constraints, indexes
//! - `0002_legacy_status_codes.sql`: rewrites free-text statuses to codes
//! - `0003_triggers_and_settings.sql`: repair history trigger, default settings
//! - `0004_tax_rate_unit.sql`: states that `tax_rate` is a percentage
//!
//! 0002 runs before the history trigger exists, so rewriting old repair
//! statuses leaves `repair_status_history` alone. Applied migrations are
//! never edited; schema changes go in a new `NNNN_description.sql`.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies whatever migrations the database has not seen yet. Safe to call on
/// every open.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(count = MIGRATOR.migrations.len(), "schema up to date");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::MigrationFailed(e.to_string()))?;

    Ok((total, applied as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_all_migrations_applied() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (total, applied) = migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert_eq!(total, 4);

        // Rerunning is a no-op.
        db.run_migrations().await.unwrap();
    }
}
