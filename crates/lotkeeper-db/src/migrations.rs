//! # Database Migrations
//!
//! Embedded SQL migrations for the inventory engine.
//!
//! ## How Migrations Work
//! ```text
//! Startup
//!    │
//!    ▼
//! _sqlx_migrations table ── compare with embedded files
//!    │
//!    ├── 001_inventory_engine.sql ✓ (already applied)
//!    └── 002_....sql              ⬜ (pending → run in a transaction)
//! ```
//!
//! Never edit an applied migration; add the next numbered file under
//! `migrations/sqlite/`. Triggers that enforce the append-only ledger live
//! in the schema, so a migration that drops them is a behavior change.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!(
        embedded = MIGRATOR.migrations.len(),
        "Checking for pending migrations"
    );

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
