//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  EngineConfig::load() → db_config()                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Request 1 ──► consume (tx holds write lock)                           │
//! │  Request 2 ──► consume (waits up to lock_timeout, then retryable)      │
//! │  Request 3 ──► ledger history (reads never wait in WAL)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//! SQLite serializes writers. Every mutating engine transaction writes
//! first (the product's `lock_version`, or the session row), so it owns the
//! write lock before reading any lot it will decrement. Waiting is bounded
//! by `busy_timeout`; expiry surfaces as `DbError::ConcurrencyTimeout`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ShortageCosting;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::consumption::ConsumptionRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::lot::LotRepository;
use crate::repository::product::ProductRepository;
use crate::repository::reconciliation::ReconciliationRepository;
use crate::repository::valuation::ValuationRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/lotkeeper.db")
///     .max_connections(5)
///     .lock_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    pub min_connections: u32,

    /// Pool acquire timeout.
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    pub idle_timeout: Duration,

    /// Upper bound on waiting for the write lock.
    pub lock_timeout: Duration,

    /// Whether to run migrations on connect.
    pub run_migrations: bool,

    /// Fall back to unscoped lots when a location cannot cover a request.
    pub location_fallback: bool,

    /// Cost basis for reconciliation shortages.
    pub shortage_costing: ShortageCosting,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            lock_timeout: Duration::from_secs(5),
            run_migrations: true,
            location_fallback: true,
            shortage_costing: ShortageCosting::AverageCost,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the write-lock wait bound.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets location fallback for FIFO consumption.
    pub fn location_fallback(mut self, enabled: bool) -> Self {
        self.location_fallback = enabled;
        self
    }

    /// Sets the reconciliation shortage cost basis.
    pub fn shortage_costing(mut self, costing: ShortageCosting) -> Self {
        self.shortage_costing = costing;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// A single connection: every repository call and every transaction
    /// shares it, so operations must never acquire a second connection
    /// while a transaction is open.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            lock_timeout: Duration::from_secs(1),
            run_migrations: true,
            location_fallback: true,
            shortage_costing: ShortageCosting::AverageCost,
        }
    }

    fn policy(&self) -> EnginePolicy {
        EnginePolicy {
            location_fallback: self.location_fallback,
            shortage_costing: self.shortage_costing,
        }
    }
}

/// Behavior switches handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnginePolicy {
    pub location_fallback: bool,
    pub shortage_costing: ShortageCosting,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        DbConfig::in_memory().policy()
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// ## Usage
/// ```rust,ignore
/// let lot_id = db.lots().open_lot(NewLot::purchase(&product_id, 10, costs, "GR-1")).await?;
/// let taken = db.lots().consume(ConsumeRequest::new(&product_id, 7, OutboundRef::sale_line("S-1", "1"))).await?;
/// let history = db.ledger().history(&product_id, None, None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    policy: EnginePolicy,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous
    ///    - Foreign keys enabled
    ///    - busy timeout = `lock_timeout`
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .busy_timeout(config.lock_timeout)
            .create_if_missing(true);

        debug!(
            lock_timeout_ms = config.lock_timeout.as_millis() as u64,
            "Connection options configured"
        );

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            location_fallback = config.location_fallback,
            shortage_costing = %config.shortage_costing,
            "Database pool created"
        );

        let db = Database {
            pool,
            policy: config.policy(),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the active engine policy.
    pub fn policy(&self) -> EnginePolicy {
        self.policy
    }

    /// Products and the stock cache.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Cost lot store: open, consume, reverse, destroy.
    pub fn lots(&self) -> LotRepository {
        LotRepository::new(self.pool.clone(), self.policy)
    }

    /// Consumption records (read side).
    pub fn consumptions(&self) -> ConsumptionRepository {
        ConsumptionRepository::new(self.pool.clone())
    }

    /// Stock ledger history and margin.
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    /// Weighted average and on-hand valuation.
    pub fn valuation(&self) -> ValuationRepository {
        ValuationRepository::new(self.pool.clone())
    }

    /// Reconciliation sessions.
    pub fn reconciliations(&self) -> ReconciliationRepository {
        ReconciliationRepository::new(self.pool.clone(), self.policy)
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
