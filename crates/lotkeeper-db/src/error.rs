//! # Database Error Types
//!
//! Error types for engine operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  CoreError (rule violation)      SQLite Error (sqlx::Error)            │
//! │       │                                │                                │
//! │       └──────────────┬─────────────────┘                                │
//! │                      ▼                                                  │
//! │  DbError (this module) ← categorized, transaction already rolled back  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Controller maps:                                                      │
//! │    is_invalid_input() → 400    InsufficientStock → 409                 │
//! │    is_retryable()     → 503    everything else   → 500                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use lotkeeper_core::{CoreError, ValidationError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Inventory rule violation (insufficient stock, already applied, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (e.g. duplicate SKU).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint or trigger refused the write.
    ///
    /// The engine validates before writing, so this indicates a bug or a
    /// write from outside the engine.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// The write lock could not be acquired within the busy timeout.
    ///
    /// Safe to retry: the transaction was rolled back in full.
    #[error("Timed out waiting for a database lock")]
    ConcurrencyTimeout,

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns true if the caller may simply retry the operation.
    ///
    /// ```text
    /// ConcurrencyTimeout  → yes (lock contention)
    /// PoolExhausted       → yes (all connections busy)
    /// everything else     → no
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::ConcurrencyTimeout | DbError::PoolExhausted)
    }

    /// Returns true for errors caused by the request itself; nothing was
    /// written.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            DbError::Core(core) => core.is_invalid_input(),
            DbError::NotFound { .. } | DbError::UniqueViolation { .. } => true,
            _ => false,
        }
    }

    /// Returns true if this is an `InsufficientStock` failure.
    pub fn is_insufficient_stock(&self) -> bool {
        matches!(self, DbError::Core(CoreError::InsufficientStock { .. }))
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

/// SQLite primary result codes for lock contention.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → BUSY/LOCKED → ConcurrencyTimeout
///                               constraint message → Unique/FK/Integrity
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // extended codes keep the primary code in the low byte
                let primary = db_err
                    .code()
                    .and_then(|c| c.parse::<i32>().ok())
                    .map(|c| c & 0xff);
                if matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
                    || msg.contains("database is locked")
                {
                    return DbError::ConcurrencyTimeout;
                }

                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed")
                    || msg.contains("append-only")
                    || msg.contains("immutable")
                    || msg.contains("never deleted")
                    || msg.contains("single reversal")
                {
                    DbError::IntegrityViolation(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
