//! # Error Types
//!
//! Domain-specific error types for lotkeeper-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  lotkeeper-core errors (this file)                                     │
//! │  ├── CoreError        - Inventory rule violations                      │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  lotkeeper-db errors (separate crate)                                  │
//! │  └── DbError          - Storage failures, lock timeouts                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → controller response     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every engine operation either commits completely or fails with one of
//! these; nothing is reported as a partial success.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Inventory rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (or is not active).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Cost lot cannot be found.
    #[error("Cost lot not found: {0}")]
    LotNotFound(i64),

    /// FIFO consumption cannot be fully satisfied by the eligible lots.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale line: 5 × COKE
    ///      │
    ///      ▼
    /// Eligible lots: [2, 1]  → available = 3
    ///      │
    ///      ▼
    /// InsufficientStock { product_id, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Transaction rolls back: no lot, consumption or ledger row changes
    /// ```
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Reconciliation session not found.
    #[error("Reconciliation session not found: {0}")]
    SessionNotFound(i64),

    /// Reconciliation line not found in the given session.
    #[error("Reconciliation line {line_id} not found in session {session_id}")]
    LineNotFound { session_id: i64, line_id: i64 },

    /// Apply was called on a session that is already applied.
    #[error("Reconciliation session {session_id} is already applied")]
    AlreadyApplied { session_id: i64 },

    /// The session is not in a state that allows the requested edit.
    #[error("Reconciliation session {session_id} is {current_status}, cannot perform operation")]
    InvalidSessionStatus {
        session_id: i64,
        current_status: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True for errors that describe bad caller input rather than state.
    ///
    /// These are rejected before any write takes place.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            CoreError::Validation(_)
                | CoreError::ProductNotFound(_)
                | CoreError::LotNotFound(_)
                | CoreError::SessionNotFound(_)
                | CoreError::LineNotFound { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the engine boundary before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, unknown enum value).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A start bound lies after its end bound.
    #[error("{field} start must not be after its end")]
    InvalidRange { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
