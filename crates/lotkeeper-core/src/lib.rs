//! # lotkeeper-core: Pure Inventory Logic
//!
//! The costing rules of the Lotkeeper engine as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Lotkeeper Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              POS controllers (outside this workspace)           │   │
//! │  │    goods receipt, sale, void, stock count, reports             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    lotkeeper-db (Engine + Storage)              │   │
//! │  │    lots, consumptions, ledger, valuation, reconciliation        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ plans & math                           │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ lotkeeper-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   fifo    │  │ valuation │  │   │
//! │  │   │  CostLot  │  │   Money   │  │ plan_fifo │  │ avg cost  │  │   │
//! │  │   │  Ledger   │  │  rounding │  │  restore  │  │  margin   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (CostLot, LedgerEntry, ReferenceKind, ...)
//! - [`money`] - Integer-cent money with Bankers Rounding from decimals
//! - [`fifo`] - FIFO allocation planning and reversal caps
//! - [`valuation`] - Weighted average, running balance, gross margin
//! - [`error`] - Domain error types
//! - [`validation`] - Input checks run before any write
//!
//! ## Example Usage
//!
//! ```rust
//! use lotkeeper_core::{ReferenceKind, Direction};
//!
//! // A void is the compensation of a sale, never a second sale
//! assert_eq!(ReferenceKind::Sale.direction(), Direction::Outbound);
//! assert_eq!(ReferenceKind::SaleVoid.direction(), Direction::Inbound);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod fifo;
pub mod money;
pub mod types;
pub mod validation;
pub mod valuation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;
pub use valuation::{GrossMargin, LedgerLine, OnHandValuation};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Upper bound on a single movement or count.
///
/// Catches typos (an extra zero on a goods receipt) long before the i64
/// products in valuation could overflow.
pub const MAX_MOVEMENT_QUANTITY: i64 = 10_000_000;

/// Upper bound on any single unit cost component or unit sale price.
///
/// Three components at this bound times [`MAX_MOVEMENT_QUANTITY`] still
/// fit in an i64.
pub const MAX_UNIT_COST_CENTS: i64 = 100_000_000_000;

/// Maximum length of opaque references (source refs, sale ids, locations).
pub const MAX_REFERENCE_LEN: usize = 100;
