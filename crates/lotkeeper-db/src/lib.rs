//! # lotkeeper-db: Persistence Layer for the Inventory Engine
//!
//! SQLite storage and every transactional operation of the engine: cost
//! lots, FIFO consumption and its reversal, the movement ledger, valuation
//! and reconciliation sessions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Lotkeeper Data Flow                              │
//! │                                                                         │
//! │  HTTP controller (sale posted, goods received, count applied)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   lotkeeper-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ LotRepo        │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ LedgerRepo     │    │ 001_invent.. │  │   │
//! │  │   │ EnginePolicy  │    │ Reconciliation │    │              │  │   │
//! │  │   └───────────────┘    └───────┬────────┘    └──────────────┘  │   │
//! │  │                                │ plan_fifo, valuation math     │   │
//! │  │                                ▼                                │   │
//! │  │                         lotkeeper-core                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL)                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `lotkeeper.toml` + environment overrides
//! - [`pool`] - Connection pool creation and engine policy
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lotkeeper_core::{ConsumeRequest, NewLot, OutboundRef, UnitCostComponents};
//! use lotkeeper_db::{Database, EngineConfig};
//!
//! let config = EngineConfig::load_or_default(None);
//! let db = Database::new(config.db_config()).await?;
//!
//! let product = db.products().register("COKE-330", "Coca-Cola 330ml").await?;
//! db.lots()
//!     .open_lot(NewLot::purchase(&product.id, 24, UnitCostComponents::purchase_price(45), "GR-1001"))
//!     .await?;
//!
//! let taken = db
//!     .lots()
//!     .consume(ConsumeRequest::new(&product.id, 2, OutboundRef::sale_line("S-1", "1")))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, EngineConfig, ShortageCosting};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, EnginePolicy};

// Repository re-exports for convenience
pub use repository::consumption::ConsumptionRepository;
pub use repository::ledger::{DateRange, LedgerHistory, LedgerRepository};
pub use repository::lot::LotRepository;
pub use repository::product::ProductRepository;
pub use repository::reconciliation::ReconciliationRepository;
pub use repository::valuation::ValuationRepository;
