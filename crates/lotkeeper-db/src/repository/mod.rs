//! # Repository Module
//!
//! Database repositories for the inventory engine.
//!
//! ## Who Writes What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LotRepository             ReconciliationRepository                     │
//! │  open / consume / reverse  create / resnapshot / apply                  │
//! │       │                          │                                      │
//! │       │   (apply reuses the lot store's *_in helpers                    │
//! │       │    inside its own transaction)                                  │
//! │       ▼                          ▼                                      │
//! │  cost_lots ── consumption_records ── stock_ledger ── products.stock     │
//! │                                                                         │
//! │  Read-only: ConsumptionRepository, LedgerRepository,                    │
//! │             ValuationRepository                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Helpers suffixed `_in` take a `&mut SqliteConnection` that is already
//! inside a transaction holding the write lock. Public methods open the
//! transaction, take the lock with their first write, and commit.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - product master data and stock resync
//! - [`LotRepository`](lot::LotRepository) - cost lots and FIFO consumption
//! - [`ConsumptionRepository`](consumption::ConsumptionRepository) - lot ↔ outbound history
//! - [`LedgerRepository`](ledger::LedgerRepository) - movement history and margin
//! - [`ValuationRepository`](valuation::ValuationRepository) - average cost and on-hand value
//! - [`ReconciliationRepository`](reconciliation::ReconciliationRepository) - counting sessions

pub mod consumption;
pub mod ledger;
pub mod lot;
pub mod product;
pub mod reconciliation;
pub mod valuation;

#[cfg(test)]
pub(crate) mod invariants;
