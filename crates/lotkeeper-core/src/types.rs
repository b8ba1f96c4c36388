//! # Domain Types
//!
//! Core domain types used throughout Lotkeeper.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌───────────────────┐   ┌─────────────────┐     │
//! │  │    CostLot      │◄──│ ConsumptionRecord │   │   LedgerEntry   │     │
//! │  │  ─────────────  │   │  ───────────────  │   │  ─────────────  │     │
//! │  │  id (i64)       │   │  lot_id (FK)      │   │  direction ±1   │     │
//! │  │  unit_cost      │   │  outbound ref     │   │  reference_kind │     │
//! │  │  qty init/rem   │   │  reversed_at      │   │  subtotal_cost  │     │
//! │  └─────────────────┘   └───────────────────┘   └─────────────────┘     │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌───────────────────┐   ┌─────────────────┐     │
//! │  │   LotSource     │   │   ReferenceKind   │   │  OutboundKind   │     │
//! │  │  PURCHASE_...   │──►│  GR, SALE, ...    │◄──│  SALE, ...      │     │
//! │  └─────────────────┘   └───────────────────┘   └─────────────────┘     │
//! │                                                                         │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐           │
//! │  │  ReconciliationSession   │◄──│   ReconciliationLine     │           │
//! │  │  DRAFT → APPLIED         │   │  system_qty, physical    │           │
//! │  └──────────────────────────┘   └──────────────────────────┘           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Products are referenced by UUID strings owned by master data. Lots,
//! consumption records, ledger entries and reconciliation rows use
//! monotonically increasing integer ids: the id is the FIFO tie-break for
//! lots received at the same instant, and the ledger's secondary sort key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Direction
// =============================================================================

/// Direction of a stock movement. Stored as `+1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// `+1` for inbound, `-1` for outbound.
    #[inline]
    pub const fn sign(&self) -> i64 {
        match self {
            Direction::Inbound => 1,
            Direction::Outbound => -1,
        }
    }
}

impl TryFrom<i64> for Direction {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Direction::Inbound),
            -1 => Ok(Direction::Outbound),
            other => Err(ValidationError::InvalidFormat {
                field: "direction".to_string(),
                reason: format!("expected 1 or -1, got {}", other),
            }),
        }
    }
}

// =============================================================================
// Reference Kind
// =============================================================================

/// What caused a ledger movement.
///
/// ## Direction Normalization
/// Every kind has exactly one direction. Voids and destructions are the
/// inverse of the operation they relate to, not a second instance of it:
/// ```text
/// SALE            → outbound      SALE_VOID        → inbound (compensation)
/// DESTROY         → outbound      RECON_ADJUST_OUT → outbound
/// GR              → inbound       RECON_ADJUST_IN  → inbound
/// INITIAL_STOCK   → inbound       IMPORT_OPENING   → inbound
/// ADJUSTMENT_IN   → inbound
/// ```
/// The ledger writes `direction()` at append time and reporting reads it
/// back through the same function, so the two can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceKind {
    /// Goods receipt against a purchase.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "GR"))]
    #[serde(rename = "GR")]
    GoodsReceipt,
    InitialStock,
    ImportOpening,
    AdjustmentIn,
    ReconAdjustIn,
    ReconAdjustOut,
    Sale,
    SaleVoid,
    Destroy,
}

impl ReferenceKind {
    /// The fixed direction of this kind.
    pub const fn direction(&self) -> Direction {
        match self {
            ReferenceKind::GoodsReceipt
            | ReferenceKind::InitialStock
            | ReferenceKind::ImportOpening
            | ReferenceKind::AdjustmentIn
            | ReferenceKind::ReconAdjustIn
            | ReferenceKind::SaleVoid => Direction::Inbound,
            ReferenceKind::ReconAdjustOut | ReferenceKind::Sale | ReferenceKind::Destroy => {
                Direction::Outbound
            }
        }
    }

    /// Storage/wire code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::GoodsReceipt => "GR",
            ReferenceKind::InitialStock => "INITIAL_STOCK",
            ReferenceKind::ImportOpening => "IMPORT_OPENING",
            ReferenceKind::AdjustmentIn => "ADJUSTMENT_IN",
            ReferenceKind::ReconAdjustIn => "RECON_ADJUST_IN",
            ReferenceKind::ReconAdjustOut => "RECON_ADJUST_OUT",
            ReferenceKind::Sale => "SALE",
            ReferenceKind::SaleVoid => "SALE_VOID",
            ReferenceKind::Destroy => "DESTROY",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GR" => Ok(ReferenceKind::GoodsReceipt),
            "INITIAL_STOCK" => Ok(ReferenceKind::InitialStock),
            "IMPORT_OPENING" => Ok(ReferenceKind::ImportOpening),
            "ADJUSTMENT_IN" => Ok(ReferenceKind::AdjustmentIn),
            "RECON_ADJUST_IN" => Ok(ReferenceKind::ReconAdjustIn),
            "RECON_ADJUST_OUT" => Ok(ReferenceKind::ReconAdjustOut),
            "SALE" => Ok(ReferenceKind::Sale),
            "SALE_VOID" => Ok(ReferenceKind::SaleVoid),
            "DESTROY" => Ok(ReferenceKind::Destroy),
            other => Err(ValidationError::InvalidFormat {
                field: "reference_kind".to_string(),
                reason: format!("unknown kind '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Lot Source
// =============================================================================

/// Where a cost lot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotSource {
    PurchaseReceipt,
    InitialStock,
    ImportOpening,
    AdjustmentIn,
    ReconciliationIn,
}

impl LotSource {
    /// The inbound ledger kind recorded when a lot of this source opens.
    pub const fn ledger_kind(&self) -> ReferenceKind {
        match self {
            LotSource::PurchaseReceipt => ReferenceKind::GoodsReceipt,
            LotSource::InitialStock => ReferenceKind::InitialStock,
            LotSource::ImportOpening => ReferenceKind::ImportOpening,
            LotSource::AdjustmentIn => ReferenceKind::AdjustmentIn,
            LotSource::ReconciliationIn => ReferenceKind::ReconAdjustIn,
        }
    }
}

// =============================================================================
// Outbound Reference
// =============================================================================

/// What an outbound movement is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundKind {
    Sale,
    ReconciliationOut,
    Destroy,
}

impl OutboundKind {
    /// Ledger kind written for each lot consumed.
    pub const fn ledger_kind(&self) -> ReferenceKind {
        match self {
            OutboundKind::Sale => ReferenceKind::Sale,
            OutboundKind::ReconciliationOut => ReferenceKind::ReconAdjustOut,
            OutboundKind::Destroy => ReferenceKind::Destroy,
        }
    }

    /// Ledger kind written when the consumption is reversed.
    pub const fn compensation_kind(&self) -> ReferenceKind {
        match self {
            OutboundKind::Sale => ReferenceKind::SaleVoid,
            OutboundKind::ReconciliationOut => ReferenceKind::ReconAdjustIn,
            OutboundKind::Destroy => ReferenceKind::AdjustmentIn,
        }
    }
}

/// Identifies one outbound movement: a sale (optionally one sale line),
/// a reconciliation session, or a destruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OutboundRef {
    pub kind: OutboundKind,
    pub reference_id: String,
    /// Sale line id; `None` for whole-document references.
    pub line_id: Option<String>,
}

impl OutboundRef {
    /// A sale line.
    pub fn sale_line(sale_id: impl Into<String>, line_id: impl Into<String>) -> Self {
        OutboundRef {
            kind: OutboundKind::Sale,
            reference_id: sale_id.into(),
            line_id: Some(line_id.into()),
        }
    }

    /// A whole sale. Used to void every line at once.
    pub fn sale(sale_id: impl Into<String>) -> Self {
        OutboundRef {
            kind: OutboundKind::Sale,
            reference_id: sale_id.into(),
            line_id: None,
        }
    }

    /// Shortage posted by a reconciliation session.
    pub fn reconciliation(session_id: i64) -> Self {
        OutboundRef {
            kind: OutboundKind::ReconciliationOut,
            reference_id: session_id.to_string(),
            line_id: None,
        }
    }

    /// Administrative destruction.
    pub fn destroy(reference_id: impl Into<String>) -> Self {
        OutboundRef {
            kind: OutboundKind::Destroy,
            reference_id: reference_id.into(),
            line_id: None,
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product as seen by the engine. Master data is owned elsewhere;
/// `stock` is a derived cache of the lot sum.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit.
    pub sku: String,

    pub name: String,

    /// Cached Σ(quantity_remaining) over this product's lots.
    pub stock: i64,

    /// Inactive products are skipped by reconciliation snapshots.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Cost Lot
// =============================================================================

/// Per-unit cost components of a receipt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnitCostComponents {
    pub purchase_price_cents: i64,
    pub tax_cents: i64,
    pub other_cost_cents: i64,
}

impl UnitCostComponents {
    /// Components with only a purchase price.
    pub const fn purchase_price(cents: i64) -> Self {
        UnitCostComponents {
            purchase_price_cents: cents,
            tax_cents: 0,
            other_cost_cents: 0,
        }
    }

    /// Landed unit cost: purchase price + tax + other cost.
    #[inline]
    pub const fn landed(&self) -> Money {
        Money::from_cents(self.purchase_price_cents + self.tax_cents + self.other_cost_cents)
    }
}

/// One receipt of goods at a known unit cost.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CostLot {
    pub id: i64,
    pub product_id: String,
    pub location_id: Option<String>,
    pub source_kind: LotSource,
    pub source_ref: String,
    pub purchase_price_cents: i64,
    pub tax_cents: i64,
    pub other_cost_cents: i64,
    /// Landed cost, fixed at creation.
    pub unit_cost_cents: i64,
    pub quantity_initial: i64,
    pub quantity_remaining: i64,
    /// FIFO order key.
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CostLot {
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// Units taken out of this lot and not yet given back.
    #[inline]
    pub fn consumed(&self) -> i64 {
        self.quantity_initial - self.quantity_remaining
    }

    /// remaining × unit cost.
    #[inline]
    pub fn remaining_value(&self) -> Money {
        self.unit_cost().multiply_quantity(self.quantity_remaining)
    }
}

/// Input for opening a lot.
#[derive(Debug, Clone)]
pub struct NewLot {
    pub product_id: String,
    pub quantity: i64,
    pub costs: UnitCostComponents,
    pub source_kind: LotSource,
    pub source_ref: String,
    pub location_id: Option<String>,
    /// Receipt time; defaults to now. Backdated opening stock sorts first.
    pub received_at: Option<DateTime<Utc>>,
}

impl NewLot {
    /// A purchase receipt with defaults for the optional fields.
    pub fn purchase(
        product_id: impl Into<String>,
        quantity: i64,
        costs: UnitCostComponents,
        receipt_ref: impl Into<String>,
    ) -> Self {
        NewLot {
            product_id: product_id.into(),
            quantity,
            costs,
            source_kind: LotSource::PurchaseReceipt,
            source_ref: receipt_ref.into(),
            location_id: None,
            received_at: None,
        }
    }

    /// Sets the location.
    pub fn at_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    /// Sets the receipt time.
    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = Some(at);
        self
    }
}

// =============================================================================
// Consumption
// =============================================================================

/// Input for FIFO consumption.
#[derive(Debug, Clone)]
pub struct ConsumeRequest {
    pub product_id: String,
    pub quantity: i64,
    /// Preferred location; see the lot store for fallback rules.
    pub location_id: Option<String>,
    pub outbound: OutboundRef,
    /// Selling price per unit, recorded on SALE ledger rows.
    pub unit_sale_price_cents: Option<i64>,
}

impl ConsumeRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64, outbound: OutboundRef) -> Self {
        ConsumeRequest {
            product_id: product_id.into(),
            quantity,
            location_id: None,
            outbound,
            unit_sale_price_cents: None,
        }
    }

    pub fn at_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    pub fn with_sale_price(mut self, cents: i64) -> Self {
        self.unit_sale_price_cents = Some(cents);
        self
    }
}

/// One slice of a FIFO consumption: units taken from a lot at its cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Allocation {
    pub lot_id: i64,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

impl Allocation {
    /// quantity × unit cost.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents).multiply_quantity(self.quantity)
    }
}

/// "This outbound movement took N units from this lot at this lot's cost."
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ConsumptionRecord {
    pub id: i64,
    pub product_id: String,
    pub lot_id: i64,
    pub outbound_kind: OutboundKind,
    pub outbound_ref: String,
    pub outbound_line_ref: Option<String>,
    pub quantity: i64,
    /// Copied from the lot when consumed.
    pub unit_cost_cents: i64,
    /// Selling price per unit, for sales; carried onto the void entry.
    pub unit_sale_price_cents: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub reversed_at: Option<DateTime<Utc>>,
}

impl ConsumptionRecord {
    #[inline]
    pub fn is_reversed(&self) -> bool {
        self.reversed_at.is_some()
    }
}

/// Outcome of reversing an outbound reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReversalSummary {
    pub records_reversed: u32,
    pub quantity_restored: i64,
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// Append-only record of one quantity movement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    pub id: i64,
    pub product_id: String,
    pub location_id: Option<String>,
    pub lot_id: Option<i64>,
    /// Stored direction (`+1`/`-1`).
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "i64"))]
    pub direction: Direction,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub unit_sale_price_cents: Option<i64>,
    pub subtotal_cost_cents: i64,
    pub reference_kind: ReferenceKind,
    pub reference_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Direction from the kind, independent of the stored value.
    #[inline]
    pub fn normalized_direction(&self) -> Direction {
        self.reference_kind.direction()
    }

    /// quantity × normalized sign.
    #[inline]
    pub fn signed_quantity(&self) -> i64 {
        self.quantity * self.normalized_direction().sign()
    }

    /// subtotal cost × normalized sign.
    #[inline]
    pub fn signed_subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cost_cents * self.normalized_direction().sign())
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Status of a reconciliation session. `Applied` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    #[default]
    Draft,
    Applied,
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationStatus::Draft => write!(f, "DRAFT"),
            ReconciliationStatus::Applied => write!(f, "APPLIED"),
        }
    }
}

/// A counting exercise for one location over a period.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReconciliationSession {
    pub id: i64,
    pub location_id: String,
    pub status: ReconciliationStatus,
    #[ts(as = "String")]
    pub period_start: DateTime<Utc>,
    #[ts(as = "String")]
    pub period_end: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// When system quantities were last captured.
    #[ts(as = "String")]
    pub snapshot_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub applied_at: Option<DateTime<Utc>>,
    pub applied_by: Option<String>,
}

/// Per-product line of a session.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReconciliationLine {
    pub id: i64,
    pub session_id: i64,
    pub product_id: String,
    /// Live lot sum at snapshot time.
    pub system_qty: i64,
    /// Weighted average unit cost at snapshot time, in whole cents.
    pub avg_cost_cents: i64,
    /// Counted quantity; `None` until entered, and such lines are skipped.
    pub physical_qty: Option<i64>,
}

impl ReconciliationLine {
    /// physical − system, if counted.
    #[inline]
    pub fn diff(&self) -> Option<i64> {
        self.physical_qty.map(|p| p - self.system_qty)
    }

    #[inline]
    pub fn avg_cost(&self) -> Money {
        Money::from_cents(self.avg_cost_cents)
    }
}

/// A session with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciliationDetail {
    pub session: ReconciliationSession,
    pub lines: Vec<ReconciliationLine>,
}

/// What an apply changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciliationOutcome {
    pub session_id: i64,
    pub lines_applied: u32,
    pub surplus_units: i64,
    pub shortage_units: i64,
    pub touched_products: Vec<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
