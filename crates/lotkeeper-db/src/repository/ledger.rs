//! # Stock Ledger Repository
//!
//! Append-only movement history and the reports built on it.
//!
//! ## Write Path
//! Only the engine appends, from inside its own transactions, through
//! [`append_in`]. The direction column is always `reference_kind.direction()`;
//! callers cannot choose it. UPDATE and DELETE are refused by triggers.
//!
//! ## Read Path
//! ```text
//! history(product, location?, range?)
//!   │
//!   ├── entries before range.start → opening balance (quantity, value)
//!   │
//!   └── entries in range, ORDER BY created_at, id
//!          │
//!          ▼
//!       running_balance(opening, entries)  ← normalized direction
//! ```

use chrono::{DateTime, Utc};
use lotkeeper_core::valuation::{self, GrossMargin, LedgerLine};
use lotkeeper_core::validation::{validate_period, validate_uuid};
use lotkeeper_core::{LedgerEntry, Money, ReferenceKind};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::DbResult;

const LEDGER_COLUMNS: &str = "id, product_id, location_id, lot_id, direction, quantity, \
     unit_cost_cents, unit_sale_price_cents, subtotal_cost_cents, reference_kind, \
     reference_id, created_at";

/// Inclusive time window for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        DateRange { start, end }
    }
}

/// Ledger history with the balance carried in from before the range.
#[derive(Debug, Clone)]
pub struct LedgerHistory {
    pub product_id: String,
    pub opening_balance: i64,
    pub opening_value: Money,
    pub lines: Vec<LedgerLine>,
}

impl LedgerHistory {
    /// Balance after the last line (or the opening balance).
    pub fn closing_balance(&self) -> i64 {
        self.lines
            .last()
            .map(|l| l.running_balance)
            .unwrap_or(self.opening_balance)
    }
}

/// A movement to append. Direction and subtotal are derived.
#[derive(Debug, Clone)]
pub(crate) struct NewLedgerEntry<'a> {
    pub product_id: &'a str,
    pub location_id: Option<&'a str>,
    pub lot_id: Option<i64>,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub unit_sale_price_cents: Option<i64>,
    pub reference_kind: ReferenceKind,
    pub reference_id: &'a str,
}

/// Appends one ledger row and returns its id.
pub(crate) async fn append_in(conn: &mut SqliteConnection, entry: NewLedgerEntry<'_>) -> DbResult<i64> {
    let direction = entry.reference_kind.direction();
    let subtotal = Money::from_cents(entry.unit_cost_cents).multiply_quantity(entry.quantity);

    let result = sqlx::query(
        r#"
        INSERT INTO stock_ledger (
            product_id, location_id, lot_id, direction, quantity,
            unit_cost_cents, unit_sale_price_cents, subtotal_cost_cents,
            reference_kind, reference_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(entry.product_id)
    .bind(entry.location_id)
    .bind(entry.lot_id)
    .bind(direction.sign())
    .bind(entry.quantity)
    .bind(entry.unit_cost_cents)
    .bind(entry.unit_sale_price_cents)
    .bind(subtotal.cents())
    .bind(entry.reference_kind)
    .bind(entry.reference_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %entry.product_id,
        kind = %entry.reference_kind,
        qty = entry.quantity,
        unit_cost = entry.unit_cost_cents,
        "Ledger entry appended"
    );

    Ok(result.last_insert_rowid())
}

/// Repository for reading the stock ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Entries for a product in `(created_at, id)` order with running
    /// balances. With a range, the balance starts from everything before
    /// `range.start`.
    pub async fn history(
        &self,
        product_id: &str,
        location_id: Option<&str>,
        range: Option<DateRange>,
    ) -> DbResult<LedgerHistory> {
        validate_uuid("product_id", product_id)?;
        if let Some(r) = range {
            validate_period(r.start, r.end)?;
        }

        let (opening_balance, opening_value): (i64, Money) = match range {
            Some(r) => {
                let before = self
                    .fetch(product_id, location_id, None, Some(r.start), None)
                    .await?;
                (
                    before.iter().map(LedgerEntry::signed_quantity).sum(),
                    valuation::reconstructed_value(&before),
                )
            }
            None => (0, Money::zero()),
        };

        let entries = self
            .fetch(
                product_id,
                location_id,
                range.map(|r| r.start),
                None,
                range.map(|r| r.end),
            )
            .await?;

        for e in entries.iter().filter(|e| e.direction != e.normalized_direction()) {
            warn!(
                entry_id = e.id,
                kind = %e.reference_kind,
                stored = e.direction.sign(),
                "Stored ledger direction disagrees with its kind; using the kind"
            );
        }

        debug!(product_id = %product_id, count = entries.len(), opening_balance, "Ledger history loaded");

        Ok(LedgerHistory {
            product_id: product_id.to_string(),
            opening_balance,
            opening_value,
            lines: valuation::running_balance(opening_balance, opening_value, entries),
        })
    }

    /// Σ(direction × subtotal) over the whole history.
    pub async fn reconstructed_value(&self, product_id: &str, location_id: Option<&str>) -> DbResult<Money> {
        let entries = self.fetch(product_id, location_id, None, None, None).await?;
        Ok(valuation::reconstructed_value(&entries))
    }

    /// Revenue, COGS and margin from sales net of voids.
    pub async fn gross_margin(&self, product_id: &str, range: Option<DateRange>) -> DbResult<GrossMargin> {
        validate_uuid("product_id", product_id)?;
        if let Some(r) = range {
            validate_period(r.start, r.end)?;
        }

        let entries = self
            .fetch(
                product_id,
                None,
                range.map(|r| r.start),
                None,
                range.map(|r| r.end),
            )
            .await?;

        Ok(valuation::gross_margin(product_id, &entries))
    }

    /// Entries written for a reference (e.g. all rows of one sale).
    pub async fn for_reference(&self, kind: ReferenceKind, reference_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM stock_ledger \
             WHERE reference_kind = ?1 AND reference_id = ?2 ORDER BY id"
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(kind)
            .bind(reference_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// `from` inclusive, `before` exclusive, `until` inclusive.
    async fn fetch(
        &self,
        product_id: &str,
        location_id: Option<&str>,
        from: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            r#"
            SELECT {LEDGER_COLUMNS}
            FROM stock_ledger
            WHERE product_id = ?1
              AND (?2 IS NULL OR location_id = ?2)
              AND (?3 IS NULL OR created_at >= ?3)
              AND (?4 IS NULL OR created_at < ?4)
              AND (?5 IS NULL OR created_at <= ?5)
            ORDER BY created_at, id
            "#
        );

        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(product_id)
            .bind(location_id)
            .bind(from)
            .bind(before)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }
}
