//! # Consumption Repository
//!
//! Which lot satisfied which outbound movement, and whether that has been
//! reversed. Rows are never deleted; a void only stamps `reversed_at`.
//!
//! ```text
//! consume(S-1 line 1, 8 units)          reverse(S-1)
//!   ├── #1  lot L1  5 @100                ├── #1  reversed_at = t
//!   └── #2  lot L2  3 @120                └── #2  reversed_at = t
//! ```
//!
//! Per lot: Σ(quantity of unreversed rows) = initial − remaining.

use chrono::{DateTime, Utc};
use lotkeeper_core::{ConsumptionRecord, OutboundRef};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;

const CONSUMPTION_COLUMNS: &str = "id, product_id, lot_id, outbound_kind, outbound_ref, \
     outbound_line_ref, quantity, unit_cost_cents, unit_sale_price_cents, created_at, reversed_at";

/// Input for a consumption row.
#[derive(Debug, Clone)]
pub(crate) struct NewConsumption<'a> {
    pub product_id: &'a str,
    pub lot_id: i64,
    pub outbound: &'a OutboundRef,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub unit_sale_price_cents: Option<i64>,
}

pub(crate) async fn insert_in(conn: &mut SqliteConnection, row: NewConsumption<'_>) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO consumption_records (
            product_id, lot_id, outbound_kind, outbound_ref, outbound_line_ref,
            quantity, unit_cost_cents, unit_sale_price_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(row.product_id)
    .bind(row.lot_id)
    .bind(row.outbound.kind)
    .bind(&row.outbound.reference_id)
    .bind(row.outbound.line_id.as_deref())
    .bind(row.quantity)
    .bind(row.unit_cost_cents)
    .bind(row.unit_sale_price_cents)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Unreversed rows matching an outbound reference, oldest first.
///
/// A reference without a line id matches every line of the document.
pub(crate) async fn unreversed_in(
    conn: &mut SqliteConnection,
    outbound: &OutboundRef,
) -> DbResult<Vec<ConsumptionRecord>> {
    let sql = format!(
        r#"
        SELECT {CONSUMPTION_COLUMNS}
        FROM consumption_records
        WHERE outbound_kind = ?1
          AND outbound_ref = ?2
          AND (?3 IS NULL OR outbound_line_ref = ?3)
          AND reversed_at IS NULL
        ORDER BY id
        "#
    );

    let rows = sqlx::query_as::<_, ConsumptionRecord>(&sql)
        .bind(outbound.kind)
        .bind(&outbound.reference_id)
        .bind(outbound.line_id.as_deref())
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows)
}

/// Stamps the reversal time. Returns false if the row was already reversed.
pub(crate) async fn mark_reversed_in(
    conn: &mut SqliteConnection,
    id: i64,
    at: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE consumption_records SET reversed_at = ?2 WHERE id = ?1 AND reversed_at IS NULL",
    )
    .bind(id)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Repository for reading consumption history.
#[derive(Debug, Clone)]
pub struct ConsumptionRepository {
    pool: SqlitePool,
}

impl ConsumptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ConsumptionRepository { pool }
    }

    /// All rows (reversed or not) for an outbound reference.
    pub async fn for_outbound(&self, outbound: &OutboundRef) -> DbResult<Vec<ConsumptionRecord>> {
        let sql = format!(
            r#"
            SELECT {CONSUMPTION_COLUMNS}
            FROM consumption_records
            WHERE outbound_kind = ?1
              AND outbound_ref = ?2
              AND (?3 IS NULL OR outbound_line_ref = ?3)
            ORDER BY id
            "#
        );

        let rows = sqlx::query_as::<_, ConsumptionRecord>(&sql)
            .bind(outbound.kind)
            .bind(&outbound.reference_id)
            .bind(outbound.line_id.as_deref())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// All rows that drew from a lot.
    pub async fn for_lot(&self, lot_id: i64) -> DbResult<Vec<ConsumptionRecord>> {
        let sql = format!(
            "SELECT {CONSUMPTION_COLUMNS} FROM consumption_records WHERE lot_id = ?1 ORDER BY id"
        );

        let rows = sqlx::query_as::<_, ConsumptionRecord>(&sql)
            .bind(lot_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Σ(quantity) of unreversed rows on a lot.
    pub async fn outstanding_for_lot(&self, lot_id: i64) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM consumption_records \
             WHERE lot_id = ?1 AND reversed_at IS NULL",
        )
        .bind(lot_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
