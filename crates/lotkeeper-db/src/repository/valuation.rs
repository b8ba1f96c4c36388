//! # Valuation Repository
//!
//! Read-side aggregates over live lots: weighted average cost and on-hand
//! quantity/value. Aggregation runs in SQL; the division stays in
//! `lotkeeper_core::valuation` so rounding is decided in one place.

use lotkeeper_core::validation::{validate_reference, validate_uuid};
use lotkeeper_core::valuation::{average_from_totals, OnHandValuation};
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use crate::repository::product;

/// Repository for inventory valuation.
#[derive(Debug, Clone)]
pub struct ValuationRepository {
    pool: SqlitePool,
}

impl ValuationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ValuationRepository { pool }
    }

    /// Σ(remaining × cost) / Σ(remaining), zero when nothing is on hand.
    ///
    /// Fails with `ProductNotFound` for an unregistered product.
    pub async fn weighted_average_cost(
        &self,
        product_id: &str,
        location_id: Option<&str>,
    ) -> DbResult<Decimal> {
        validate_uuid("product_id", product_id)?;
        if let Some(location) = location_id {
            validate_reference("location_id", location)?;
        }

        let mut conn = self.pool.acquire().await?;
        product::ensure_exists_in(&mut *conn, product_id).await?;
        average_cost_in(&mut *conn, product_id, location_id).await
    }

    /// Quantity and value on hand per product, optionally filtered.
    ///
    /// Products with nothing on hand are omitted.
    pub async fn on_hand_valuation(
        &self,
        product_id: Option<&str>,
        location_id: Option<&str>,
    ) -> DbResult<Vec<OnHandValuation>> {
        let rows = sqlx::query_as::<_, OnHandValuation>(
            r#"
            SELECT product_id,
                   SUM(quantity_remaining) AS quantity,
                   SUM(quantity_remaining * unit_cost_cents) AS value_cents
            FROM cost_lots
            WHERE quantity_remaining > 0
              AND (?1 IS NULL OR product_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
            GROUP BY product_id
            ORDER BY product_id
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Weighted average on a connection that may be inside a transaction.
pub(crate) async fn average_cost_in(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: Option<&str>,
) -> DbResult<Decimal> {
    let (quantity, value): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(quantity_remaining), 0),
               COALESCE(SUM(quantity_remaining * unit_cost_cents), 0)
        FROM cost_lots
        WHERE product_id = ?1
          AND quantity_remaining > 0
          AND (?2 IS NULL OR location_id = ?2)
        "#,
    )
    .bind(product_id)
    .bind(location_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(average_from_totals(value, quantity))
}
