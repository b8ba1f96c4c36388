//! # Cost Lot Repository
//!
//! The cost lot store: opening lots, FIFO consumption, reversal of
//! consumption, and the administrative destroy.
//!
//! ## Consume Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE products SET lock_version + 1      ← takes the write lock     │
//! │    SELECT lots WHERE remaining > 0           ← location first,          │
//! │           ORDER BY received_at, id             then unscoped fallback   │
//! │    plan_fifo(lots, qty)                      ← InsufficientStock? abort │
//! │    per allocation:                                                      │
//! │      UPDATE cost_lots remaining -= take                                 │
//! │      INSERT consumption_records                                        │
//! │      INSERT stock_ledger (-1, lot cost)                                 │
//! │      UPDATE products stock -= take                                      │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The plan is computed before the first lot write, so an insufficient
//! request leaves nothing behind even before rollback.

use chrono::Utc;
use lotkeeper_core::fifo::{plan_fifo, restorable_quantity};
use lotkeeper_core::validation::{
    validate_cost_components, validate_quantity, validate_reference, validate_sale_price_cents,
    validate_uuid,
};
use lotkeeper_core::{
    Allocation, ConsumeRequest, CoreError, CostLot, NewLot, OutboundRef, ReversalSummary,
};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::EnginePolicy;
use crate::repository::consumption::{self, NewConsumption};
use crate::repository::ledger::{self, NewLedgerEntry};
use crate::repository::product;

const LOT_COLUMNS: &str = "id, product_id, location_id, source_kind, source_ref, \
     purchase_price_cents, tax_cents, other_cost_cents, unit_cost_cents, \
     quantity_initial, quantity_remaining, received_at, created_at";

/// Repository for cost lots.
#[derive(Debug, Clone)]
pub struct LotRepository {
    pool: SqlitePool,
    policy: EnginePolicy,
}

impl LotRepository {
    pub fn new(pool: SqlitePool, policy: EnginePolicy) -> Self {
        LotRepository { pool, policy }
    }

    /// Opens a lot for an inbound movement.
    ///
    /// ## Returns
    /// * `Ok(Some(lot_id))` - lot, ledger row and stock cache written
    /// * `Ok(None)` - quantity was zero; nothing written
    /// * `Err(..)` - negative quantity, unknown product, bad costs
    pub async fn open_lot(&self, lot: NewLot) -> DbResult<Option<i64>> {
        if lot.quantity == 0 {
            debug!(product_id = %lot.product_id, "Zero-quantity receipt ignored");
            return Ok(None);
        }
        validate_new_lot(&lot)?;

        let mut tx = self.pool.begin().await?;
        product::lock_in(&mut *tx, &lot.product_id).await?;
        let lot_id = open_lot_in(&mut *tx, &lot).await?;
        tx.commit().await?;

        info!(
            lot_id,
            product_id = %lot.product_id,
            qty = lot.quantity,
            unit_cost = lot.costs.landed().cents(),
            source = ?lot.source_kind,
            "Cost lot opened"
        );
        Ok(Some(lot_id))
    }

    /// Consumes `quantity` units oldest-lot-first.
    ///
    /// Fails with `InsufficientStock` (and writes nothing) if the eligible
    /// lots cannot cover the whole request.
    pub async fn consume(&self, request: ConsumeRequest) -> DbResult<Vec<Allocation>> {
        validate_consume(&request)?;

        let mut tx = self.pool.begin().await?;
        product::lock_in(&mut *tx, &request.product_id).await?;
        let allocations = consume_in(&mut *tx, &request, self.policy.location_fallback, None).await?;
        tx.commit().await?;

        info!(
            product_id = %request.product_id,
            qty = request.quantity,
            lots = allocations.len(),
            outbound = %request.outbound.reference_id,
            "FIFO consumption committed"
        );
        Ok(allocations)
    }

    /// Reverses every unreversed consumption of `outbound`.
    ///
    /// Safe to call repeatedly: already-reversed rows are skipped, so the
    /// second call returns an empty summary.
    pub async fn reverse(&self, outbound: &OutboundRef) -> DbResult<ReversalSummary> {
        validate_reference("outbound_ref", &outbound.reference_id)?;

        let mut tx = self.pool.begin().await?;

        // lock every product this reference touched before reading lots
        let locked = sqlx::query(
            r#"
            UPDATE products SET lock_version = lock_version + 1
            WHERE id IN (
                SELECT product_id FROM consumption_records
                WHERE outbound_kind = ?1
                  AND outbound_ref = ?2
                  AND (?3 IS NULL OR outbound_line_ref = ?3)
                  AND reversed_at IS NULL
            )
            "#,
        )
        .bind(outbound.kind)
        .bind(&outbound.reference_id)
        .bind(outbound.line_id.as_deref())
        .execute(&mut *tx)
        .await?;

        if locked.rows_affected() == 0 {
            tx.commit().await?;
            debug!(outbound = %outbound.reference_id, "Nothing to reverse");
            return Ok(ReversalSummary::default());
        }

        let summary = reverse_in(&mut *tx, outbound).await?;
        tx.commit().await?;

        info!(
            outbound = %outbound.reference_id,
            kind = ?outbound.kind,
            records = summary.records_reversed,
            restored = summary.quantity_restored,
            "Consumption reversed"
        );
        Ok(summary)
    }

    /// Zeroes a lot's remainder through a `DESTROY` consumption.
    ///
    /// The lot row stays (at zero) so its consumption history still
    /// resolves; reversing `OutboundRef::destroy(reference)` restores it.
    /// Returns the quantity destroyed (0 if the lot was already empty).
    pub async fn destroy_remaining(&self, lot_id: i64, reference: &str) -> DbResult<i64> {
        validate_reference("reference", reference)?;

        let product_id: Option<String> = sqlx::query_scalar("SELECT product_id FROM cost_lots WHERE id = ?1")
            .bind(lot_id)
            .fetch_optional(&self.pool)
            .await?;
        let product_id = product_id.ok_or(CoreError::LotNotFound(lot_id))?;

        let mut tx = self.pool.begin().await?;
        product::lock_in(&mut *tx, &product_id).await?;

        let lot = fetch_lot_in(&mut *tx, lot_id).await?;
        if lot.quantity_remaining == 0 {
            tx.commit().await?;
            return Ok(0);
        }

        let outbound = OutboundRef::destroy(reference);
        let allocation = Allocation {
            lot_id,
            quantity: lot.quantity_remaining,
            unit_cost_cents: lot.unit_cost_cents,
        };
        take_from_lot_in(&mut *tx, &lot, &allocation, &outbound, None, None).await?;
        tx.commit().await?;

        warn!(
            lot_id,
            product_id = %product_id,
            qty = allocation.quantity,
            value = %allocation.cost(),
            "Lot remainder destroyed"
        );
        Ok(allocation.quantity)
    }

    /// Gets a lot by id.
    pub async fn get(&self, lot_id: i64) -> DbResult<Option<CostLot>> {
        let sql = format!("SELECT {LOT_COLUMNS} FROM cost_lots WHERE id = ?1");
        let lot = sqlx::query_as::<_, CostLot>(&sql)
            .bind(lot_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lot)
    }

    /// Lots of a product in FIFO order, including empty ones.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<CostLot>> {
        let sql = format!(
            "SELECT {LOT_COLUMNS} FROM cost_lots WHERE product_id = ?1 ORDER BY received_at, id"
        );
        let lots = sqlx::query_as::<_, CostLot>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(lots)
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_new_lot(lot: &NewLot) -> DbResult<()> {
    validate_uuid("product_id", &lot.product_id)?;
    validate_quantity(lot.quantity)?;
    validate_cost_components(&lot.costs)?;
    validate_reference("source_ref", &lot.source_ref)?;
    if let Some(location) = &lot.location_id {
        validate_reference("location_id", location)?;
    }
    Ok(())
}

fn validate_consume(request: &ConsumeRequest) -> DbResult<()> {
    validate_uuid("product_id", &request.product_id)?;
    validate_quantity(request.quantity)?;
    validate_reference("outbound_ref", &request.outbound.reference_id)?;
    if let Some(location) = &request.location_id {
        validate_reference("location_id", location)?;
    }
    if let Some(price) = request.unit_sale_price_cents {
        validate_sale_price_cents(price)?;
    }
    Ok(())
}

// =============================================================================
// Transaction Helpers
// =============================================================================
// Callers hold the product lock (see `product::lock_in`).

/// Inserts the lot, its inbound ledger row, and bumps the stock cache.
pub(crate) async fn open_lot_in(conn: &mut SqliteConnection, lot: &NewLot) -> DbResult<i64> {
    let now = Utc::now();
    let received_at = lot.received_at.unwrap_or(now);
    let unit_cost = lot.costs.landed();

    let result = sqlx::query(
        r#"
        INSERT INTO cost_lots (
            product_id, location_id, source_kind, source_ref,
            purchase_price_cents, tax_cents, other_cost_cents, unit_cost_cents,
            quantity_initial, quantity_remaining, received_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10, ?11)
        "#,
    )
    .bind(&lot.product_id)
    .bind(lot.location_id.as_deref())
    .bind(lot.source_kind)
    .bind(&lot.source_ref)
    .bind(lot.costs.purchase_price_cents)
    .bind(lot.costs.tax_cents)
    .bind(lot.costs.other_cost_cents)
    .bind(unit_cost.cents())
    .bind(lot.quantity)
    .bind(received_at)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    let lot_id = result.last_insert_rowid();

    ledger::append_in(
        conn,
        NewLedgerEntry {
            product_id: &lot.product_id,
            location_id: lot.location_id.as_deref(),
            lot_id: Some(lot_id),
            quantity: lot.quantity,
            unit_cost_cents: unit_cost.cents(),
            unit_sale_price_cents: None,
            reference_kind: lot.source_kind.ledger_kind(),
            reference_id: &lot.source_ref,
        },
    )
    .await?;

    product::adjust_stock_in(conn, &lot.product_id, lot.quantity).await?;

    debug!(lot_id, product_id = %lot.product_id, qty = lot.quantity, "Lot inserted");
    Ok(lot_id)
}

/// Plans and writes a FIFO consumption.
///
/// `ledger_cost_cents` replaces each lot's cost on the ledger rows only
/// (consumption rows always keep the lot cost); see `ShortageCosting`.
pub(crate) async fn consume_in(
    conn: &mut SqliteConnection,
    request: &ConsumeRequest,
    location_fallback: bool,
    ledger_cost_cents: Option<i64>,
) -> DbResult<Vec<Allocation>> {
    let product_id = request.product_id.as_str();
    let location = request.location_id.as_deref();

    let mut lots = open_lots_in(conn, product_id, location).await?;
    let mut plan = plan_fifo(product_id, &lots, request.quantity);

    let scoped_available = match &plan {
        Err(CoreError::InsufficientStock { available, .. }) => Some(*available),
        _ => None,
    };

    if let (Some(available), Some(location), true) = (scoped_available, location, location_fallback) {
        debug!(
            product_id = %product_id,
            location = %location,
            available,
            requested = request.quantity,
            "Location cannot cover request; retrying across all locations"
        );
        lots = open_lots_in(conn, product_id, None).await?;
        plan = plan_fifo(product_id, &lots, request.quantity);
    }

    let allocations = plan?;

    for allocation in &allocations {
        let lot = lots
            .iter()
            .find(|l| l.id == allocation.lot_id)
            .ok_or(CoreError::LotNotFound(allocation.lot_id))?;
        take_from_lot_in(
            conn,
            lot,
            allocation,
            &request.outbound,
            request.unit_sale_price_cents,
            ledger_cost_cents,
        )
        .await?;
    }

    Ok(allocations)
}

/// Writes one allocation: lot decrement, consumption row, ledger row,
/// stock cache.
async fn take_from_lot_in(
    conn: &mut SqliteConnection,
    lot: &CostLot,
    allocation: &Allocation,
    outbound: &OutboundRef,
    unit_sale_price_cents: Option<i64>,
    ledger_cost_cents: Option<i64>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE cost_lots
        SET quantity_remaining = quantity_remaining - ?2
        WHERE id = ?1 AND quantity_remaining >= ?2
        "#,
    )
    .bind(allocation.lot_id)
    .bind(allocation.quantity)
    .execute(&mut *conn)
    .await?;

    // the plan was made under the same lock, so this cannot miss
    if result.rows_affected() != 1 {
        return Err(DbError::Internal(format!(
            "lot {} changed underneath its lock",
            allocation.lot_id
        )));
    }

    consumption::insert_in(
        conn,
        NewConsumption {
            product_id: &lot.product_id,
            lot_id: allocation.lot_id,
            outbound,
            quantity: allocation.quantity,
            unit_cost_cents: allocation.unit_cost_cents,
            unit_sale_price_cents,
        },
    )
    .await?;

    ledger::append_in(
        conn,
        NewLedgerEntry {
            product_id: &lot.product_id,
            location_id: lot.location_id.as_deref(),
            lot_id: Some(allocation.lot_id),
            quantity: allocation.quantity,
            unit_cost_cents: ledger_cost_cents.unwrap_or(allocation.unit_cost_cents),
            unit_sale_price_cents,
            reference_kind: outbound.kind.ledger_kind(),
            reference_id: &outbound.reference_id,
        },
    )
    .await?;

    product::adjust_stock_in(conn, &lot.product_id, -allocation.quantity).await?;

    debug!(
        lot_id = allocation.lot_id,
        qty = allocation.quantity,
        unit_cost = allocation.unit_cost_cents,
        "Lot consumed"
    );
    Ok(())
}

/// Restores every unreversed consumption of `outbound`.
pub(crate) async fn reverse_in(
    conn: &mut SqliteConnection,
    outbound: &OutboundRef,
) -> DbResult<ReversalSummary> {
    let now = Utc::now();
    let mut summary = ReversalSummary::default();

    for record in consumption::unreversed_in(conn, outbound).await? {
        let lot = fetch_lot_in(conn, record.lot_id).await?;
        let restored = restorable_quantity(&lot, record.quantity);

        if restored < record.quantity {
            warn!(
                record_id = record.id,
                lot_id = lot.id,
                recorded = record.quantity,
                restored,
                "Reversal clipped at the lot's initial quantity"
            );
        }

        if restored > 0 {
            sqlx::query("UPDATE cost_lots SET quantity_remaining = quantity_remaining + ?2 WHERE id = ?1")
                .bind(lot.id)
                .bind(restored)
                .execute(&mut *conn)
                .await?;

            ledger::append_in(
                conn,
                NewLedgerEntry {
                    product_id: &record.product_id,
                    location_id: lot.location_id.as_deref(),
                    lot_id: Some(lot.id),
                    quantity: restored,
                    unit_cost_cents: record.unit_cost_cents,
                    unit_sale_price_cents: record.unit_sale_price_cents,
                    reference_kind: record.outbound_kind.compensation_kind(),
                    reference_id: &record.outbound_ref,
                },
            )
            .await?;

            product::adjust_stock_in(conn, &record.product_id, restored).await?;
        }

        if consumption::mark_reversed_in(conn, record.id, now).await? {
            summary.records_reversed += 1;
            summary.quantity_restored += restored;
        }
    }

    Ok(summary)
}

/// Lots with stock left, FIFO order, optionally for one location.
async fn open_lots_in(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: Option<&str>,
) -> DbResult<Vec<CostLot>> {
    let sql = format!(
        r#"
        SELECT {LOT_COLUMNS}
        FROM cost_lots
        WHERE product_id = ?1
          AND quantity_remaining > 0
          AND (?2 IS NULL OR location_id = ?2)
        ORDER BY received_at, id
        "#
    );

    let lots = sqlx::query_as::<_, CostLot>(&sql)
        .bind(product_id)
        .bind(location_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(lots)
}

async fn fetch_lot_in(conn: &mut SqliteConnection, lot_id: i64) -> DbResult<CostLot> {
    let sql = format!("SELECT {LOT_COLUMNS} FROM cost_lots WHERE id = ?1");
    sqlx::query_as::<_, CostLot>(&sql)
        .bind(lot_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::LotNotFound(lot_id).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::invariants;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use lotkeeper_core::{
        Direction, LotSource, Money, ReferenceKind, UnitCostComponents, MAX_MOVEMENT_QUANTITY,
        MAX_UNIT_COST_CENTS,
    };

    async fn setup_with(config: DbConfig) -> (Database, String) {
        let db = Database::new(config).await.unwrap();
        let p = db.products().register("A-1", "Apple").await.unwrap();
        (db, p.id)
    }

    async fn setup() -> (Database, String) {
        setup_with(DbConfig::in_memory()).await
    }

    async fn receive(db: &Database, pid: &str, qty: i64, cost: i64, hours_ago: i64) -> i64 {
        let lot = NewLot::purchase(pid, qty, UnitCostComponents::purchase_price(cost), "GR-1")
            .received_at(Utc::now() - Duration::hours(hours_ago));
        db.lots().open_lot(lot).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_open_then_consume() {
        let (db, pid) = setup().await;
        let lot_id = receive(&db, &pid, 10, 100, 1).await;

        let allocations = db
            .lots()
            .consume(ConsumeRequest::new(&pid, 7, OutboundRef::sale_line("S-1", "1")))
            .await
            .unwrap();
        assert_eq!(
            allocations,
            vec![Allocation { lot_id, quantity: 7, unit_cost_cents: 100 }]
        );

        let lot = db.lots().get(lot_id).await.unwrap().unwrap();
        assert_eq!(lot.quantity_remaining, 3);

        let records = db.consumptions().for_lot(lot_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!((records[0].quantity, records[0].unit_cost_cents), (7, 100));

        let history = db.ledger().history(&pid, None, None).await.unwrap();
        let moves: Vec<(i64, i64)> = history
            .lines
            .iter()
            .map(|l| (l.signed_quantity, l.entry.unit_cost_cents))
            .collect();
        assert_eq!(moves, vec![(10, 100), (-7, 100)]);
        assert_eq!(history.closing_balance(), 3);

        invariants::assert_all(&db, &pid).await;
    }

    #[tokio::test]
    async fn test_fifo_spans_lots_oldest_first() {
        let (db, pid) = setup().await;
        let l1 = receive(&db, &pid, 5, 100, 2).await;
        let l2 = receive(&db, &pid, 5, 120, 1).await;

        let allocations = db
            .lots()
            .consume(ConsumeRequest::new(&pid, 8, OutboundRef::sale_line("S-1", "1")))
            .await
            .unwrap();

        assert_eq!(
            allocations,
            vec![
                Allocation { lot_id: l1, quantity: 5, unit_cost_cents: 100 },
                Allocation { lot_id: l2, quantity: 3, unit_cost_cents: 120 },
            ]
        );
        let cogs: Money = allocations.iter().map(Allocation::cost).sum();
        assert_eq!(cogs.cents(), 860);

        invariants::assert_all(&db, &pid).await;
    }

    #[tokio::test]
    async fn test_fifo_follows_receipt_time_not_insert_order() {
        let (db, pid) = setup().await;
        let newer = receive(&db, &pid, 5, 120, 1).await;
        let older = receive(&db, &pid, 5, 100, 5).await;

        let allocations = db
            .lots()
            .consume(ConsumeRequest::new(&pid, 7, OutboundRef::sale_line("S-1", "1")))
            .await
            .unwrap();

        assert_eq!(allocations[0].lot_id, older);
        assert_eq!(allocations[0].quantity, 5);
        assert_eq!(allocations[1].lot_id, newer);
        assert_eq!(allocations[1].quantity, 2);
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let (db, pid) = setup().await;
        let lot_id = receive(&db, &pid, 10, 100, 1).await;

        let err = db
            .lots()
            .consume(ConsumeRequest::new(&pid, 100, OutboundRef::sale_line("S-1", "1")))
            .await
            .unwrap_err();
        assert!(err.is_insufficient_stock());
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 10, requested: 100, .. })
        ));

        let lot = db.lots().get(lot_id).await.unwrap().unwrap();
        assert_eq!(lot.quantity_remaining, 10);
        assert!(db.consumptions().for_lot(lot_id).await.unwrap().is_empty());
        assert_eq!(db.ledger().history(&pid, None, None).await.unwrap().lines.len(), 1);

        invariants::assert_all(&db, &pid).await;
    }

    #[tokio::test]
    async fn test_void_restores_at_recorded_cost_once() {
        let (db, pid) = setup().await;
        let lot_id = receive(&db, &pid, 10, 50, 1).await;
        db.lots()
            .consume(ConsumeRequest::new(&pid, 4, OutboundRef::sale_line("S-1", "1")).with_sale_price(80))
            .await
            .unwrap();

        let summary = db.lots().reverse(&OutboundRef::sale("S-1")).await.unwrap();
        assert_eq!(summary, ReversalSummary { records_reversed: 1, quantity_restored: 4 });

        let lot = db.lots().get(lot_id).await.unwrap().unwrap();
        assert_eq!(lot.quantity_remaining, 10);

        let records = db.consumptions().for_outbound(&OutboundRef::sale("S-1")).await.unwrap();
        assert!(records.iter().all(|r| r.is_reversed()));

        let voids = db.ledger().for_reference(ReferenceKind::SaleVoid, "S-1").await.unwrap();
        assert_eq!(voids.len(), 1);
        assert_eq!(voids[0].direction, Direction::Inbound);
        assert_eq!((voids[0].quantity, voids[0].unit_cost_cents), (4, 50));
        assert_eq!(voids[0].unit_sale_price_cents, Some(80));

        let again = db.lots().reverse(&OutboundRef::sale("S-1")).await.unwrap();
        assert_eq!(again, ReversalSummary::default());
        assert_eq!(db.lots().get(lot_id).await.unwrap().unwrap().quantity_remaining, 10);
        assert_eq!(db.ledger().history(&pid, None, None).await.unwrap().lines.len(), 3);

        invariants::assert_all(&db, &pid).await;
    }

    #[tokio::test]
    async fn test_reverse_single_line() {
        let (db, pid) = setup().await;
        receive(&db, &pid, 10, 100, 1).await;
        for line in ["1", "2"] {
            db.lots()
                .consume(ConsumeRequest::new(&pid, 3, OutboundRef::sale_line("S-1", line)))
                .await
                .unwrap();
        }

        let summary = db.lots().reverse(&OutboundRef::sale_line("S-1", "2")).await.unwrap();
        assert_eq!(summary.quantity_restored, 3);

        let product = db.products().get_by_id(&pid).await.unwrap().unwrap();
        assert_eq!(product.stock, 7);

        let line_one = db
            .consumptions()
            .for_outbound(&OutboundRef::sale_line("S-1", "1"))
            .await
            .unwrap();
        assert!(!line_one[0].is_reversed());

        invariants::assert_all(&db, &pid).await;
    }

    #[tokio::test]
    async fn test_reverse_unknown_reference_is_noop() {
        let (db, _pid) = setup().await;
        let summary = db.lots().reverse(&OutboundRef::sale("nope")).await.unwrap();
        assert_eq!(summary, ReversalSummary::default());
    }

    #[tokio::test]
    async fn test_location_fallback() {
        let (db, pid) = setup().await;
        let cost = UnitCostComponents::purchase_price(100);
        let a = NewLot::purchase(&pid, 5, cost, "GR-A")
            .at_location("WH-A")
            .received_at(Utc::now() - Duration::hours(1));
        let b = NewLot::purchase(&pid, 5, cost, "GR-B")
            .at_location("WH-B")
            .received_at(Utc::now() - Duration::hours(2));
        let lot_a = db.lots().open_lot(a).await.unwrap().unwrap();
        let lot_b = db.lots().open_lot(b).await.unwrap().unwrap();

        // enough at WH-A: stays local even though WH-B is older
        let local = db
            .lots()
            .consume(ConsumeRequest::new(&pid, 2, OutboundRef::sale_line("S-1", "1")).at_location("WH-A"))
            .await
            .unwrap();
        assert_eq!(local[0].lot_id, lot_a);

        // not enough at WH-A: falls back to global FIFO
        let spread = db
            .lots()
            .consume(ConsumeRequest::new(&pid, 6, OutboundRef::sale_line("S-2", "1")).at_location("WH-A"))
            .await
            .unwrap();
        assert_eq!(spread[0], Allocation { lot_id: lot_b, quantity: 5, unit_cost_cents: 100 });
        assert_eq!(spread[1], Allocation { lot_id: lot_a, quantity: 1, unit_cost_cents: 100 });

        invariants::assert_all(&db, &pid).await;
    }

    #[tokio::test]
    async fn test_location_is_hard_without_fallback() {
        let (db, pid) = setup_with(DbConfig::in_memory().location_fallback(false)).await;
        let cost = UnitCostComponents::purchase_price(100);
        db.lots()
            .open_lot(NewLot::purchase(&pid, 5, cost, "GR-A").at_location("WH-A"))
            .await
            .unwrap();
        db.lots()
            .open_lot(NewLot::purchase(&pid, 5, cost, "GR-B").at_location("WH-B"))
            .await
            .unwrap();

        let err = db
            .lots()
            .consume(ConsumeRequest::new(&pid, 6, OutboundRef::sale_line("S-1", "1")).at_location("WH-A"))
            .await
            .unwrap_err();
        assert!(err.is_insufficient_stock());

        invariants::assert_all(&db, &pid).await;
    }

    #[tokio::test]
    async fn test_open_lot_quantity_rules() {
        let (db, pid) = setup().await;
        let cost = UnitCostComponents::purchase_price(100);

        let zero = db.lots().open_lot(NewLot::purchase(&pid, 0, cost, "GR-1")).await.unwrap();
        assert!(zero.is_none());
        assert!(db.lots().list_for_product(&pid).await.unwrap().is_empty());

        let err = db.lots().open_lot(NewLot::purchase(&pid, -3, cost, "GR-1")).await.unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn test_oversized_costs_rejected_before_any_write() {
        let (db, pid) = setup().await;

        let huge = UnitCostComponents::purchase_price(10_000_000_000_000);
        let err = db
            .lots()
            .open_lot(NewLot::purchase(&pid, MAX_MOVEMENT_QUANTITY, huge, "GR-1"))
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(db.lots().list_for_product(&pid).await.unwrap().is_empty());

        let largest = UnitCostComponents {
            purchase_price_cents: MAX_UNIT_COST_CENTS,
            tax_cents: MAX_UNIT_COST_CENTS,
            other_cost_cents: MAX_UNIT_COST_CENTS,
        };
        let lot_id = db
            .lots()
            .open_lot(NewLot::purchase(&pid, MAX_MOVEMENT_QUANTITY, largest, "GR-2"))
            .await
            .unwrap()
            .unwrap();
        let lot = db.lots().get(lot_id).await.unwrap().unwrap();
        assert_eq!(lot.unit_cost_cents, 3 * MAX_UNIT_COST_CENTS);

        let err = db
            .lots()
            .consume(
                ConsumeRequest::new(&pid, 1, OutboundRef::sale_line("S-1", "1"))
                    .with_sale_price(MAX_UNIT_COST_CENTS + 1),
            )
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
        invariants::assert_all(&db, &pid).await;
    }

    #[tokio::test]
    async fn test_landed_cost_and_source() {
        let (db, pid) = setup().await;
        let costs = UnitCostComponents {
            purchase_price_cents: 100,
            tax_cents: 11,
            other_cost_cents: 4,
        };
        let mut lot = NewLot::purchase(&pid, 2, costs, "OPEN-2026");
        lot.source_kind = LotSource::InitialStock;
        let lot_id = db.lots().open_lot(lot).await.unwrap().unwrap();

        let lot = db.lots().get(lot_id).await.unwrap().unwrap();
        assert_eq!(lot.unit_cost_cents, 115);
        assert_eq!(lot.source_kind, LotSource::InitialStock);

        let entries = db.ledger().for_reference(ReferenceKind::InitialStock, "OPEN-2026").await.unwrap();
        assert_eq!(entries[0].subtotal_cost_cents, 230);
    }

    #[tokio::test]
    async fn test_consume_rejects_bad_input() {
        let (db, pid) = setup().await;
        receive(&db, &pid, 10, 100, 1).await;

        let zero = db
            .lots()
            .consume(ConsumeRequest::new(&pid, 0, OutboundRef::sale_line("S-1", "1")))
            .await
            .unwrap_err();
        assert!(zero.is_invalid_input());

        let unknown = db
            .lots()
            .consume(ConsumeRequest::new(
                crate::repository::product::generate_product_id(),
                1,
                OutboundRef::sale_line("S-1", "1"),
            ))
            .await
            .unwrap_err();
        assert!(matches!(unknown, DbError::Core(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_destroy_and_restore() {
        let (db, pid) = setup().await;
        let lot_id = receive(&db, &pid, 10, 100, 1).await;
        db.lots()
            .consume(ConsumeRequest::new(&pid, 3, OutboundRef::sale_line("S-1", "1")))
            .await
            .unwrap();

        assert_eq!(db.lots().destroy_remaining(lot_id, "SPOIL-1").await.unwrap(), 7);
        let lot = db.lots().get(lot_id).await.unwrap().unwrap();
        assert_eq!(lot.quantity_remaining, 0);
        invariants::assert_all(&db, &pid).await;

        let destroyed = db.ledger().for_reference(ReferenceKind::Destroy, "SPOIL-1").await.unwrap();
        assert_eq!(destroyed[0].direction, Direction::Outbound);
        assert_eq!(destroyed[0].quantity, 7);

        assert_eq!(db.lots().destroy_remaining(lot_id, "SPOIL-2").await.unwrap(), 0);

        let restored = db.lots().reverse(&OutboundRef::destroy("SPOIL-1")).await.unwrap();
        assert_eq!(restored.quantity_restored, 7);
        assert_eq!(db.lots().get(lot_id).await.unwrap().unwrap().quantity_remaining, 7);
        invariants::assert_all(&db, &pid).await;
    }

    #[tokio::test]
    async fn test_destroy_unknown_lot() {
        let (db, _pid) = setup().await;
        let err = db.lots().destroy_remaining(999, "SPOIL-1").await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::LotNotFound(999))));
    }

    #[tokio::test]
    async fn test_lot_rows_cannot_be_deleted() {
        let (db, pid) = setup().await;
        receive(&db, &pid, 1, 100, 1).await;

        let delete = sqlx::query("DELETE FROM cost_lots").execute(db.pool()).await;
        assert!(delete.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let path = std::env::temp_dir().join(format!("lotkeeper-{}.db", uuid::Uuid::new_v4()));
        let config = DbConfig::new(path.clone())
            .max_connections(4)
            .lock_timeout(std::time::Duration::from_secs(10));
        let (db, pid) = setup_with(config).await;
        receive(&db, &pid, 50, 100, 2).await;
        receive(&db, &pid, 50, 120, 1).await;

        let mut handles = Vec::new();
        for i in 0..12 {
            let db = db.clone();
            let pid = pid.clone();
            handles.push(tokio::spawn(async move {
                db.lots()
                    .consume(ConsumeRequest::new(&pid, 10, OutboundRef::sale_line(format!("S-{i}"), "1")))
                    .await
            }));
        }

        let mut sold = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(allocations) => sold += allocations.iter().map(|a| a.quantity).sum::<i64>(),
                Err(e) if e.is_insufficient_stock() => refused += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(sold, 100);
        assert_eq!(refused, 2);
        invariants::assert_all(&db, &pid).await;

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lock_wait_expiry_is_retryable_and_writes_nothing() {
        let path = std::env::temp_dir().join(format!("lotkeeper-{}.db", uuid::Uuid::new_v4()));
        let config = DbConfig::new(path.clone())
            .max_connections(2)
            .lock_timeout(std::time::Duration::from_millis(200));
        let (db, pid) = setup_with(config).await;
        let lot_id = receive(&db, &pid, 10, 100, 1).await;

        // another writer holds the database write lock
        let mut holder = db.pool().begin().await.unwrap();
        sqlx::query("UPDATE products SET lock_version = lock_version + 1 WHERE id = ?1")
            .bind(&pid)
            .execute(&mut *holder)
            .await
            .unwrap();

        let err = db
            .lots()
            .consume(ConsumeRequest::new(&pid, 4, OutboundRef::sale_line("S-1", "1")))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ConcurrencyTimeout));
        assert!(err.is_retryable());

        holder.rollback().await.unwrap();

        let lot = db.lots().get(lot_id).await.unwrap().unwrap();
        assert_eq!(lot.quantity_remaining, 10);
        assert!(db
            .consumptions()
            .for_outbound(&OutboundRef::sale_line("S-1", "1"))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(db.products().get_by_id(&pid).await.unwrap().unwrap().stock, 10);
        invariants::assert_all(&db, &pid).await;

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
