//! # Reconciliation Repository
//!
//! Counting sessions: snapshot what the lots say, take the physical count,
//! post the difference.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create ──► DRAFT ──────────────────────────────► APPLIED (terminal)   │
//! │               │  resnapshot      (system_qty, avg_cost refreshed)       │
//! │               │  set_physical_qty (per line, or cleared)                │
//! │               └─ apply ─────────────────────────┘                       │
//! │                                                                         │
//! │  apply, one transaction:                                                │
//! │    1. DRAFT → APPLIED           ← first write; AlreadyApplied otherwise │
//! │    2. per counted line:                                                 │
//! │         diff > 0  → open RECONCILIATION_IN lot @ avg_cost               │
//! │         diff < 0  → FIFO consume, RECONCILIATION_OUT / session id       │
//! │    3. resync stock of every touched product                             │
//! │  Any failure (e.g. InsufficientStock) rolls back all three steps.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use lotkeeper_core::validation::{validate_count, validate_period, validate_reference};
use lotkeeper_core::{
    ConsumeRequest, CoreError, LotSource, Money, NewLot, OutboundRef, ReconciliationDetail,
    ReconciliationLine, ReconciliationOutcome, ReconciliationSession, ReconciliationStatus,
    UnitCostComponents,
};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::config::ShortageCosting;
use crate::error::DbResult;
use crate::pool::EnginePolicy;
use crate::repository::{lot, product, valuation};

const SESSION_COLUMNS: &str = "id, location_id, status, period_start, period_end, notes, \
     created_by, created_at, snapshot_at, applied_at, applied_by";

const LINE_COLUMNS: &str =
    "id, session_id, product_id, system_qty, avg_cost_cents, physical_qty";

/// Repository for reconciliation sessions.
#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    pool: SqlitePool,
    policy: EnginePolicy,
}

impl ReconciliationRepository {
    pub fn new(pool: SqlitePool, policy: EnginePolicy) -> Self {
        ReconciliationRepository { pool, policy }
    }

    /// Creates a DRAFT session with one line per active product.
    ///
    /// System quantity and average cost are taken from the lots at
    /// `location_id`.
    pub async fn create(
        &self,
        location_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        created_by: &str,
        notes: Option<&str>,
    ) -> DbResult<i64> {
        validate_reference("location_id", location_id)?;
        validate_reference("created_by", created_by)?;
        validate_period(period_start, period_end)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO reconciliation_sessions (
                location_id, status, period_start, period_end, notes,
                created_by, created_at, snapshot_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(location_id)
        .bind(ReconciliationStatus::Draft)
        .bind(period_start)
        .bind(period_end)
        .bind(notes)
        .bind(created_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let session_id = result.last_insert_rowid();

        let lines = snapshot_in(&mut *tx, session_id, location_id).await?;
        tx.commit().await?;

        info!(session_id, location = %location_id, lines, "Reconciliation session created");
        Ok(session_id)
    }

    /// Refreshes system quantities and average costs of a DRAFT session.
    ///
    /// Counts already entered are kept; products activated since the last
    /// snapshot get a line. Returns the number of lines refreshed.
    pub async fn resnapshot(&self, session_id: i64) -> DbResult<u32> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE reconciliation_sessions SET snapshot_at = ?2 WHERE id = ?1 AND status = ?3",
        )
        .bind(session_id)
        .bind(Utc::now())
        .bind(ReconciliationStatus::Draft)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let status = status_in(&mut *tx, session_id).await?;
            return Err(not_draft(session_id, status).into());
        }

        let location_id: String =
            sqlx::query_scalar("SELECT location_id FROM reconciliation_sessions WHERE id = ?1")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await?;

        let lines = snapshot_in(&mut *tx, session_id, &location_id).await?;
        tx.commit().await?;

        info!(session_id, lines, "Reconciliation session re-snapshotted");
        Ok(lines)
    }

    /// Enters (or clears, with `None`) the physical count of a line.
    pub async fn set_physical_qty(
        &self,
        session_id: i64,
        line_id: i64,
        physical_qty: Option<i64>,
    ) -> DbResult<()> {
        if let Some(qty) = physical_qty {
            validate_count(qty)?;
        }

        let result = sqlx::query(
            r#"
            UPDATE reconciliation_lines
            SET physical_qty = ?3
            WHERE id = ?2
              AND session_id = ?1
              AND EXISTS (
                  SELECT 1 FROM reconciliation_sessions WHERE id = ?1 AND status = ?4
              )
            "#,
        )
        .bind(session_id)
        .bind(line_id)
        .bind(physical_qty)
        .bind(ReconciliationStatus::Draft)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let mut conn = self.pool.acquire().await?;
            return match status_in(&mut *conn, session_id).await? {
                Some(ReconciliationStatus::Draft) => {
                    Err(CoreError::LineNotFound { session_id, line_id }.into())
                }
                status => Err(not_draft(session_id, status).into()),
            };
        }

        debug!(session_id, line_id, ?physical_qty, "Physical count set");
        Ok(())
    }

    /// Posts every counted difference and marks the session APPLIED.
    ///
    /// ## Errors
    /// * `AlreadyApplied` - checked before any line is processed
    /// * `InsufficientStock` - a shortage cannot be covered; nothing is posted
    /// * `SessionNotFound`
    pub async fn apply(&self, session_id: i64, applied_by: &str) -> DbResult<ReconciliationOutcome> {
        validate_reference("applied_by", applied_by)?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE reconciliation_sessions
            SET status = ?2, applied_at = ?3, applied_by = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(session_id)
        .bind(ReconciliationStatus::Applied)
        .bind(Utc::now())
        .bind(applied_by)
        .bind(ReconciliationStatus::Draft)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match status_in(&mut *tx, session_id).await? {
                None => CoreError::SessionNotFound(session_id),
                Some(_) => CoreError::AlreadyApplied { session_id },
            }
            .into());
        }

        let location_id: String =
            sqlx::query_scalar("SELECT location_id FROM reconciliation_sessions WHERE id = ?1")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await?;

        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM reconciliation_lines \
             WHERE session_id = ?1 AND physical_qty IS NOT NULL ORDER BY id"
        );
        let lines = sqlx::query_as::<_, ReconciliationLine>(&sql)
            .bind(session_id)
            .fetch_all(&mut *tx)
            .await?;

        let mut outcome = ReconciliationOutcome {
            session_id,
            ..Default::default()
        };

        for line in &lines {
            let diff = line.diff().unwrap_or(0);
            if diff == 0 {
                continue;
            }

            if diff > 0 {
                let surplus = NewLot {
                    product_id: line.product_id.clone(),
                    quantity: diff,
                    costs: UnitCostComponents::purchase_price(line.avg_cost_cents),
                    source_kind: LotSource::ReconciliationIn,
                    source_ref: session_id.to_string(),
                    location_id: Some(location_id.clone()),
                    received_at: None,
                };
                lot::open_lot_in(&mut *tx, &surplus).await?;
                outcome.surplus_units += diff;
            } else {
                let request = ConsumeRequest::new(
                    line.product_id.clone(),
                    -diff,
                    OutboundRef::reconciliation(session_id),
                )
                .at_location(location_id.clone());
                let ledger_cost = match self.policy.shortage_costing {
                    ShortageCosting::FifoLot => None,
                    ShortageCosting::AverageCost => Some(line.avg_cost_cents),
                };
                lot::consume_in(&mut *tx, &request, self.policy.location_fallback, ledger_cost).await?;
                outcome.shortage_units += -diff;
            }

            debug!(session_id, line_id = line.id, product_id = %line.product_id, diff, "Line posted");
            outcome.lines_applied += 1;
            outcome.touched_products.push(line.product_id.clone());
        }

        for product_id in &outcome.touched_products {
            product::resync_in(&mut *tx, product_id).await?;
        }

        tx.commit().await?;

        info!(
            session_id,
            applied_by = %applied_by,
            lines = outcome.lines_applied,
            surplus = outcome.surplus_units,
            shortage = outcome.shortage_units,
            "Reconciliation applied"
        );
        Ok(outcome)
    }

    /// A session with its lines, or `None` if it does not exist.
    pub async fn get(&self, session_id: i64) -> DbResult<Option<ReconciliationDetail>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM reconciliation_sessions WHERE id = ?1");
        let Some(session) = sqlx::query_as::<_, ReconciliationSession>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM reconciliation_lines WHERE session_id = ?1 ORDER BY id"
        );
        let lines = sqlx::query_as::<_, ReconciliationLine>(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(Some(ReconciliationDetail { session, lines }))
    }

    /// Sessions of a location, newest first.
    pub async fn list_for_location(&self, location_id: &str) -> DbResult<Vec<ReconciliationSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM reconciliation_sessions \
             WHERE location_id = ?1 ORDER BY created_at DESC, id DESC"
        );
        let sessions = sqlx::query_as::<_, ReconciliationSession>(&sql)
            .bind(location_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(sessions)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Upserts one line per active product (and refreshes existing lines),
/// keeping any physical count already entered.
async fn snapshot_in(conn: &mut SqliteConnection, session_id: i64, location_id: &str) -> DbResult<u32> {
    let product_ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM products WHERE is_active = 1
        UNION
        SELECT product_id FROM reconciliation_lines WHERE session_id = ?1
        ORDER BY 1
        "#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    for product_id in &product_ids {
        let system_qty = product::lot_sum_in(conn, product_id, Some(location_id)).await?;
        let avg = valuation::average_cost_in(conn, product_id, Some(location_id)).await?;
        let avg_cost = Money::from_decimal_cents(avg);

        sqlx::query(
            r#"
            INSERT INTO reconciliation_lines (session_id, product_id, system_qty, avg_cost_cents)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (session_id, product_id) DO UPDATE SET
                system_qty = excluded.system_qty,
                avg_cost_cents = excluded.avg_cost_cents
            "#,
        )
        .bind(session_id)
        .bind(product_id)
        .bind(system_qty)
        .bind(avg_cost.cents())
        .execute(&mut *conn)
        .await?;
    }

    Ok(product_ids.len() as u32)
}

async fn status_in(conn: &mut SqliteConnection, session_id: i64) -> DbResult<Option<ReconciliationStatus>> {
    let status = sqlx::query_scalar("SELECT status FROM reconciliation_sessions WHERE id = ?1")
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(status)
}

fn not_draft(session_id: i64, status: Option<ReconciliationStatus>) -> CoreError {
    match status {
        None => CoreError::SessionNotFound(session_id),
        Some(current) => CoreError::InvalidSessionStatus {
            session_id,
            current_status: current.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::invariants;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use lotkeeper_core::{Direction, ReferenceKind};

    const SHOP: &str = "SHOP-1";

    struct Fixture {
        db: Database,
        apple: String,
        pear: String,
    }

    async fn setup_with(config: DbConfig) -> Fixture {
        let db = Database::new(config).await.unwrap();
        let apple = db.products().register("A-1", "Apple").await.unwrap().id;
        let pear = db.products().register("P-1", "Pear").await.unwrap().id;

        for pid in [&apple, &pear] {
            for (cost, hours_ago) in [(100, 2), (120, 1)] {
                let lot = NewLot::purchase(pid.as_str(), 10, UnitCostComponents::purchase_price(cost), "GR-1")
                    .at_location(SHOP)
                    .received_at(Utc::now() - Duration::hours(hours_ago));
                db.lots().open_lot(lot).await.unwrap();
            }
        }

        Fixture { db, apple, pear }
    }

    async fn setup() -> Fixture {
        setup_with(DbConfig::in_memory()).await
    }

    async fn create(db: &Database) -> i64 {
        let now = Utc::now();
        db.reconciliations()
            .create(SHOP, now - Duration::days(7), now, "alice", Some("weekly count"))
            .await
            .unwrap()
    }

    fn line_for<'a>(detail: &'a ReconciliationDetail, product_id: &str) -> &'a ReconciliationLine {
        detail.lines.iter().find(|l| l.product_id == product_id).unwrap()
    }

    async fn count(db: &Database, session_id: i64, product_id: &str, qty: Option<i64>) {
        let detail = db.reconciliations().get(session_id).await.unwrap().unwrap();
        let line_id = line_for(&detail, product_id).id;
        db.reconciliations().set_physical_qty(session_id, line_id, qty).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_snapshots_active_products() {
        let f = setup().await;
        let retired = f.db.products().register("R-1", "Retired").await.unwrap();
        f.db.products().set_active(&retired.id, false).await.unwrap();

        let session_id = create(&f.db).await;
        let detail = f.db.reconciliations().get(session_id).await.unwrap().unwrap();

        assert_eq!(detail.session.status, ReconciliationStatus::Draft);
        assert_eq!(detail.session.created_by, "alice");
        assert_eq!(detail.lines.len(), 2);

        let apple = line_for(&detail, &f.apple);
        assert_eq!((apple.system_qty, apple.avg_cost_cents), (20, 110));
        assert_eq!(apple.physical_qty, None);
        assert_eq!(apple.diff(), None);
    }

    #[tokio::test]
    async fn test_snapshot_is_location_scoped() {
        let f = setup().await;
        f.db.lots()
            .open_lot(NewLot::purchase(&f.apple, 5, UnitCostComponents::purchase_price(500), "GR-2").at_location("SHOP-2"))
            .await
            .unwrap();

        let session_id = create(&f.db).await;
        let detail = f.db.reconciliations().get(session_id).await.unwrap().unwrap();
        assert_eq!(line_for(&detail, &f.apple).system_qty, 20);
        assert_eq!(line_for(&detail, &f.apple).avg_cost_cents, 110);
    }

    #[tokio::test]
    async fn test_apply_posts_shortage_and_surplus() {
        let f = setup().await;
        let session_id = create(&f.db).await;
        count(&f.db, session_id, &f.apple, Some(15)).await;
        count(&f.db, session_id, &f.pear, Some(26)).await;

        let outcome = f.db.reconciliations().apply(session_id, "bob").await.unwrap();
        assert_eq!(outcome.lines_applied, 2);
        assert_eq!(outcome.shortage_units, 5);
        assert_eq!(outcome.surplus_units, 6);

        // shortage drains the oldest lot, posted at the snapshot average
        let out = f
            .db
            .ledger()
            .for_reference(ReferenceKind::ReconAdjustOut, &session_id.to_string())
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].direction, Direction::Outbound);
        assert_eq!((out[0].quantity, out[0].unit_cost_cents), (5, 110));
        assert_eq!(f.db.products().get_by_id(&f.apple).await.unwrap().unwrap().stock, 15);

        // surplus becomes a new lot at the snapshot average
        let pear_lots = f.db.lots().list_for_product(&f.pear).await.unwrap();
        let surplus = pear_lots
            .iter()
            .find(|l| l.source_kind == LotSource::ReconciliationIn)
            .unwrap();
        assert_eq!((surplus.quantity_initial, surplus.unit_cost_cents), (6, 110));
        assert_eq!(surplus.location_id.as_deref(), Some(SHOP));
        assert_eq!(surplus.source_ref, session_id.to_string());
        assert_eq!(f.db.products().get_by_id(&f.pear).await.unwrap().unwrap().stock, 26);

        let detail = f.db.reconciliations().get(session_id).await.unwrap().unwrap();
        assert_eq!(detail.session.status, ReconciliationStatus::Applied);
        assert_eq!(detail.session.applied_by.as_deref(), Some("bob"));
        assert!(detail.session.applied_at.is_some());

        // the lot itself still gave up its oldest units
        let records = f
            .db
            .consumptions()
            .for_outbound(&OutboundRef::reconciliation(session_id))
            .await
            .unwrap();
        assert_eq!(records[0].unit_cost_cents, 100);

        // ledger value runs 50 below lot value: 5 × (110 - 100)
        invariants::assert_quantities(&f.db, &f.apple).await;
        let on_hand = f.db.valuation().on_hand_valuation(Some(&f.apple), None).await.unwrap();
        let reconstructed = f.db.ledger().reconstructed_value(&f.apple, None).await.unwrap();
        assert_eq!(on_hand[0].value_cents - reconstructed.cents(), 50);
        invariants::assert_all(&f.db, &f.pear).await;
    }

    #[tokio::test]
    async fn test_fifo_lot_shortage_costing() {
        let f = setup_with(DbConfig::in_memory().shortage_costing(ShortageCosting::FifoLot)).await;
        let session_id = create(&f.db).await;
        count(&f.db, session_id, &f.apple, Some(15)).await;

        f.db.reconciliations().apply(session_id, "bob").await.unwrap();

        let out = f
            .db
            .ledger()
            .for_reference(ReferenceKind::ReconAdjustOut, &session_id.to_string())
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].quantity, out[0].unit_cost_cents), (5, 100));
        assert_eq!(f.db.products().get_by_id(&f.apple).await.unwrap().unwrap().stock, 15);

        invariants::assert_all(&f.db, &f.apple).await;
    }

    #[tokio::test]
    async fn test_apply_twice_rejected() {
        let f = setup().await;
        let session_id = create(&f.db).await;
        count(&f.db, session_id, &f.apple, Some(15)).await;
        f.db.reconciliations().apply(session_id, "bob").await.unwrap();

        let err = f.db.reconciliations().apply(session_id, "bob").await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::AlreadyApplied { .. })));
        assert_eq!(f.db.products().get_by_id(&f.apple).await.unwrap().unwrap().stock, 15);
    }

    #[tokio::test]
    async fn test_uncounted_and_matching_lines_are_skipped() {
        let f = setup().await;
        let session_id = create(&f.db).await;
        count(&f.db, session_id, &f.apple, Some(20)).await;

        let outcome = f.db.reconciliations().apply(session_id, "bob").await.unwrap();
        assert_eq!(outcome.lines_applied, 0);
        assert!(outcome.touched_products.is_empty());
        assert_eq!(f.db.ledger().history(&f.pear, None, None).await.unwrap().lines.len(), 2);
    }

    #[tokio::test]
    async fn test_insufficient_stock_aborts_whole_apply() {
        let f = setup().await;
        let session_id = create(&f.db).await;
        count(&f.db, session_id, &f.pear, Some(30)).await;
        count(&f.db, session_id, &f.apple, Some(0)).await;

        // stock moves after the snapshot: only 2 apples left to take
        f.db.lots()
            .consume(ConsumeRequest::new(&f.apple, 18, OutboundRef::sale_line("S-1", "1")))
            .await
            .unwrap();

        let err = f.db.reconciliations().apply(session_id, "bob").await.unwrap_err();
        assert!(err.is_insufficient_stock());

        let detail = f.db.reconciliations().get(session_id).await.unwrap().unwrap();
        assert_eq!(detail.session.status, ReconciliationStatus::Draft);
        assert_eq!(f.db.lots().list_for_product(&f.pear).await.unwrap().len(), 2);
        assert_eq!(f.db.products().get_by_id(&f.pear).await.unwrap().unwrap().stock, 20);

        invariants::assert_all(&f.db, &f.apple).await;
        invariants::assert_all(&f.db, &f.pear).await;
    }

    #[tokio::test]
    async fn test_resnapshot_refreshes_and_keeps_counts() {
        let f = setup().await;
        let session_id = create(&f.db).await;
        count(&f.db, session_id, &f.apple, Some(12)).await;

        f.db.lots()
            .consume(ConsumeRequest::new(&f.apple, 10, OutboundRef::sale_line("S-1", "1")).at_location(SHOP))
            .await
            .unwrap();
        let kiwi = f.db.products().register("K-1", "Kiwi").await.unwrap();

        let lines = f.db.reconciliations().resnapshot(session_id).await.unwrap();
        assert_eq!(lines, 3);

        let detail = f.db.reconciliations().get(session_id).await.unwrap().unwrap();
        let apple = line_for(&detail, &f.apple);
        assert_eq!((apple.system_qty, apple.avg_cost_cents), (10, 120));
        assert_eq!(apple.physical_qty, Some(12));
        assert_eq!(apple.diff(), Some(2));
        assert_eq!(line_for(&detail, &kiwi.id).system_qty, 0);
    }

    #[tokio::test]
    async fn test_edits_require_draft() {
        let f = setup().await;
        let session_id = create(&f.db).await;
        let detail = f.db.reconciliations().get(session_id).await.unwrap().unwrap();
        let line_id = line_for(&detail, &f.apple).id;

        let missing = f.db.reconciliations().set_physical_qty(session_id, 9_999, Some(1)).await.unwrap_err();
        assert!(matches!(missing, DbError::Core(CoreError::LineNotFound { .. })));

        let negative = f.db.reconciliations().set_physical_qty(session_id, line_id, Some(-1)).await.unwrap_err();
        assert!(negative.is_invalid_input());

        f.db.reconciliations().apply(session_id, "bob").await.unwrap();

        let locked = f.db.reconciliations().set_physical_qty(session_id, line_id, Some(1)).await.unwrap_err();
        assert!(matches!(locked, DbError::Core(CoreError::InvalidSessionStatus { .. })));

        let resnap = f.db.reconciliations().resnapshot(session_id).await.unwrap_err();
        assert!(matches!(resnap, DbError::Core(CoreError::InvalidSessionStatus { .. })));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let f = setup().await;
        let err = f.db.reconciliations().apply(404, "bob").await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::SessionNotFound(404))));
        assert!(f.db.reconciliations().get(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inverted_period_rejected() {
        let f = setup().await;
        let now = Utc::now();
        let err = f
            .db
            .reconciliations()
            .create(SHOP, now, now - Duration::days(1), "alice", None)
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn test_list_for_location() {
        let f = setup().await;
        let first = create(&f.db).await;
        let second = create(&f.db).await;

        let sessions = f.db.reconciliations().list_for_location(SHOP).await.unwrap();
        let ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert!(f.db.reconciliations().list_for_location("SHOP-9").await.unwrap().is_empty());
    }
}
