//! # FIFO Allocation
//!
//! Pure planning for FIFO consumption and reversal. The storage layer
//! loads candidate lots under its write lock, asks this module what to do,
//! then writes the plan.
//!
//! ## Consumption Walk
//! ```text
//! request: 8 units
//!
//!   L1 (t1, 5 left @100)   L2 (t2, 5 left @120)   L3 (t3, 9 left @130)
//!   ────────────────────   ────────────────────   ────────────────────
//!   take 5 → need 3        take 3 → need 0        untouched
//!
//!   plan = [(L1, 5, 100), (L2, 3, 120)]      COGS = 500 + 360 = 860
//! ```
//!
//! Lots are ordered by `(received_at, id)` so same-instant inserts still
//! have a deterministic order. When the candidates cannot cover the
//! request the planner returns `InsufficientStock` and produces no
//! allocation at all.

use crate::error::{CoreError, CoreResult};
use crate::types::{Allocation, CostLot};

/// Plans a FIFO consumption of `requested` units across `lots`.
///
/// Lots with nothing remaining are ignored. The input does not need to be
/// sorted.
///
/// ```rust
/// # use lotkeeper_core::fifo::plan_fifo;
/// # use lotkeeper_core::CoreError;
/// let err = plan_fifo("p-1", &[], 3).unwrap_err();
/// assert!(matches!(err, CoreError::InsufficientStock { available: 0, requested: 3, .. }));
/// ```
pub fn plan_fifo(product_id: &str, lots: &[CostLot], requested: i64) -> CoreResult<Vec<Allocation>> {
    let mut eligible: Vec<&CostLot> = lots.iter().filter(|l| l.quantity_remaining > 0).collect();
    eligible.sort_by(|a, b| (a.received_at, a.id).cmp(&(b.received_at, b.id)));

    let available: i64 = eligible.iter().map(|l| l.quantity_remaining).sum();
    if available < requested {
        return Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            available,
            requested,
        });
    }

    let mut need = requested;
    let mut plan = Vec::new();
    for lot in eligible {
        if need == 0 {
            break;
        }
        let take = need.min(lot.quantity_remaining);
        plan.push(Allocation {
            lot_id: lot.id,
            quantity: take,
            unit_cost_cents: lot.unit_cost_cents,
        });
        need -= take;
    }

    Ok(plan)
}

/// Units a reversal may give back to a lot.
///
/// A lot never grows past its initial size, so a record whose quantity
/// would overshoot is clipped. A return value smaller than
/// `record_quantity` means the lot state and the consumption history
/// disagree and the caller should log it.
#[inline]
pub fn restorable_quantity(lot: &CostLot, record_quantity: i64) -> i64 {
    let restored_to = lot
        .quantity_initial
        .min(lot.quantity_remaining + record_quantity);
    (restored_to - lot.quantity_remaining).max(0)
}

// =============================================================================
// Unit Tests
// =============================================================================
