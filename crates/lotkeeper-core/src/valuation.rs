//! # Valuation & Ledger Math
//!
//! Weighted-average cost, on-hand value, running balances and gross margin.
//! Inputs are rows already loaded by the storage layer; nothing here
//! touches the database.
//!
//! ## Two Views of the Same Value
//! ```text
//! ┌──────────────────────────────┐        ┌──────────────────────────────┐
//! │  Live lots                   │        │  Ledger history              │
//! │  Σ(remaining × unit_cost)    │   ==   │  Σ(direction × subtotal)     │
//! └──────────────────────────────┘        └──────────────────────────────┘
//! ```
//! Both sides use integer cents. Only the weighted average divides, and it
//! stays an exact `Decimal` until a caller rounds it into a lot cost.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CostLot, Direction, LedgerEntry, ReferenceKind};

// =============================================================================
// Weighted Average
// =============================================================================

/// Average unit cost in cents from aggregate totals; zero when `quantity`
/// is zero.
///
/// ```rust
/// use lotkeeper_core::valuation::average_from_totals;
/// use rust_decimal::Decimal;
///
/// // 5 @100 + 5 @120
/// assert_eq!(average_from_totals(1100, 10), Decimal::from(110));
/// assert_eq!(average_from_totals(0, 0), Decimal::ZERO);
/// ```
pub fn average_from_totals(value_cents: i64, quantity: i64) -> Decimal {
    if quantity <= 0 {
        return Decimal::ZERO;
    }
    Decimal::from(value_cents) / Decimal::from(quantity)
}

/// Σ(remaining × cost) / Σ(remaining) over lots with stock left.
pub fn weighted_average_cost(lots: &[CostLot]) -> Decimal {
    let (value, qty) = lots
        .iter()
        .filter(|l| l.quantity_remaining > 0)
        .fold((0i64, 0i64), |(v, q), l| {
            (v + l.remaining_value().cents(), q + l.quantity_remaining)
        });
    average_from_totals(value, qty)
}

// =============================================================================
// On-Hand Valuation
// =============================================================================

/// Quantity and value on hand for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OnHandValuation {
    pub product_id: String,
    pub quantity: i64,
    pub value_cents: i64,
}

impl OnHandValuation {
    #[inline]
    pub fn value(&self) -> Money {
        Money::from_cents(self.value_cents)
    }

    /// Average unit cost of what is on hand.
    pub fn average_cost(&self) -> Decimal {
        average_from_totals(self.value_cents, self.quantity)
    }
}

// =============================================================================
// Running Balance
// =============================================================================

/// A ledger entry with the balance after it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerLine {
    pub entry: LedgerEntry,
    /// Normalized direction, used for the balance.
    pub direction: Direction,
    pub signed_quantity: i64,
    pub running_balance: i64,
    pub running_value_cents: i64,
}

/// Folds entries (already in `(created_at, id)` order) into running
/// balances starting from an opening quantity and value.
pub fn running_balance(
    opening_quantity: i64,
    opening_value: Money,
    entries: Vec<LedgerEntry>,
) -> Vec<LedgerLine> {
    let mut balance = opening_quantity;
    let mut value = opening_value;

    entries
        .into_iter()
        .map(|entry| {
            let signed_quantity = entry.signed_quantity();
            balance += signed_quantity;
            value += entry.signed_subtotal();
            LedgerLine {
                direction: entry.normalized_direction(),
                signed_quantity,
                running_balance: balance,
                running_value_cents: value.cents(),
                entry,
            }
        })
        .collect()
}

/// Σ(direction × subtotal): the value the ledger says is on hand.
pub fn reconstructed_value<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Money {
    entries.into_iter().map(LedgerEntry::signed_subtotal).sum()
}

// =============================================================================
// Gross Margin
// =============================================================================

/// Revenue against cost of goods sold for one product, net of voids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GrossMargin {
    pub product_id: String,
    pub units_sold: i64,
    pub revenue_cents: i64,
    pub cogs_cents: i64,
    pub margin_cents: i64,
}

impl GrossMargin {
    /// margin / revenue, or `None` with no revenue.
    pub fn margin_ratio(&self) -> Option<Decimal> {
        if self.revenue_cents == 0 {
            return None;
        }
        Some(Decimal::from(self.margin_cents) / Decimal::from(self.revenue_cents))
    }
}

/// Computes gross margin from SALE and SALE_VOID entries.
///
/// A sale (outbound) adds to units, revenue and COGS; its void (inbound)
/// takes the same amounts back out. Other kinds are ignored.
pub fn gross_margin<'a>(
    product_id: &str,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> GrossMargin {
    let mut margin = GrossMargin {
        product_id: product_id.to_string(),
        ..Default::default()
    };

    for entry in entries {
        if !matches!(entry.reference_kind, ReferenceKind::Sale | ReferenceKind::SaleVoid) {
            continue;
        }
        // outbound sale counts up, inbound void counts down
        let sign = -entry.normalized_direction().sign();
        let price = entry.unit_sale_price_cents.unwrap_or(0);

        margin.units_sold += sign * entry.quantity;
        margin.revenue_cents += sign * entry.quantity * price;
        margin.cogs_cents += sign * entry.subtotal_cost_cents;
    }

    margin.margin_cents = margin.revenue_cents - margin.cogs_cents;
    margin
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LotSource;
    use chrono::Utc;

    fn entry(id: i64, kind: ReferenceKind, qty: i64, cost: i64, price: Option<i64>) -> LedgerEntry {
        LedgerEntry {
            id,
            product_id: "p-1".to_string(),
            location_id: None,
            lot_id: Some(1),
            direction: kind.direction(),
            quantity: qty,
            unit_cost_cents: cost,
            unit_sale_price_cents: price,
            subtotal_cost_cents: qty * cost,
            reference_kind: kind,
            reference_id: "ref".to_string(),
            created_at: Utc::now(),
        }
    }

    fn lot(remaining: i64, cost: i64) -> CostLot {
        let now = Utc::now();
        CostLot {
            id: 1,
            product_id: "p-1".to_string(),
            location_id: None,
            source_kind: LotSource::PurchaseReceipt,
            source_ref: "GR-1".to_string(),
            purchase_price_cents: cost,
            tax_cents: 0,
            other_cost_cents: 0,
            unit_cost_cents: cost,
            quantity_initial: 10,
            quantity_remaining: remaining,
            received_at: now,
            created_at: now,
        }
    }

    #[test]
    fn test_weighted_average() {
        let lots = [lot(5, 100), lot(5, 120), lot(0, 999)];
        assert_eq!(weighted_average_cost(&lots), Decimal::from(110));
    }

    #[test]
    fn test_weighted_average_keeps_fraction() {
        // (1 × 100 + 2 × 101) / 3 = 100.666…
        let lots = [lot(1, 100), lot(2, 101)];
        let avg = weighted_average_cost(&lots);
        assert_eq!(Money::from_decimal_cents(avg).cents(), 101);
        assert!(avg > Decimal::from(100) && avg < Decimal::from(101));
    }

    #[test]
    fn test_weighted_average_without_stock_is_zero() {
        assert_eq!(weighted_average_cost(&[lot(0, 100)]), Decimal::ZERO);
        assert_eq!(weighted_average_cost(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_running_balance() {
        let lines = running_balance(
            0,
            Money::zero(),
            vec![
                entry(1, ReferenceKind::GoodsReceipt, 10, 100, None),
                entry(2, ReferenceKind::Sale, 7, 100, Some(150)),
            ],
        );

        assert_eq!(lines[0].running_balance, 10);
        assert_eq!(lines[1].signed_quantity, -7);
        assert_eq!(lines[1].running_balance, 3);
        assert_eq!(lines[1].running_value_cents, 300);
    }

    #[test]
    fn test_running_balance_normalizes_stored_direction() {
        let mut void = entry(3, ReferenceKind::SaleVoid, 4, 50, None);
        void.direction = Direction::Outbound;

        let lines = running_balance(6, Money::from_cents(300), vec![void]);
        assert_eq!(lines[0].direction, Direction::Inbound);
        assert_eq!(lines[0].running_balance, 10);
        assert_eq!(lines[0].running_value_cents, 500);
    }

    #[test]
    fn test_reconstructed_value() {
        let entries = [
            entry(1, ReferenceKind::GoodsReceipt, 5, 100, None),
            entry(2, ReferenceKind::GoodsReceipt, 5, 120, None),
            entry(3, ReferenceKind::Sale, 5, 100, None),
            entry(4, ReferenceKind::Sale, 3, 120, None),
        ];
        // 2 left @120
        assert_eq!(reconstructed_value(&entries).cents(), 240);
    }

    #[test]
    fn test_gross_margin_nets_voids() {
        let entries = [
            entry(1, ReferenceKind::GoodsReceipt, 10, 100, None),
            entry(2, ReferenceKind::Sale, 4, 100, Some(150)),
            entry(3, ReferenceKind::Sale, 2, 100, Some(150)),
            entry(4, ReferenceKind::SaleVoid, 2, 100, Some(150)),
            entry(5, ReferenceKind::Destroy, 1, 100, None),
        ];
        let m = gross_margin("p-1", &entries);

        assert_eq!(m.units_sold, 4);
        assert_eq!(m.revenue_cents, 600);
        assert_eq!(m.cogs_cents, 400);
        assert_eq!(m.margin_cents, 200);
        assert_eq!(m.margin_ratio().unwrap().round_dp(4), Decimal::new(3333, 4));
    }

    #[test]
    fn test_margin_ratio_without_revenue() {
        assert_eq!(GrossMargin::default().margin_ratio(), None);
    }
}
