//! Test-only checks of the properties every committed operation must keep.

use lotkeeper_core::{CostLot, Money};

use crate::Database;

/// Quantity properties: lot bounds, consumption coverage, stock cache and
/// ledger balance all agree with the lots.
pub(crate) async fn assert_quantities(db: &Database, product_id: &str) {
    let lots = db.lots().list_for_product(product_id).await.unwrap();

    for lot in &lots {
        assert!(
            (0..=lot.quantity_initial).contains(&lot.quantity_remaining),
            "lot {} out of bounds: {}/{}",
            lot.id,
            lot.quantity_remaining,
            lot.quantity_initial
        );

        let outstanding = db.consumptions().outstanding_for_lot(lot.id).await.unwrap();
        assert_eq!(
            lot.quantity_initial - lot.quantity_remaining,
            outstanding,
            "lot {} consumption does not cover its decrement",
            lot.id
        );
    }

    let lot_sum: i64 = lots.iter().map(|l| l.quantity_remaining).sum();
    let product = db.products().get_by_id(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, lot_sum, "stock cache drifted");

    let history = db.ledger().history(product_id, None, None).await.unwrap();
    assert_eq!(history.closing_balance(), lot_sum, "ledger balance drifted");
}

/// Quantity properties plus on-hand value == ledger-reconstructed value.
///
/// Only holds when every outbound row is costed at its lot's cost.
pub(crate) async fn assert_all(db: &Database, product_id: &str) {
    assert_quantities(db, product_id).await;

    let lots = db.lots().list_for_product(product_id).await.unwrap();
    let on_hand: Money = lots.iter().map(CostLot::remaining_value).sum();
    let reconstructed = db.ledger().reconstructed_value(product_id, None).await.unwrap();
    assert_eq!(on_hand, reconstructed, "ledger value drifted");
}
