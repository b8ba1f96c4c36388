//! # Seed Data Generator
//!
//! Populates a database with demo inventory and runs the engine end to end:
//! opening stock, goods receipts, sales, a void, and a stock count.
//!
//! ## Usage
//! ```bash
//! # Use lotkeeper.toml / LOTKEEPER_* / defaults
//! cargo run -p lotkeeper-db --bin seed
//!
//! # Specify database path
//! cargo run -p lotkeeper-db --bin seed -- --db ./data/lotkeeper.db
//!
//! # Specify config file
//! cargo run -p lotkeeper-db --bin seed -- --config ./lotkeeper.toml
//! ```

use std::env;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use lotkeeper_core::{
    ConsumeRequest, LotSource, NewLot, OutboundRef, UnitCostComponents,
};
use lotkeeper_db::{Database, EngineConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const STORE: &str = "STORE-1";

/// (sku, name, opening qty, opening cost, receipt qty, receipt price, receipt tax)
const PRODUCTS: &[(&str, &str, i64, i64, i64, i64, i64)] = &[
    ("BEV-COKE-330", "Coca-Cola 330ml", 24, 45, 48, 50, 4),
    ("BEV-WATER-500", "Spring Water 500ml", 40, 20, 60, 22, 2),
    ("SNK-CHIPS-150", "Salted Chips 150g", 12, 95, 24, 110, 9),
    ("DRY-MILK-1L", "Whole Milk 1L", 18, 80, 18, 85, 0),
];

/// (sale id, sku, qty, unit price)
const SALES: &[(&str, &str, i64, i64)] = &[
    ("S-1001", "BEV-COKE-330", 30, 120),
    ("S-1002", "BEV-WATER-500", 12, 60),
    ("S-1003", "SNK-CHIPS-150", 5, 250),
    ("S-1004", "BEV-COKE-330", 6, 120),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Lotkeeper Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -c, --config <PATH>  Config file path (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("Lotkeeper Seed Data Generator");
    println!("=============================");
    println!("Database:         {}", config.database.path.display());
    println!("Shortage costing: {}", config.reconciliation.shortage_costing);
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Products, opening stock (backdated so it is consumed first), receipts
    let opening_at = Utc::now() - Duration::days(30);
    for (idx, (sku, name, open_qty, open_cost, recv_qty, recv_price, recv_tax)) in
        PRODUCTS.iter().enumerate()
    {
        let product = db.products().register(sku, name).await?;

        let mut opening = NewLot::purchase(
            &product.id,
            *open_qty,
            UnitCostComponents::purchase_price(*open_cost),
            "OPENING-BALANCE",
        )
        .at_location(STORE)
        .received_at(opening_at);
        opening.source_kind = LotSource::InitialStock;
        db.lots().open_lot(opening).await?;

        let costs = UnitCostComponents {
            purchase_price_cents: *recv_price,
            tax_cents: *recv_tax,
            other_cost_cents: 0,
        };
        let receipt = NewLot::purchase(&product.id, *recv_qty, costs, format!("GR-{}", 2001 + idx))
            .at_location(STORE);
        db.lots().open_lot(receipt).await?;
    }
    println!("✓ Registered {} products with opening stock and receipts", PRODUCTS.len());

    // Sales
    for (sale_id, sku, qty, price) in SALES {
        let Some(product) = db.products().get_by_sku(sku).await? else {
            continue;
        };
        let allocations = db
            .lots()
            .consume(
                ConsumeRequest::new(&product.id, *qty, OutboundRef::sale_line(*sale_id, "1"))
                    .at_location(STORE)
                    .with_sale_price(*price),
            )
            .await?;
        let cogs: i64 = allocations.iter().map(|a| a.cost().cents()).sum();
        println!("  {} {} × {}: {} lot(s), COGS {} cents", sale_id, qty, sku, allocations.len(), cogs);
    }

    let voided = db.lots().reverse(&OutboundRef::sale("S-1004")).await?;
    println!("✓ Voided S-1004: {} unit(s) restored", voided.quantity_restored);

    // Stock count: a few chips went missing
    let session_id = db
        .reconciliations()
        .create(STORE, opening_at, Utc::now(), "seed", Some("demo count"))
        .await?;
    if let Some(detail) = db.reconciliations().get(session_id).await? {
        let chips = db.products().get_by_sku("SNK-CHIPS-150").await?;
        for line in &detail.lines {
            let counted = match &chips {
                Some(p) if p.id == line.product_id => line.system_qty - 2,
                _ => line.system_qty,
            };
            db.reconciliations()
                .set_physical_qty(session_id, line.id, Some(counted))
                .await?;
        }
    }
    let outcome = db.reconciliations().apply(session_id, "seed").await?;
    println!(
        "✓ Reconciliation {} applied: {} line(s), -{} / +{} units",
        session_id, outcome.lines_applied, outcome.shortage_units, outcome.surplus_units
    );

    // Report
    println!();
    println!("On-hand valuation at {}:", STORE);
    let valuation = db.valuation().on_hand_valuation(None, Some(STORE)).await?;
    println!("{}", serde_json::to_string_pretty(&valuation)?);

    for (sku, ..) in PRODUCTS {
        if let Some(product) = db.products().get_by_sku(sku).await? {
            let margin = db.ledger().gross_margin(&product.id, None).await?;
            info!(
                sku = %sku,
                units = margin.units_sold,
                revenue = margin.revenue_cents,
                cogs = margin.cogs_cents,
                margin = margin.margin_cents,
                "Gross margin"
            );
        }
    }

    db.close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Initializes logging.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lotkeeper=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
