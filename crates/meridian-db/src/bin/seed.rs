//! # Seed Data Generator
//!
//! Populates the database with development data: a few suppliers and a
//! catalog of products across categories.
//!
//! ## Usage
//! ```bash
//! # Default database path (./meridian.db) and product count
//! cargo run -p meridian-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p meridian-db --bin seed -- --count 500 --db ./data/pos.db
//! ```
//!
//! Prices and stock levels are derived from the product index, so seeding
//! is deterministic: the same arguments produce the same catalog.

use std::env;

use meridian_db::{Database, DbConfig, NewProduct, NewSupplier};
use tracing::{error, info};

/// Product categories with representative names.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Cola 330ml",
            "Cola 500ml",
            "Orange Soda 330ml",
            "Bottled Water 750ml",
            "Malt Drink 330ml",
            "Iced Tea 500ml",
            "Orange Juice 1L",
            "Pineapple Juice 1L",
        ],
    ),
    (
        "SNK",
        &[
            "Plantain Chips 100g",
            "Potato Chips 150g",
            "Salted Peanuts 200g",
            "Chocolate Bar 45g",
            "Biscuits 200g",
            "Chewing Gum 14g",
        ],
    ),
    (
        "GRO",
        &[
            "Rice 5kg",
            "Sugar 1kg",
            "Flour 2kg",
            "Cooking Oil 1L",
            "Tomato Paste 400g",
            "Canned Sardines 125g",
            "Spaghetti 500g",
            "Salt 500g",
        ],
    ),
    (
        "HOME",
        &[
            "Laundry Soap Bar",
            "Washing Powder 1kg",
            "Dish Liquid 500ml",
            "Matches Box",
            "Candles Pack of 6",
            "Batteries AA 4pk",
        ],
    ),
];

const SUPPLIERS: &[&str] = &["Accra Wholesale Ltd", "Tema Distributors", "Northern Traders"];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let db_path = arg_value(&args, "--db").unwrap_or_else(|| "./meridian.db".to_string());
    let count: usize = arg_value(&args, "--count")
        .and_then(|v| v.parse().ok())
        .unwrap_or(200);

    info!(db = %db_path, count = %count, "Seeding database");

    if let Err(e) = run(&db_path, count).await {
        error!(error = %e, "Seeding failed");
        std::process::exit(1);
    }
}

async fn run(db_path: &str, count: usize) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::new(DbConfig::new(db_path)).await?;

    // Initialize the settings row so the front end has defaults to edit
    let settings = db.settings().get().await?;
    info!(business = %settings.business_name, currency = %settings.currency, "Settings ready");

    let mut supplier_ids = Vec::new();
    for name in SUPPLIERS {
        let supplier = db
            .suppliers()
            .create(NewSupplier {
                name: name.to_string(),
                ..Default::default()
            })
            .await?;
        supplier_ids.push(supplier.id);
    }
    info!(count = supplier_ids.len(), "Suppliers created");

    let mut created = 0usize;
    'outer: for round in 0.. {
        for (cat_idx, (category, names)) in CATEGORIES.iter().enumerate() {
            for (name_idx, name) in names.iter().enumerate() {
                if created >= count {
                    break 'outer;
                }

                let index = created;
                let sku = format!("{}-{:04}", category, index);
                let display_name = if round == 0 {
                    name.to_string()
                } else {
                    format!("{} (lot {})", name, round + 1)
                };

                // Deterministic pseudo-variation from the index
                let price_cents = 99 + ((index as i64 * 137) % 1900);
                let cost_price_cents = price_cents * 6 / 10;
                let stock_quantity = (index as i64 * 31) % 100;

                db.products()
                    .create(NewProduct {
                        name: display_name,
                        sku,
                        category: Some(category.to_string()),
                        supplier_id: Some(supplier_ids[(cat_idx + name_idx) % supplier_ids.len()]),
                        price_cents,
                        cost_price_cents: Some(cost_price_cents),
                        stock_quantity,
                        low_stock_threshold: 5,
                        ..Default::default()
                    })
                    .await?;

                created += 1;
            }
        }
    }

    info!(products = created, "Seed complete");
    db.close().await;
    Ok(())
}

/// Returns the value following `flag` in the argument list.
fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
