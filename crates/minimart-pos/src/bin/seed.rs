//! # Seed Data Loader
//!
//! Fills an empty register database with a small grocery catalog and a few
//! credit customers for development.
//!
//! ## Usage
//! ```bash
//! # Use the database from pos.toml (or the platform default)
//! cargo run -p minimart-pos --bin seed
//!
//! # Specify database path
//! cargo run -p minimart-pos --bin seed -- --db ./data/minimart.db
//! ```
//!
//! Each product gets:
//! - Barcode: `611{category}{index}` padded to 13 digits
//! - Cost between 65% and 85% of the selling price
//! - Stock between 0 and 60, so some start below their minimum level

use std::env;
use std::path::PathBuf;

use minimart_core::{NewCustomer, NewProduct};
use minimart_pos::{init_tracing, PointOfSale, PosConfig};

/// Catalog by category: (name, selling price in cents).
const CATALOG: &[(&str, &[(&str, i64)])] = &[
    (
        "Grocery",
        &[
            ("Couscous 1kg", 1500),
            ("Flour 5kg", 4200),
            ("Sugar 1kg", 1200),
            ("Olive Oil 1L", 6500),
            ("Sunflower Oil 1L", 1900),
            ("Lentils 1kg", 1800),
            ("Rice 1kg", 1600),
            ("Tomato Paste 400g", 900),
        ],
    ),
    (
        "Dairy",
        &[
            ("Milk 1L", 700),
            ("Butter 250g", 2300),
            ("Yogurt 4-Pack", 1000),
            ("Fresh Cheese 200g", 1400),
            ("Eggs x12", 1800),
        ],
    ),
    (
        "Beverages",
        &[
            ("Green Tea 200g", 1850),
            ("Mineral Water 1.5L", 600),
            ("Orange Juice 1L", 1300),
            ("Coffee 250g", 3200),
            ("Cola 1L", 1000),
        ],
    ),
    (
        "Household",
        &[
            ("Dish Soap 750ml", 1450),
            ("Laundry Powder 1kg", 2600),
            ("Bleach 1L", 800),
            ("Paper Towels x2", 1700),
        ],
    ),
];

/// (name, phone, credit limit in cents)
const CUSTOMERS: &[(&str, Option<&str>, i64)] = &[
    ("Amina Benali", Some("0612345678"), 50000),
    ("Youssef Idrissi", Some("0661000000"), 100000),
    ("Khadija Alaoui", None, 30000),
    ("Omar Tazi", Some("0700112233"), 0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
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
                println!("Minimart POS Seed Data Loader");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: from pos.toml)");
                println!("  -c, --config <PATH>   Config file path (default: platform config dir)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = PosConfig::load_or_default(config_path);
    if db_path.is_some() {
        config.database.path = db_path;
    }
    init_tracing(&config.logging.filter);

    println!("Minimart POS Seed Data Loader");
    println!("=============================");
    println!("Database: {}", config.database_path()?.display());
    println!();

    let pos = PointOfSale::open(&config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = pos.database().products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Loading catalog...");

    let mut loaded = 0;
    for (category_idx, (category, products)) in CATALOG.iter().enumerate() {
        for (product_idx, (name, price_cents)) in products.iter().enumerate() {
            let product = generate_product(category_idx, product_idx, name, *price_cents);
            if let Err(e) = pos.add_product(&product).await {
                eprintln!("Failed to insert {}: {}", name, e);
                continue;
            }
            loaded += 1;
        }
        println!("  {}: {} products", category, products.len());
    }

    println!();
    println!("Loading customers...");
    for (full_name, phone, credit_limit_cents) in CUSTOMERS {
        let customer = NewCustomer {
            full_name: full_name.to_string(),
            phone: phone.map(String::from),
            credit_limit_cents: *credit_limit_cents,
        };
        if let Err(e) = pos.add_customer(&customer).await {
            eprintln!("Failed to insert {}: {}", full_name, e);
        }
    }

    let low_stock = pos.low_stock_products().await?;

    println!();
    println!("✓ Loaded {} products and {} customers", loaded, CUSTOMERS.len());
    println!("  {} products start at or below their minimum level", low_stock.len());
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one product with deterministic cost, stock, and promotion.
fn generate_product(category_idx: usize, product_idx: usize, name: &str, price_cents: i64) -> NewProduct {
    let seed = category_idx * 100 + product_idx;

    // EAN-13 shaped, checksum not computed
    let barcode = format!("611{:02}{:08}", category_idx, product_idx);

    // Cost 65-85% of price
    let cost_pct = 65 + (seed * 7 % 21) as i64;

    // Every fifth product on a 10% promotion
    let discount_bps = if seed % 5 == 0 { 1000 } else { 0 };

    NewProduct {
        barcode: Some(barcode),
        name: name.to_string(),
        selling_price_cents: price_cents,
        purchase_price_cents: price_cents * cost_pct / 100,
        initial_stock: (seed * 13 % 61) as i64,
        min_stock_level: 5,
        discount_bps,
    }
}
