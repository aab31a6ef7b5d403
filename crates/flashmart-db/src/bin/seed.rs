//! # Seed Data Generator
//!
//! Populates the database with demo catalog data for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p flashmart-db --bin seed
//!
//! # Generate custom amount, first 20 on flash sale
//! cargo run -p flashmart-db --bin seed -- --count 500 --flash 20
//!
//! # Specify database path
//! cargo run -p flashmart-db --bin seed -- --db ./data/flashmart.db
//! ```
//!
//! ## Generated Products
//! - Every category (Food, Home, Beauty, Other) gets products
//! - Prices between ₹49 and ₹848, deterministic per index
//! - Stock between 50 and 149
//! - The first `--flash` products carry a live flash sale: 15-24% off,
//!   ending 12-35 hours from now

use chrono::{Duration, Utc};
use std::env;
use tracing_subscriber::EnvFilter;

use flashmart_core::{Category, FlashSale, Money, Product};
use flashmart_db::{Database, DbConfig};

/// Product names per category for realistic demo data
const CATALOG: &[(Category, &[&str])] = &[
    (
        Category::Food,
        &[
            "Masala Chai",
            "Filter Coffee",
            "Basmati Rice",
            "Toor Dal",
            "Alphonso Mango Pulp",
            "Ghee",
            "Jaggery Powder",
            "Roasted Makhana",
            "Dark Chocolate",
            "Kokum Sherbet",
        ],
    ),
    (
        Category::Home,
        &[
            "Steel Tiffin",
            "Cotton Bedsheet",
            "Brass Diya",
            "Copper Bottle",
            "Bamboo Mat",
            "Cast Iron Tawa",
            "Clay Planter",
            "Jute Basket",
            "Scented Candle",
            "Door Mat",
        ],
    ),
    (
        Category::Beauty,
        &[
            "Rose Face Mist",
            "Kumkumadi Oil",
            "Sandalwood Soap",
            "Aloe Gel",
            "Hair Oil",
            "Ubtan Face Pack",
            "Kajal",
            "Lip Balm",
            "Neem Face Wash",
            "Body Lotion",
        ],
    ),
    (
        Category::Other,
        &[
            "Notebook",
            "Yoga Block",
            "Water Colours",
            "Board Game",
            "Phone Stand",
            "Travel Pouch",
            "Gift Card Holder",
            "Umbrella",
            "Tote Bag",
            "Baby Wipes",
        ],
    ),
];

/// Pack sizes for products
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Regular", 5000),
    ("Large", 12000),
    ("Family Pack", 25000),
    ("Combo", 35000),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Repository logs (migrations, failures) go to stderr; progress to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flashmart_db=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut flash: usize = 50;
    let mut db_path = String::from("./flashmart_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--flash" | "-f" => {
                if i + 1 < args.len() {
                    flash = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Flashmart Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -f, --flash <N>    How many of them get a live flash sale (default: 50)");
                println!("  -d, --db <PATH>    Database file path (default: ./flashmart_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Flashmart Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Products: {} ({} on flash sale)", count, flash.min(count));
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing products
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut on_sale = 0;

    // Interleave categories so a small --count still covers all of them
    let names_per_category = CATALOG[0].1.len();
    'outer: for (size_name, price_addon) in SIZES {
        for name_idx in 0..names_per_category {
            for (category, names) in CATALOG {
                if generated >= count {
                    break 'outer;
                }
                let Some(name) = names.get(name_idx) else {
                    continue;
                };

                let product = generate_product(
                    *category,
                    name,
                    size_name,
                    *price_addon,
                    generated,
                    generated < flash,
                );
                if product.flash_sale.is_active {
                    on_sale += 1;
                }

                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.name, e);
                    continue;
                }

                generated += 1;

                if generated % 50 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);
    println!("  Flash sales: {}", on_sale);

    // Verify FTS
    println!();
    println!("Verifying FTS index...");
    let filter = flashmart_db::ProductFilter {
        category: None,
        search: Some("chai".into()),
    };
    let search_results = db.products().list(&filter, 10).await?;
    println!("  Search 'chai': {} results", search_results.len());

    let live = db.products().list_flash_sales(Utc::now()).await?;
    println!("  Live flash sales: {}", live.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with deterministic data.
fn generate_product(
    category: Category,
    name: &str,
    size: &str,
    price_addon: i64,
    seed: usize,
    flash_sale: bool,
) -> Product {
    let now = Utc::now();

    // Base ₹49.00 - ₹848.00 + size addon
    let base = 4900 + ((seed * 1700) % 80000) as i64;
    let base_price = Money::from_cents(base + price_addon);

    // Stock 50-149
    let stock = 50 + (seed % 100) as i64;

    let full_name = format!("{} {}", name, size);
    let mut product = Product::new(full_name.clone(), category, base_price, stock, now)
        .with_description(format!("{} from the Flashmart {} range.", full_name, category));

    if flash_sale {
        // 15-24% off, ending 12-35 hours from now
        let discount_pct = 15 + (seed % 10) as i64;
        let sale_price = Money::from_cents(base_price.cents() * (100 - discount_pct) / 100);
        let end_time = now + Duration::hours(12 + (seed % 24) as i64);
        product.flash_sale = FlashSale::live(sale_price, end_time);
    }

    product
}
