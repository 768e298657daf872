//! Cart demo binary
//!
//! Runs a short sale through the cart store on file storage, printing the
//! cart after each step. Run it twice to see the cart restored from disk
//! (the last step empties it, so pass `--keep` to skip that).

use anyhow::Context;
use gestpharma_cart::{pos, CartConfig, CartState, CartStore, FileStorage, Money, Product, ProductId, SaleRequest};
use gestpharma_core::environment::SystemClock;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_cart(label: &str, cart: &CartState) {
    println!("\n>>> {label}");
    for item in cart.items() {
        println!(
            "  {:<20} {:>3} x {:>8} = {:>9}",
            item.product().name,
            item.quantity(),
            item.product().unit_price.to_string(),
            item.subtotal().to_string()
        );
    }
    println!(
        "  items: {}  total: {}{}",
        cart.item_count(),
        cart.total(),
        cart.error().map(|e| format!("  [!] {e}")).unwrap_or_default()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = CartConfig::from_env().context("invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let keep = std::env::args().any(|arg| arg == "--keep");

    println!("=== GestPharma cart ===");
    let storage = FileStorage::open(&config.storage_dir)
        .with_context(|| format!("cannot open storage at {}", config.storage_dir.display()))?;
    let cart = CartStore::open(&config, Arc::new(storage), Arc::new(SystemClock)).await?;
    print_cart("Restored", &cart.snapshot());

    let mut updates = cart.subscribe();
    let watcher = tokio::spawn(async move {
        while let Some(state) = updates.changed().await {
            tracing::info!(items = state.item_count(), total = %state.total(), "Cart changed");
        }
    });

    let aspirin = Product::new(1, "Aspirina 500mg", Money::from_cents(2550), 100);
    let ibuprofen = Product::new(2, "Ibuprofeno 400mg", Money::from_cents(3500), 50);

    cart.clear().await?;
    cart.add_item(aspirin.clone(), 2).await?;
    print_cart("Add 2 x Aspirina", &cart.snapshot());

    pos::add_to_cart(&cart, ibuprofen).await?;
    print_cart("Add 1 x Ibuprofeno", &cart.snapshot());

    cart.update_quantity(aspirin.id, 5).await?;
    print_cart("Aspirina quantity to 5", &cart.snapshot());

    let sale = SaleRequest::from_store(&cart)?.with_notes("Demo sale");
    println!("\n>>> Sale request (total {})", sale.total());
    println!("{}", serde_json::to_string_pretty(&sale)?);

    cart.remove_item(ProductId::new(2)).await?;
    print_cart("Remove Ibuprofeno", &cart.snapshot());

    if !keep {
        cart.clear().await?;
        print_cart("Clear", &cart.snapshot());
    }

    cart.close();
    drop(cart);
    watcher.await?;
    println!("\nCart stored under {}", config.storage_dir.join(&config.storage_key).display());
    Ok(())
}
