//! Example demonstrating session tracing against the live Shopee search API.
//!
//! Run with: cargo run -p dupewatch-core --example shopee_tracing -- "手機殼"

use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use dupewatch_core::{
    AcquisitionSession, HttpTransport, HttpTransportConfig, SessionConfig, ShopeeMarketplace,
};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::new("dupewatch_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let keyword = std::env::args().nth(1).unwrap_or_else(|| "手機殼".to_string());
    println!("=== Shopee Search Tracing Demo ===\n");

    let config = HttpTransportConfig {
        timeout: Duration::from_secs(15),
        max_retries: 1,
        ..Default::default()
    };
    println!("Transport: {:?}\n", config);

    let transport = match HttpTransport::new(config) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };

    let session = AcquisitionSession::new(
        ShopeeMarketplace::default(),
        transport,
        SessionConfig::default(),
    );
    let result = session.search(&keyword, 2, 20).await;

    println!("\nListings: {}", result.total_found);
    println!("Pages:    {}", result.pages_scraped);
    for listing in result.listings.iter().take(5) {
        println!("   {} | {} {:.0} | {}", listing.id, listing.currency, listing.price, listing.title);
    }
    for error in &result.errors {
        println!("   error: {}", error);
    }
}
