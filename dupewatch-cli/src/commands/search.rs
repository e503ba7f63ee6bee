//! Search command implementation.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use dupewatch_core::{
    AcquisitionResult, AcquisitionSession, Config, HttpTransport, NoDelay, Platform,
    ShopeeMarketplace, SyntheticMarketplace, SyntheticTransport,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::exit_codes::SEARCH_FAILED;
use crate::utils::{to_json, truncate, OutputFormat};

#[derive(Args)]
pub struct SearchArgs {
    /// Search keyword
    #[arg(value_name = "KEYWORD")]
    keyword: String,

    /// Marketplace to search (ruten and yahoo are synthetic)
    #[arg(short, long, default_value = "shopee")]
    platform: Platform,

    /// Maximum number of pages to request
    #[arg(long, default_value_t = 3)]
    max_pages: u32,

    /// Maximum number of listings to keep
    #[arg(long, default_value_t = 100)]
    max_results: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Execute the search command.
pub async fn execute(config: &Config, args: SearchArgs, quiet: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing current page");
            on_interrupt.cancel();
        }
    });

    let result = match SyntheticMarketplace::for_platform(args.platform) {
        Some(marketplace) => {
            info!(platform = %args.platform, "Using synthetic listings");
            AcquisitionSession::new(
                marketplace.clone(),
                SyntheticTransport::new(marketplace),
                config.session_config(),
            )
            .with_pacer(NoDelay)
            .with_cancellation(cancel)
            .search(&args.keyword, args.max_pages, args.max_results)
            .await
        }
        None => {
            let transport = HttpTransport::new(config.http_transport_config())
                .context("Failed to create marketplace client")?;
            let marketplace = ShopeeMarketplace::new(config.shopee_config())
                .context("Invalid Shopee configuration")?;
            AcquisitionSession::new(
                marketplace,
                transport,
                config.session_config(),
            )
            .with_cancellation(cancel)
            .search(&args.keyword, args.max_pages, args.max_results)
            .await
        }
    };

    match args.format {
        OutputFormat::Json => println!("{}", to_json(&result)?),
        OutputFormat::Text if !quiet => print_text(&result),
        OutputFormat::Text => {}
    }

    if !result.success {
        bail!("{SEARCH_FAILED}: {}", result.errors.join("; "));
    }
    Ok(())
}

fn print_text(result: &AcquisitionResult) {
    println!();
    println!(
        "{} {} on {} ({} pages, {} ms)",
        format!("{} listings", result.total_found).bold(),
        format!("for \"{}\"", result.keyword).cyan(),
        result.platform,
        result.pages_scraped,
        result.duration_ms
    );
    if result.platform != Platform::Shopee {
        println!("   {}", "Synthetic listings, not real marketplace data".yellow());
    }
    println!();

    for (rank, listing) in result.listings.iter().enumerate() {
        println!(
            "{:>4}. {}  {} {:.0}  {} {}",
            rank + 1,
            truncate(&listing.title, 40),
            listing.currency.dimmed(),
            listing.price,
            "sold".dimmed(),
            listing.sales_count
        );
        println!("      {} {}", listing.seller_name.dimmed(), listing.url.dimmed());
    }

    for error in &result.errors {
        println!("   {} {}", "error:".red(), error);
    }
    for warning in &result.warnings {
        println!("   {} {}", "warning:".yellow(), warning);
    }
    if result.cancelled {
        println!("   {}", "Search was cancelled; results are partial".yellow());
    }
}
