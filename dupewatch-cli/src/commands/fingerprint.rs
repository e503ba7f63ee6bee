//! Fingerprint command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use dupewatch_core::Config;
use serde_json::json;

use crate::utils::{build_engine, load_image_source, to_json, OutputFormat};

#[derive(Args)]
pub struct FingerprintArgs {
    /// Image file path or http(s) URL
    #[arg(value_name = "IMAGE")]
    image: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Execute the fingerprint command.
pub async fn execute(config: &Config, args: FingerprintArgs, quiet: bool) -> Result<()> {
    let engine = build_engine(config, None)?;
    let source = load_image_source(&args.image)?;
    let fingerprint = engine
        .compute_fingerprint(&source)
        .await
        .with_context(|| format!("Failed to fingerprint {}", args.image))?;

    match args.format {
        OutputFormat::Json => {
            let output = json!({
                "image": args.image,
                "algorithm": fingerprint.algorithm(),
                "bit_size": fingerprint.bit_size(),
                "hash": fingerprint.to_hex(),
            });
            println!("{}", to_json(&output)?);
        }
        OutputFormat::Text if quiet => println!("{}", fingerprint.to_hex()),
        OutputFormat::Text => {
            println!(
                "{} {}",
                "Algorithm:".dimmed(),
                format!("{} ({} bits)", fingerprint.algorithm(), fingerprint.bit_size())
            );
            println!("{} {}", "Hash:".dimmed(), fingerprint.to_hex().green());
        }
    }

    Ok(())
}
