//! Compare command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use dupewatch_core::{ComparisonDetails, ComparisonResult, Config, SimilarityLevel};
use tracing::info;

use crate::utils::{build_engine, load_image_source, to_json, OutputFormat};

#[derive(Args)]
pub struct CompareArgs {
    /// First image (file path or http(s) URL)
    #[arg(value_name = "A")]
    left: String,

    /// Second image (file path or http(s) URL)
    #[arg(value_name = "B")]
    right: String,

    /// Match threshold in 0-100 (defaults to DUPEWATCH_SIMILARITY_THRESHOLD or 70)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Execute the compare command.
pub async fn execute(config: &Config, args: CompareArgs, quiet: bool) -> Result<()> {
    let engine = build_engine(config, args.threshold)?;

    let left = load_image_source(&args.left)?;
    let right = load_image_source(&args.right)?;

    // Fingerprint separately so load failures keep their cause.
    let left_fp = engine
        .compute_fingerprint(&left)
        .await
        .with_context(|| format!("Failed to fingerprint {}", args.left))?;
    let right_fp = engine
        .compute_fingerprint(&right)
        .await
        .with_context(|| format!("Failed to fingerprint {}", args.right))?;

    let result = engine.compare_fingerprints(&left_fp, &right_fp);
    info!(
        score = result.overall_similarity,
        level = %result.similarity_level,
        "Comparison finished"
    );

    match args.format {
        OutputFormat::Json => println!("{}", to_json(&result)?),
        OutputFormat::Text if !quiet => print_text(&result, engine.threshold()),
        OutputFormat::Text => {}
    }

    if let ComparisonDetails::Error { message } = &result.details {
        anyhow::bail!("Comparison failed: {message}");
    }
    Ok(())
}

pub(crate) fn level_label(level: SimilarityLevel) -> colored::ColoredString {
    match level {
        SimilarityLevel::Exact => "exact".green().bold(),
        SimilarityLevel::High => "high".green(),
        SimilarityLevel::Medium => "medium".yellow(),
        SimilarityLevel::Low => "low".normal(),
        SimilarityLevel::Error => "error".red(),
    }
}

fn print_text(result: &ComparisonResult, threshold: f64) {
    let verdict = if result.is_match {
        "MATCH".green().bold()
    } else {
        "NO MATCH".dimmed()
    };

    println!();
    println!(
        "   {} {:.2}% ({})  {}",
        "Similarity:".dimmed(),
        result.overall_similarity,
        level_label(result.similarity_level),
        verdict
    );
    println!("   {} {:.2}%", "Threshold:".dimmed(), threshold);

    if let ComparisonDetails::Fingerprints {
        algorithm,
        bit_size,
        distance,
        ..
    } = &result.details
    {
        println!(
            "   {} {} of {} bits differ ({})",
            "Distance:".dimmed(),
            distance,
            bit_size,
            algorithm
        );
    }
}
