//! Rank command implementation.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dupewatch_core::similarity::DEFAULT_MIN_SIMILARITY;
use dupewatch_core::{ComparisonResult, Config};
use serde::Serialize;

use super::compare::level_label;
use crate::utils::{build_engine, load_image_source, to_json, OutputFormat};

#[derive(Args)]
pub struct RankArgs {
    /// Source image (file path or http(s) URL)
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Candidate images to rank against the source
    #[arg(value_name = "CANDIDATE", required = true)]
    candidates: Vec<String>,

    /// Drop candidates scoring below this value (0-100)
    #[arg(long, default_value_t = DEFAULT_MIN_SIMILARITY)]
    min_similarity: f64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Serialize)]
struct RankedCandidate<'a> {
    index: usize,
    candidate: &'a str,
    #[serde(flatten)]
    result: &'a ComparisonResult,
}

/// Execute the rank command.
pub async fn execute(config: &Config, args: RankArgs, quiet: bool) -> Result<()> {
    let engine = build_engine(config, None)?;

    let source = load_image_source(&args.source)?;
    let candidates = args
        .candidates
        .iter()
        .map(|c| load_image_source(c))
        .collect::<Result<Vec<_>>>()?;

    let ranked = engine
        .batch_compare(&source, &candidates, args.min_similarity)
        .await;

    let rows: Vec<RankedCandidate<'_>> = ranked
        .iter()
        .map(|(index, result)| RankedCandidate {
            index: *index,
            candidate: &args.candidates[*index],
            result,
        })
        .collect();

    match args.format {
        OutputFormat::Json => println!("{}", to_json(&rows)?),
        OutputFormat::Text if quiet => {}
        OutputFormat::Text => {
            println!();
            println!(
                "{} of {} candidates at or above {:.2}%",
                rows.len().to_string().bold(),
                args.candidates.len(),
                args.min_similarity
            );
            for (position, row) in rows.iter().enumerate() {
                println!(
                    "{:>4}. {:>6.2}% ({})  {}",
                    position + 1,
                    row.result.overall_similarity,
                    level_label(row.result.similarity_level),
                    row.candidate
                );
            }
        }
    }

    Ok(())
}
