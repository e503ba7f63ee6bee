//! Dupewatch CLI - marketplace listing search and duplicate image detection.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use dupewatch_core::Config;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod exit_codes;
mod utils;

use commands::{compare, fingerprint, rank, search};
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  66  Input file could not be read
  69  Marketplace or image host unavailable";

#[derive(Parser)]
#[command(name = "dupewatch")]
#[command(author, version, about = "Marketplace listing search and duplicate image detection", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress human-readable output (JSON output is unaffected)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a marketplace for listings matching a keyword
    Search(search::SearchArgs),

    /// Print the perceptual fingerprint of an image
    Fingerprint(fingerprint::FingerprintArgs),

    /// Compare two images
    Compare(compare::CompareArgs),

    /// Rank candidate images by similarity to a source image
    Rank(rank::RankArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "dupewatch_core=debug,dupewatch=debug,info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("DUPEWATCH_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Search(args) => search::execute(&config, args, quiet).await,
        Commands::Fingerprint(args) => fingerprint::execute(&config, args, quiet).await,
        Commands::Compare(args) => compare::execute(&config, args, quiet).await,
        Commands::Rank(args) => rank::execute(&config, args, quiet).await,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}
