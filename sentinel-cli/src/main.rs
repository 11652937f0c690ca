//! Sentinel CLI - invoice red-flag detection.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod output;
mod utils;

use exit_codes::{ExitCode, EXIT_CODES_HELP};

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(author, version, about = "Invoice red-flag detection", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress the human-readable report
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log extraction and rule evaluation to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from invoice documents and flag suspicious ones
    Analyze {
        /// Invoice documents (PDF, PNG, JPEG or plain text), analyzed in order
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Field structurer
        #[arg(long, value_enum, default_value_t = ExtractorArg::Auto)]
        extractor: ExtractorArg,

        /// OCR engine
        #[arg(long, value_enum, default_value_t = OcrArg::Auto)]
        ocr: OcrArg,

        /// Maximum concurrent extractions
        #[arg(short, long, default_value_t = 7)]
        jobs: usize,

        /// Skip visual page hashing
        #[arg(long)]
        no_visual_hash: bool,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Flag already-extracted records read from JSON files
    Check {
        /// JSON files holding one record or an array of records
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Flag engine overrides. Unset values fall back to `SENTINEL_*` variables.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Minimum similarity for "same layout, different vendor" (0-1)
    #[arg(long, value_name = "SCORE")]
    pub same_layout: Option<f64>,

    /// Similarity below which a vendor's invoices are inconsistent (0-1)
    #[arg(long, value_name = "SCORE")]
    pub different_layout: Option<f64>,

    /// Treat near-identical vendor names as the same vendor (Jaro-Winkler cutoff)
    #[arg(long, value_name = "SCORE", num_args = 0..=1, default_missing_value = "0.92")]
    pub vendor_fuzzy: Option<f64>,

    /// Layout similarity scorer (dice, levenshtein, perceptual)
    #[arg(long, value_name = "SCORER")]
    pub similarity: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Also write the CSV report to this path
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Exit with code 65 when any record is red
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtractorArg {
    Auto,
    Heuristic,
    Openai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OcrArg {
    Auto,
    Text,
    Tesseract,
    Azure,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("sentinel_cli=debug,sentinel_core=debug,warn")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Analyze {
            files,
            extractor,
            ocr,
            jobs,
            no_visual_hash,
            engine,
            output,
        } => {
            let options = commands::analyze::AnalyzeOptions {
                extractor,
                ocr,
                jobs,
                visual_hash: !no_visual_hash,
            };
            commands::analyze::execute(files, options, engine, output, quiet).await
        }
        Commands::Check {
            files,
            engine,
            output,
        } => commands::check::execute(files, engine, output, quiet),
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli).await {
        Ok(exit) => exit,
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("Error: {message}");
    }
    std::process::exit(exit.code);
}
