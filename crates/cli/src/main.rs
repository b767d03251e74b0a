//! # handelingen: command-line front end
//!
//! One subcommand per harvest stage, plus audits, a preview of parsed
//! speeches, and the language-model analysis runner.

mod commands;
mod config;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "handelingen=info";

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// YAML config file. Defaults to ./config.yml when present.
    #[arg(long, global = true, env = "HANDELINGEN_CONFIG")]
    config: Option<PathBuf>,
    /// Log file written alongside stderr.
    #[arg(long, global = true, default_value = "handelingen.log")]
    log_file: PathBuf,
    /// Overrides `data_dir` from the config.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Overrides the group order, e.g. `--groups 2023-2024,2022-2023`.
    #[arg(long, global = true, value_delimiter = ',')]
    groups: Vec<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect document links from the listing pages
    Links,
    /// Download the XML documents named in the link lists
    Download,
    /// Scrape the metadata detail page of every downloaded document
    Meta,
    /// Re-scrape metadata for named documents with a patient retry policy
    MetaRetry(MetaRetryArgs),
    /// Extract speeches from downloaded documents
    Parse,
    /// Run links, download, meta and parse in order
    Harvest,
    /// Audit what the stages produced
    Validate(ValidateArgs),
    /// Print the first parsed speeches of each group
    Preview(PreviewArgs),
    /// Send speeches to the language model and write a JSON report
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct MetaRetryArgs {
    /// The session year the documents belong to.
    #[arg(long)]
    group: String,
    /// Document names without `.xml`. Defaults to the logged metadata failures.
    names: Vec<String>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[command(subcommand)]
    target: ValidateTarget,
}

#[derive(Subcommand, Debug)]
enum ValidateTarget {
    /// Compare link lists with downloaded documents and the error log
    Downloads,
    /// Check metadata rows for bad values, duplicates and orphans
    Metadata,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// Only this group instead of every configured one.
    #[arg(long)]
    group: Option<String>,
    #[arg(short = 'n', long, default_value_t = 5)]
    count: usize,
    #[arg(long, default_value_t = 100)]
    max_chars: usize,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// A speeches CSV file or a directory of `speeches_*.csv`.
    #[arg(long)]
    csv_path: Option<PathBuf>,
    #[arg(long)]
    prompt_path: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Number of random speeches to analyze; 0 runs the full analysis.
    #[arg(long, default_value_t = 0)]
    sample: usize,
    #[arg(long, default_value_t = 50)]
    min_length: usize,
}

// --- Main Application Entry ---

fn init_tracing(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr.and(Arc::new(file)))
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

async fn run(command: Commands, config: config::AppConfig) -> Result<()> {
    match command {
        Commands::Links => commands::links(&config).await,
        Commands::Download => commands::download(&config).await,
        Commands::Meta => commands::meta(&config).await,
        Commands::MetaRetry(args) => commands::meta_retry(&config, &args.group, args.names).await,
        Commands::Parse => commands::parse(&config).await,
        Commands::Harvest => commands::harvest(&config).await,
        Commands::Validate(args) => match args.target {
            ValidateTarget::Downloads => commands::validate_downloads(&config),
            ValidateTarget::Metadata => commands::validate_metadata(&config),
        },
        Commands::Preview(args) => {
            commands::preview(&config, args.group.as_deref(), args.count, args.max_chars)
        }
        Commands::Analyze(args) => {
            commands::analyze(
                &config,
                commands::AnalyzeOptions {
                    csv_path: args.csv_path,
                    prompt_path: args.prompt_path,
                    output_dir: args.output_dir,
                    sample: args.sample,
                    min_length: args.min_length,
                },
            )
            .await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_file)?;

    let mut config =
        config::get_config(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if !cli.groups.is_empty() {
        config.groups = cli.groups;
    }

    tokio::select! {
        result = run(cli.command, config) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted. Checkpoints point at the last stored item.");
            bail!("interrupted")
        }
    }
}
