//! Command line entry point for media-dl

use clap::{Args, Parser, Subcommand};
use media_dl::{Config, ErrorLog, MediaDownloader, RunSummary};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "media-dl",
    version,
    about = "Download media listed in a CSV file, skipping what is already on disk"
)]
struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every item in the input CSV
    Run(RunArgs),
    /// Write the unique source links of the input CSV to a text file
    ExtractLinks(ExtractArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// CSV with artist_username, title and permalink_url columns
    #[arg(short, long, default_value = "metadata.csv")]
    input: PathBuf,

    /// Output root
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Minimum size in bytes of a valid output
    #[arg(long)]
    min_size: Option<u64>,

    /// Items per batch
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Pause between batches in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Attempts per item, including the first
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Delay after the first failed attempt in milliseconds
    #[arg(long)]
    backoff_ms: Option<u64>,

    /// Client id appended to source requests
    #[arg(long, env = "MEDIA_DL_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// CSV with artist_username, title and permalink_url columns
    #[arg(short, long, default_value = "metadata.csv")]
    input: PathBuf,

    /// Where to write the links
    #[arg(short, long, default_value = "links.txt")]
    output: PathBuf,

    /// Only keep links containing this host
    #[arg(long, default_value = "soundcloud.com")]
    host: String,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.download.output_dir = dir.clone();
        }
        if let Some(size) = self.min_size {
            config.download.min_file_size = size;
        }
        if let Some(concurrency) = self.concurrency {
            config.batch.concurrency = concurrency;
        }
        if let Some(ms) = self.delay_ms {
            config.batch.inter_batch_delay = Duration::from_millis(ms);
        }
        if let Some(attempts) = self.max_attempts {
            config.retry.max_attempts = attempts;
        }
        if let Some(ms) = self.backoff_ms {
            config.retry.initial_delay = Duration::from_millis(ms);
        }
        if let Some(id) = &self.client_id {
            config.source.client_id = Some(id.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config.source.request_timeout = Some(Duration::from_secs(secs));
        }
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>) -> media_dl::Result<Config> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            Config::from_file(path)
        }
        None => Ok(Config::default()),
    }
}

/// Resolve the effective configuration for a `run` invocation
fn run_config(cli: &Cli, args: &RunArgs) -> media_dl::Result<Config> {
    let mut config = load_config(cli.config.as_deref())?;
    args.apply(&mut config);
    Ok(config)
}

async fn run(config: Config, input: &Path) -> media_dl::Result<RunSummary> {
    let downloader = MediaDownloader::new(config)?;
    downloader.run_csv(input).await
}

fn extract_links(args: &ExtractArgs) -> media_dl::Result<usize> {
    let items = media_dl::input::read_items(&args.input)?;
    let links = media_dl::input::extract_links(&items, &args.host);
    media_dl::input::write_links(&args.output, &links)?;
    Ok(links.len())
}

fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Done: {} items, {} skipped, {} downloaded, {} failed",
            summary.total, summary.skipped, summary.downloaded, summary.failed
        ),
        format!("Check {} for error details", summary.error_log.display()),
    ];
    if let Some(report) = &summary.failure_report {
        lines.push(format!("Failed items written to {}", report.display()));
    }
    lines
}

fn print_summary(summary: &RunSummary) {
    for line in summary_lines(summary) {
        println!("{line}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match &cli.command {
        Command::Run(args) => {
            let result = match run_config(&cli, args) {
                Ok(config) => {
                    let error_log = ErrorLog::new(config.error_log_path());
                    let result = run(config, &args.input).await;
                    if let Err(e) = &result {
                        error_log.record_fatal(e);
                    }
                    result
                }
                Err(e) => {
                    // The configured root is unknown, so fall back to the defaults and flags
                    let mut fallback = Config::default();
                    args.apply(&mut fallback);
                    ErrorLog::new(fallback.error_log_path()).record_fatal(&e);
                    Err(e)
                }
            };
            match result {
                Ok(summary) => {
                    print_summary(&summary);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!(error = %e, "Fatal error");
                    eprintln!("Error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Command::ExtractLinks(args) => match extract_links(args) {
            Ok(count) => {
                println!(
                    "Extracted {} unique links to {}",
                    count,
                    args.output.display()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "Fatal error");
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },
    }
}
