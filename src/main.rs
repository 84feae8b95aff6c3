//! doi2pdf - download academic papers as PDF
//!
//! ## Usage
//!
//! ```bash
//! doi2pdf --doi 10.1038/nature12373 -o papers
//! doi2pdf --name "Attention is all you need" --open
//! doi2pdf --input-file dois.txt --method plain-http --delay 5
//! ```

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use doi2pdf::batch::{read_identifiers, BatchRunner};
use doi2pdf::config::{self, Config, DEFAULT_DELAY_SECS};
use doi2pdf::identifier::SourceKind;
use doi2pdf::mirror::browser::DEFAULT_WEBDRIVER_URL;
use doi2pdf::mirror::{StrategyKind, DEFAULT_MIRROR_URL};
use doi2pdf::openalex::OPENALEX_API_BASE;
use doi2pdf::pipeline::{Downloader, PdfSource};
use doi2pdf::report;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Download academic papers as PDF from a DOI, title or URL
#[derive(Parser)]
#[command(name = "doi2pdf")]
#[command(version, about, long_about = None)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["doi", "name", "url", "input_file"]),
))]
struct Cli {
    /// DOI of the paper (bare, doi: or doi.org URL)
    #[arg(long)]
    doi: Option<String>,

    /// Paper title to search for
    #[arg(long)]
    name: Option<String>,

    /// URL of the paper or its PDF
    #[arg(long)]
    url: Option<String>,

    /// File with one identifier per line
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Open each PDF in the system viewer after download
    #[arg(long)]
    open: bool,

    /// Mirror fallback method
    #[arg(long, value_enum, default_value_t = StrategyKind::Browser)]
    method: StrategyKind,

    /// Seconds to wait between batch items
    #[arg(long, default_value_t = DEFAULT_DELAY_SECS as f64)]
    delay: f64,

    /// Mirror site base URL
    #[arg(long, env = "SCI_HUB_URL", default_value = DEFAULT_MIRROR_URL)]
    mirror: String,

    /// WebDriver endpoint for the browser method
    #[arg(long, env = "WEBDRIVER_URL", default_value = DEFAULT_WEBDRIVER_URL)]
    webdriver_url: String,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,

    /// Seconds to wait for the mirror's PDF viewer
    #[arg(long, default_value_t = 20.0)]
    element_timeout: f64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 60.0)]
    timeout: f64,

    /// Proxy URL (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    proxy: Option<String>,

    /// OpenAlex API base URL
    #[arg(long, env = "OPENALEX_URL", default_value = OPENALEX_API_BASE)]
    openalex_url: String,

    /// Contact email for the OpenAlex polite pool
    #[arg(long, env = "OPENALEX_MAILTO")]
    mailto: Option<String>,

    /// Do not write a CSV summary after a batch run
    #[arg(long)]
    no_summary: bool,

    /// Also append logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn to_config(&self) -> Result<Config> {
        Ok(Config {
            output_dir: self.output.clone(),
            open_after: self.open,
            strategy: self.method,
            delay: config::seconds(self.delay).context("Invalid --delay")?,
            mirror_url: self.mirror.clone(),
            openalex_url: self.openalex_url.clone(),
            mailto: self.mailto.clone(),
            webdriver_url: self.webdriver_url.clone(),
            headless: self.headless,
            element_timeout: config::seconds(self.element_timeout)
                .context("Invalid --element-timeout")?,
            request_timeout: config::seconds(self.timeout).context("Invalid --timeout")?,
            proxy: self.proxy.clone(),
            write_summary: !self.no_summary,
        })
    }

    /// The single identifier and its source tag, if not in batch mode.
    fn single_input(&self) -> Option<(&str, SourceKind)> {
        if let Some(doi) = &self.doi {
            Some((doi.as_str(), SourceKind::Doi))
        } else if let Some(name) = &self.name {
            Some((name.as_str(), SourceKind::Name))
        } else {
            self.url.as_deref().map(|url| (url, SourceKind::Url))
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_file.as_deref())?;

    let config = cli.to_config()?;
    let downloader = Downloader::from_config(&config).context("Failed to set up downloader")?;

    let ok = match (&cli.input_file, cli.single_input()) {
        (Some(path), _) => run_batch(&downloader, &config, path).await?,
        (None, Some((raw, source))) => run_single(&downloader, raw, source).await,
        // clap's required group makes this unreachable
        (None, None) => false,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let log_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(file_layer)
        .init();
    Ok(())
}

// ============================================================================
// Single & Batch Modes
// ============================================================================

async fn run_single(downloader: &Downloader, raw: &str, source: SourceKind) -> bool {
    match downloader.download(raw, source).await {
        Ok(saved) => {
            let via = match saved.source {
                PdfSource::Direct => "direct link",
                PdfSource::Mirror => "mirror",
            };
            println!("Title: {}", saved.record.title);
            println!("Saved ({}): {}", via, saved.path.display());
            true
        }
        Err(failure) => {
            error!(input = %raw, stage = %failure.stage, kind = %failure.error.kind(), "Download failed");
            println!("Failed to download {}: {}", raw, failure);
            false
        }
    }
}

async fn run_batch(downloader: &Downloader, config: &Config, path: &Path) -> Result<bool> {
    let items = read_identifiers(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    if items.is_empty() {
        println!("No identifiers in {}", path.display());
        return Ok(true);
    }

    println!("Processing {} identifiers...", items.len());
    let summary = BatchRunner::new(config.delay).run(downloader, items).await;

    println!("\n--- Summary ---");
    println!("Saved: {}", summary.saved());
    println!("Failed: {}", summary.failed());
    for report in summary.reports.iter().filter(|r| r.outcome.is_err()) {
        if let Err(e) = &report.outcome {
            println!("  [{}] {}: {}", report.item.position, report.item.raw, e);
        }
    }

    if config.write_summary {
        let summary_file = report::summary_path(&config.output_dir);
        report::write_summary(&summary_file, &summary).context("Failed to write summary")?;
        println!("Summary: {}", summary_file.display());
    }

    info!(saved = summary.saved(), failed = summary.failed(), "Done");
    Ok(summary.failed() == 0)
}
