//! Sequential batch processing of identifiers read from a file.
//!
//! Items run strictly one after another. A failing item is recorded and the
//! run moves on; the configured delay is inserted between items but not after
//! the last one.

use crate::error::{Error, Result};
use crate::identifier::SourceKind;
use crate::pipeline::Downloader;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// One non-empty line of a batch file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// 1-based position among the kept lines
    pub position: usize,
    pub raw: String,
    pub source: SourceKind,
}

/// Keep non-blank, non-comment lines and classify each one.
pub fn parse_identifiers(text: &str) -> Vec<BatchItem> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .map(|(i, line)| BatchItem {
            position: i + 1,
            raw: line.to_string(),
            source: SourceKind::infer(line),
        })
        .collect()
}

/// Read a batch file. A missing or unreadable file is an `Io` error.
pub fn read_identifiers(path: &Path) -> Result<Vec<BatchItem>> {
    let text = std::fs::read_to_string(path)?;
    let items = parse_identifiers(&text);
    info!(path = %path.display(), count = items.len(), "Loaded identifiers");
    Ok(items)
}

/// Anything that can turn one batch item into a saved file.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: &BatchItem) -> std::result::Result<PathBuf, Error>;
}

#[async_trait]
impl ItemProcessor for Downloader {
    async fn process(&self, item: &BatchItem) -> std::result::Result<PathBuf, Error> {
        self.download(&item.raw, item.source)
            .await
            .map(|saved| saved.path)
            .map_err(|failure| failure.error)
    }
}

/// Outcome of one item
#[derive(Debug)]
pub struct ItemReport {
    pub item: BatchItem,
    pub outcome: std::result::Result<PathBuf, Error>,
}

/// Per-item outcomes of a whole run, in input order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<ItemReport>,
    /// Number of inter-item pauses taken
    pub pauses: usize,
}

impl BatchSummary {
    pub fn saved(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.saved()
    }
}

pub struct BatchRunner {
    delay: Duration,
}

impl BatchRunner {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Process every item in order. Never aborts on an item failure.
    pub async fn run<P: ItemProcessor + ?Sized>(&self, processor: &P, items: Vec<BatchItem>) -> BatchSummary {
        let total = items.len();
        let mut summary = BatchSummary::default();

        for (index, item) in items.into_iter().enumerate() {
            println!("[{}/{}] {}", index + 1, total, item.raw);

            let outcome = processor.process(&item).await;
            match &outcome {
                Ok(path) => println!("  Saved: {}", path.display()),
                Err(e) => {
                    warn!(position = item.position, input = %item.raw, error = %e, "Item failed");
                    println!("  Failed: {}", e);
                }
            }
            summary.reports.push(ItemReport { item, outcome });

            if index + 1 < total {
                summary.pauses += 1;
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
            }
        }

        info!(
            total = total,
            saved = summary.saved(),
            failed = summary.failed(),
            "Batch finished"
        );
        summary
    }
}
