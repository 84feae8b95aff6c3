//! CSV summary of a batch run.

use crate::batch::{BatchSummary, ItemReport};
use crate::error::{Error, Result};
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// One CSV row per batch item
#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    position: usize,
    identifier: &'a str,
    status: &'static str,
    kind: String,
    detail: String,
    path: String,
}

impl<'a> From<&'a ItemReport> for SummaryRow<'a> {
    fn from(report: &'a ItemReport) -> Self {
        let (status, kind, detail, path) = match &report.outcome {
            Ok(path) => ("saved", String::new(), String::new(), path.display().to_string()),
            Err(e) => ("failed", e.kind().to_string(), e.to_string(), String::new()),
        };
        Self {
            position: report.item.position,
            identifier: &report.item.raw,
            status,
            kind,
            detail,
            path,
        }
    }
}

/// `download_summary_<timestamp>.csv` under `dir`
pub fn summary_path(dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("download_summary_{}.csv", timestamp))
}

/// Write the summary as CSV to `path`, creating parent directories.
pub fn write_summary(path: &Path, summary: &BatchSummary) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_err)?;

    for report in &summary.reports {
        wtr.serialize(SummaryRow::from(report)).map_err(csv_err)?;
    }
    wtr.flush()?;

    info!(path = %path.display(), rows = summary.reports.len(), "Wrote batch summary");
    Ok(())
}

fn csv_err(e: csv::Error) -> Error {
    Error::Io(std::io::Error::other(e.to_string()))
}
