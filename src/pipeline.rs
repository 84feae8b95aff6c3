//! Single-identifier download pipeline.
//!
//! ```text
//! Start -> Normalized -> MetadataResolved -> DirectSucceeded ----------> saved
//!                                         \-> FallbackAttempted (mirror) -> saved
//! ```
//!
//! A saved file is the `Ok` value, [`SavedPaper`]. Any stage can end in a
//! [`Failure`] instead, which keeps the stage reached and the error that
//! stopped the run.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{build_http_client, FetchOptions, PdfFetcher};
use crate::filename::{derive_filename, write_unique};
use crate::identifier::{normalize, SourceKind};
use crate::mirror::browser::{BrowserOptions, BrowserStrategy};
use crate::mirror::html::HtmlStrategy;
use crate::mirror::{MirrorStrategy, StrategyKind};
use crate::openalex::{OpenAlexClient, PaperRecord};
use crate::viewer;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Pipeline states for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Normalized,
    MetadataResolved,
    DirectSucceeded,
    FallbackAttempted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "start",
            Stage::Normalized => "normalized",
            Stage::MetadataResolved => "metadata resolved",
            Stage::DirectSucceeded => "direct download",
            Stage::FallbackAttempted => "mirror fallback",
        };
        f.write_str(s)
    }
}

/// Where the saved PDF came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfSource {
    Direct,
    Mirror,
}

/// A successfully saved paper
#[derive(Debug, Clone)]
pub struct SavedPaper {
    pub path: PathBuf,
    pub record: PaperRecord,
    pub source: PdfSource,
}

/// Terminal failure of a pipeline run.
#[derive(Debug, Error)]
#[error("{error} (stage: {stage})")]
pub struct Failure {
    /// Last stage reached before the failing step
    pub stage: Stage,
    pub error: Error,
}

impl Failure {
    fn at(stage: Stage, error: Error) -> Self {
        Self { stage, error }
    }
}

/// Resolves identifiers and saves their PDFs.
pub struct Downloader {
    metadata: OpenAlexClient,
    fetcher: PdfFetcher,
    mirror: Box<dyn MirrorStrategy>,
    output_dir: PathBuf,
    open_after: bool,
}

impl Downloader {
    pub fn new(
        metadata: OpenAlexClient,
        fetcher: PdfFetcher,
        mirror: Box<dyn MirrorStrategy>,
        output_dir: PathBuf,
        open_after: bool,
    ) -> Self {
        Self {
            metadata,
            fetcher,
            mirror,
            output_dir,
            open_after,
        }
    }

    /// Build the HTTP client, resolver and configured mirror strategy.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let client = build_http_client(config.proxy.as_deref(), config.request_timeout)?;
        let fetcher = PdfFetcher::new(client.clone());
        let metadata = OpenAlexClient::new(client.clone(), &config.openalex_url, config.mailto.clone());

        let mirror: Box<dyn MirrorStrategy> = match config.strategy {
            StrategyKind::Browser => Box::new(BrowserStrategy::new(
                fetcher.clone(),
                &config.mirror_url,
                BrowserOptions {
                    webdriver_url: config.webdriver_url.clone(),
                    headless: config.headless,
                    element_timeout: config.element_timeout,
                },
            )),
            StrategyKind::PlainHttp => {
                Box::new(HtmlStrategy::new(client, fetcher.clone(), &config.mirror_url))
            }
        };

        Ok(Self::new(
            metadata,
            fetcher,
            mirror,
            config.output_dir.clone(),
            config.open_after,
        ))
    }

    /// Run the whole pipeline for one raw identifier.
    pub async fn download(&self, raw: &str, source: SourceKind) -> std::result::Result<SavedPaper, Failure> {
        info!(input = %raw, "Starting download");

        let identifier = normalize(raw, source).map_err(|e| Failure::at(Stage::Start, e))?;
        debug!(stage = %Stage::Normalized, identifier = %identifier, "Identifier normalized");

        let record = self
            .metadata
            .resolve(&identifier)
            .await
            .map_err(|e| Failure::at(Stage::Normalized, e))?;
        debug!(stage = %Stage::MetadataResolved, title = %record.title, "Metadata resolved");

        // The record's DOI wins; a DOI-tagged input still counts if OpenAlex omitted it
        let doi = record
            .doi
            .clone()
            .or_else(|| identifier.doi().map(str::to_string));

        let (bytes, pdf_source, stage) = self.retrieve(&record, doi.as_deref()).await?;

        let file_name = derive_filename(&record);
        let path = write_unique(&self.output_dir, &file_name, &bytes)
            .map_err(|e| Failure::at(stage, Error::Io(e)))?;
        info!(path = %path.display(), source = ?pdf_source, "PDF saved");

        if self.open_after {
            viewer::open_detached(&path);
        }

        Ok(SavedPaper {
            path,
            record,
            source: pdf_source,
        })
    }

    /// Direct download first, mirror fallback when a DOI is known.
    async fn retrieve(
        &self,
        record: &PaperRecord,
        doi: Option<&str>,
    ) -> std::result::Result<(Vec<u8>, PdfSource, Stage), Failure> {
        let direct_error = match &record.pdf_url {
            Some(url) => match self.fetcher.fetch(url, &FetchOptions::default()).await {
                Ok(bytes) => return Ok((bytes, PdfSource::Direct, Stage::DirectSucceeded)),
                Err(e) => {
                    warn!(url = %url, error = %e, "Direct download failed");
                    Some(e)
                }
            },
            None => {
                info!("No direct PDF URL for this paper");
                None
            }
        };

        let Some(doi) = doi else {
            let error = direct_error.unwrap_or_else(|| {
                Error::NotFound("no direct PDF link and no DOI for the mirror".to_string())
            });
            return Err(Failure::at(Stage::MetadataResolved, error));
        };

        info!(doi = %doi, strategy = self.mirror.name(), "Trying mirror fallback");
        match self.mirror.retrieve(doi).await {
            Ok(bytes) => Ok((bytes, PdfSource::Mirror, Stage::FallbackAttempted)),
            Err(e) => {
                warn!(doi = %doi, error = %e, "Mirror fallback failed");
                Err(Failure::at(Stage::FallbackAttempted, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Mirror stub that counts calls and returns a fixed outcome.
    struct StubMirror {
        calls: Arc<AtomicUsize>,
        pdf: Option<Vec<u8>>,
    }

    #[async_trait]
    impl MirrorStrategy for StubMirror {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn retrieve(&self, _doi: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pdf
                .clone()
                .ok_or_else(|| Error::BlockedByAntiBot("stub challenge".to_string()))
        }
    }

    fn downloader(dir: &TempDir, mirror: StubMirror) -> Downloader {
        let client = build_http_client(None, Duration::from_secs(5)).expect("client");
        Downloader::new(
            // Never reached by these tests: they only use inputs that skip OpenAlex
            OpenAlexClient::new(client.clone(), "http://127.0.0.1:1", None),
            PdfFetcher::new(client),
            Box::new(mirror),
            dir.path().to_path_buf(),
            false,
        )
    }

    #[tokio::test]
    async fn test_invalid_identifier_fails_at_start() {
        let dir = TempDir::new().expect("tempdir");
        let calls = Arc::new(AtomicUsize::new(0));
        let d = downloader(&dir, StubMirror { calls: calls.clone(), pdf: None });

        let failure = d.download("https://doi.org/", SourceKind::Doi).await.expect_err("should fail");
        assert_eq!(failure.stage, Stage::Start);
        assert_eq!(failure.error.kind(), ErrorKind::InvalidIdentifier);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_url_without_doi_never_reaches_mirror() {
        let dir = TempDir::new().expect("tempdir");
        let calls = Arc::new(AtomicUsize::new(0));
        let d = downloader(&dir, StubMirror { calls: calls.clone(), pdf: Some(b"%PDF-1.4".to_vec()) });

        // Nothing listens on port 1, so the direct fetch fails at transport level
        let failure = d
            .download("http://127.0.0.1:1/paper.pdf", SourceKind::Url)
            .await
            .expect_err("should fail");
        assert_eq!(failure.stage, Stage::MetadataResolved);
        assert_eq!(failure.error.kind(), ErrorKind::NetworkFailure);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
