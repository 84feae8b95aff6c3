//! # doi2pdf
//!
//! Download the PDF of an academic paper given a DOI, a title or a URL.
//!
//! ## Modules
//!
//! - [`identifier`] - Classify and normalize raw input
//! - [`openalex`] - OpenAlex metadata lookup
//! - [`fetch`] - Direct PDF download with content validation
//! - [`mirror`] - Mirror fallback (browser or plain HTTP)
//! - [`cookies`] - Browser cookie hand-off to the PDF download
//! - [`filename`] - Safe, collision-free output names
//! - [`pipeline`] - Per-identifier orchestration
//! - [`batch`] - Sequential batch runs from a file
//! - [`report`] - CSV summary of a batch run
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use doi2pdf::config::Config;
//! use doi2pdf::identifier::SourceKind;
//! use doi2pdf::pipeline::Downloader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let downloader = Downloader::from_config(&Config::default())?;
//!     let saved = downloader.download("10.1234/example.doi", SourceKind::Doi).await?;
//!     println!("Saved {}", saved.path.display());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod cookies;
pub mod error;
pub mod fetch;
pub mod filename;
pub mod identifier;
pub mod mirror;
pub mod openalex;
pub mod pipeline;
pub mod report;
pub mod viewer;

pub use error::{Error, ErrorKind, Result};
