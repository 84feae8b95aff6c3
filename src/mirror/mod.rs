//! Mirror fallback retrieval.
//!
//! When OpenAlex has no usable open-access link, the PDF is looked up on a mirror
//! site keyed by DOI (`{mirror}/{doi}`). Two interchangeable strategies exist:
//!
//! - [`browser::BrowserStrategy`] drives a real browser over WebDriver and can get
//!   past JavaScript-gated pages.
//! - [`html::HtmlStrategy`] fetches the page over plain HTTP and parses it. It
//!   cannot run scripts and will report `NotFound`/`BlockedByAntiBot` when the
//!   mirror needs them.

pub mod browser;
pub mod html;

use crate::error::{Error, Result};
use async_trait::async_trait;
use clap::ValueEnum;
use std::fmt;
use url::Url;

/// Default mirror base URL, overridable with `SCI_HUB_URL`
pub const DEFAULT_MIRROR_URL: &str = "https://sci-hub.mksa.top/";

/// Text the mirror shows when it has no copy of the paper.
pub(crate) const NOT_FOUND_MARKERS: &[&str] = &[
    "Unfortunately, Sci-Hub doesn't have the requested document",
    "You can request this article",
    "article not found",
];

/// A way of turning a DOI into PDF bytes through the mirror.
#[async_trait]
pub trait MirrorStrategy: Send + Sync {
    /// Short name for logs and reports
    fn name(&self) -> &'static str;

    /// Retrieve the PDF for `doi`.
    ///
    /// Returns the PDF bytes, or `NotFound`, `BlockedByAntiBot` or a network error.
    async fn retrieve(&self, doi: &str) -> Result<Vec<u8>>;
}

/// Which fallback strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StrategyKind {
    /// Browser automation over WebDriver
    #[default]
    Browser,
    /// Plain HTTP fetch and HTML parsing (cannot run JavaScript)
    PlainHttp,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Browser => f.write_str("browser"),
            StrategyKind::PlainHttp => f.write_str("plain-http"),
        }
    }
}

/// Mirror page for `doi`.
pub fn mirror_page_url(mirror_base: &str, doi: &str) -> String {
    format!("{}/{}", mirror_base.trim_end_matches('/'), doi)
}

/// Turn an `src`/`href` found on the mirror page into an absolute URL.
///
/// Protocol-relative links get `https:`; relative paths are joined to the mirror base.
pub fn resolve_pdf_src(mirror_base: &str, src: &str) -> Result<String> {
    let src = src.trim();
    if src.is_empty() {
        return Err(Error::NotFound("empty PDF link on mirror page".to_string()));
    }
    if let Some(rest) = src.strip_prefix("//") {
        return Ok(format!("https://{}", rest));
    }
    if src.starts_with("http://") || src.starts_with("https://") {
        return Ok(src.to_string());
    }
    let base = Url::parse(mirror_base)
        .map_err(|e| Error::Config(format!("Invalid mirror URL '{}': {}", mirror_base, e)))?;
    base.join(src)
        .map(|u| u.to_string())
        .map_err(|e| Error::NotFound(format!("Unresolvable PDF link '{}': {}", src, e)))
}

/// Whether the page text says the mirror has no copy.
pub fn page_says_not_found(body: &str) -> bool {
    let lower = body.to_lowercase();
    NOT_FOUND_MARKERS
        .iter()
        .any(|m| lower.contains(&m.to_lowercase()))
}
