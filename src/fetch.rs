//! Direct PDF download with content sniffing.
//!
//! Metadata sources often point at an HTML landing page instead of the file, and
//! some hosts lie about `Content-Type`. A response is only accepted when its body
//! starts with the `%PDF-` signature.

use crate::error::{Error, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, REFERER};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Leading bytes of every PDF file
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// User agent string for requests
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const PDF_ACCEPT: &str = "application/pdf,application/octet-stream;q=0.9,*/*;q=0.8";

/// Page fragments that mark a bot check rather than real content.
const ANTI_BOT_MARKERS: &[&str] = &[
    "captcha",
    "checking your browser",
    "ddos-guard",
    "cf-challenge",
    "just a moment...",
    "unusual traffic",
    "are you a robot",
];

/// Build HTTP client with optional proxy
pub fn build_http_client(proxy: Option<&str>, timeout: Duration) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| Error::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Whether a page body looks like an anti-automation interstitial.
pub fn looks_like_bot_check(body: &str) -> bool {
    let lower = body.to_lowercase();
    ANTI_BOT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Whether `bytes` carries the PDF signature.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Optional request decorations for a PDF download.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions<'a> {
    /// Pre-built `Cookie` header value
    pub cookie_header: Option<&'a str>,
    /// Page the link was found on
    pub referer: Option<&'a str>,
}

/// Downloads URLs that are supposed to serve a PDF.
#[derive(Clone)]
pub struct PdfFetcher {
    client: reqwest::Client,
}

impl PdfFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch `url` and return the PDF bytes.
    ///
    /// # Errors
    ///
    /// - `NotFound` for 404/410, empty bodies, and bodies without the PDF signature
    /// - `BlockedByAntiBot` for 403/429 or an HTML challenge page
    /// - `Network` for transport failures and other HTTP errors
    pub async fn fetch(&self, url: &str, options: &FetchOptions<'_>) -> Result<Vec<u8>> {
        let url = strip_fragment(url);
        info!(url = %url, "Downloading PDF");

        let mut request = self.client.get(url).header(ACCEPT, PDF_ACCEPT);
        if let Some(cookie) = options.cookie_header.filter(|c| !c.is_empty()) {
            request = request.header(COOKIE, cookie);
        }
        if let Some(referer) = options.referer {
            request = request.header(REFERER, referer);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(Error::NotFound(format!("{} returned HTTP {}", url, status)));
        }
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::BlockedByAntiBot(format!("{} returned HTTP {}", url, status)));
        }
        if !status.is_success() {
            return Err(Error::Network(format!("{} returned HTTP {}", url, status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        let bytes = response.bytes().await?;
        debug!(url = %url, content_type = %content_type, len = bytes.len(), "Response received");

        if bytes.is_empty() {
            return Err(Error::NotFound(format!("{} returned an empty body", url)));
        }

        if !is_pdf(&bytes) {
            let preview = String::from_utf8_lossy(&bytes[..bytes.len().min(4096)]);
            if looks_like_bot_check(&preview) {
                warn!(url = %url, "Anti-bot page instead of PDF");
                return Err(Error::BlockedByAntiBot(format!(
                    "{} served a challenge page instead of a PDF",
                    url
                )));
            }
            warn!(url = %url, content_type = %content_type, "Response is not a PDF");
            return Err(Error::NotFound(format!(
                "{} did not return a PDF (content-type '{}')",
                url, content_type
            )));
        }

        info!(url = %url, bytes = bytes.len(), "PDF downloaded");
        Ok(bytes.to_vec())
    }
}

fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}
