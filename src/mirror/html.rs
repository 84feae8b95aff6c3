//! Plain HTTP mirror strategy.
//!
//! Fetches the mirror page as raw HTML and looks for the embedded PDF link. No
//! JavaScript runs, so a mirror that builds the viewer client-side or shows an
//! interactive challenge yields `NotFound` or `BlockedByAntiBot`.

use super::{mirror_page_url, page_says_not_found, resolve_pdf_src, MirrorStrategy};
use crate::error::{Error, OptionExt, Result};
use crate::fetch::{looks_like_bot_check, FetchOptions, PdfFetcher};
use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use scraper::{Html, Selector};
use tracing::{info, warn};

/// Mirror lookup over plain HTTP.
pub struct HtmlStrategy {
    client: reqwest::Client,
    fetcher: PdfFetcher,
    mirror_base: String,
}

impl HtmlStrategy {
    pub fn new(client: reqwest::Client, fetcher: PdfFetcher, mirror_base: &str) -> Self {
        Self {
            client,
            fetcher,
            mirror_base: mirror_base.to_string(),
        }
    }

    /// Fetch the mirror page with browser-like headers
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Cache-Control", "no-cache")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
        ) {
            return Err(Error::BlockedByAntiBot(format!("mirror returned HTTP {}", status)));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("mirror has no page at {}", url)));
        }
        if !status.is_success() {
            return Err(Error::Network(format!("mirror returned HTTP {}", status)));
        }

        response.text().await.map_err(Error::from)
    }
}

#[async_trait]
impl MirrorStrategy for HtmlStrategy {
    fn name(&self) -> &'static str {
        "plain-http"
    }

    async fn retrieve(&self, doi: &str) -> Result<Vec<u8>> {
        let page_url = mirror_page_url(&self.mirror_base, doi);
        info!(doi = %doi, url = %page_url, "Fetching mirror page over HTTP");

        let html = self.fetch_page(&page_url).await?;

        if page_says_not_found(&html) {
            info!(doi = %doi, "Mirror does not have the document");
            return Err(Error::NotFound(format!("mirror does not have the document for DOI {}", doi)));
        }

        let link = extract_pdf_link(&html);
        if link.is_none() && looks_like_bot_check(&html) {
            warn!(doi = %doi, "Mirror answered with a bot check");
            return Err(Error::BlockedByAntiBot(
                "mirror page requires a browser challenge".to_string(),
            ));
        }
        let src = link.ok_or_not_found("no PDF link on mirror page (it may need JavaScript)")?;

        let pdf_url = resolve_pdf_src(&self.mirror_base, &src)?;
        info!(pdf_url = %pdf_url, "Found PDF link on mirror page");

        let options = FetchOptions {
            cookie_header: None,
            referer: Some(&self.mirror_base),
        };
        self.fetcher.fetch(&pdf_url, &options).await
    }
}

/// Find the embedded PDF link in a mirror page.
///
/// Checked in order: `#pdf` iframe/embed, any iframe/embed pointing at a `.pdf`,
/// a download button's `location.href`, then a plain `.pdf` anchor.
pub fn extract_pdf_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let by_id = Selector::parse("iframe#pdf, embed#pdf").ok()?;
    if let Some(src) = document
        .select(&by_id)
        .filter_map(|el| el.value().attr("src"))
        .find(|s| !s.trim().is_empty())
    {
        return Some(src.to_string());
    }

    let frames = Selector::parse("iframe[src], embed[src], object[data]").ok()?;
    for el in document.select(&frames) {
        let src = el.value().attr("src").or_else(|| el.value().attr("data"));
        if let Some(src) = src.filter(|s| s.to_lowercase().contains(".pdf")) {
            return Some(src.to_string());
        }
    }

    let buttons = Selector::parse("button[onclick]").ok()?;
    let href_re = Regex::new(r#"location\.href\s*=\s*['"]([^'"]+)['"]"#).ok()?;
    for el in document.select(&buttons) {
        if let Some(caps) = el.value().attr("onclick").and_then(|js| href_re.captures(js)) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().to_string());
            }
        }
    }

    let anchors = Selector::parse("a[href]").ok()?;
    document
        .select(&anchors)
        .filter_map(|el| el.value().attr("href"))
        .find(|href| {
            let path = href.split(['?', '#']).next().unwrap_or_default();
            path.to_lowercase().ends_with(".pdf")
        })
        .map(str::to_string)
}
