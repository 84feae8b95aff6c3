//! Browser-automation mirror strategy.
//!
//! Drives a real browser through a WebDriver endpoint (chromedriver, geckodriver,
//! selenium) with `fantoccini`. The page's scripts run, so JavaScript-gated
//! viewers and lightweight bot checks resolve on their own. Solving CAPTCHAs is
//! out of scope; a page that never shows the viewer is reported as
//! `BlockedByAntiBot` or `NotFound`.
//!
//! Every attempt opens its own session and closes it before returning, whatever
//! the outcome.

use super::{mirror_page_url, resolve_pdf_src, MirrorStrategy};
use crate::cookies::{build_cookie_header, Cookie};
use crate::error::{Error, Result};
use crate::fetch::{looks_like_bot_check, FetchOptions, PdfFetcher};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default WebDriver endpoint, overridable with `WEBDRIVER_URL`
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Either the PDF viewer element or the mirror's "not found" paragraph.
const VIEWER_OR_MISSING_XPATH: &str = r#"//iframe[@id='pdf'] | //embed[@id='pdf'] | //p[contains(text(), "doesn't have the requested document")] | //p[contains(text(), 'You can request this article')]"#;

const CHROME_ARGS: &[&str] = &["--disable-gpu", "--no-sandbox", "--disable-dev-shm-usage"];

/// Settings for a browser session
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub webdriver_url: String,
    pub headless: bool,
    /// Upper bound for waiting on the viewer element
    pub element_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: false,
            element_timeout: Duration::from_secs(20),
        }
    }
}

/// Mirror lookup through a WebDriver-controlled browser.
pub struct BrowserStrategy {
    fetcher: PdfFetcher,
    mirror_base: String,
    options: BrowserOptions,
}

impl BrowserStrategy {
    pub fn new(fetcher: PdfFetcher, mirror_base: &str, options: BrowserOptions) -> Self {
        Self {
            fetcher,
            mirror_base: mirror_base.to_string(),
            options,
        }
    }

    fn capabilities(&self) -> Map<String, Value> {
        let mut args: Vec<&str> = CHROME_ARGS.to_vec();
        if self.options.headless {
            args.push("--headless=new");
        }
        let mut caps = Map::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }

    async fn open_session(&self) -> Result<Client> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());
        builder.connect(&self.options.webdriver_url).await.map_err(|e| {
            Error::Browser(format!(
                "Failed to start WebDriver session at {}: {}",
                self.options.webdriver_url, e
            ))
        })
    }

    /// Load the mirror page and return the absolute PDF URL plus session cookies.
    async fn locate_pdf(&self, client: &Client, doi: &str) -> Result<(String, Vec<Cookie>)> {
        let page_url = mirror_page_url(&self.mirror_base, doi);
        info!(doi = %doi, url = %page_url, "Opening mirror page in browser");
        client.goto(&page_url).await.map_err(browser_err)?;

        let waited = client
            .wait()
            .at_most(self.options.element_timeout)
            .for_element(Locator::XPath(VIEWER_OR_MISSING_XPATH))
            .await;

        let src = match waited {
            Ok(element) => {
                let tag = element.tag_name().await.map_err(browser_err)?;
                if tag.eq_ignore_ascii_case("p") {
                    info!(doi = %doi, "Mirror does not have the document");
                    return Err(Error::NotFound(format!(
                        "mirror does not have the document for DOI {}",
                        doi
                    )));
                }
                let src = element.attr("src").await.map_err(browser_err)?;
                if src.is_none() {
                    warn!("PDF element has no src");
                }
                src.filter(|s| !s.trim().is_empty())
            }
            Err(CmdError::WaitTimeout) => {
                warn!(
                    timeout_secs = self.options.element_timeout.as_secs(),
                    "Timed out waiting for PDF viewer, scanning frames"
                );
                None
            }
            Err(e) => return Err(browser_err(e)),
        };

        let src = match src {
            Some(src) => src,
            None => self.scan_frames(client).await?,
        };
        let pdf_url = resolve_pdf_src(&self.mirror_base, &src)?;
        info!(pdf_url = %pdf_url, "Found PDF link via browser");

        let page_host = Url::parse(&page_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let cookies = match client.get_all_cookies().await {
            Ok(raw) => raw.iter().map(|c| Cookie::from_browser(c, &page_host)).collect(),
            Err(e) => {
                warn!(error = %e, "Could not read session cookies");
                Vec::new()
            }
        };
        debug!(count = cookies.len(), "Captured session cookies");

        Ok((pdf_url, cookies))
    }

    /// Look through all frames for a `.pdf` source after the viewer wait timed out.
    async fn scan_frames(&self, client: &Client) -> Result<String> {
        let frames = client
            .find_all(Locator::Css("iframe, embed"))
            .await
            .map_err(browser_err)?;

        for frame in frames {
            match frame.attr("src").await {
                Ok(Some(src)) if src.to_lowercase().contains(".pdf") => return Ok(src),
                Ok(Some(src)) => debug!(src = %src, "Frame is not a PDF"),
                Ok(None) => {}
                Err(e) => debug!(error = %e, "Could not read frame src"),
            }
        }

        let source = client.source().await.map_err(browser_err)?;
        if looks_like_bot_check(&source) {
            return Err(Error::BlockedByAntiBot(
                "mirror kept the browser on a challenge page".to_string(),
            ));
        }
        Err(Error::NotFound("PDF viewer not found on mirror page".to_string()))
    }
}

#[async_trait]
impl MirrorStrategy for BrowserStrategy {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn retrieve(&self, doi: &str) -> Result<Vec<u8>> {
        let client = self.open_session().await?;
        let located = self.locate_pdf(&client, doi).await;

        debug!("Closing WebDriver session");
        if let Err(e) = client.close().await {
            warn!(error = %e, "Failed to close WebDriver session");
        }

        let (pdf_url, cookies) = located?;
        let cookie_header = build_cookie_header(&cookies, &pdf_url);
        let options = FetchOptions {
            cookie_header: cookie_header.as_deref(),
            referer: Some(&self.mirror_base),
        };
        self.fetcher.fetch(&pdf_url, &options).await
    }
}

fn browser_err(e: CmdError) -> Error {
    Error::Browser(e.to_string())
}
