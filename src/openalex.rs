//! OpenAlex API Client
//!
//! Resolves an [`Identifier`] to a [`PaperRecord`]: exact lookup for DOIs,
//! top-ranked title search for names, and a synthesized record for plain URLs.
//!
//! API Best Practices (per OpenAlex docs):
//! - Use `mailto:email` parameter for polite pool (10 req/s vs 1 req/s)
//! - Only the top result of a title search is consumed (`per-page=1`)

use crate::error::{Error, Result};
use crate::identifier::Identifier;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use url::Url;

/// OpenAlex API base URL
pub const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// Canonical bibliographic record for one paper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperRecord {
    pub title: String,
    /// Bare DOI without resolver prefix
    pub doi: Option<String>,
    /// Open-access link believed to serve the PDF itself
    pub pdf_url: Option<String>,
}

/// OpenAlex API response structures
#[derive(Debug, Deserialize)]
struct OpenAlexResponse {
    #[serde(default)]
    meta: OpenAlexMeta,
    #[serde(default)]
    results: Vec<OpenAlexWork>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAlexMeta {
    #[serde(default)]
    count: i64,
}

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    title: Option<String>,
    display_name: Option<String>,
    doi: Option<String>,
    primary_location: Option<OpenAlexLocation>,
    best_oa_location: Option<OpenAlexLocation>,
    open_access: Option<OpenAlexOpenAccess>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexLocation {
    pdf_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexOpenAccess {
    oa_url: Option<String>,
}

/// Metadata resolver backed by OpenAlex.
#[derive(Clone)]
pub struct OpenAlexClient {
    client: Client,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexClient {
    /// Create a client against `base_url` (normally [`OPENALEX_API_BASE`]).
    pub fn new(client: Client, base_url: &str, mailto: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            mailto: mailto.filter(|m| !m.trim().is_empty()),
        }
    }

    /// Resolve an identifier to a paper record.
    ///
    /// # Errors
    ///
    /// `NotFound` when OpenAlex has no matching work, `Network` on transport or
    /// API failures. No retries happen here.
    pub async fn resolve(&self, identifier: &Identifier) -> Result<PaperRecord> {
        match identifier {
            Identifier::Doi(doi) => self.lookup_doi(doi).await,
            Identifier::Title(title) => self.search_title(title).await,
            Identifier::Url(url) => Ok(record_from_url(url)),
        }
    }

    async fn lookup_doi(&self, doi: &str) -> Result<PaperRecord> {
        let url = format!("{}/works/https://doi.org/{}", self.base_url, doi);
        info!(doi = %doi, url = %url, "Querying OpenAlex by DOI");

        let body = self.fetch_json(&url, &[]).await?;
        let work: OpenAlexWork = serde_json::from_str(&body)
            .map_err(|e| Error::Network(format!("Failed to parse OpenAlex work: {}", e)))?;
        let record = work_to_record(work);
        info!(title = %record.title, pdf_url = ?record.pdf_url, "Found paper on OpenAlex");
        Ok(record)
    }

    async fn search_title(&self, title: &str) -> Result<PaperRecord> {
        let url = format!("{}/works", self.base_url);
        // A comma separates filters, so it cannot appear inside the search term
        let term = title.replace(',', " ").split_whitespace().collect::<Vec<_>>().join(" ");
        let filter = format!("title.search:{}", term);
        let params = [
            ("filter", filter.as_str()),
            ("sort", "relevance_score:desc"),
            ("per-page", "1"),
        ];
        info!(title = %title, "Searching OpenAlex by title");

        let body = self.fetch_json(&url, &params).await?;
        let response: OpenAlexResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Network(format!("Failed to parse OpenAlex response: {}", e)))?;
        debug!(count = response.meta.count, "Title search results");

        let work = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("No paper found on OpenAlex for title: {}", title)))?;
        let record = work_to_record(work);
        info!(title = %record.title, doi = ?record.doi, "Found paper on OpenAlex");
        Ok(record)
    }

    /// Fetch a JSON body from OpenAlex
    async fn fetch_json(&self, url: &str, params: &[(&str, &str)]) -> Result<String> {
        let mut request = self.client.get(url).query(params);
        if let Some(mailto) = &self.mailto {
            request = request.query(&[("mailto", mailto.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("OpenAlex has no work at {}", url)));
        }
        if !status.is_success() {
            warn!(status = %status, url = %url, "OpenAlex API error");
            return Err(Error::Network(format!("OpenAlex API error: {}", status)));
        }

        response.text().await.map_err(Error::from)
    }
}

fn work_to_record(work: OpenAlexWork) -> PaperRecord {
    let title = work
        .display_name
        .or(work.title)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown Title".to_string());

    let doi = work
        .doi
        .map(|d| crate::identifier::strip_doi_prefix(&d).to_string())
        .filter(|d| !d.is_empty());

    // oa_url first, then explicit pdf_url fields; landing pages are never chosen
    let pdf_url = work
        .open_access
        .and_then(|oa| oa.oa_url)
        .or_else(|| work.best_oa_location.and_then(|l| l.pdf_url))
        .or_else(|| work.primary_location.and_then(|l| l.pdf_url))
        .filter(|u| !u.is_empty())
        .map(|u| arxiv_pdf_url(&u).unwrap_or(u));

    if pdf_url.is_none() {
        debug!("No direct open-access PDF URL in OpenAlex metadata");
    }

    PaperRecord { title, doi, pdf_url }
}

/// Record for a URL that is not a DOI link: the URL is the download target.
pub fn record_from_url(url: &str) -> PaperRecord {
    let pdf_url = arxiv_pdf_url(url).unwrap_or_else(|| url.to_string());
    PaperRecord {
        title: title_from_url(url),
        doi: None,
        pdf_url: Some(pdf_url),
    }
}

fn title_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "Downloaded_Paper".to_string();
    };
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|s| {
            let decoded = urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_else(|_| s.to_string());
            decoded
                .strip_suffix(".pdf")
                .map(str::to_string)
                .unwrap_or(decoded)
        })
        .filter(|s| !s.is_empty());

    segment
        .or_else(|| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| "Downloaded_Paper".to_string())
}

/// Rewrite an arXiv abstract link to its PDF link.
pub fn arxiv_pdf_url(url: &str) -> Option<String> {
    static ARXIV_ABS: OnceLock<Option<Regex>> = OnceLock::new();
    let re = ARXIV_ABS
        .get_or_init(|| Regex::new(r"arxiv\.org/abs/([^/?#]+(?:/[^/?#]+)?)").ok())
        .as_ref()?;
    let caps = re.captures(url)?;
    let id = caps.get(1)?.as_str().trim_end_matches(".pdf");
    Some(format!("https://arxiv.org/pdf/{}.pdf", id))
}
