//! Identifier classification and DOI extraction.
//!
//! Pure string handling, no network access. The caller says which kind of input
//! it has (`--doi`, `--name`, `--url`); this module only validates it and pulls a
//! bare DOI out of resolver URLs.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Resolver prefixes stripped from DOI input, longest first.
const DOI_PREFIXES: &[&str] = &[
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "https://doi.org/",
    "http://doi.org/",
    "dx.doi.org/",
    "doi.org/",
    "doi:",
];

/// Where a raw input string came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Doi,
    Name,
    Url,
}

impl SourceKind {
    /// Guess the source of an untagged line from a batch file.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SourceKind::Url
        } else if looks_like_doi(strip_doi_prefix(trimmed)) {
            SourceKind::Doi
        } else {
            SourceKind::Name
        }
    }
}

/// A classified paper identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Doi(String),
    Title(String),
    Url(String),
}

impl Identifier {
    /// The DOI, if this identifier carries one.
    pub fn doi(&self) -> Option<&str> {
        match self {
            Identifier::Doi(doi) => Some(doi),
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Doi(doi) => write!(f, "DOI {}", doi),
            Identifier::Title(title) => write!(f, "title \"{}\"", title),
            Identifier::Url(url) => write!(f, "URL {}", url),
        }
    }
}

/// Classify `raw` according to `source`.
///
/// # Errors
///
/// Returns `InvalidIdentifier` when nothing usable remains after trimming and
/// prefix stripping.
pub fn normalize(raw: &str, source: SourceKind) -> Result<Identifier> {
    let trimmed = raw.trim();
    match source {
        SourceKind::Doi => canonical_doi(trimmed).map(Identifier::Doi),
        SourceKind::Name => {
            if trimmed.is_empty() {
                return Err(Error::InvalidIdentifier("empty title".to_string()));
            }
            Ok(Identifier::Title(trimmed.to_string()))
        }
        SourceKind::Url => {
            if trimmed.is_empty() {
                return Err(Error::InvalidIdentifier("empty URL".to_string()));
            }
            match doi_from_url(trimmed) {
                Some(doi) => Ok(Identifier::Doi(doi)),
                None => Ok(Identifier::Url(trimmed.to_string())),
            }
        }
    }
}

/// Strip a resolver prefix (`https://doi.org/`, `doi:` ...) if present.
pub fn strip_doi_prefix(input: &str) -> &str {
    let trimmed = input.trim();
    for prefix in DOI_PREFIXES {
        if trimmed.len() >= prefix.len()
            && trimmed.is_char_boundary(prefix.len())
            && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return trimmed[prefix.len()..].trim();
        }
    }
    trimmed
}

fn canonical_doi(input: &str) -> Result<String> {
    let stripped = strip_doi_prefix(input);
    let decoded = urlencoding::decode(stripped)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| stripped.to_string());
    let doi = decoded.trim().trim_end_matches('/').to_string();
    if doi.is_empty() {
        return Err(Error::InvalidIdentifier(format!(
            "no DOI left after stripping prefix from '{}'",
            input
        )));
    }
    Ok(doi)
}

/// Extract the DOI from a resolver URL such as `https://doi.org/10.1/x`.
fn doi_from_url(url: &str) -> Option<String> {
    let lower = url.to_ascii_lowercase();
    let pos = lower.find("doi.org/")?;
    let rest = &url[pos + "doi.org/".len()..];
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    canonical_doi(rest).ok()
}

fn looks_like_doi(s: &str) -> bool {
    static DOI_RE: OnceLock<Option<Regex>> = OnceLock::new();
    DOI_RE
        .get_or_init(|| Regex::new(r"^10\.\d{4,9}/\S+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(s))
}
