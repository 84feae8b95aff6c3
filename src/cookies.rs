//! Session cookies carried from the browser to the PDF download.
//!
//! Mirrors often gate the PDF host behind cookies set while the lookup page
//! ran its scripts. The browser strategy captures them and the direct fetch
//! replays the ones that match the PDF host.

use url::Url;

/// Cookie entry captured from a WebDriver session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Sent to `domain` exactly, never to its subdomains
    pub host_only: bool,
}

impl Cookie {
    /// Convert a browser cookie. One reported without a domain belongs to
    /// `page_host` only.
    pub fn from_browser(c: &fantoccini::cookies::Cookie<'static>, page_host: &str) -> Self {
        let (domain, host_only) = match c.domain().filter(|d| !d.is_empty()) {
            Some(domain) => (domain.to_string(), false),
            None => (page_host.to_string(), true),
        };
        Self {
            name: c.name().to_string(),
            value: c.value().to_string(),
            domain,
            path: c.path().unwrap_or("/").to_string(),
            host_only,
        }
    }

    /// Whether this cookie would be sent to `host`.
    fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.').to_ascii_lowercase();
        if domain.is_empty() {
            return false;
        }
        let host = host.to_ascii_lowercase();
        if self.host_only {
            return host == domain;
        }
        host == domain || host.ends_with(&format!(".{}", domain))
    }
}

/// Build cookie header string for a request to `url`.
///
/// Returns `None` when no cookie applies.
pub fn build_cookie_header(cookies: &[Cookie], url: &str) -> Option<String> {
    let host = Url::parse(url).ok()?.host_str()?.to_string();
    let header = cookies
        .iter()
        .filter(|c| c.matches_host(&host))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ");
    (!header.is_empty()).then_some(header)
}
