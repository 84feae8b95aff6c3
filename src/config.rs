//! Runtime configuration shared by the pipeline and the batch runner.

use crate::error::{Error, Result};
use crate::mirror::browser::DEFAULT_WEBDRIVER_URL;
use crate::mirror::{StrategyKind, DEFAULT_MIRROR_URL};
use crate::openalex::OPENALEX_API_BASE;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default pause between batch items
pub const DEFAULT_DELAY_SECS: u64 = 2;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory receiving the PDFs (created if absent)
    pub output_dir: PathBuf,
    /// Open each PDF in the system viewer after saving
    pub open_after: bool,
    pub strategy: StrategyKind,
    /// Pause between batch items
    pub delay: Duration,
    pub mirror_url: String,
    pub openalex_url: String,
    /// OpenAlex polite-pool contact
    pub mailto: Option<String>,
    pub webdriver_url: String,
    pub headless: bool,
    /// Bound on the browser's wait for the PDF viewer
    pub element_timeout: Duration,
    pub request_timeout: Duration,
    pub proxy: Option<String>,
    /// Write a CSV summary after a batch run
    pub write_summary: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            open_after: false,
            strategy: StrategyKind::default(),
            delay: Duration::from_secs(DEFAULT_DELAY_SECS),
            mirror_url: DEFAULT_MIRROR_URL.to_string(),
            openalex_url: OPENALEX_API_BASE.to_string(),
            mailto: None,
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: false,
            element_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(60),
            proxy: None,
            write_summary: true,
        }
    }
}

impl Config {
    /// Check URLs and timeouts before any request is made.
    pub fn validate(&self) -> Result<()> {
        check_http_url("mirror", &self.mirror_url)?;
        check_http_url("OpenAlex", &self.openalex_url)?;
        if self.strategy == StrategyKind::Browser {
            check_http_url("WebDriver", &self.webdriver_url)?;
        }
        if self.element_timeout.is_zero() {
            return Err(Error::Config("element timeout must be positive".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Parse a non-negative number of seconds into a `Duration`.
pub fn seconds(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| Error::Config(format!("invalid duration {}s: {}", value, e)))
}

fn check_http_url(what: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| Error::Config(format!("Invalid {} URL '{}': {}", what, value, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "{} URL must be http(s), got '{}'",
            what, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_mirror() {
        let config = Config {
            mirror_url: "ftp://mirror.example".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config {
            mirror_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_element_timeout_rejected() {
        let config = Config {
            element_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seconds() {
        assert_eq!(seconds(1.5).expect("valid"), Duration::from_millis(1500));
        assert!(seconds(-1.0).is_err());
        assert!(seconds(f64::NAN).is_err());
    }
}
