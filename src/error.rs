//! Custom error types for doi2pdf.
//!
//! Every stage of the pipeline returns `Result<T, Error>`; the error variant is the
//! retrieval outcome the orchestrator branches on. Nothing here panics or exits.

use std::fmt;
use thiserror::Error;

/// Main error type for doi2pdf operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input could not be turned into a usable identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// No record, page or PDF exists at some stage
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport-level failure (connection, timeout, unexpected HTTP status)
    #[error("Network error: {0}")]
    Network(String),

    /// The mirror or host answered with an anti-automation challenge
    #[error("Blocked by anti-bot check: {0}")]
    BlockedByAntiBot(String),

    /// WebDriver session could not be created or a command failed
    #[error("Browser error: {0}")]
    Browser(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

impl Error {
    /// Coarse classification used for reporting and escalation decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Network(_) | Error::Browser(_) => ErrorKind::NetworkFailure,
            Error::BlockedByAntiBot(_) => ErrorKind::BlockedByAntiBot,
            Error::Io(_) => ErrorKind::Io,
            Error::Config(_) => ErrorKind::Config,
        }
    }
}

/// Plain tag for an [`Error`], without the detail string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidIdentifier,
    NotFound,
    NetworkFailure,
    BlockedByAntiBot,
    Io,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidIdentifier => "InvalidIdentifier",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::NetworkFailure => "NetworkFailure",
            ErrorKind::BlockedByAntiBot => "BlockedByAntiBot",
            ErrorKind::Io => "Io",
            ErrorKind::Config => "Config",
        };
        f.write_str(s)
    }
}

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for turning a missing value into a `NotFound` outcome
pub trait OptionExt<T> {
    fn ok_or_not_found(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| Error::NotFound(msg.to_string()))
    }
}
