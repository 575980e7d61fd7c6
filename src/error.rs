// src/error.rs

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure retrieving a document over HTTP.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("GET {url} timed out")]
    Timeout { url: String },

    #[error("GET {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("building HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Classify a `reqwest` error raised while requesting `url`.
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Failure locating or reading a table inside a fetched document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("table position {position} out of range: {found} table(s) in document")]
    NotFound { position: usize, found: usize },

    #[error("{0}")]
    Parse(String),
}

/// Pipeline stage an extraction was in when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lookup,
    Fetch,
    Parse,
    Normalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Lookup => "lookup",
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Normalize => "normalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong, independent of where.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("unknown source")]
    UnknownSource,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("table position {position} out of range: {found} table(s) in document")]
    NotFound { position: usize, found: usize },

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<TableError> for ErrorKind {
    fn from(err: TableError) -> Self {
        match err {
            TableError::NotFound { position, found } => ErrorKind::NotFound { position, found },
            TableError::Parse(msg) => ErrorKind::Parse(msg),
        }
    }
}

/// Terminal failure of one extraction, carrying enough context for the
/// caller to decide whether to run it again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("source {source_id}: {stage} failed: {kind}")]
pub struct ExtractionError {
    pub source_id: String,
    pub stage: Stage,
    #[source]
    pub kind: ErrorKind,
}

impl ExtractionError {
    pub fn new(source_id: impl Into<String>, stage: Stage, kind: impl Into<ErrorKind>) -> Self {
        Self {
            source_id: source_id.into(),
            stage,
            kind: kind.into(),
        }
    }

    /// Network and parse failures may clear up on their own; unknown ids and
    /// stale table positions need a registry change first.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Fetch(_) | ErrorKind::Parse(_))
    }
}
