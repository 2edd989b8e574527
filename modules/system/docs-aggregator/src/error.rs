//! Error types of the aggregation engine.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration defects. Raised for a single source during resolution and
/// URL building, or for a whole file by the loaders.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("destination '{destination_id}' has an invalid address '{address}': {reason}")]
    InvalidAddress {
        destination_id: String,
        address: String,
        reason: String,
    },

    #[error("invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unable to combine '{base}' with document path '{document_path}': {reason}")]
    UnresolvableUrl {
        base: String,
        document_path: String,
        reason: String,
    },

    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid settings: {0}")]
    Settings(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Settings(Box::new(err))
    }
}

/// Failure to obtain or decode a single upstream document.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] docs_http::HttpError),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("response is not a valid OpenAPI document: {0}")]
    Decode(String),

    #[error("fetch cancelled")]
    Cancelled,
}

/// Classification of a per-source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    Fetch,
}

/// One source (or one document of a source) that did not contribute to a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub cluster_id: String,
    pub destination_id: String,
    /// Position of the source descriptor within its destination.
    pub source_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_path: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} source #{}",
            self.cluster_id, self.destination_id, self.source_index
        )?;
        if let Some(path) = &self.document_path {
            write!(f, " ({path})")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Errors that abort a whole aggregation request.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AggregationError {
    /// A source failed while `fail_fast` is enabled.
    #[error("aggregation aborted: {0}")]
    SourceFailed(SourceFailure),

    #[error("aggregation cancelled")]
    Cancelled,
}
