use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Database(e.to_string())
    }
}

/// Failure of a single provider call. Never escapes a fallback chain; the
/// chain records it and moves on to the next provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} is unavailable")]
    Unavailable { provider: String },

    #[error("{provider} requires credentials: {missing}")]
    MissingCredentials { provider: String, missing: String },

    #[error("{provider} does not support {operation}")]
    Unsupported { provider: String, operation: String },

    #[error("{provider} has no data for {symbol}")]
    NoData { provider: String, symbol: String },

    #[error("{provider} timed out")]
    Timeout { provider: String },

    #[error("{provider} failed: {message}")]
    OperationFailed { provider: String, message: String },
}

impl ProviderError {
    pub fn failed(provider: &str, message: impl Into<String>) -> Self {
        ProviderError::OperationFailed {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn no_data(provider: &str, symbol: &str) -> Self {
        ProviderError::NoData {
            provider: provider.to_string(),
            symbol: symbol.to_string(),
        }
    }

    pub fn unsupported(provider: &str, operation: &str) -> Self {
        ProviderError::Unsupported {
            provider: provider.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Maps a transport error onto the provider taxonomy, keeping timeouts distinct.
    pub fn from_http(provider: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            ProviderError::failed(provider, e.to_string())
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("Provider chain is empty")]
    EmptyChain,

    #[error("Unknown provider '{0}' in chain")]
    UnknownProvider(String),
}

/// Fatal ingestion failures. Everything else degrades by dropping rows.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Cannot read portfolio file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed portfolio table: {0}")]
    Csv(String),

    #[error("Unrecognized portfolio format (columns: {columns:?})")]
    SchemaUnrecognized { columns: Vec<String> },

    #[error("No valid holdings remain after validation ({dropped} rows dropped)")]
    EmptyAfterValidation { dropped: usize },
}

impl From<csv::Error> for IngestError {
    fn from(e: csv::Error) -> Self {
        IngestError::Csv(e.to_string())
    }
}

/// Reference dataset problems. The resolver recovers from all of them by
/// falling back to a stale copy or to key synthesis.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset download failed: {0}")]
    Download(String),

    #[error("Dataset file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dataset parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No dataset available (download failed and no local copy)")]
    Unavailable,
}

impl From<ConstructionError> for DomainError {
    fn from(e: ConstructionError) -> Self {
        DomainError::Config(e.to_string())
    }
}
