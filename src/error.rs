use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the stats provider: transport, status, or payload shape.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Transport errors, throttling and server-side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(_) => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Malformed(_) | ProviderError::Json(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid table: {0}")]
    InvalidTable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid season label `{0}` (expected e.g. 2023-24)")]
    InvalidSeason(String),

    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: String, value: String },

    #[error("invalid table name `{0}`")]
    InvalidTableName(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
