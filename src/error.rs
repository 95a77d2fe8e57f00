//! Errors raised by the pipeline stages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The geocoder returned no usable match for a city.
    #[error("could not resolve location: {0}")]
    Resolution(String),

    /// The forecast or geocoding request failed at the network or HTTP level.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// No bronze snapshot exists for the requested city.
    #[error("not found: {0}")]
    NotFound(String),

    /// A snapshot does not have the structure the normaliser expects.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A SQLite statement or transaction failed.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Reading or writing a snapshot or the database directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a derived file artifact (parquet) failed.
    #[error("artifact error: {0}")]
    Artifact(String),
}

impl PipelineError {
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedPayload(message.into())
    }

    pub fn resolution<S: Into<String>>(message: S) -> Self {
        Self::Resolution(message.into())
    }

    pub fn fetch<S: Into<String>>(message: S) -> Self {
        Self::Fetch(message.into())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Fetch(format!("request timed out: {err}"))
        } else {
            Self::Fetch(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for PipelineError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        Self::Artifact(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for PipelineError {
    fn from(err: arrow::error::ArrowError) -> Self {
        Self::Artifact(err.to_string())
    }
}

// -- Tests -------------------------------------------------------------------
