//! Error types for fetching, writing and driving an ingestion run

use reqwest::StatusCode;
use thiserror::Error;

/// A page could not be fetched; fatal for the source being paginated
#[derive(Error, Debug)]
pub enum FetchError {
    /// Every attempt against `url` came back 429
    #[error("Rate limit exceeded for {url} after {attempts} attempts")]
    RateLimitExceeded { url: String, attempts: u32 },

    /// The request never produced a response
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// A response other than success or 429
    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    /// The body is not a page
    #[error("Failed to decode page from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The server handed back a `next` value that is not an absolute URL
    #[error("Invalid next-page cursor '{cursor}': {source}")]
    InvalidCursor {
        cursor: String,
        #[source]
        source: url::ParseError,
    },
}

impl FetchError {
    /// URL of the request that failed
    pub fn url(&self) -> &str {
        match self {
            FetchError::RateLimitExceeded { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Decode { url, .. } => url,
            FetchError::InvalidCursor { cursor, .. } => cursor,
        }
    }
}

/// A record could not be written; the record is skipped
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Failure of a whole source
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Source '{namespace}' aborted at {url}: {error}")]
    Fetch {
        namespace: String,
        url: String,
        #[source]
        error: FetchError,
    },

    #[error("Source '{namespace}' has no valid root URL: {error}")]
    RootUrl {
        namespace: String,
        #[source]
        error: url::ParseError,
    },
}

impl IngestError {
    pub fn namespace(&self) -> &str {
        match self {
            IngestError::Fetch { namespace, .. } | IngestError::RootUrl { namespace, .. } => {
                namespace
            },
        }
    }
}
