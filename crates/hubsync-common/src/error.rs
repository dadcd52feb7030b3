//! Error types shared across hubsync crates

use thiserror::Error;

/// Result type alias for hubsync operations
pub type Result<T> = std::result::Result<T, HubsyncError>;

/// Workspace-wide error for failures outside the fetch/write path
#[derive(Error, Debug)]
pub enum HubsyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl HubsyncError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
