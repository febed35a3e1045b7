//! Error types for the NetPulse system
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for NetPulse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the NetPulse system
#[derive(Error, Debug)]
pub enum Error {
    /// Geolocation provider errors
    #[error("Geolocation error: {0}")]
    Geo(String),

    /// ISP state store errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Speed measurement errors (spawn failure, non-zero exit, bad output)
    #[error("Measurement error: {0}")]
    Measurement(String),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Bucket, database or endpoint not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An operation exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a geolocation error
    pub fn geo(msg: impl Into<String>) -> Self {
        Self::Geo(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a measurement error
    pub fn measurement(msg: impl Into<String>) -> Self {
        Self::Measurement(msg.into())
    }

    /// Create a storage backend error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same request later could succeed
    ///
    /// The readiness wait retries both kinds, but logs a non-transient
    /// failure (wrong path, bad request) as a warning.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Io(_) | Self::RateLimited(_) | Self::Timeout(_) | Self::Storage(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = Error::provider("ipinfo", "HTTP 502");
        assert_eq!(err.to_string(), "Provider error (ipinfo): HTTP 502");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::http("connection refused").is_transient());
        assert!(Error::timeout("health check").is_transient());
        assert!(!Error::auth("bad token").is_transient());
        assert!(!Error::config("missing bucket").is_transient());
    }
}
