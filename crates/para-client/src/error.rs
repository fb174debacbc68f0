//! Para API client error types.

/// Errors from Para API calls.
#[derive(Debug, thiserror::Error)]
pub enum ParaError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Para API returned a non-2xx status (other than 404/204).
    #[error("Para API {endpoint} returned {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {reason}")]
    Deserialization { endpoint: String, reason: String },
    /// Request signing failed (malformed key material or headers).
    #[error("request signing failed: {reason}")]
    Signing { reason: String },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
