//! Error types for mollom-rs

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, MollomError>;

/// Errors surfaced to callers of the client.
///
/// Retryable server errors and stale server lists never show up here: the
/// dispatcher consumes them while iterating the server pool.
#[derive(Error, Debug)]
pub enum MollomError {
    /// Configuration error (bad credentials, invalid options)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The service refused the request; retrying elsewhere cannot help
    #[error("Request rejected by Mollom: {message}")]
    Rejected { message: String },

    /// The response could not be mapped onto the expected type
    #[error("Malformed response from remote service: {0}")]
    MalformedResponse(String),

    /// No server could serve the request
    #[error("Communication with Mollom failed: {0}")]
    Communication(String),

    /// Caller misuse detected before anything was sent
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
}

impl MollomError {
    pub(crate) fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Whether this error means the service could not be reached at all.
    ///
    /// Only these errors are subject to the fail-open/fail-closed policy.
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication(_))
    }
}
