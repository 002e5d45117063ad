// Error handling module
// Defines the failures surfaced through an intercepted request

use thiserror::Error;

/// Errors that can occur while sending a request through the interceptor
#[derive(Error, Debug)]
pub enum FetchError {
    /// The underlying transport rejected the request (network, DNS, timeout)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Final response status was outside 2xx/3xx
    #[error("HTTP error: {status} {status_text} - {body}")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    /// Token cannot be encoded into an Authorization header
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl FetchError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            FetchError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for interceptor operations
pub type Result<T> = std::result::Result<T, FetchError>;
