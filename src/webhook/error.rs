//! Error types for webhook delivery.

use thiserror::Error;

/// Error type for HTTP operations.
///
/// Describes what went wrong at the transport level without dictating
/// recovery strategy.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network connection failed (DNS, refused, reset).
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server did not respond within the request timeout.
    #[error("Request timed out")]
    Timeout,

    /// The request could not be built from the given URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Error type for a single webhook delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The configured webhook URL does not parse.
    #[error("Invalid webhook URL '{url}': {reason}")]
    InvalidUrl {
        /// The configured URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// The payload could not be serialized.
    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Transport failure.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The endpoint answered with status 400 or above.
    #[error("Webhook returned status {status}")]
    Rejected {
        /// Response status
        status: http::StatusCode,
        /// Response body, if valid UTF-8
        body: Option<String>,
    },
}

impl DeliveryError {
    /// Returns true if repeating the same request could plausibly succeed.
    ///
    /// Informational only: every failure consumes the same retry budget.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(HttpError::Connection(_) | HttpError::Timeout) => true,
            Self::Rejected { status, .. } => {
                status.is_server_error()
                    || *status == http::StatusCode::TOO_MANY_REQUESTS
                    || *status == http::StatusCode::REQUEST_TIMEOUT
            }
            Self::InvalidUrl { .. } | Self::Serialize(_) | Self::Http(HttpError::InvalidUrl(_)) => {
                false
            }
        }
    }
}
