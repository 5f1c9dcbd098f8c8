//! Errors raised by the remote cart service boundary.
//!
//! Callers of the cart store see every failure as "the remote call failed";
//! the variants exist so logs can tell a timeout from a 4xx from a malformed
//! payload.

use thiserror::Error;

/// Errors that can occur when talking to the remote cart service.
#[derive(Debug, Error)]
pub enum CartError {
    /// HTTP request failed (connection, timeout, body decoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the cart service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A cart record could not be normalized into a cart line.
    #[error("Invalid cart record: {0}")]
    InvalidRecord(String),

    /// Request URL could not be built from the configured base URL.
    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

impl CartError {
    /// Returns `true` for failures that are worth retrying later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Parse(_) | Self::InvalidRecord(_) | Self::Url(_) => false,
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = CartError::Api {
            status: 404,
            message: "cart not found".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 404 - cart not found");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = CartError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
        assert!(err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        let server = CartError::Api {
            status: 503,
            message: String::new(),
        };
        let client = CartError::Api {
            status: 422,
            message: String::new(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!CartError::Parse("eof".to_string()).is_transient());
    }
}
