//! Errors from the NeMo Microservices HTTP surface.
//!
//! [`NemoError::is_transient`] decides what the poller may retry: network
//! failures, rate limiting, server errors and 404 (the resource has not been
//! created yet) are worth another tick; other client errors are not.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NemoError {
    /// Non-2xx response. Carries the status code and the response body.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// DNS, connection refused, request timeout.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// 2xx response whose body was not the JSON we expected.
    #[error("failed to parse response: {0}")]
    ParseError(String),
}

impl NemoError {
    pub fn is_transient(&self) -> bool {
        match self {
            NemoError::ApiError { status, .. } => {
                *status == 404 || *status == 429 || *status >= 500
            }
            NemoError::NetworkError(_) => true,
            NemoError::ParseError(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NemoError::ApiError { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> NemoError {
        NemoError::ApiError {
            status,
            message: "body".into(),
        }
    }

    #[test]
    fn api_error_display() {
        let err = NemoError::ApiError {
            status: 422,
            message: "Field required: config".into(),
        };
        assert_eq!(err.to_string(), "API error (status 422): Field required: config");
    }

    #[test]
    fn retryable_statuses() {
        assert!(api(404).is_transient());
        assert!(api(429).is_transient());
        assert!(api(502).is_transient());
        assert!(!api(400).is_transient());
        assert!(!api(401).is_transient());
        assert!(!NemoError::ParseError("eof".into()).is_transient());
    }

    #[test]
    fn not_found() {
        assert!(api(404).is_not_found());
        assert!(!api(500).is_not_found());
    }
}
