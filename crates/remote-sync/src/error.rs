//! Error types for the remote sync adapter.

use aasanify_core::sync::RemoteError;
use thiserror::Error;

/// Result type alias for remote sync operations.
pub type Result<T> = std::result::Result<T, RemoteSyncError>;

/// Errors that can occur while talking to the practice backend.
#[derive(Debug, Error)]
pub enum RemoteSyncError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the backend
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication error (missing or invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl RemoteSyncError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Fold adapter failures into the engine's retry classes. Transport failures
/// count as outages; validation statuses mean the payload will never be
/// accepted and must not loop in the queue.
impl From<RemoteSyncError> for RemoteError {
    fn from(err: RemoteSyncError) -> Self {
        match err {
            RemoteSyncError::Http(e) => RemoteError::unavailable(e),
            RemoteSyncError::Api { status, message } if matches!(status, 400 | 422) => {
                RemoteError::InvalidPayload(message)
            }
            RemoteSyncError::Api { status, message } => RemoteError::rejected(status, message),
            RemoteSyncError::Json(e) => RemoteError::InvalidPayload(e.to_string()),
            RemoteSyncError::InvalidRequest(message) => RemoteError::InvalidPayload(message),
            RemoteSyncError::Auth(message) => RemoteError::rejected(401, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_statuses_map_to_invalid_payload() {
        let err: RemoteError = RemoteSyncError::api(400, "bad document").into();
        assert!(!err.is_retryable());
        let err: RemoteError = RemoteSyncError::api(422, "unprocessable").into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_errors_stay_retryable() {
        let err: RemoteError = RemoteSyncError::api(500, "internal").into();
        assert!(err.is_retryable());
        let err: RemoteError = RemoteSyncError::api(429, "slow down").into();
        assert!(err.is_retryable());
    }

    #[test]
    fn auth_errors_map_to_a_retryable_rejection() {
        let err: RemoteError = RemoteSyncError::auth("token expired").into();
        assert_eq!(err, RemoteError::rejected(401, "token expired"));
        assert!(err.is_retryable());
    }
}
