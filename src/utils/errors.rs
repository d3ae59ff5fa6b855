use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for chatbridge
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Failure reported by a model backend.
///
/// Each backend classifies its own failures. Transient ones are worth one retry,
/// permanent ones are surfaced immediately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend temporarily unavailable: {0}")]
    Transient(String),

    #[error("Backend error: {0}")]
    Permanent(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient(msg) | Self::Permanent(msg) => msg,
        }
    }

    /// Classify a non-success HTTP status returned by a backend endpoint
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body.trim())
        };

        let retryable = status == StatusCode::REQUEST_TIMEOUT
            || status.as_u16() == 425
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error();

        if retryable {
            Self::Transient(message)
        } else {
            Self::Permanent(message)
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Transient(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status, "")
        } else {
            Self::Permanent(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(BackendError::from_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(BackendError::from_status(StatusCode::SERVICE_UNAVAILABLE, "loading").is_transient());
        assert!(BackendError::from_status(StatusCode::GATEWAY_TIMEOUT, "").is_transient());
        assert!(!BackendError::from_status(StatusCode::BAD_REQUEST, "bad").is_transient());
        assert!(!BackendError::from_status(StatusCode::UNAUTHORIZED, "").is_transient());
        assert!(!BackendError::from_status(StatusCode::NOT_FOUND, "").is_transient());
    }

    #[test]
    fn test_status_message_includes_body() {
        let err = BackendError::from_status(StatusCode::NOT_FOUND, " model missing \n");
        assert_eq!(err.message(), "HTTP 404 Not Found: model missing");
    }

    #[test]
    fn test_backend_error_converts_into_chat_error() {
        let err: ChatError = BackendError::Permanent("gone".to_string()).into();
        assert!(matches!(err, ChatError::Backend(BackendError::Permanent(_))));
        assert_eq!(err.to_string(), "Backend error: gone");
    }
}
