//! Error classification at the API boundary.
//!
//! Every backend failure is turned into one [`ApiError`] here, so the rest of
//! the coordinator branches on [`ErrorKind`] instead of status codes and
//! response bodies.

use serde::Deserialize;
use storesight_core::{ErrorKind, ServerErrorCode};
use thiserror::Error;

/// A classified backend failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// HTTP status, when a response arrived.
    pub status: Option<u16>,
    /// Human-readable detail.
    pub message: String,
    /// Seconds the backend asked us to wait (429 only).
    pub retry_after: Option<u64>,
}

impl ApiError {
    /// Create an error without a status.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attach the HTTP status.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// The request never produced a response.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    /// The session is missing or expired.
    #[must_use]
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthRequired, message)
    }

    /// The response body did not match the expected shape.
    #[must_use]
    pub fn decode(path: &str, error: &serde_json::Error) -> Self {
        Self::new(
            ErrorKind::Unknown,
            format!("unexpected response from {path}: {error}"),
        )
    }

    /// Whether retry-with-backoff may try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Error fields the backend may put in a JSON body.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classify a backend response.
///
/// Returns `None` for a successful response. A recognised `error_code` wins
/// over the status, because the backend reports plan limits with a 200.
#[must_use]
pub fn classify(status: u16, body: &str, retry_after: Option<u64>) -> Option<ApiError> {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let detail = parsed.message.clone().or_else(|| parsed.error.clone());

    if let Some(code) = parsed.error_code.as_deref().and_then(ServerErrorCode::parse) {
        let kind = code.kind();
        let message = detail.unwrap_or_else(|| kind.to_string());
        return Some(ApiError::new(kind, message).with_status(status));
    }

    let auth_body = parsed.error.as_deref() == Some("Authentication required");
    let error = match status {
        401 => ApiError::auth_required(detail.unwrap_or_else(|| "Session expired".to_string())),
        _ if auth_body => ApiError::auth_required("Authentication required"),
        429 => ApiError {
            retry_after,
            ..ApiError::new(
                ErrorKind::RateLimited,
                detail.unwrap_or_else(|| "Too many requests".to_string()),
            )
        },
        500..=599 => ApiError::new(
            ErrorKind::ServiceUnavailable,
            detail.unwrap_or_else(|| format!("Server error ({status})")),
        ),
        200..=299 => return None,
        _ => ApiError::new(
            ErrorKind::Unknown,
            detail.unwrap_or_else(|| format!("Unexpected status {status}")),
        ),
    };

    Some(error.with_status(status))
}
