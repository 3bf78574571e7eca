//! Error classification shared by the API boundary and per-metric state.

use serde::{Deserialize, Serialize};

/// What went wrong with a backend request, decided once at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Session is missing or expired (HTTP 401, `AUTHENTICATION_FAILED`).
    AuthRequired,
    /// The app lacks a Shopify scope (`INSUFFICIENT_PERMISSIONS`).
    PermissionDenied,
    /// The plan does not include this data (`API_ACCESS_LIMITED`).
    AccessLimited,
    /// The backend is throttling us (HTTP 429).
    RateLimited,
    /// The backend failed (HTTP 5xx).
    ServiceUnavailable,
    /// The request never produced a response.
    NetworkError,
    /// Anything else, including undecodable bodies.
    Unknown,
}

impl ErrorKind {
    /// Whether retry-with-backoff may attempt the request again.
    ///
    /// Authentication failures and errors that already have a dedicated
    /// handling path (permissions, access limits, throttling) are final.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable | Self::NetworkError | Self::Unknown
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AuthRequired => "authentication required",
            Self::PermissionDenied => "permission denied",
            Self::AccessLimited => "access limited",
            Self::RateLimited => "rate limited",
            Self::ServiceUnavailable => "service unavailable",
            Self::NetworkError => "network error",
            Self::Unknown => "unknown error",
        };
        f.write_str(name)
    }
}

/// The `error_code` values the backend attaches to JSON error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerErrorCode {
    InsufficientPermissions,
    ApiAccessLimited,
    AuthenticationFailed,
}

impl ServerErrorCode {
    /// Parse a raw `error_code` string; unknown codes yield `None`.
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "INSUFFICIENT_PERMISSIONS" => Some(Self::InsufficientPermissions),
            "API_ACCESS_LIMITED" => Some(Self::ApiAccessLimited),
            "AUTHENTICATION_FAILED" => Some(Self::AuthenticationFailed),
            _ => None,
        }
    }

    /// The error kind this code maps to.
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::InsufficientPermissions => ErrorKind::PermissionDenied,
            Self::ApiAccessLimited => ErrorKind::AccessLimited,
            Self::AuthenticationFailed => ErrorKind::AuthRequired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::ServiceUnavailable.is_retryable());
        assert!(ErrorKind::NetworkError.is_retryable());
        assert!(ErrorKind::Unknown.is_retryable());
        assert!(!ErrorKind::AuthRequired.is_retryable());
        assert!(!ErrorKind::PermissionDenied.is_retryable());
        assert!(!ErrorKind::AccessLimited.is_retryable());
        assert!(!ErrorKind::RateLimited.is_retryable());
    }

    #[test]
    fn test_server_error_codes() {
        assert_eq!(
            ServerErrorCode::parse("API_ACCESS_LIMITED").map(ServerErrorCode::kind),
            Some(ErrorKind::AccessLimited)
        );
        assert_eq!(
            ServerErrorCode::parse("INSUFFICIENT_PERMISSIONS").map(ServerErrorCode::kind),
            Some(ErrorKind::PermissionDenied)
        );
        assert_eq!(
            ServerErrorCode::parse("AUTHENTICATION_FAILED").map(ServerErrorCode::kind),
            Some(ErrorKind::AuthRequired)
        );
        assert_eq!(ServerErrorCode::parse("SOMETHING_ELSE"), None);
    }
}
