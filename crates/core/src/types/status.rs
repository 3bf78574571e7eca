//! Per-metric loading state and refresh phase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error_kind::ErrorKind;

/// Why a metric card is showing an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReason {
    /// Classified cause.
    pub kind: ErrorKind,
    /// Message shown on the card.
    pub message: String,
}

impl ErrorReason {
    /// Create a new error reason.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether the card should offer a manual retry button.
    #[must_use]
    pub const fn offers_retry(&self) -> bool {
        self.kind.is_retryable() || matches!(self.kind, ErrorKind::RateLimited)
    }

    /// Whether the card should prompt the merchant to re-authenticate.
    #[must_use]
    pub const fn needs_reauth(&self) -> bool {
        matches!(self.kind, ErrorKind::PermissionDenied | ErrorKind::AuthRequired)
    }
}

impl std::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// The state of one metric card.
///
/// Loading and error are mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MetricState<T> {
    /// Nothing requested yet for the current shop.
    #[default]
    Idle,
    /// A fetch is outstanding.
    Loading,
    /// The last fetch failed.
    Error {
        /// Failure cause.
        reason: ErrorReason,
    },
    /// Data is available.
    Fresh {
        /// The metric payload.
        data: T,
        /// When the data was fetched from the backend.
        fetched_at: DateTime<Utc>,
    },
}

impl<T> MetricState<T> {
    /// Returns the data if the state is `Fresh`.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Fresh { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Returns the error reason if the state is `Error`.
    #[must_use]
    pub const fn error(&self) -> Option<&ErrorReason> {
        match self {
            Self::Error { reason } => Some(reason),
            _ => None,
        }
    }

    /// Whether a fetch is outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Refresh controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    #[default]
    Idle,
    Refreshing,
}

impl std::fmt::Display for RefreshPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Refreshing => write!(f, "refreshing"),
        }
    }
}
