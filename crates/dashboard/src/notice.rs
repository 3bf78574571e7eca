//! User-facing notifications raised by the coordinator.

use std::time::Duration;

use serde::Serialize;
use storesight_core::Metric;

/// A transient message for the merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    /// A manual refresh was rejected.
    PleaseWait { message: String },
    /// Every metric refreshed successfully.
    RefreshSucceeded,
    /// A refresh finished with some metrics failing.
    RefreshFailed { failed: Vec<Metric> },
    /// A metric needs an additional Shopify scope.
    ReauthRequired { metric: Metric },
    /// The merchant came back from re-authenticating.
    Reauthenticated,
    /// The session ended; the merchant must sign in again.
    SignedOut,
    /// The store was just connected.
    StoreConnected,
    /// The shop cache was cleared on request.
    CacheCleared,
    /// The backend is throttling us; a refresh is scheduled.
    RateLimited { retry_in: Duration },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PleaseWait { message } => f.write_str(message),
            Self::RefreshSucceeded => f.write_str("Dashboard data refreshed."),
            Self::RefreshFailed { failed } => {
                let names: Vec<&str> = failed.iter().map(|metric| metric.label()).collect();
                write!(f, "Some data could not be refreshed: {}.", names.join(", "))
            }
            Self::ReauthRequired { metric } => write!(
                f,
                "Additional Shopify permissions are required to view {}. Please re-authenticate.",
                metric.label()
            ),
            Self::Reauthenticated => f.write_str("Re-authenticated with Shopify."),
            Self::SignedOut => f.write_str("Your session has expired. Please sign in again."),
            Self::StoreConnected => f.write_str("Your store is connected."),
            Self::CacheCleared => f.write_str("Cached dashboard data cleared."),
            Self::RateLimited { retry_in } => write!(
                f,
                "Shopify is rate limiting requests. Retrying in {} seconds.",
                retry_in.as_secs()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_messages() {
        let notice = Notice::RefreshFailed {
            failed: vec![Metric::Orders, Metric::AbandonedCarts],
        };
        assert_eq!(
            notice.to_string(),
            format!(
                "Some data could not be refreshed: {}, {}.",
                Metric::Orders.label(),
                Metric::AbandonedCarts.label()
            )
        );

        let notice = Notice::RateLimited {
            retry_in: Duration::from_secs(60),
        };
        assert!(notice.to_string().contains("60 seconds"));
    }
}
