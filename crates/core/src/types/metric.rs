//! Dashboard metric identifiers.

use serde::{Deserialize, Serialize};

/// Error returned when a metric name is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown metric: {0}")]
pub struct MetricParseError(pub String);

/// One discrete analytics category, fetched and cached independently.
///
/// The serialized form is the cache key used in persisted dashboard caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Revenue,
    Products,
    Inventory,
    NewProducts,
    /// Conversion insights.
    Insights,
    Orders,
    AbandonedCarts,
}

impl Metric {
    /// Every metric, in the order the dashboard loads them.
    pub const ALL: [Self; 7] = [
        Self::Revenue,
        Self::Products,
        Self::Inventory,
        Self::NewProducts,
        Self::Insights,
        Self::Orders,
        Self::AbandonedCarts,
    ];

    /// The cache key for this metric.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Products => "products",
            Self::Inventory => "inventory",
            Self::NewProducts => "newProducts",
            Self::Insights => "insights",
            Self::Orders => "orders",
            Self::AbandonedCarts => "abandonedCarts",
        }
    }

    /// Human-readable card title, used in notices and error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Revenue => "Revenue",
            Self::Products => "Top products",
            Self::Inventory => "Low inventory",
            Self::NewProducts => "New products",
            Self::Insights => "Conversion rate",
            Self::Orders => "Recent orders",
            Self::AbandonedCarts => "Abandoned carts",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Metric {
    type Err = MetricParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.key() == s)
            .ok_or_else(|| MetricParseError(s.to_string()))
    }
}
