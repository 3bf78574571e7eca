//! Shop-scoped, versioned dashboard cache.
//!
//! One [`DashboardCache`] per shop is persisted under a storage key derived
//! from the shop domain. Entries carry their own shop and schema version and
//! are only trusted when both match and the entry is younger than the TTL.

mod storage;
mod store;

pub use storage::*;
pub use store::*;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storesight_core::{Metric, MetricPayload, ShopDomain};

/// Bumped whenever the persisted layout changes; older entries are ignored.
pub const CACHE_SCHEMA_VERSION: &str = "1.1.0";

/// Prefix of every persisted cache key.
pub const STORAGE_KEY_PREFIX: &str = "storesight_dashboard_cache_";

/// The storage key holding `shop`'s cache.
#[must_use]
pub fn storage_key(shop: &ShopDomain) -> String {
    format!("{STORAGE_KEY_PREFIX}{shop}")
}

/// One cached metric payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub data: T,
    /// Write time in epoch milliseconds.
    pub timestamp: i64,
    pub last_updated: DateTime<Utc>,
    pub version: String,
    pub shop: String,
}

impl<T> CacheEntry<T> {
    /// An entry written now for `shop` with the current schema version.
    pub fn new(data: T, shop: &ShopDomain, now: DateTime<Utc>) -> Self {
        Self {
            data,
            timestamp: now.timestamp_millis(),
            last_updated: now,
            version: CACHE_SCHEMA_VERSION.to_string(),
            shop: shop.to_string(),
        }
    }
}

/// Everything cached for one shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardCache {
    pub version: String,
    pub shop: String,
    #[serde(default)]
    pub entries: BTreeMap<Metric, CacheEntry<MetricPayload>>,
}

impl DashboardCache {
    /// An empty cache tagged with `shop`.
    #[must_use]
    pub fn empty(shop: &ShopDomain) -> Self {
        Self {
            version: CACHE_SCHEMA_VERSION.to_string(),
            shop: shop.to_string(),
            entries: BTreeMap::new(),
        }
    }

    /// Whether this cache was written for `shop` with the current schema.
    #[must_use]
    pub fn belongs_to(&self, shop: &ShopDomain) -> bool {
        self.version == CACHE_SCHEMA_VERSION && self.shop == shop.as_str()
    }
}

/// Why an entry can or cannot be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Missing,
    WrongShop,
    VersionMismatch,
    Expired,
}

impl Freshness {
    /// Whether the entry may be served without a network call.
    #[must_use]
    pub const fn is_fresh(self) -> bool {
        matches!(self, Self::Fresh)
    }
}

/// Decide whether `entry` may be served for `shop` at `now`.
///
/// An entry is fresh only when its age is strictly below `max_age`. Entries
/// stamped in the future are treated as expired.
#[must_use]
pub fn check_freshness<T>(
    entry: Option<&CacheEntry<T>>,
    shop: &ShopDomain,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Freshness {
    let Some(entry) = entry else {
        return Freshness::Missing;
    };
    if entry.shop != shop.as_str() {
        return Freshness::WrongShop;
    }
    if entry.version != CACHE_SCHEMA_VERSION {
        return Freshness::VersionMismatch;
    }

    let age_ms = now.timestamp_millis() - entry.timestamp;
    let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
    if (0..max_age_ms).contains(&age_ms) {
        Freshness::Fresh
    } else {
        Freshness::Expired
    }
}
