use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use storesight_core::{Metric, MetricPayload, ShopDomain};
use tracing::{debug, info, warn};

use super::{
    CacheEntry, CacheStorage, DashboardCache, StorageError, check_freshness, storage_key,
};

/// The cache of the shop currently bound to the dashboard.
///
/// Holds the in-memory copy and writes it through to storage on every change.
/// The in-memory copy stays authoritative when storage fails.
pub struct CacheStore {
    storage: Arc<dyn CacheStorage>,
    ttl: Duration,
    current: Mutex<Option<DashboardCache>>,
    /// Orders storage writes. `current` is never held across storage I/O.
    writes: Mutex<()>,
}

impl CacheStore {
    /// A store with no shop bound yet.
    #[must_use]
    pub fn new(storage: Arc<dyn CacheStorage>, ttl: Duration) -> Self {
        Self {
            storage,
            ttl,
            current: Mutex::new(None),
            writes: Mutex::new(()),
        }
    }

    /// The configured entry TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn current(&self) -> MutexGuard<'_, Option<DashboardCache>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `shop`, loading its persisted cache when one exists and matches
    /// the shop and schema version.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read; `shop` is still bound, with an
    /// empty cache. Unreadable cache contents are discarded, not reported.
    pub fn bind(&self, shop: &ShopDomain) -> Result<(), StorageError> {
        let (cache, result) = match self.load(shop) {
            Ok(loaded) => (loaded.unwrap_or_else(|| DashboardCache::empty(shop)), Ok(())),
            Err(e) => (DashboardCache::empty(shop), Err(e)),
        };
        *self.current() = Some(cache);
        result
    }

    /// Read `shop`'s persisted cache without binding it.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read.
    pub fn load(&self, shop: &ShopDomain) -> Result<Option<DashboardCache>, StorageError> {
        let Some(raw) = self.storage.get(&storage_key(shop))? else {
            return Ok(None);
        };

        match serde_json::from_str::<DashboardCache>(&raw) {
            Ok(cache) if cache.belongs_to(shop) => {
                debug!(shop = %shop, entries = cache.entries.len(), "loaded persisted cache");
                Ok(Some(cache))
            }
            Ok(cache) => {
                info!(
                    shop = %shop,
                    cached_shop = %cache.shop,
                    version = %cache.version,
                    "ignoring persisted cache from another shop or schema"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(shop = %shop, error = %e, "discarding unreadable cache");
                Ok(None)
            }
        }
    }

    /// Replace `from`'s cache with an empty one tagged with `to`.
    ///
    /// `from`'s storage key is removed before anything is written for `to`.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be written; `to` is still bound, with
    /// an empty cache.
    pub fn switch_shop(&self, from: &ShopDomain, to: &ShopDomain) -> Result<(), StorageError> {
        let _writes = self.writes();
        let cache = DashboardCache::empty(to);
        let json = serde_json::to_string(&cache);
        *self.current() = Some(cache);

        self.storage.remove(&storage_key(from))?;
        info!(from = %from, to = %to, "shop changed; cleared previous shop cache");
        self.storage.set(&storage_key(to), &json?)
    }

    /// The entry for `metric` if it can be served for `shop` at `now`.
    #[must_use]
    pub fn fresh(
        &self,
        shop: &ShopDomain,
        metric: Metric,
        now: DateTime<Utc>,
    ) -> Option<CacheEntry<MetricPayload>> {
        let current = self.current();
        let cache = current.as_ref().filter(|cache| cache.belongs_to(shop))?;
        let entry = cache.entries.get(&metric);
        let freshness = check_freshness(entry, shop, now, self.ttl);
        if freshness.is_fresh() {
            debug!(shop = %shop, metric = %metric, "cache hit");
            entry.cloned()
        } else {
            debug!(shop = %shop, metric = %metric, ?freshness, "cache miss");
            None
        }
    }

    /// Record `payload` for `shop`.
    ///
    /// Returns `Ok(false)` without writing when `shop` is no longer the bound
    /// shop; the result belongs to a session that has moved on.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be written.
    pub fn put(
        &self,
        shop: &ShopDomain,
        payload: MetricPayload,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let _writes = self.writes();
        let json = {
            let mut current = self.current();
            let Some(cache) = current.as_mut().filter(|cache| cache.belongs_to(shop)) else {
                debug!(shop = %shop, metric = %payload.metric(), "dropping result for unbound shop");
                return Ok(false);
            };
            cache
                .entries
                .insert(payload.metric(), CacheEntry::new(payload, shop, now));
            serde_json::to_string(&*cache)?
        };
        self.storage.set(&storage_key(shop), &json)?;
        Ok(true)
    }

    /// Drop every entry for `shop`, keeping it bound.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be written.
    pub fn invalidate(&self, shop: &ShopDomain) -> Result<(), StorageError> {
        let _writes = self.writes();
        let cache = DashboardCache::empty(shop);
        let json = serde_json::to_string(&cache)?;
        *self.current() = Some(cache);
        debug!(shop = %shop, "cache invalidated");
        self.storage.set(&storage_key(shop), &json)
    }

    /// Forget the bound shop without touching storage.
    pub fn unbind(&self) {
        *self.current() = None;
    }

    /// A copy of the bound cache.
    #[must_use]
    pub fn snapshot(&self) -> Option<DashboardCache> {
        self.current().clone()
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("ttl", &self.ttl)
            .field("shop", &self.current().as_ref().map(|cache| cache.shop.clone()))
            .finish_non_exhaustive()
    }
}
