//! Persisted cache inspection.

use serde::Serialize;
use storesight_core::ShopDomain;
use storesight_dashboard::DashboardConfig;
use storesight_dashboard::cache::{CacheStore, STORAGE_KEY_PREFIX, check_freshness, storage_key};

use super::{CliError, print_json, storage};

#[derive(Serialize)]
struct EntrySummary {
    metric: String,
    last_updated: String,
    fresh: bool,
}

/// Print `shop`'s cache summary, or the cached shops when no shop is given.
pub fn show(config: &DashboardConfig, shop: Option<&str>) -> Result<(), CliError> {
    let storage = storage(config);

    let Some(shop) = shop else {
        let shops: Vec<String> = storage
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(STORAGE_KEY_PREFIX).map(str::to_string))
            .collect();
        return print_json(&shops);
    };

    let shop = ShopDomain::parse(shop)?;
    let store = CacheStore::new(storage, config.settings.cache_ttl);
    let Some(cache) = store.load(&shop)? else {
        tracing::info!(shop = %shop, "no cache for shop");
        return Ok(());
    };

    let now = chrono::Utc::now();
    let summary: Vec<EntrySummary> = cache
        .entries
        .iter()
        .map(|(metric, entry)| EntrySummary {
            metric: metric.key().to_string(),
            last_updated: entry.last_updated.to_rfc3339(),
            fresh: check_freshness(Some(entry), &shop, now, config.settings.cache_ttl).is_fresh(),
        })
        .collect();
    print_json(&summary)
}

/// Remove `shop`'s cache, or every cache when no shop is given.
pub fn clear(config: &DashboardConfig, shop: Option<&str>) -> Result<(), CliError> {
    let storage = storage(config);

    if let Some(shop) = shop {
        let shop = ShopDomain::parse(shop)?;
        storage.remove(&storage_key(&shop))?;
        tracing::info!(shop = %shop, "cache cleared");
        return Ok(());
    }

    let mut cleared = 0_usize;
    for key in storage.keys()? {
        if key.starts_with(STORAGE_KEY_PREFIX) {
            storage.remove(&key)?;
            cleared += 1;
        }
    }
    tracing::info!(cleared, "caches cleared");
    Ok(())
}
