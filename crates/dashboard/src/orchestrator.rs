//! Cache-first fetching with in-flight request deduplication.
//!
//! At most one network call per [`FetchKey`] is outstanding. A caller that
//! arrives while one is running awaits the same shared future and receives
//! the same result, success or error.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use storesight_core::{Metric, ShopDomain};
use tracing::debug;

use crate::api::ApiError;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;
type InFlight<V> = Arc<Mutex<HashMap<FetchKey, SharedFetch<V>>>>;

/// Identifies one deduplicated fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub shop: ShopDomain,
    pub metric: Metric,
}

impl FetchKey {
    #[must_use]
    pub const fn new(shop: ShopDomain, metric: Metric) -> Self {
        Self { shop, metric }
    }
}

impl std::fmt::Display for FetchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.shop, self.metric)
    }
}

/// Where a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Served from the cache without a network call.
    Cache,
    /// This caller started the network call.
    Network,
    /// This caller joined a network call already in flight.
    Joined,
}

/// A value together with its [`Source`].
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<V> {
    pub value: V,
    pub source: Source,
}

enum Plan<V> {
    Cached(V),
    Join(SharedFetch<V>),
    Start(SharedFetch<V>),
}

/// Deduplicates concurrent fetches of the same key.
pub struct Orchestrator<V> {
    in_flight: InFlight<V>,
}

impl<V> Default for Orchestrator<V> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

fn lock<V>(in_flight: &InFlight<V>) -> MutexGuard<'_, HashMap<FetchKey, SharedFetch<V>>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V> Orchestrator<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value, join a pending fetch, or start one.
    ///
    /// A pending fetch is joined even when `force_refresh` is set; otherwise
    /// `cached` is served unless `force_refresh` is set. `commit` runs once,
    /// on success, before any caller observes the value, and the key is
    /// released before the result is delivered.
    ///
    /// # Errors
    ///
    /// Returns the fetch error to every caller that awaited it.
    pub async fn check_and_fetch<F, C>(
        &self,
        key: FetchKey,
        cached: Option<V>,
        force_refresh: bool,
        fetch: F,
        commit: C,
    ) -> Result<Fetched<V>, ApiError>
    where
        F: Future<Output = Result<V, ApiError>> + Send + 'static,
        C: FnOnce(&V) + Send + 'static,
    {
        let plan = {
            let mut in_flight = lock(&self.in_flight);
            if let Some(pending) = in_flight.get(&key) {
                debug!(key = %key, "joining in-flight request");
                Plan::Join(pending.clone())
            } else if let Some(value) = cached.filter(|_| !force_refresh) {
                Plan::Cached(value)
            } else {
                let registry = Arc::clone(&self.in_flight);
                let settled = key.clone();
                let shared = async move {
                    let result = fetch.await;
                    if let Ok(value) = &result {
                        commit(value);
                    }
                    lock(&registry).remove(&settled);
                    result
                }
                .boxed()
                .shared();
                in_flight.insert(key, shared.clone());
                Plan::Start(shared)
            }
        };

        match plan {
            Plan::Cached(value) => Ok(Fetched {
                value,
                source: Source::Cache,
            }),
            Plan::Join(pending) => pending.await.map(|value| Fetched {
                value,
                source: Source::Joined,
            }),
            Plan::Start(pending) => pending.await.map(|value| Fetched {
                value,
                source: Source::Network,
            }),
        }
    }

    /// Whether a fetch for `key` is outstanding.
    #[must_use]
    pub fn is_in_flight(&self, key: &FetchKey) -> bool {
        lock(&self.in_flight).contains_key(key)
    }

    /// Number of outstanding fetches.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

impl<V> std::fmt::Debug for Orchestrator<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("in_flight", &lock(&self.in_flight).len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use storesight_core::ErrorKind;

    use super::*;

    fn key(metric: Metric) -> FetchKey {
        FetchKey::new(ShopDomain::parse("acme.myshopify.com").unwrap(), metric)
    }

    fn slow_fetch(
        calls: &Arc<AtomicU32>,
        result: Result<u32, ApiError>,
    ) -> impl Future<Output = Result<u32, ApiError>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            result
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_call() {
        let orchestrator = Orchestrator::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));
        let commits = Arc::new(AtomicU32::new(0));

        let commit = |commits: &Arc<AtomicU32>| {
            let commits = Arc::clone(commits);
            move |_: &u32| {
                commits.fetch_add(1, Ordering::SeqCst);
            }
        };

        let (first, second) = tokio::join!(
            orchestrator.check_and_fetch(
                key(Metric::Revenue),
                None,
                false,
                slow_fetch(&calls, Ok(42)),
                commit(&commits),
            ),
            orchestrator.check_and_fetch(
                key(Metric::Revenue),
                None,
                false,
                slow_fetch(&calls, Ok(7)),
                commit(&commits),
            ),
        );

        let first = first.unwrap();
        let second = second.unwrap();
        assert_eq!(first.value, 42);
        assert_eq!(second.value, 42);
        assert_eq!(first.source, Source::Network);
        assert_eq!(second.source, Source::Joined);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(commits.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_joined_callers_share_the_error() {
        let orchestrator = Orchestrator::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));
        let failure = ApiError::new(ErrorKind::ServiceUnavailable, "down");

        let (first, second) = tokio::join!(
            orchestrator.check_and_fetch(
                key(Metric::Orders),
                None,
                false,
                slow_fetch(&calls, Err(failure.clone())),
                |_: &u32| {},
            ),
            orchestrator.check_and_fetch(
                key(Metric::Orders),
                Some(1),
                true,
                slow_fetch(&calls, Ok(1)),
                |_: &u32| {},
            ),
        );

        assert_eq!(first.unwrap_err(), failure);
        assert_eq!(second.unwrap_err(), failure);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!orchestrator.is_in_flight(&key(Metric::Orders)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_network() {
        let orchestrator = Orchestrator::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));

        let fetched = orchestrator
            .check_and_fetch(
                key(Metric::Products),
                Some(5),
                false,
                slow_fetch(&calls, Ok(9)),
                |_: &u32| {},
            )
            .await
            .unwrap();

        assert_eq!(fetched, Fetched { value: 5, source: Source::Cache });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_bypasses_cache() {
        let orchestrator = Orchestrator::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));

        let fetched = orchestrator
            .check_and_fetch(
                key(Metric::Products),
                Some(5),
                true,
                slow_fetch(&calls, Ok(9)),
                |_: &u32| {},
            )
            .await
            .unwrap();

        assert_eq!(fetched.value, 9);
        assert_eq!(fetched.source, Source::Network);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_do_not_share() {
        let orchestrator = Orchestrator::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));

        let (a, b) = tokio::join!(
            orchestrator.check_and_fetch(
                key(Metric::Inventory),
                None,
                false,
                slow_fetch(&calls, Ok(1)),
                |_: &u32| {},
            ),
            orchestrator.check_and_fetch(
                key(Metric::NewProducts),
                None,
                false,
                slow_fetch(&calls, Ok(2)),
                |_: &u32| {},
            ),
        );

        assert_eq!(a.unwrap().value, 1);
        assert_eq!(b.unwrap().value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
