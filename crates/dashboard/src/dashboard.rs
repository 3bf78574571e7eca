//! The dashboard coordinator.
//!
//! [`Dashboard`] owns the cache, the in-flight registry, per-metric state,
//! the refresh gate and every background task for one merchant session. It
//! is cheap to clone; clones share state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use storesight_core::{ErrorKind, ErrorReason, Metric, MetricPayload, MetricState, ShopDomain};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::{ApiError, Transport};
use crate::cache::{CacheStorage, CacheStore, DashboardCache, StorageError};
use crate::clock::{Clock, SystemClock};
use crate::config::DashboardSettings;
use crate::fetchers::{self, FetchContext};
use crate::insights::Insights;
use crate::notice::Notice;
use crate::orchestrator::{FetchKey, Orchestrator, Source};
use crate::refresh::{RateLimitFlag, RefreshGate, RefreshReport};
use crate::session::{AuthContext, ShopChange, shop_change};
use crate::tasks::{TaskPurpose, TaskRegistry};

const NOTICE_CAPACITY: usize = 64;

/// How the initial load presents itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    /// Leave cards as they are instead of marking them `Loading`.
    pub skip_loading: bool,
}

/// Cache and refresh coordinator for one merchant session.
pub struct Dashboard<T> {
    pub(crate) inner: Arc<DashboardInner<T>>,
}

pub(crate) struct DashboardInner<T> {
    pub(crate) transport: Arc<T>,
    pub(crate) settings: DashboardSettings,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) cache: CacheStore,
    pub(crate) orchestrator: Orchestrator<MetricPayload>,
    pub(crate) auth: Mutex<AuthContext>,
    pub(crate) states: Mutex<BTreeMap<Metric, MetricState<MetricPayload>>>,
    pub(crate) refresh: Mutex<RefreshGate>,
    pub(crate) rate_limited: RateLimitFlag,
    pub(crate) tasks: TaskRegistry,
    pub(crate) notices: broadcast::Sender<Notice>,
}

impl<T> Clone for Dashboard<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn idle_states() -> BTreeMap<Metric, MetricState<MetricPayload>> {
    Metric::ALL
        .into_iter()
        .map(|metric| (metric, MetricState::Idle))
        .collect()
}

impl<T: Transport> Dashboard<T> {
    /// A signed-out coordinator using the system clock.
    pub fn new(transport: T, storage: Arc<dyn CacheStorage>, settings: DashboardSettings) -> Self {
        Self::with_clock(transport, storage, settings, Arc::new(SystemClock))
    }

    /// A signed-out coordinator reading time from `clock`.
    pub fn with_clock(
        transport: T,
        storage: Arc<dyn CacheStorage>,
        settings: DashboardSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            inner: Arc::new(DashboardInner {
                transport: Arc::new(transport),
                cache: CacheStore::new(storage, settings.cache_ttl),
                settings,
                clock,
                orchestrator: Orchestrator::new(),
                auth: Mutex::new(AuthContext::loading()),
                states: Mutex::new(idle_states()),
                refresh: Mutex::new(RefreshGate::default()),
                rate_limited: RateLimitFlag::new(),
                tasks: TaskRegistry::new(),
                notices,
            }),
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// The current authentication context.
    #[must_use]
    pub fn auth(&self) -> AuthContext {
        lock(&self.inner.auth).clone()
    }

    /// Replace the authentication context.
    ///
    /// Moving from one shop to a different one removes the previous shop's
    /// cache, binds an empty cache for the new shop, returns every metric to
    /// `Idle` and stops rate-limit polling.
    pub fn set_auth(&self, next: AuthContext) {
        let previous = std::mem::replace(&mut *lock(&self.inner.auth), next.clone());

        match shop_change(&previous, &next) {
            ShopChange::Switched { from, to } => {
                self.inner.tasks.cancel(TaskPurpose::RateLimitPoll);
                self.inner.rate_limited.clear();
                if let Err(e) = self.inner.cache.switch_shop(&from, &to) {
                    warn!(from = %from, to = %to, error = %e, "failed to clear previous shop cache");
                }
                self.reset_states();
            }
            ShopChange::Bound(shop) => {
                if let Err(e) = self.inner.cache.bind(&shop) {
                    warn!(shop = %shop, error = %e, "failed to load persisted cache");
                }
                info!(shop = %shop, "shop bound");
                self.reset_states();
            }
            ShopChange::Cleared(shop) => {
                info!(shop = %shop, "shop unbound");
                self.inner.tasks.cancel(TaskPurpose::RateLimitPoll);
                self.inner.cache.unbind();
                self.reset_states();
            }
            ShopChange::Unchanged => {}
        }

        if !next.authenticated {
            self.inner.tasks.cancel(TaskPurpose::RateLimitPoll);
        }
    }

    /// Resolve the session through the transport and apply it.
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be resolved; the context is left
    /// unchanged.
    pub async fn resolve_session(&self) -> Result<AuthContext, ApiError> {
        let context = crate::session::resolve_session(self.inner.transport.as_ref()).await?;
        self.set_auth(context.clone());
        Ok(context)
    }

    pub(crate) fn ready_shop(&self) -> Option<ShopDomain> {
        lock(&self.inner.auth).ready_shop().cloned()
    }

    fn sign_out(&self) {
        {
            let mut auth = lock(&self.inner.auth);
            if !auth.authenticated {
                return;
            }
            *auth = auth.revoked();
        }
        warn!("session expired; signed out");
        self.inner.tasks.cancel(TaskPurpose::RateLimitPoll);
        self.notify(Notice::SignedOut);
    }

    // =========================================================================
    // State
    // =========================================================================

    /// The state of one metric card.
    #[must_use]
    pub fn state(&self, metric: Metric) -> MetricState<MetricPayload> {
        lock(&self.inner.states)
            .get(&metric)
            .cloned()
            .unwrap_or_default()
    }

    /// The state of every metric card.
    #[must_use]
    pub fn states(&self) -> BTreeMap<Metric, MetricState<MetricPayload>> {
        lock(&self.inner.states).clone()
    }

    /// The flattened view model for the insights page.
    #[must_use]
    pub fn insights(&self) -> Insights {
        Insights::from_states(&self.states(), self.is_rate_limited())
    }

    /// Whether the backend is currently throttling us.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.inner.rate_limited.is_raised()
    }

    /// A copy of the bound shop's cache.
    #[must_use]
    pub fn cache_snapshot(&self) -> Option<DashboardCache> {
        self.inner.cache.snapshot()
    }

    /// The coordinator settings.
    #[must_use]
    pub fn settings(&self) -> &DashboardSettings {
        &self.inner.settings
    }

    /// Receive notices raised from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    pub(crate) fn set_state(&self, metric: Metric, state: MetricState<MetricPayload>) {
        lock(&self.inner.states).insert(metric, state);
    }

    fn reset_states(&self) {
        *lock(&self.inner.states) = idle_states();
    }

    pub(crate) fn notify(&self, notice: Notice) {
        debug!(notice = %notice, "notice");
        // No subscribers is fine.
        let _ = self.inner.notices.send(notice);
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load every metric, serving fresh cache entries without network calls.
    pub async fn load(&self, options: LoadOptions) -> RefreshReport {
        let report = self.fetch_all(false, !options.skip_loading).await;
        self.ensure_rate_limit_polling();
        report
    }

    /// Load one metric, from the cache unless `force_refresh` is set.
    pub async fn fetch_metric(
        &self,
        metric: Metric,
        force_refresh: bool,
    ) -> MetricState<MetricPayload> {
        let state = self.fetch_one(metric, force_refresh, true).await;
        self.ensure_rate_limit_polling();
        state
    }

    /// Drop every cached entry for the current shop.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be written.
    pub fn clear_cache(&self) -> Result<(), StorageError> {
        let Some(shop) = self.auth().shop else {
            return Ok(());
        };
        self.inner.cache.invalidate(&shop)?;
        info!(shop = %shop, "cache cleared");
        self.notify(Notice::CacheCleared);
        Ok(())
    }

    /// Reload from cache every `interval`, refetching whatever has expired.
    pub fn start_auto_reload(&self, interval: Duration) {
        let dashboard = self.clone();
        self.inner.tasks.spawn(TaskPurpose::AutoReload, async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = dashboard
                    .load(LoadOptions { skip_loading: true })
                    .await;
                debug!(
                    loaded = report.loaded.len(),
                    failed = report.failed.len(),
                    "auto reload"
                );
            }
        });
    }

    /// Cancel every background task.
    ///
    /// Background tasks hold a handle to the coordinator, so they keep it
    /// alive until this is called.
    pub fn shutdown(&self) {
        self.inner.tasks.cancel_all();
        info!("dashboard shut down");
    }

    /// Purposes with a running background task.
    #[must_use]
    pub fn active_tasks(&self) -> Vec<TaskPurpose> {
        self.inner.tasks.active()
    }

    pub(crate) async fn fetch_all(&self, force_refresh: bool, mark_loading: bool) -> RefreshReport {
        let others = Metric::ALL
            .into_iter()
            .filter(|metric| *metric != Metric::Orders)
            .map(|metric| async move {
                (metric, self.fetch_one(metric, force_refresh, mark_loading).await)
            });

        let orders = async {
            if force_refresh {
                tokio::time::sleep(self.inner.settings.orders_stagger).await;
            }
            (
                Metric::Orders,
                self.fetch_one(Metric::Orders, force_refresh, mark_loading).await,
            )
        };

        let (mut results, orders) = tokio::join!(join_all(others), orders);
        results.push(orders);

        let mut report = RefreshReport::default();
        for (metric, state) in &results {
            report.record(*metric, state);
        }
        report
    }

    fn fetch_context(&self) -> FetchContext<T> {
        FetchContext {
            transport: Arc::clone(&self.inner.transport),
            retry: self.inner.settings.retry,
            orders: self.inner.settings.orders,
            rate_limited: self.inner.rate_limited.clone(),
        }
    }

    async fn fetch_one(
        &self,
        metric: Metric,
        force_refresh: bool,
        mark_loading: bool,
    ) -> MetricState<MetricPayload> {
        let Some(shop) = self.ready_shop() else {
            let state = MetricState::Error {
                reason: ErrorReason::new(
                    ErrorKind::AuthRequired,
                    format!("Sign in to view {}.", metric.label()),
                ),
            };
            self.set_state(metric, state.clone());
            return state;
        };

        let now = self.inner.clock.now();
        let cached = if force_refresh {
            None
        } else {
            self.inner.cache.fresh(&shop, metric, now)
        };
        let cached_at = cached.as_ref().map(|entry| entry.last_updated);

        // Cards already showing data keep it while they reload.
        if mark_loading && cached.is_none() && self.state(metric).data().is_none() {
            self.set_state(metric, MetricState::Loading);
        }

        let commit = {
            let inner = Arc::clone(&self.inner);
            let shop = shop.clone();
            move |payload: &MetricPayload| {
                if let Err(e) = inner.cache.put(&shop, payload.clone(), inner.clock.now()) {
                    warn!(shop = %shop, metric = %metric, error = %e, "failed to persist cache");
                }
            }
        };

        let result = self
            .inner
            .orchestrator
            .check_and_fetch(
                FetchKey::new(shop.clone(), metric),
                cached.map(|entry| entry.data),
                force_refresh,
                fetchers::load(metric, self.fetch_context()),
                commit,
            )
            .await;

        if self.ready_shop().as_ref() != Some(&shop) {
            debug!(shop = %shop, metric = %metric, "discarding result for previous session");
            return self.state(metric);
        }

        let state = match result {
            Ok(fetched) => MetricState::Fresh {
                data: fetched.value,
                fetched_at: match fetched.source {
                    Source::Cache => cached_at.unwrap_or(now),
                    Source::Network | Source::Joined => self.inner.clock.now(),
                },
            },
            Err(error) => self.error_state(metric, &error),
        };
        self.set_state(metric, state.clone());
        state
    }

    fn error_state(&self, metric: Metric, error: &ApiError) -> MetricState<MetricPayload> {
        let label = metric.label();
        let reason = match error.kind {
            ErrorKind::AccessLimited => {
                info!(metric = %metric, "not available on this plan; showing zero");
                return MetricState::Fresh {
                    data: MetricPayload::empty(metric),
                    fetched_at: self.inner.clock.now(),
                };
            }
            ErrorKind::PermissionDenied => {
                warn!(metric = %metric, error = %error, "missing Shopify permission");
                self.notify(Notice::ReauthRequired { metric });
                ErrorReason::new(
                    ErrorKind::PermissionDenied,
                    format!(
                        "Additional Shopify permissions are required. Please re-authenticate to view {label}."
                    ),
                )
            }
            ErrorKind::AuthRequired => {
                self.sign_out();
                ErrorReason::new(
                    ErrorKind::AuthRequired,
                    "Your session has expired. Please sign in again.",
                )
            }
            ErrorKind::RateLimited => {
                self.inner.rate_limited.raise();
                let previous = self.state(metric);
                if previous.data().is_some() {
                    debug!(metric = %metric, "rate limited; keeping previous data");
                    return previous;
                }
                ErrorReason::new(
                    ErrorKind::RateLimited,
                    format!("Shopify is rate limiting requests. {label} will refresh automatically."),
                )
            }
            kind => {
                warn!(metric = %metric, error = %error, "failed to load metric");
                ErrorReason::new(kind, format!("Failed to load {label}: {}", error.message))
            }
        };
        MetricState::Error { reason }
    }
}

impl<T> std::fmt::Debug for Dashboard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("auth", &*lock(&self.inner.auth))
            .field("cache", &self.inner.cache)
            .field("rate_limited", &self.inner.rate_limited.is_raised())
            .finish_non_exhaustive()
    }
}
