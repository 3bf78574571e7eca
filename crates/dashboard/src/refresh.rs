//! Manual refresh, its debounce gate, and rate-limit polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use storesight_core::{ErrorReason, Metric, MetricState, RefreshPhase};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::Transport;
use crate::dashboard::Dashboard;
use crate::notice::Notice;
use crate::tasks::TaskPurpose;

/// Set when the backend signals throttling; read by the polling loop.
#[derive(Debug, Clone, Default)]
pub struct RateLimitFlag(Arc<AtomicBool>);

impl RateLimitFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a refresh request was turned down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshRejected {
    #[error("A refresh is already in progress. Please wait.")]
    InProgress,

    #[error("Please wait {remaining_secs} seconds before refreshing again.")]
    Debounced { remaining_secs: u64 },

    #[error("Sign in to refresh dashboard data.")]
    NotAuthenticated,
}

/// What asked for a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// The merchant pressed refresh.
    Manual,
    /// The rate-limit polling loop.
    RateLimitPoll,
    /// A `force_refresh` page intent.
    Intent,
}

impl RefreshTrigger {
    /// Only manual refreshes are debounced.
    #[must_use]
    pub const fn bypasses_debounce(self) -> bool {
        !matches!(self, Self::Manual)
    }
}

/// Serialises refreshes and enforces the debounce window.
#[derive(Debug, Default)]
pub struct RefreshGate {
    phase: RefreshPhase,
    last_refresh: Option<DateTime<Utc>>,
}

impl RefreshGate {
    /// Enter `Refreshing`, or say why not.
    ///
    /// # Errors
    ///
    /// Rejects while a refresh is running, and rejects manual refreshes
    /// within `debounce` of the last accepted one.
    pub fn try_begin(
        &mut self,
        now: DateTime<Utc>,
        debounce: Duration,
        trigger: RefreshTrigger,
    ) -> Result<(), RefreshRejected> {
        if self.phase == RefreshPhase::Refreshing {
            return Err(RefreshRejected::InProgress);
        }

        if let Some(last) = self.last_refresh.filter(|_| !trigger.bypasses_debounce()) {
            let elapsed = (now - last).to_std().unwrap_or_default();
            if elapsed < debounce {
                let remaining = debounce - elapsed;
                let remaining_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                return Err(RefreshRejected::Debounced { remaining_secs });
            }
        }

        self.phase = RefreshPhase::Refreshing;
        self.last_refresh = Some(now);
        Ok(())
    }

    /// Return to `Idle`.
    pub fn finish(&mut self) {
        self.phase = RefreshPhase::Idle;
    }

    #[must_use]
    pub const fn phase(&self) -> RefreshPhase {
        self.phase
    }

    #[must_use]
    pub const fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }
}

/// Returns the gate to `Idle` even if the refresh future is dropped.
struct RefreshGuard<'a>(&'a Mutex<RefreshGate>);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).finish();
    }
}

/// Outcome of loading or refreshing every metric.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RefreshReport {
    /// Metrics now showing data.
    pub loaded: Vec<Metric>,
    /// Metrics now showing an error.
    pub failed: Vec<(Metric, ErrorReason)>,
}

impl RefreshReport {
    pub(crate) fn record(&mut self, metric: Metric, state: &MetricState<impl Sized>) {
        match state {
            MetricState::Fresh { .. } => self.loaded.push(metric),
            MetricState::Error { reason } => self.failed.push((metric, reason.clone())),
            MetricState::Idle | MetricState::Loading => {}
        }
    }

    /// Whether no metric failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// The metrics that failed.
    #[must_use]
    pub fn failed_metrics(&self) -> Vec<Metric> {
        self.failed.iter().map(|(metric, _)| *metric).collect()
    }
}

impl<T: Transport> Dashboard<T> {
    /// Refresh every metric at the merchant's request.
    ///
    /// Rejections raise a "please wait" notice and change nothing.
    ///
    /// # Errors
    ///
    /// Returns why the refresh was rejected.
    pub async fn request_refresh(&self) -> Result<RefreshReport, RefreshRejected> {
        match self.run_refresh(RefreshTrigger::Manual).await {
            Ok(report) => {
                self.ensure_rate_limit_polling();
                Ok(report)
            }
            Err(rejected) => {
                info!(reason = %rejected, "refresh rejected");
                if !matches!(rejected, RefreshRejected::NotAuthenticated) {
                    self.notify(Notice::PleaseWait {
                        message: rejected.to_string(),
                    });
                }
                Err(rejected)
            }
        }
    }

    /// The current refresh phase.
    #[must_use]
    pub fn refresh_phase(&self) -> RefreshPhase {
        self.gate().phase()
    }

    /// When the last refresh was accepted.
    #[must_use]
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.gate().last_refresh()
    }

    fn gate(&self) -> std::sync::MutexGuard<'_, RefreshGate> {
        self.inner
            .refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) async fn run_refresh(
        &self,
        trigger: RefreshTrigger,
    ) -> Result<RefreshReport, RefreshRejected> {
        let shop = self.ready_shop().ok_or(RefreshRejected::NotAuthenticated)?;
        let now = self.inner.clock.now();
        self.gate()
            .try_begin(now, self.inner.settings.refresh_debounce, trigger)?;
        let _guard = RefreshGuard(&self.inner.refresh);

        info!(shop = %shop, ?trigger, "refreshing dashboard");
        self.inner.rate_limited.clear();
        if let Err(e) = self.inner.cache.invalidate(&shop) {
            warn!(shop = %shop, error = %e, "failed to invalidate cache before refresh");
        }
        for metric in Metric::ALL {
            self.set_state(metric, MetricState::Loading);
        }

        let report = self.fetch_all(true, false).await;

        if report.is_success() {
            info!(shop = %shop, "dashboard refreshed");
            self.notify(Notice::RefreshSucceeded);
        } else {
            warn!(shop = %shop, failed = ?report.failed_metrics(), "dashboard refresh incomplete");
            self.notify(Notice::RefreshFailed {
                failed: report.failed_metrics(),
            });
        }
        Ok(report)
    }

    /// Start polling if a fetch reported throttling and no poll is running.
    pub(crate) fn ensure_rate_limit_polling(&self) {
        if !self.inner.rate_limited.is_raised()
            || self.inner.tasks.is_active(TaskPurpose::RateLimitPoll)
        {
            return;
        }

        let retry_in = self.poll_delay(0);
        warn!(retry_in_secs = retry_in.as_secs(), "rate limited; polling for recovery");
        self.notify(Notice::RateLimited { retry_in });

        let dashboard = self.clone();
        self.inner
            .tasks
            .spawn(TaskPurpose::RateLimitPoll, dashboard.poll_rate_limit());
    }

    fn poll_delay(&self, attempt: u32) -> Duration {
        let settings = &self.inner.settings;
        settings
            .rate_limit_base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(settings.rate_limit_max_delay)
    }

    async fn poll_rate_limit(self) {
        let mut attempt: u32 = 0;
        loop {
            let delay = self.poll_delay(attempt);
            debug!(attempt, delay_secs = delay.as_secs(), "rate-limit poll scheduled");
            tokio::time::sleep(delay).await;

            match self.run_refresh(RefreshTrigger::RateLimitPoll).await {
                Ok(_) if !self.inner.rate_limited.is_raised() => {
                    info!(attempt, "rate limit cleared; polling stopped");
                    return;
                }
                Ok(_) => warn!(attempt, "still rate limited"),
                Err(RefreshRejected::NotAuthenticated) => {
                    debug!("no session; polling stopped");
                    return;
                }
                Err(rejected) => debug!(reason = %rejected, "rate-limit poll deferred"),
            }
            attempt = attempt.saturating_add(1);
        }
    }
}
