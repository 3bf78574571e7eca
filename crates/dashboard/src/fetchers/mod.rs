//! Per-metric loaders.
//!
//! Each loader knows its endpoint(s) and response shape and turns them into a
//! [`MetricPayload`]. Every request goes through retry-with-backoff, and any
//! response carrying `rate_limited: true` raises the shared flag.

mod abandoned_carts;
mod conversion;
mod inventory;
mod new_products;
mod orders;
mod products;
mod revenue;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use storesight_core::{Metric, MetricPayload};
use tracing::warn;

use crate::api::{ApiError, Transport};
use crate::config::OrdersPaging;
use crate::refresh::RateLimitFlag;
use crate::retry::{RetryPolicy, retry_with_backoff};

/// What a loader needs to reach the backend.
pub(crate) struct FetchContext<T> {
    pub transport: Arc<T>,
    pub retry: RetryPolicy,
    pub orders: OrdersPaging,
    pub rate_limited: RateLimitFlag,
}

impl<T> Clone for FetchContext<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            retry: self.retry,
            orders: self.orders,
            rate_limited: self.rate_limited.clone(),
        }
    }
}

impl<T: Transport> FetchContext<T> {
    /// GET `path` with retries, note any rate limiting, and decode the body.
    async fn get<D: DeserializeOwned>(
        &self,
        path: &'static str,
        query: &[(&str, String)],
    ) -> Result<D, ApiError> {
        let value = retry_with_backoff(self.retry, || self.transport.get_json(path, query)).await?;

        if value.get("rate_limited").and_then(Value::as_bool) == Some(true) {
            warn!(path, "backend reported rate limiting");
            self.rate_limited.raise();
        }

        serde_json::from_value(value).map_err(|e| ApiError::decode(path, &e))
    }
}

/// Load `metric` from the backend.
pub(crate) async fn load<T: Transport>(
    metric: Metric,
    ctx: FetchContext<T>,
) -> Result<MetricPayload, ApiError> {
    match metric {
        Metric::Revenue => revenue::load(&ctx).await.map(MetricPayload::Revenue),
        Metric::Products => products::load(&ctx).await.map(MetricPayload::Products),
        Metric::Inventory => inventory::load(&ctx).await.map(MetricPayload::Inventory),
        Metric::NewProducts => new_products::load(&ctx).await.map(MetricPayload::NewProducts),
        Metric::Insights => conversion::load(&ctx).await.map(MetricPayload::Insights),
        Metric::Orders => orders::load(&ctx).await.map(MetricPayload::Orders),
        Metric::AbandonedCarts => abandoned_carts::load(&ctx)
            .await
            .map(MetricPayload::AbandonedCarts),
    }
}
