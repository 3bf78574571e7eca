//! Concurrent callers share one backend request per shop and metric.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use storesight_core::{Metric, MetricPayload};
use storesight_dashboard::LoadOptions;
use storesight_dashboard::api::{
    LOW_INVENTORY_PATH, PRODUCTS_PATH, REVENUE_PATH, REVENUE_TIMESERIES_PATH,
};
use storesight_integration_tests::{ANALYTICS_PATHS, Harness};

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_share_one_request() {
    let harness = Harness::signed_in();
    harness.backend.set_latency(Duration::from_secs(1));

    let (first, second) = tokio::join!(
        harness.dashboard.fetch_metric(Metric::Revenue, false),
        harness.dashboard.fetch_metric(Metric::Revenue, false),
    );

    assert_eq!(harness.backend.calls(REVENUE_PATH), 1);
    assert_eq!(harness.backend.calls(REVENUE_TIMESERIES_PATH), 1);
    assert_eq!(first, second);
    assert!(matches!(first.data(), Some(MetricPayload::Revenue(_))));
}

#[tokio::test(start_paused = true)]
async fn test_forced_fetch_joins_request_in_flight() {
    let harness = Harness::signed_in();
    harness.backend.set_latency(Duration::from_secs(1));

    let (cached, forced) = tokio::join!(
        harness.dashboard.fetch_metric(Metric::Products, false),
        harness.dashboard.fetch_metric(Metric::Products, true),
    );

    assert_eq!(harness.backend.calls(PRODUCTS_PATH), 1);
    assert_eq!(cached.data(), forced.data());
}

#[tokio::test(start_paused = true)]
async fn test_distinct_metrics_are_not_shared() {
    let harness = Harness::signed_in();
    harness.backend.set_latency(Duration::from_secs(1));

    tokio::join!(
        harness.dashboard.fetch_metric(Metric::Products, false),
        harness.dashboard.fetch_metric(Metric::Inventory, false),
    );

    assert_eq!(harness.backend.calls(PRODUCTS_PATH), 1);
    assert_eq!(harness.backend.calls(LOW_INVENTORY_PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_loads_request_each_endpoint_once() {
    let harness = Harness::signed_in();
    harness.backend.set_latency(Duration::from_secs(1));

    let first = harness.dashboard.clone();
    let second = harness.dashboard.clone();
    let (a, b) = tokio::join!(
        first.load(LoadOptions::default()),
        second.load(LoadOptions { skip_loading: true }),
    );

    assert!(a.is_success());
    assert!(b.is_success());
    for path in ANALYTICS_PATHS {
        assert_eq!(harness.backend.calls(path), 1, "{path}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_shared_failure_reaches_every_caller() {
    let harness = Harness::signed_in();
    harness.backend.set_latency(Duration::from_secs(1));
    harness.backend.status(
        PRODUCTS_PATH,
        403,
        serde_json::json!({ "error_code": "INSUFFICIENT_PERMISSIONS" }),
    );

    let (first, second) = tokio::join!(
        harness.dashboard.fetch_metric(Metric::Products, false),
        harness.dashboard.fetch_metric(Metric::Products, false),
    );

    assert_eq!(harness.backend.calls(PRODUCTS_PATH), 1);
    assert!(first.error().is_some());
    assert_eq!(first.error(), second.error());
}
