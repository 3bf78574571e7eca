//! Opening the dashboard at a URL carrying one-shot flags.

#![allow(clippy::unwrap_used)]

use storesight_dashboard::api::REVENUE_PATH;
use storesight_dashboard::{LoadOptions, Notice, PageIntent};
use storesight_integration_tests::{ANALYTICS_PATHS, Harness, drain};
use url::Url;

fn dashboard_url(query: &str) -> Url {
    Url::parse(&format!("https://app.storesight.app/dashboard?{query}")).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_plain_open_loads_from_cache() {
    let harness = Harness::signed_in();
    harness.dashboard.load(LoadOptions::default()).await;
    harness.backend.reset_calls();

    let opened = harness.dashboard.open(&dashboard_url("shop=acme.myshopify.com")).await;

    assert!(opened.intents.is_empty());
    assert!(opened.report.is_success());
    assert_eq!(harness.backend.total_calls(), 0);
    assert_eq!(
        opened.url.as_str(),
        "https://app.storesight.app/dashboard?shop=acme.myshopify.com"
    );
}

#[tokio::test(start_paused = true)]
async fn test_force_refresh_intent_bypasses_cache_and_debounce() {
    let harness = Harness::signed_in();
    harness.dashboard.request_refresh().await.unwrap();
    harness.backend.reset_calls();

    let opened = harness
        .dashboard
        .open(&dashboard_url("force_refresh=true&shop=acme.myshopify.com"))
        .await;

    assert!(opened.intents.contains(PageIntent::ForceRefresh));
    assert!(opened.report.is_success());
    for path in ANALYTICS_PATHS {
        assert_eq!(harness.backend.calls(path), 1, "{path}");
    }
    assert_eq!(
        opened.url.as_str(),
        "https://app.storesight.app/dashboard?shop=acme.myshopify.com"
    );
}

#[tokio::test(start_paused = true)]
async fn test_connected_and_reauth_intents_raise_notices() {
    let harness = Harness::signed_in();
    let mut notices = harness.notices();

    let opened = harness
        .dashboard
        .open(&dashboard_url("connected=true&reauth=1"))
        .await;

    assert!(opened.report.is_success());
    assert_eq!(
        drain(&mut notices),
        vec![Notice::StoreConnected, Notice::Reauthenticated]
    );
    assert_eq!(opened.url.as_str(), "https://app.storesight.app/dashboard");
}

#[tokio::test(start_paused = true)]
async fn test_clear_cache_intent_refetches_everything() {
    let harness = Harness::signed_in();
    harness.dashboard.load(LoadOptions::default()).await;
    harness.backend.reset_calls();
    let mut notices = harness.notices();

    harness.dashboard.open(&dashboard_url("clear_cache=true")).await;

    assert_eq!(harness.backend.calls(REVENUE_PATH), 1);
    assert_eq!(drain(&mut notices), vec![Notice::CacheCleared]);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_intent_is_stripped_but_ignored() {
    let harness = Harness::signed_in();
    harness.dashboard.load(LoadOptions::default()).await;
    harness.backend.reset_calls();

    let opened = harness.dashboard.open(&dashboard_url("force_refresh=false")).await;

    assert!(opened.intents.is_empty());
    assert_eq!(harness.backend.total_calls(), 0);
    assert_eq!(opened.url.as_str(), "https://app.storesight.app/dashboard");
}
