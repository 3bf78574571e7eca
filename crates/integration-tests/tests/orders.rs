//! Orders pagination.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use serde_json::json;
use storesight_core::{ErrorKind, Metric, MetricPayload, Order};
use storesight_dashboard::ApiError;
use storesight_dashboard::api::ORDERS_PATH;
use storesight_integration_tests::{Harness, orders_page};

const PAGE_SIZE: u32 = 3;

fn page_of(query: &[(&str, String)]) -> u32 {
    query
        .iter()
        .find(|(name, _)| *name == "page")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap()
}

fn loaded_orders(harness: &Harness) -> Vec<Order> {
    match harness.dashboard.state(Metric::Orders).data() {
        Some(MetricPayload::Orders(orders)) => orders.clone(),
        other => panic!("expected orders, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_five_pages_are_concatenated_newest_first() {
    let harness = Harness::signed_in();
    harness.backend.respond_with(ORDERS_PATH, |query| {
        let page = page_of(query);
        Ok(orders_page((page - 1) * PAGE_SIZE + 1, PAGE_SIZE, page < 5))
    });

    harness.dashboard.fetch_metric(Metric::Orders, false).await;

    let pages: Vec<u32> = harness
        .backend
        .queries(ORDERS_PATH)
        .iter()
        .map(|query| {
            let query: Vec<(&str, String)> = query
                .iter()
                .map(|(name, value)| (name.as_str(), value.clone()))
                .collect();
            page_of(&query)
        })
        .collect();
    assert_eq!(pages, vec![1, 2, 3, 4, 5]);

    let first = harness.backend.queries(ORDERS_PATH).remove(0);
    assert!(first.contains(&("limit".to_string(), "50".to_string())));
    assert!(first.contains(&("days".to_string(), "30".to_string())));

    let orders = loaded_orders(&harness);
    assert_eq!(orders.len(), 15);
    assert!(orders.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
    assert_eq!(orders.first().unwrap().id, "15");
    assert_eq!(orders.last().unwrap().id, "1");
}

#[tokio::test(start_paused = true)]
async fn test_pagination_is_capped_at_five_pages() {
    let harness = Harness::signed_in();
    harness.backend.respond_with(ORDERS_PATH, |query| {
        let page = page_of(query);
        Ok(orders_page((page - 1) * PAGE_SIZE + 1, PAGE_SIZE, true))
    });

    harness.dashboard.fetch_metric(Metric::Orders, false).await;

    assert_eq!(harness.backend.calls(ORDERS_PATH), 5);
    assert_eq!(loaded_orders(&harness).len(), 15);
}

#[tokio::test(start_paused = true)]
async fn test_pagination_stops_when_no_more_pages() {
    let harness = Harness::signed_in();
    harness.backend.respond_with(ORDERS_PATH, |query| {
        let page = page_of(query);
        Ok(orders_page((page - 1) * PAGE_SIZE + 1, PAGE_SIZE, page < 2))
    });

    harness.dashboard.fetch_metric(Metric::Orders, false).await;

    assert_eq!(harness.backend.calls(ORDERS_PATH), 2);
    assert_eq!(loaded_orders(&harness).len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_later_page_failure_keeps_collected_orders() {
    let harness = Harness::signed_in();
    harness.backend.respond_with(ORDERS_PATH, |query| match page_of(query) {
        1 => Ok(orders_page(1, PAGE_SIZE, true)),
        _ => Err(ApiError::new(ErrorKind::ServiceUnavailable, "Server error (502)").with_status(502)),
    });

    harness.dashboard.fetch_metric(Metric::Orders, false).await;

    // page 2 is retried three times before pagination gives up
    assert_eq!(harness.backend.calls(ORDERS_PATH), 5);
    assert_eq!(loaded_orders(&harness).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_later_page_auth_failure_fails_the_card() {
    let harness = Harness::signed_in();
    harness.backend.respond_with(ORDERS_PATH, |query| match page_of(query) {
        1 => Ok(orders_page(1, PAGE_SIZE, true)),
        _ => Err(ApiError::auth_required("Session expired").with_status(401)),
    });

    let state = harness.dashboard.fetch_metric(Metric::Orders, false).await;

    assert_eq!(state.error().unwrap().kind, ErrorKind::AuthRequired);
    assert!(!harness.dashboard.auth().authenticated);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_page_stops_pagination() {
    let harness = Harness::signed_in();
    harness.backend.respond(
        ORDERS_PATH,
        json!({
            "orders": orders_page(1, PAGE_SIZE, true)["orders"],
            "has_more": true,
            "rate_limited": true,
        }),
    );

    harness.dashboard.fetch_metric(Metric::Orders, false).await;

    assert_eq!(harness.backend.calls(ORDERS_PATH), 1);
    assert_eq!(loaded_orders(&harness).len(), 3);
    assert!(harness.dashboard.is_rate_limited());
    harness.dashboard.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_first_page_failure_fails_the_card() {
    let harness = Harness::signed_in();
    harness.backend.status(
        ORDERS_PATH,
        403,
        json!({ "error_code": "INSUFFICIENT_PERMISSIONS" }),
    );

    let state = harness.dashboard.fetch_metric(Metric::Orders, false).await;

    assert_eq!(state.error().unwrap().kind, ErrorKind::PermissionDenied);
    assert_eq!(harness.backend.calls(ORDERS_PATH), 1);
}
