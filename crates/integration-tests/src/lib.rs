//! Integration tests for the StoreSight dashboard coordinator.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storesight-integration-tests
//! ```
//!
//! The tests drive a real [`Dashboard`] against [`MockBackend`], an in-memory
//! [`Transport`] that serves canned JSON per path and counts requests. Tokio
//! time is paused in every test, so backoff and polling delays cost nothing.
//!
//! # Test Categories
//!
//! - `cache` - TTL, shop isolation and persistence
//! - `dedup` - concurrent callers sharing one request
//! - `errors` - per-metric handling of classified failures
//! - `intents` - one-shot URL flags
//! - `orders` - pagination
//! - `refresh` - debounce, rate-limit polling and auto reload
//! - `session` - resolving the signed-in shop

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use storesight_core::{ErrorKind, ShopDomain};
use storesight_dashboard::api::{
    ABANDONED_CARTS_PATH, CONVERSION_PATH, LOW_INVENTORY_PATH, NEW_PRODUCTS_PATH, ORDERS_PATH,
    PRODUCTS_PATH, REVENUE_PATH, REVENUE_TIMESERIES_PATH, SESSION_PATH, classify,
};
use storesight_dashboard::clock::ManualClock;
use storesight_dashboard::{
    ApiError, AuthContext, Dashboard, DashboardSettings, MemoryStorage, Notice, Transport,
};
use tokio::sync::broadcast;

/// The shop most tests sign in as.
pub const SHOP: &str = "acme.myshopify.com";
/// A second shop for switching tests.
pub const OTHER_SHOP: &str = "globex.myshopify.com";

/// Every path a full dashboard load requests.
pub const ANALYTICS_PATHS: [&str; 8] = [
    REVENUE_PATH,
    REVENUE_TIMESERIES_PATH,
    PRODUCTS_PATH,
    LOW_INVENTORY_PATH,
    NEW_PRODUCTS_PATH,
    CONVERSION_PATH,
    ORDERS_PATH,
    ABANDONED_CARTS_PATH,
];

/// Parse a shop domain known to be valid.
#[must_use]
pub fn shop(domain: &str) -> ShopDomain {
    ShopDomain::parse(domain).expect("test shop domain is valid")
}

/// The instant every test clock starts at.
#[must_use]
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
        .single()
        .expect("valid start time")
}

type Reply = Result<Value, ApiError>;
type Handler = Arc<dyn Fn(&[(&str, String)]) -> Reply + Send + Sync>;

#[derive(Default)]
struct Route {
    queued: VecDeque<Reply>,
    handler: Option<Handler>,
}

#[derive(Default)]
struct MockState {
    routes: HashMap<String, Route>,
    calls: Vec<(String, Vec<(String, String)>)>,
    latency: Duration,
}

/// An in-memory backend.
///
/// Each path answers with its queued one-shot replies first, then with its
/// handler. Unknown paths fail with a 404. Clones share routes and the call
/// log, so a test keeps one clone while the dashboard owns another.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// A backend with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend where every endpoint answers with healthy data.
    #[must_use]
    pub fn healthy() -> Self {
        let backend = Self::new();
        backend.respond(
            SESSION_PATH,
            json!({ "authenticated": true, "shop": SHOP }),
        );
        backend.respond(REVENUE_PATH, json!({ "total_revenue": "1250.00" }));
        backend.respond(
            REVENUE_TIMESERIES_PATH,
            json!({ "timeseries": [
                { "date": "2024-02-29", "revenue": "650.00" },
                { "date": "2024-02-28", "revenue": "600.00" },
            ]}),
        );
        backend.respond(
            PRODUCTS_PATH,
            json!({ "products": [
                { "id": 11, "title": "Coconut Soap", "quantity": 4, "revenue": "48.00" },
                { "id": 10, "title": "Sea Salt Soap", "quantity": 12, "revenue": "240.00" },
            ]}),
        );
        backend.respond(
            LOW_INVENTORY_PATH,
            json!({ "low_inventory": [
                { "id": "gid://shopify/ProductVariant/7", "title": "Mango Balm", "quantity": 3 },
                { "id": "gid://shopify/ProductVariant/8", "title": "Lime Scrub", "quantity": 1 },
            ]}),
        );
        backend.respond(
            NEW_PRODUCTS_PATH,
            json!({ "new_products": [
                { "id": 21, "title": "Guava Lotion", "created_at": "2024-02-27T10:00:00Z" },
            ]}),
        );
        backend.respond(CONVERSION_PATH, json!({ "conversion_rate": 2.5 }));
        backend.respond(ORDERS_PATH, orders_page(1, 3, false));
        backend.respond(
            ABANDONED_CARTS_PATH,
            json!({ "abandoned_carts": 4, "abandoned_value": "88.00" }),
        );
        backend
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer every request to `path` with `body`.
    pub fn respond(&self, path: &str, body: Value) {
        self.respond_with(path, move |_| Ok(body.clone()));
    }

    /// Answer every request to `path` with `error`.
    pub fn fail(&self, path: &str, error: ApiError) {
        self.respond_with(path, move |_| Err(error.clone()));
    }

    /// Answer every request to `path` the way the HTTP client would for
    /// `status` and `body`.
    pub fn status(&self, path: &str, status: u16, body: Value) {
        let text = body.to_string();
        self.respond_with(path, move |_| match classify(status, &text, None) {
            Some(error) => Err(error),
            None => Ok(body.clone()),
        });
    }

    /// Compute each reply to `path` from the request query.
    pub fn respond_with<F>(&self, path: &str, handler: F)
    where
        F: Fn(&[(&str, String)]) -> Reply + Send + Sync + 'static,
    {
        self.state().routes.entry(path.to_string()).or_default().handler = Some(Arc::new(handler));
    }

    /// Answer the next request to `path` with `reply`, ahead of the handler.
    pub fn enqueue(&self, path: &str, reply: Reply) {
        self.state()
            .routes
            .entry(path.to_string())
            .or_default()
            .queued
            .push_back(reply);
    }

    /// Delay every reply by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Requests made to `path`.
    #[must_use]
    pub fn calls(&self, path: &str) -> usize {
        self.state().calls.iter().filter(|(p, _)| p == path).count()
    }

    /// Requests made to any path.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.state().calls.len()
    }

    /// Query strings sent to `path`, in request order.
    #[must_use]
    pub fn queries(&self, path: &str) -> Vec<Vec<(String, String)>> {
        self.state()
            .calls
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, query)| query.clone())
            .collect()
    }

    /// Forget recorded calls.
    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }

    fn reply(&self, path: &str, query: &[(&str, String)]) -> Reply {
        let mut state = self.state();
        state.calls.push((
            path.to_string(),
            query
                .iter()
                .map(|(name, value)| ((*name).to_string(), value.clone()))
                .collect(),
        ));

        let Some(route) = state.routes.get_mut(path) else {
            return Err(ApiError::new(ErrorKind::Unknown, format!("no route for {path}")).with_status(404));
        };
        if let Some(reply) = route.queued.pop_front() {
            return reply;
        }
        let handler = route.handler.clone();
        drop(state);

        handler.map_or_else(
            || Err(ApiError::new(ErrorKind::Unknown, format!("no reply for {path}")).with_status(404)),
            |handler| handler(query),
        )
    }
}

impl Transport for MockBackend {
    fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> impl Future<Output = Result<Value, ApiError>> + Send {
        let reply = self.reply(path, query);
        let latency = self.state().latency;
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            reply
        }
    }
}

/// One page of orders with ids `first..first + count`, created an hour apart
/// with the lowest id oldest.
#[must_use]
pub fn orders_page(first: u32, count: u32, has_more: bool) -> Value {
    let orders: Vec<Value> = (first..first + count)
        .map(|id| {
            let created_at = start_time() - chrono::Duration::hours(i64::from(10_000 - id));
            json!({
                "id": id,
                "name": format!("#{id}"),
                "created_at": created_at.to_rfc3339(),
                "total_price": "25.00",
                "financial_status": "paid",
            })
        })
        .collect();
    json!({ "orders": orders, "has_more": has_more })
}

/// A dashboard wired to a [`MockBackend`], in-memory storage and a manual
/// clock.
pub struct Harness {
    pub backend: MockBackend,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
    pub dashboard: Dashboard<MockBackend>,
}

impl Harness {
    /// A signed-out dashboard over a healthy backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(MockBackend::healthy(), DashboardSettings::default())
    }

    /// A dashboard signed in to [`SHOP`] over a healthy backend.
    #[must_use]
    pub fn signed_in() -> Self {
        let harness = Self::new();
        harness.sign_in(SHOP);
        harness
    }

    /// A signed-out dashboard over `backend` with `settings`.
    #[must_use]
    pub fn with_backend(backend: MockBackend, settings: DashboardSettings) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let dashboard = Dashboard::with_clock(
            backend.clone(),
            storage.clone(),
            settings,
            clock.clone(),
        );
        Self {
            backend,
            storage,
            clock,
            dashboard,
        }
    }

    /// Sign in to `domain`.
    pub fn sign_in(&self, domain: &str) {
        self.dashboard.set_auth(AuthContext::signed_in(shop(domain)));
    }

    /// Subscribe to notices raised from now on.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.dashboard.subscribe()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Every notice already sent to `receiver`.
#[must_use]
pub fn drain(receiver: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = receiver.try_recv() {
        notices.push(notice);
    }
    notices
}
