//! StoreSight backend access.
//!
//! [`Transport`] is the seam between the coordinator and the network:
//! [`ApiClient`] implements it over HTTP, tests implement it in memory.

mod client;
mod error;

pub use client::*;
pub use error::*;

use std::future::Future;

use serde_json::Value;

/// Revenue summary endpoint.
pub const REVENUE_PATH: &str = "/api/analytics/revenue";
/// Daily revenue series endpoint.
pub const REVENUE_TIMESERIES_PATH: &str = "/api/analytics/revenue/timeseries";
/// Top products endpoint.
pub const PRODUCTS_PATH: &str = "/api/analytics/products";
/// Low inventory endpoint.
pub const LOW_INVENTORY_PATH: &str = "/api/analytics/inventory/low";
/// Recently added products endpoint.
pub const NEW_PRODUCTS_PATH: &str = "/api/analytics/new_products";
/// Conversion rate endpoint.
pub const CONVERSION_PATH: &str = "/api/analytics/conversion";
/// Paged orders endpoint.
pub const ORDERS_PATH: &str = "/api/analytics/orders/timeseries";
/// Abandoned carts endpoint.
pub const ABANDONED_CARTS_PATH: &str = "/api/analytics/abandoned_carts";
/// Current session endpoint.
pub const SESSION_PATH: &str = "/api/auth/shopify/me";

/// Issues GET requests against the backend and returns classified results.
///
/// Implementations must classify failures with [`classify`] so every caller
/// sees the same [`ApiError`] kinds.
pub trait Transport: Send + Sync + 'static {
    /// GET `path` with `query` and return the decoded JSON body.
    fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> impl Future<Output = Result<Value, ApiError>> + Send;
}
