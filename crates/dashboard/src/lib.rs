//! StoreSight dashboard coordinator.
//!
//! Fetches, caches and refreshes the analytics shown on the merchant
//! dashboard:
//!
//! - a shop-scoped, versioned cache with a two-hour TTL
//! - one in-flight request per shop and metric, shared by every caller
//! - retry with exponential backoff for transient failures
//! - a debounced manual refresh and automatic polling while rate limited
//! - cache invalidation whenever the signed-in shop changes
//!
//! [`Dashboard`] is the entry point; [`ApiClient`] talks to the backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod dashboard;
mod fetchers;
pub mod insights;
pub mod intents;
pub mod notice;
pub mod orchestrator;
pub mod refresh;
pub mod retry;
pub mod session;
pub mod tasks;

pub use api::{ApiClient, ApiError, Transport};
pub use cache::{CacheStorage, FileStorage, MemoryStorage};
pub use config::{DashboardConfig, DashboardSettings};
pub use dashboard::{Dashboard, LoadOptions};
pub use insights::Insights;
pub use intents::{PageIntent, PageIntents, parse_intents};
pub use notice::Notice;
pub use refresh::{RefreshRejected, RefreshReport};
pub use session::AuthContext;
