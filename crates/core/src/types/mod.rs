//! Core types for StoreSight.
//!
//! This module provides type-safe wrappers for the dashboard's domain concepts.

pub mod analytics;
pub mod error_kind;
pub mod metric;
pub mod price;
pub mod shop;
pub mod status;

pub use analytics::*;
pub use error_kind::{ErrorKind, ServerErrorCode};
pub use metric::{Metric, MetricParseError};
pub use price::Money;
pub use shop::{ShopDomain, ShopDomainError};
pub use status::*;
