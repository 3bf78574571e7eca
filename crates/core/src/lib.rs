//! StoreSight Core - Shared domain types.
//!
//! This crate provides the types shared by every StoreSight component:
//! - `dashboard` - Cache and refresh coordinator for the merchant dashboard
//! - `cli` - Command-line front end for the coordinator
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Shop domains, metrics, money, per-metric state, error kinds
//!   and the analytics payloads returned by the backend

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
