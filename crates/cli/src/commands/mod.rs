//! CLI command implementations.

pub mod cache;
pub mod dashboard;
pub mod intents;

use std::sync::Arc;

use serde::Serialize;
use storesight_core::{ShopDomain, ShopDomainError};
use storesight_dashboard::cache::{CacheStorage, FileStorage, StorageError};
use storesight_dashboard::{
    ApiClient, ApiError, AuthContext, Dashboard, DashboardConfig, RefreshRejected,
};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// The backend could not be reached or refused the request.
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    /// The cache directory could not be read or written.
    #[error("Cache storage error: {0}")]
    Storage(#[from] StorageError),

    /// A `--shop` value is not a shop domain.
    #[error("Invalid shop: {0}")]
    Shop(#[from] ShopDomainError),

    /// A URL argument could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Output could not be serialized.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    /// The refresh was turned down.
    #[error("Refresh rejected: {0}")]
    Refresh(#[from] RefreshRejected),

    /// No session and no `--shop`.
    #[error("Not signed in: set STORESIGHT_SESSION_TOKEN or pass --shop")]
    NotSignedIn,
}

/// Print `value` to stdout as pretty JSON.
#[allow(clippy::print_stdout)]
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The persisted cache directory.
pub fn storage(config: &DashboardConfig) -> Arc<dyn CacheStorage> {
    let storage = FileStorage::new(&config.cache_dir);
    tracing::debug!(dir = %storage.dir().display(), "using cache directory");
    Arc::new(storage)
}

/// Build a coordinator and sign it in.
///
/// With `shop` the coordinator acts for that shop directly; otherwise the
/// backend is asked who the session token belongs to.
pub async fn connect(
    config: &DashboardConfig,
    shop: Option<&str>,
) -> Result<Dashboard<ApiClient>, CliError> {
    let client = ApiClient::new(&config.api)?;

    let context = match shop {
        Some(shop) => AuthContext::signed_in(ShopDomain::parse(shop)?),
        None if config.session_token().is_none() => return Err(CliError::NotSignedIn),
        None => {
            tracing::debug!(api = %client.base_url(), "resolving session");
            client.current_session().await?
        }
    };
    let Some(shop) = context.ready_shop().cloned() else {
        return Err(CliError::NotSignedIn);
    };

    let dashboard = Dashboard::new(client, storage(config), config.settings.clone());
    dashboard.set_auth(context);
    tracing::info!(shop = %shop, "signed in");
    Ok(dashboard)
}
