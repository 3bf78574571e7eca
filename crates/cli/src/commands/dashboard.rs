//! Loading, refreshing and watching the dashboard.

use std::time::Duration;

use storesight_dashboard::{ApiClient, Dashboard, DashboardConfig, Notice, RefreshReport};
use tokio::sync::broadcast::error::RecvError;
use url::Url;

use super::{CliError, connect, print_json};

/// Where the embedded dashboard lives when no `--url` is given.
const DEFAULT_DASHBOARD_URL: &str = "https://app.storesight.app/dashboard";

fn log_report(report: &RefreshReport) {
    for (metric, reason) in &report.failed {
        tracing::warn!(metric = %metric, kind = %reason.kind, "{reason}");
    }
    tracing::info!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        "dashboard loaded"
    );
}

fn finish(dashboard: &Dashboard<ApiClient>) {
    if dashboard.is_rate_limited() {
        tracing::warn!("Shopify is rate limiting requests; some data may be stale");
    }
    dashboard.shutdown();
}

/// Open the dashboard and print the insights view model.
pub async fn show(
    config: &DashboardConfig,
    shop: Option<&str>,
    url: Option<&str>,
) -> Result<(), CliError> {
    let dashboard = connect(config, shop).await?;
    let url = Url::parse(url.unwrap_or(DEFAULT_DASHBOARD_URL))?;

    let opened = dashboard.open(&url).await;
    if !opened.intents.is_empty() {
        tracing::info!(url = %opened.url, "page intents applied");
    }
    log_report(&opened.report);

    print_json(&dashboard.insights())?;
    finish(&dashboard);
    Ok(())
}

/// Refresh every metric and print the insights view model.
pub async fn refresh(config: &DashboardConfig, shop: Option<&str>) -> Result<(), CliError> {
    let dashboard = connect(config, shop).await?;

    let report = dashboard.request_refresh().await?;
    log_report(&report);

    print_json(&dashboard.insights())?;
    finish(&dashboard);
    Ok(())
}

/// Load once, then keep the cache warm and log notices until Ctrl-C.
pub async fn watch(
    config: &DashboardConfig,
    shop: Option<&str>,
    interval_minutes: u64,
) -> Result<(), CliError> {
    let dashboard = connect(config, shop).await?;
    let mut notices = dashboard.subscribe();

    let report = dashboard.load(storesight_dashboard::LoadOptions::default()).await;
    log_report(&report);
    print_json(&dashboard.insights())?;

    let interval = Duration::from_secs(interval_minutes.max(1) * 60);
    dashboard.start_auto_reload(interval);
    tracing::info!(interval_minutes, "watching; press Ctrl-C to stop");

    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Ok(notice) => {
                    tracing::info!("{notice}");
                    if matches!(notice, Notice::RefreshSucceeded) {
                        print_json(&dashboard.insights())?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notices dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    finish(&dashboard);
    Ok(())
}
