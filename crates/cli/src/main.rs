//! StoreSight CLI - Dashboard data from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Load the dashboard (cache first) and print the insights view model
//! storesight dashboard
//!
//! # Open a dashboard URL, honouring its one-shot flags
//! storesight dashboard --url "https://app.storesight.app/dashboard?force_refresh=true"
//!
//! # Force a refresh of every metric
//! storesight refresh --shop acme.myshopify.com
//!
//! # Keep the cache warm and log notices until interrupted
//! storesight watch --interval-minutes 15
//!
//! # Inspect or clear persisted caches
//! storesight cache show --shop acme.myshopify.com
//! storesight cache clear
//!
//! # Show which flags a URL carries
//! storesight intents "https://app.storesight.app/dashboard?connected=true"
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use storesight_dashboard::config::ConfigError;
use storesight_dashboard::DashboardConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "storesight")]
#[command(author, version, about = "StoreSight dashboard tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every metric and print the insights view model
    Dashboard {
        /// Act for this shop instead of asking the backend
        #[arg(short, long)]
        shop: Option<String>,

        /// Dashboard URL whose one-shot flags should be applied
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Refresh every metric, bypassing the cache
    Refresh {
        /// Act for this shop instead of asking the backend
        #[arg(short, long)]
        shop: Option<String>,
    },
    /// Keep the cache warm and log notices until interrupted
    Watch {
        /// Act for this shop instead of asking the backend
        #[arg(short, long)]
        shop: Option<String>,

        /// Minutes between cache checks
        #[arg(short, long, default_value_t = 15)]
        interval_minutes: u64,
    },
    /// Inspect persisted caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Parse the one-shot flags of a dashboard URL
    Intents {
        /// The URL to parse
        url: String,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print a shop's cache, or list cached shops
    Show {
        #[arg(short, long)]
        shop: Option<String>,
    },
    /// Remove a shop's cache, or every cache
    Clear {
        #[arg(short, long)]
        shop: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &DashboardConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storesight_dashboard=info,storesight_cli=info".into());

    // JSON for log shippers, text for humans
    let json = std::env::var_os("STORESIGHT_LOG_JSON").is_some();
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Loaded before tracing so Sentry can be initialised first
    let config = DashboardConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(
    cli: Cli,
    config: Result<DashboardConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Dashboard { shop, url } => {
            commands::dashboard::show(&config?, shop.as_deref(), url.as_deref()).await?;
        }
        Commands::Refresh { shop } => {
            commands::dashboard::refresh(&config?, shop.as_deref()).await?;
        }
        Commands::Watch {
            shop,
            interval_minutes,
        } => {
            commands::dashboard::watch(&config?, shop.as_deref(), interval_minutes).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Show { shop } => commands::cache::show(&config?, shop.as_deref())?,
            CacheAction::Clear { shop } => commands::cache::clear(&config?, shop.as_deref())?,
        },
        Commands::Intents { url } => commands::intents::parse(&url)?,
    }
    Ok(())
}
