//! Dashboard configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STORESIGHT_API_URL` - Base URL of the StoreSight backend
//!
//! ## Optional
//! - `STORESIGHT_SESSION_TOKEN` - Bearer credential sent with every request
//! - `STORESIGHT_CACHE_DIR` - Directory for persisted dashboard caches (default: .storesight/cache)
//! - `STORESIGHT_CACHE_TTL_MINUTES` - Cache entry max age (default: 120)
//! - `STORESIGHT_REFRESH_DEBOUNCE_SECS` - Minimum gap between manual refreshes (default: 120)
//! - `STORESIGHT_MAX_RETRIES` - Retries for transient failures (default: 3)
//! - `STORESIGHT_RETRY_BASE_DELAY_MS` - First backoff delay (default: 1000)
//! - `STORESIGHT_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::retry::RetryPolicy;

const DEFAULT_CACHE_DIR: &str = ".storesight/cache";
const DEFAULT_CACHE_TTL_MINUTES: u64 = 120;
const DEFAULT_REFRESH_DEBOUNCE_SECS: u64 = 120;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Backend API access
    pub api: ApiConfig,
    /// Coordinator tunables
    pub settings: DashboardSettings,
    /// Directory holding one JSON cache file per shop
    pub cache_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Backend API configuration.
///
/// Implements `Debug` manually to redact the session token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Backend base URL (e.g. `https://api.storesight.app`)
    pub base_url: Url,
    /// Session credential, if the embedding app holds one
    pub session_token: Option<SecretString>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ApiConfig {
    /// Configuration for a backend at `base_url` without credentials.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            session_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Orders card pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrdersPaging {
    /// Orders per page
    pub page_size: u32,
    /// Look-back window in days
    pub days: u32,
    /// Pages fetched after the first one, at most
    pub max_extra_pages: u32,
    /// Fixed pause between page requests
    pub page_delay: Duration,
}

impl Default for OrdersPaging {
    fn default() -> Self {
        Self {
            page_size: 50,
            days: 30,
            max_extra_pages: 4,
            page_delay: Duration::from_millis(500),
        }
    }
}

/// Coordinator tunables.
///
/// `Default` yields the production values, so the library can be used
/// without touching the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSettings {
    /// Cache entries older than this are stale
    pub cache_ttl: Duration,
    /// Minimum gap between accepted manual refreshes
    pub refresh_debounce: Duration,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
    /// Orders pagination
    pub orders: OrdersPaging,
    /// Delay before the orders fetch during a full refresh
    pub orders_stagger: Duration,
    /// First rate-limit poll delay
    pub rate_limit_base_delay: Duration,
    /// Upper bound on rate-limit poll delay
    pub rate_limit_max_delay: Duration,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_MINUTES * 60),
            refresh_debounce: Duration::from_secs(DEFAULT_REFRESH_DEBOUNCE_SECS),
            retry: RetryPolicy::default(),
            orders: OrdersPaging::default(),
            orders_stagger: Duration::from_millis(500),
            rate_limit_base_delay: Duration::from_secs(60),
            rate_limit_max_delay: Duration::from_secs(300),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the session token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = get_required_env("STORESIGHT_API_URL")?;
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STORESIGHT_API_URL".to_string(), e.to_string())
        })?;

        let session_token = get_optional_env("STORESIGHT_SESSION_TOKEN")
            .map(|token| {
                validate_not_placeholder(&token, "STORESIGHT_SESSION_TOKEN")?;
                Ok::<_, ConfigError>(SecretString::from(token))
            })
            .transpose()?;

        let api = ApiConfig {
            base_url,
            session_token,
            request_timeout: Duration::from_secs(get_parsed_or_default(
                "STORESIGHT_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
        };

        let settings = DashboardSettings {
            cache_ttl: Duration::from_secs(
                get_parsed_or_default("STORESIGHT_CACHE_TTL_MINUTES", DEFAULT_CACHE_TTL_MINUTES)?
                    * 60,
            ),
            refresh_debounce: Duration::from_secs(get_parsed_or_default(
                "STORESIGHT_REFRESH_DEBOUNCE_SECS",
                DEFAULT_REFRESH_DEBOUNCE_SECS,
            )?),
            retry: RetryPolicy {
                max_retries: get_parsed_or_default("STORESIGHT_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
                base_delay: Duration::from_millis(get_parsed_or_default(
                    "STORESIGHT_RETRY_BASE_DELAY_MS",
                    DEFAULT_RETRY_BASE_DELAY_MS,
                )?),
            },
            ..DashboardSettings::default()
        };

        Ok(Self {
            api,
            settings,
            cache_dir: PathBuf::from(get_env_or_default("STORESIGHT_CACHE_DIR", DEFAULT_CACHE_DIR)),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// The session token, if configured.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.api
            .session_token
            .as_ref()
            .map(|token| token.expose_secret())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Reject values copied verbatim from `.env.example`.
fn validate_not_placeholder(value: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("contains placeholder pattern '{pattern}'"),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = DashboardSettings::default();
        assert_eq!(settings.cache_ttl, Duration::from_secs(120 * 60));
        assert_eq!(settings.refresh_debounce, Duration::from_secs(120));
        assert_eq!(settings.retry.max_retries, 3);
        assert_eq!(settings.retry.base_delay, Duration::from_millis(1000));
        assert_eq!(settings.orders.max_extra_pages, 4);
        assert_eq!(settings.orders.page_delay, Duration::from_millis(500));
        assert_eq!(settings.rate_limit_max_delay, Duration::from_secs(300));
    }

    #[test]
    fn test_validate_not_placeholder() {
        assert!(validate_not_placeholder("your-session-token", "TEST_VAR").is_err());
        assert!(validate_not_placeholder("CHANGEME", "TEST_VAR").is_err());
        assert!(validate_not_placeholder("eyJhbGciOiJIUzI1NiJ9.c2hvcA.sig", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_get_parsed_or_default_uses_default_when_unset() {
        let value: u64 = get_parsed_or_default("STORESIGHT_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_api_config_debug_redacts_token() {
        let config = ApiConfig {
            base_url: Url::parse("https://api.storesight.app").unwrap(),
            session_token: Some(SecretString::from("super_secret_session_token")),
            request_timeout: Duration::from_secs(30),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("api.storesight.app"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_session_token"));
    }
}
