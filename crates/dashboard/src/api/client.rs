//! HTTP client for the StoreSight backend.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use secrecy::ExposeSecret;
use serde_json::Value;
use storesight_core::ErrorKind;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use super::{ApiError, Transport, classify};
use crate::config::ApiConfig;
use crate::session::{self, AuthContext};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// StoreSight backend client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns error if the session token is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();

        if let Some(token) = &config.session_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| {
                    ApiError::new(ErrorKind::Unknown, format!("Invalid session token: {e}"))
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::new(ErrorKind::Unknown, format!("HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// The backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Ask the backend who we are.
    ///
    /// # Errors
    ///
    /// Returns error for failures other than an expired session, which
    /// yields a signed-out context instead.
    pub async fn current_session(&self) -> Result<AuthContext, ApiError> {
        session::resolve_session(self).await
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.join(path).map_err(|e| {
            ApiError::new(ErrorKind::Unknown, format!("Invalid endpoint {path}: {e}"))
        })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    #[instrument(skip(self, query), fields(request_id))]
    async fn request_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = self.endpoint(path, query)?;
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let response = self
            .inner
            .client
            .get(url)
            .header(REQUEST_ID_HEADER, request_id.as_str())
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        if let Some(error) = classify(status, &body, retry_after) {
            tracing::debug!(status, kind = %error.kind, "backend request failed");
            return Err(error);
        }

        serde_json::from_str(&body).map_err(|e| ApiError::decode(path, &e).with_status(status))
    }
}

impl Transport for ApiClient {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        self.request_json(path, query).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_endpoint_appends_query() {
        let config = ApiConfig::new(Url::parse("https://api.storesight.app").unwrap());
        let client = ApiClient::new(&config).unwrap();

        let url = client
            .endpoint(
                "/api/analytics/orders/timeseries",
                &[("page", "2".to_string()), ("limit", "50".to_string())],
            )
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.storesight.app/api/analytics/orders/timeseries?page=2&limit=50"
        );
    }

    #[test]
    fn test_debug_omits_token() {
        let mut config = ApiConfig::new(Url::parse("https://api.storesight.app").unwrap());
        config.session_token = Some(SecretString::from("session-abc123"));
        let client = ApiClient::new(&config).unwrap();

        let debug_output = format!("{client:?}");
        assert!(debug_output.contains("api.storesight.app"));
        assert!(!debug_output.contains("session-abc123"));
    }
}
