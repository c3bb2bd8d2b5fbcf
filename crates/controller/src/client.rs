//! HTTP client for a single controller.

use crate::error::{ConnectionError, Error};
use crate::resolve::{HostResolver, SystemResolver, resolve_url};
use crate::types::{ApiStatus, ControllerConfig, EntityState};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

/// Status endpoint; 200 means reachable and authorized.
pub const API_STATUS_PATH: &str = "/api/";
/// Configuration endpoint, carries the software version.
pub const API_CONFIG_PATH: &str = "/api/config";
/// Entity state endpoint.
pub const API_STATES_PATH: &str = "/api/states";

/// Timeouts for controller calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Connection test, config and states calls
    pub request_timeout: Duration,

    /// Lightweight `api_status` call
    pub status_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            status_timeout: Duration::from_secs(5),
        }
    }
}

/// Client for one controller's REST API.
///
/// Expected network failures never surface as `Err` from the fetch methods:
/// `test_connection` classifies them and the others return `None`.
pub struct ControllerClient {
    url: Url,
    display_url: String,
    credential: String,
    options: ClientOptions,
    http: reqwest::Client,
    resolver: Arc<dyn HostResolver>,
    resolved: OnceCell<Url>,
}

impl ControllerClient {
    /// Create a client with default timeouts.
    pub fn new(url: &str, credential: impl Into<String>) -> Result<Self, Error> {
        Self::with_options(url, credential, ClientOptions::default())
    }

    /// Create a client with explicit timeouts.
    pub fn with_options(
        url: &str,
        credential: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, Error> {
        let display_url = url.trim().trim_end_matches('/').to_string();
        let parsed = parse_base_url(&display_url)?;

        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            // The endpoint itself must answer; a redirect is not a controller
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            url: parsed,
            display_url,
            credential: credential.into(),
            options,
            http,
            resolver: Arc::new(SystemResolver),
            resolved: OnceCell::new(),
        })
    }

    /// Use a different resolver for the hostname.
    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self.resolved = OnceCell::new();
        self
    }

    /// The URL as configured, hostname intact.
    pub fn display_url(&self) -> &str {
        &self.display_url
    }

    /// Test reachability and authorization against the status endpoint.
    pub async fn test_connection(&self) -> Result<(), ConnectionError> {
        let endpoint = self.endpoint(API_STATUS_PATH).await;
        let start = Instant::now();

        let request = self.get(&endpoint, self.options.request_timeout);

        match timeout(self.options.request_timeout, request.send()).await {
            Ok(Ok(response)) => {
                let status = response.status();
                if status == StatusCode::OK {
                    debug!(
                        url = %self.display_url,
                        duration_ms = start.elapsed().as_millis(),
                        "Controller connection test passed"
                    );
                    Ok(())
                } else {
                    let body = response.text().await.unwrap_or_default();
                    warn!(url = %self.display_url, status = status.as_u16(), "Controller rejected connection test");
                    Err(ConnectionError::Http {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
            Ok(Err(e)) => {
                let err = ConnectionError::from_reqwest(&e);
                warn!(url = %self.display_url, error = %e, "Controller connection test failed");
                Err(err)
            }
            Err(_) => {
                warn!(url = %self.display_url, "Controller connection test timed out");
                Err(ConnectionError::Timeout)
            }
        }
    }

    /// Fetch `GET /api/` with the short status timeout.
    pub async fn api_status(&self) -> Option<ApiStatus> {
        self.fetch_json(API_STATUS_PATH, self.options.status_timeout)
            .await
    }

    /// Fetch configuration, including the software version. Best effort.
    pub async fn get_config(&self) -> Option<ControllerConfig> {
        self.fetch_json(API_CONFIG_PATH, self.options.request_timeout)
            .await
    }

    /// Fetch all entity states. Best effort.
    pub async fn get_states(&self) -> Option<Vec<EntityState>> {
        self.fetch_json(API_STATES_PATH, self.options.request_timeout)
            .await
    }

    /// Fetch entity states, keeping only `domain` when given.
    pub async fn get_entities(&self, domain: Option<&str>) -> Option<Vec<EntityState>> {
        let states = self.get_states().await?;
        Some(match domain {
            Some(domain) => states
                .into_iter()
                .filter(|state| state.domain() == domain)
                .collect(),
            None => states,
        })
    }

    /// Absolute endpoint URL on the resolved base.
    async fn endpoint(&self, path: &str) -> String {
        let base = self
            .resolved
            .get_or_init(|| resolve_url(self.resolver.as_ref(), &self.url))
            .await;
        format!("{}{}", base.as_str().trim_end_matches('/'), path)
    }

    fn get(&self, endpoint: &str, request_timeout: Duration) -> reqwest::RequestBuilder {
        self.http
            .get(endpoint)
            .bearer_auth(&self.credential)
            .header(CONTENT_TYPE, "application/json")
            .timeout(request_timeout)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str, request_timeout: Duration) -> Option<T> {
        let endpoint = self.endpoint(path).await;

        let response = match self.get(&endpoint, request_timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %self.display_url, path, error = %e, "Controller request failed");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            debug!(url = %self.display_url, path, status = response.status().as_u16(), "Controller returned non-200");
            return None;
        }

        match response.json::<T>().await {
            Ok(body) => Some(body),
            Err(e) => {
                debug!(url = %self.display_url, path, error = %e, "Controller returned an unexpected body");
                None
            }
        }
    }
}

impl std::fmt::Debug for ControllerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerClient")
            .field("url", &self.display_url)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Test a controller before registering it.
///
/// Returns the reported software version, if the config call succeeds.
pub async fn verify_controller(url: &str, credential: &str) -> Result<Option<String>, Error> {
    let client = ControllerClient::new(url, credential)?;
    client.test_connection().await?;

    let version = client.get_config().await.and_then(|config| config.version);
    Ok(version)
}

/// Flatten a connection test into `(success, error message)`.
pub fn into_pair(result: Result<(), ConnectionError>) -> (bool, Option<String>) {
    match result {
        Ok(()) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    }
}

fn parse_base_url(raw: &str) -> Result<Url, Error> {
    let url = Url::parse(raw).map_err(|e| Error::invalid_url(raw, e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::invalid_url(raw, "scheme must be http or https"));
    }
    if url.host().is_none() {
        return Err(Error::invalid_url(raw, "missing host"));
    }

    Ok(url)
}
