//! Proxy listing provider
//!
//! Fetches the account's proxy list from the GhostProxies API and turns it
//! into a [`ProxyPool`]. A fetch is a single request; there is no retry at
//! this layer.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::error::{GhostlineError, Result};
use crate::models::ProviderResponse;
use crate::proxy::pool::{ProxyPool, SelectionPolicy};

/// Default listing endpoint
pub const DEFAULT_PROVIDER_URL: &str = "https://ghostproxies.com/proxies/api.json";

/// Default timeout for one listing fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can produce a fresh proxy pool
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn fetch(&self) -> Result<ProxyPool>;
}

/// Client for the provider's listing API
#[derive(Clone)]
pub struct ProviderClient {
    api_key: String,
    base_url: String,
    timeout: Duration,
    policy: SelectionPolicy,
}

impl ProviderClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            policy: SelectionPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Selection policy given to every pool this client produces
    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the current listing.
    ///
    /// Fails with `MissingCredential` before any network activity when the
    /// key is blank.
    #[instrument(skip(self), fields(provider = %self.base_url))]
    pub async fn fetch_pool(&self) -> Result<ProxyPool> {
        if self.api_key.trim().is_empty() {
            return Err(GhostlineError::MissingCredential);
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| {
                GhostlineError::Internal(format!("Failed to build provider client: {}", e))
            })?;

        debug!("Requesting proxy listing");

        // Errors are stripped of their URL so the key never reaches a log line.
        let response = client
            .get(&self.base_url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| fetch_error(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Provider returned status {}", status.as_u16());
            return Err(GhostlineError::ProviderFetch(format!(
                "provider returned status {}",
                status.as_u16()
            )));
        }

        let listing: ProviderResponse = response
            .json()
            .await
            .map_err(|e| fetch_error(e.without_url()))?;

        let proxies = listing.into_proxies();
        let pool = ProxyPool::new(proxies).with_policy(self.policy);

        info!(
            "Fetched {} proxies ({} online, {} selectable)",
            pool.len(),
            pool.online_count(),
            pool.available_count()
        );

        Ok(pool)
    }
}

#[async_trait]
impl ProxySource for ProviderClient {
    async fn fetch(&self) -> Result<ProxyPool> {
        self.fetch_pool().await
    }
}

/// One-shot fetch against the default endpoint
pub async fn fetch_pool(api_key: &str) -> Result<ProxyPool> {
    ProviderClient::new(api_key).fetch_pool().await
}

fn fetch_error(err: reqwest::Error) -> GhostlineError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_decode() {
        "invalid listing body"
    } else {
        "request failed"
    };
    GhostlineError::ProviderFetch(format!("{}: {}", kind, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing() -> serde_json::Value {
        json!({
            "data": [
                {"Proxy": {
                    "ip": "127.0.0.2",
                    "status": "offline",
                    "portNum": "81",
                    "cityName": "Springfield",
                    "regionName": "Illinois",
                    "countryCode": "US",
                    "countryName": "United States",
                    "panel_user": "u",
                    "panel_pass": "p"
                }},
                {"Proxy": {
                    "ip": "127.0.0.3",
                    "status": "online",
                    "portNum": "82",
                    "countryCode": "DE",
                    "extra": "ignored"
                }}
            ]
        })
    }

    fn client_for(server: &MockServer, key: &str) -> ProviderClient {
        ProviderClient::new(key).with_base_url(format!("{}/proxies/api.json", server.uri()))
    }

    #[tokio::test]
    async fn test_fetch_pool_sends_key_and_decodes_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/proxies/api.json"))
            .and(query_param("key", "secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing()))
            .expect(1)
            .mount(&server)
            .await;

        let pool = client_for(&server, "secret-key").fetch_pool().await.unwrap();

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.proxies()[0].address, "127.0.0.2");
        assert_eq!(pool.proxies()[0].port, "81");
        assert_eq!(pool.proxies()[0].credentials(), Some(("u", "p")));
        assert_eq!(pool.proxies()[1].country_code, "DE");
        assert_eq!(pool.online_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_pool_applies_selection_policy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing()))
            .mount(&server)
            .await;

        let pool = client_for(&server, "k")
            .with_policy(SelectionPolicy::OnlineOnly)
            .fetch_pool()
            .await
            .unwrap();

        assert_eq!(pool.policy(), SelectionPolicy::OnlineOnly);
        assert_eq!(pool.available_count(), 1);
        assert_eq!(pool.select().unwrap().address, "127.0.0.3");
    }

    #[tokio::test]
    async fn test_blank_key_fails_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing()))
            .expect(0)
            .mount(&server)
            .await;

        for key in ["", "   "] {
            let err = client_for(&server, key).fetch_pool().await.unwrap_err();
            assert!(matches!(err, GhostlineError::MissingCredential));
        }
    }

    #[tokio::test]
    async fn test_fetch_pool_free_function_rejects_blank_key() {
        let err = fetch_pool("").await.unwrap_err();
        assert!(matches!(err, GhostlineError::MissingCredential));
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = client_for(&server, "wrong").fetch_pool().await.unwrap_err();
        match err {
            GhostlineError::ProviderFetch(message) => assert!(message.contains("401")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server, "k").fetch_pool().await.unwrap_err();
        assert!(matches!(err, GhostlineError::ProviderFetch(_)));
    }

    #[tokio::test]
    async fn test_unreachable_provider_does_not_leak_key() {
        // Nothing listens on the discard port.
        let client = ProviderClient::new("leaky-key")
            .with_base_url("http://127.0.0.1:9/proxies/api.json")
            .with_timeout(Duration::from_secs(2));

        let err = client.fetch_pool().await.unwrap_err();
        assert!(matches!(err, GhostlineError::ProviderFetch(_)));
        assert!(!err.to_string().contains("leaky-key"));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(listing())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, "k")
            .with_timeout(Duration::from_millis(200))
            .fetch_pool()
            .await
            .unwrap_err();
        assert!(matches!(err, GhostlineError::ProviderFetch(_)));
    }

    #[tokio::test]
    async fn test_empty_listing_yields_empty_pool() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
            .mount(&server)
            .await;

        let pool = client_for(&server, "k").fetch_pool().await.unwrap();
        assert!(pool.is_empty());
        assert!(matches!(pool.select(), Err(GhostlineError::EmptyPool)));
    }
}
