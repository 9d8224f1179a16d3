//! Proxy transport layer
//!
//! Builds an HTTP client whose connections all go through one upstream proxy.

use std::time::Duration;

use http::HeaderMap;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{GhostlineError, Result};
use crate::models::Proxy;

/// Transport settings shared by every client the factory builds
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-request timeout for a single attempt
    pub timeout: Duration,
    /// Forward caller headers on the proxy CONNECT handshake
    pub connect_headers: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            connect_headers: true,
        }
    }
}

/// HTTP client bound to a single proxy
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: reqwest::Client,
    proxy: Proxy,
}

impl ProxyClient {
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }
}

/// Proxy transport factory
pub struct ProxyTransport;

impl ProxyTransport {
    /// Build a client that routes through `proxy`.
    ///
    /// `headers` are the caller's request headers; they are also sent on the
    /// CONNECT handshake for proxies that authenticate at that step.
    #[instrument(skip(proxy, headers, config), fields(proxy = %proxy.endpoint()))]
    pub fn build(
        proxy: &Proxy,
        headers: &HeaderMap,
        config: &TransportConfig,
    ) -> Result<ProxyClient> {
        let proxy_url = Self::proxy_url(proxy)?;

        let mut upstream = reqwest::Proxy::all(proxy_url.as_str()).map_err(|e| {
            GhostlineError::InvalidConfig(format!(
                "Invalid proxy '{}': {}",
                proxy.endpoint(),
                e
            ))
        })?;

        if let Some((username, password)) = proxy.credentials() {
            upstream = upstream.basic_auth(username, password);
        }

        if config.connect_headers && !headers.is_empty() {
            upstream = upstream.headers(headers.clone());
        }

        let client = reqwest::Client::builder()
            .proxy(upstream)
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                GhostlineError::Internal(format!(
                    "Failed to build client for proxy {}: {}",
                    proxy.endpoint(),
                    e
                ))
            })?;

        debug!(
            "Built transport through {} (timeout {:?})",
            proxy_url, config.timeout
        );

        Ok(ProxyClient {
            client,
            proxy: proxy.clone(),
        })
    }

    /// Validate the proxy's address and port and form its `http://` URL
    pub fn proxy_url(proxy: &Proxy) -> Result<Url> {
        let invalid = |reason: &str| {
            GhostlineError::InvalidConfig(format!(
                "Invalid proxy address '{}': {}",
                proxy.endpoint(),
                reason
            ))
        };

        if proxy.address.trim().is_empty() {
            return Err(invalid("missing host"));
        }

        let port: u16 = proxy
            .port
            .trim()
            .parse()
            .map_err(|_| invalid("port must be a number between 1 and 65535"))?;
        if port == 0 {
            return Err(invalid("port must be a number between 1 and 65535"));
        }

        let url = Url::parse(&proxy.url()).map_err(|e| invalid(&e.to_string()))?;

        // Reject addresses that smuggle in URL components.
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("address must not contain credentials"));
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("address must be a bare host"));
        }
        if url.port_or_known_default() != Some(port) {
            return Err(invalid("address must not contain a port"));
        }

        Ok(url)
    }
}
