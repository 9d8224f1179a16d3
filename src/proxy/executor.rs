//! Proxied request execution with retry logic
//!
//! Each logical request selects one proxy, builds a client bound to it and
//! reuses that client for every attempt. Switching proxies between attempts
//! is left to the caller (issue a new request).

use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{GhostlineError, Result};
use crate::metrics::RequestMetrics;
use crate::models::{Proxy, RequestOutcome, RetryPolicy};
use crate::proxy::pool::PoolHandle;
use crate::proxy::transport::{ProxyClient, ProxyTransport, TransportConfig};

/// Fully buffered response from a proxied request
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: Url,
    proxy: Proxy,
    outcome: RequestOutcome,
}

impl ProxiedResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Final URL after redirects
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The proxy the request went through
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub fn outcome(&self) -> &RequestOutcome {
        &self.outcome
    }
}

/// Executes requests through a randomly selected proxy
#[derive(Clone)]
pub struct RequestExecutor {
    pool: PoolHandle,
    transport: TransportConfig,
    retry: Option<RetryPolicy>,
    metrics: Option<RequestMetrics>,
}

impl RequestExecutor {
    /// Executor without retries or metrics
    pub fn new(pool: impl Into<PoolHandle>) -> Self {
        Self {
            pool: pool.into(),
            transport: TransportConfig::default(),
            retry: None,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: RequestMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_transport_config(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    /// Default retry policy for calls that do not pass their own
    pub fn with_retry_policy(mut self, policy: Option<RetryPolicy>) -> Self {
        self.retry = policy;
        self
    }

    pub fn pool(&self) -> &PoolHandle {
        &self.pool
    }

    pub fn metrics(&self) -> Option<&RequestMetrics> {
        self.metrics.as_ref()
    }

    /// Perform a GET through a random proxy
    pub async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        retry: Option<&RetryPolicy>,
    ) -> Result<ProxiedResponse> {
        self.request(Method::GET, url, headers, None, retry).await
    }

    /// Perform an arbitrary request through a random proxy.
    ///
    /// `retry` overrides the executor's default policy for this call.
    #[instrument(skip_all, fields(method = %method, url = %url))]
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
        retry: Option<&RetryPolicy>,
    ) -> Result<ProxiedResponse> {
        let target = parse_target(url)?;
        let policy = retry.or(self.retry.as_ref()).copied();
        if let Some(policy) = &policy {
            policy.validate()?;
        }

        let proxy = self.pool.select()?;
        let client = ProxyTransport::build(&proxy, &headers, &self.transport)?;

        let response = self
            .execute(&client, method, target, headers, body, policy)
            .await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_outcome(&response.outcome);
        }

        Ok(response)
    }

    async fn execute(
        &self,
        client: &ProxyClient,
        method: Method,
        target: Url,
        headers: HeaderMap,
        body: Option<Bytes>,
        policy: Option<RetryPolicy>,
    ) -> Result<ProxiedResponse> {
        let proxy = client.proxy();
        let max_attempts = policy.map(|p| p.attempts()).unwrap_or(1);
        let start = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            debug!(
                "Sending {} {} through proxy {} (attempt {}/{})",
                method,
                target,
                proxy.endpoint(),
                attempts,
                max_attempts
            );

            let mut builder = client
                .client()
                .request(method.clone(), target.clone())
                .headers(headers.clone());
            if let Some(body) = &body {
                builder = builder.body(body.clone());
            }

            let failure = match send(builder).await {
                Ok((status, response_headers, final_url, bytes)) => {
                    let retry_status = policy.is_some() && is_retryable_status(status);
                    if !(retry_status && attempts < max_attempts) {
                        let outcome = RequestOutcome {
                            status_code: status.as_u16(),
                            method: method.as_str().to_string(),
                            proxy_address: proxy.address.clone(),
                            attempts,
                            elapsed: start.elapsed(),
                            timestamp: Utc::now(),
                        };

                        info!(
                            "{} {} through {} returned {} after {} attempt(s)",
                            method,
                            target,
                            proxy.endpoint(),
                            status.as_u16(),
                            attempts
                        );

                        return Ok(ProxiedResponse {
                            status,
                            headers: response_headers,
                            body: bytes,
                            url: final_url,
                            proxy: proxy.clone(),
                            outcome,
                        });
                    }
                    format!("retryable status {}", status.as_u16())
                }
                Err(e) => {
                    let err = attempt_error(&e, proxy, &target, attempts);
                    if !err.is_retryable() || attempts >= max_attempts {
                        warn!("{} {} failed: {}", method, target, err);
                        return Err(err);
                    }
                    describe(&e)
                }
            };

            // Only reachable with a policy and attempts remaining.
            let delay = policy.map(|p| p.delay_for(attempts)).unwrap_or(Duration::ZERO);
            warn!(
                "{} {} through {} failed: {} (attempt {}/{}, retrying in {:?})",
                method,
                target,
                proxy.endpoint(),
                failure,
                attempts,
                max_attempts,
                delay
            );
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
    }
}

/// Send one attempt and buffer the body
async fn send(
    builder: reqwest::RequestBuilder,
) -> std::result::Result<(StatusCode, HeaderMap, Url, Bytes), reqwest::Error> {
    let response = builder.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let url = response.url().clone();
    let body = response.bytes().await?;
    Ok((status, headers, url, body))
}

/// Classify a failed attempt; a request that could not be built is not retried
fn attempt_error(
    err: &reqwest::Error,
    proxy: &Proxy,
    target: &Url,
    attempts: u32,
) -> GhostlineError {
    if err.is_builder() {
        return GhostlineError::InvalidRequest(describe(err));
    }
    GhostlineError::Transport {
        proxy: proxy.endpoint(),
        url: target.to_string(),
        attempts,
        message: describe(err),
    }
}

/// 429 and 5xx except 501 are worth another attempt
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
}

fn describe(err: &reqwest::Error) -> String {
    let mut message = if err.is_timeout() {
        format!("timed out: {}", err)
    } else {
        err.to_string()
    };

    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn parse_target(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| GhostlineError::InvalidRequest(format!("Invalid URL '{}': {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(GhostlineError::InvalidRequest(format!(
                "Unsupported scheme '{}' in '{}'",
                other, url
            )))
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(GhostlineError::InvalidRequest(format!(
            "URL '{}' has no host",
            url
        )));
    }

    Ok(parsed)
}
