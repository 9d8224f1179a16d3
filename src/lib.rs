//! Ghostline - GhostProxies client
//!
//! Sends HTTP requests through proxies from a GhostProxies account.
//!
//! ## Features
//!
//! - Proxy listing fetch from the GhostProxies API
//! - Uniform random proxy selection with optional online-only filtering
//! - Per-proxy HTTP clients with proxy authentication
//! - Linear-backoff retries for transport failures and overloaded upstreams
//! - Prometheus request counters with an optional scrape endpoint

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod proxy;
pub mod services;

pub use config::Config;
pub use error::{GhostlineError, Result};
pub use metrics::RequestMetrics;
pub use models::{Proxy, RequestOutcome, RetryPolicy};
pub use provider::{fetch_pool, ProviderClient, ProxySource};
pub use proxy::{
    PoolHandle, ProxiedResponse, ProxyPool, ProxyTransport, RequestExecutor, SelectionPolicy,
};
