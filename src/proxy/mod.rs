//! Proxied request path
//!
//! This module provides:
//! - The proxy pool with uniform random selection
//! - A transport factory that binds an HTTP client to one proxy
//! - Request execution with linear-backoff retries

pub mod executor;
pub mod pool;
pub mod transport;

pub use executor::{ProxiedResponse, RequestExecutor};
pub use pool::{PoolHandle, ProxyPool, SelectionPolicy};
pub use transport::{ProxyClient, ProxyTransport, TransportConfig};
