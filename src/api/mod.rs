//! Metrics endpoint
//!
//! Serves the request counters for scraping, alongside a health check.

pub mod handlers;
pub mod routes;
pub mod server;

pub use server::{MetricsServer, MetricsServerConfig};
