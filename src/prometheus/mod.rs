//! Prometheus-compatible metrics backend: transport, execution and PromQL

pub mod client;
pub mod query;
pub mod transport;

pub use client::{classify, label_values, query_matrix, PromError, PromErrorKind};
pub use query::{PromQuery, TopologyMetricsQuery};
pub use transport::{build_client, PrometheusClient};
