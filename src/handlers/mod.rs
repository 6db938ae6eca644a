//! HTTP handlers
//!
//! Every request is handled in its own scope: parse parameters, compile the
//! backend query, execute it and normalize the reply. Nothing is shared
//! between requests except the read-only state below and the metrics recorder.

pub mod health;
pub mod loki;
pub mod metrics_handler;
pub mod prometheus;

use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::{config::Config, error::AppError, metrics, query::FieldCatalog};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Client for log queries; metrics clients are built per request
    pub http_client: reqwest::Client,
    pub catalog: Arc<FieldCatalog>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.loki.timeout_seconds))
            .build()
            .map_err(|e| AppError::ConfigError(format!("failed to build Loki client: {}", e)))?;
        let catalog = FieldCatalog::new(config.loki.labels.iter().cloned());

        Ok(Self {
            config: Arc::new(config),
            http_client,
            catalog: Arc::new(catalog),
        })
    }
}

/// Render a handler outcome and count it under its endpoint
fn respond<T: IntoResponse>(endpoint: &str, result: Result<T, AppError>) -> Response {
    let response = match result {
        Ok(body) => body.into_response(),
        Err(err) => {
            tracing::warn!(endpoint = %endpoint, error = %err, "Request failed");
            err.into_response()
        }
    };
    metrics::record_request(endpoint, response.status().as_u16());
    response
}
