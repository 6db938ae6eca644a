use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::{
    config::LokiConfig,
    converters::loki::{loki_error_message, raw_response},
    error::AppError,
    metrics::CallObserver,
    models::NormalizedResponse,
};

use super::flow_query::CompiledQuery;

pub const QUERY_RANGE_PATH: &str = "/loki/api/v1/query_range";

/// Run a compiled query against Loki's `query_range` endpoint
///
/// The request is sent without credentials.
pub async fn query_range(
    client: &Client,
    config: &LokiConfig,
    query: &CompiledQuery,
) -> Result<NormalizedResponse, AppError> {
    let url = format!("{}{}", config.url.trim_end_matches('/'), QUERY_RANGE_PATH);
    let mut observer = CallObserver::start("loki");

    tracing::debug!(url = %url, logql = %query.query, "Querying Loki");

    let response = client
        .get(&url)
        .query(&query.query_pairs())
        .timeout(Duration::from_secs(config.timeout_seconds))
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Loki request failed");
            AppError::BackendUnavailable(e.to_string())
        })?;

    let status = response.status();

    let body = response.bytes().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to read Loki response");
        AppError::BackendUnavailable(e.to_string())
    })?;

    if status != StatusCode::OK {
        let message = loki_error_message(&body, status);
        tracing::warn!(status = status.as_u16(), message = %message, "Loki returned an error");
        return Err(AppError::BackendUnavailable(message));
    }

    observer.set_code(StatusCode::OK.as_u16());
    tracing::trace!(bytes = body.len(), "Loki response received");
    Ok(raw_response(body))
}
