use axum::http::StatusCode;
use chrono::{Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    converters::prometheus::{label_values as distinct_label_values, matrix_to_response},
    error::AppError,
    metrics::CallObserver,
    models::{
        prometheus::{ApiResponse, PromValue},
        QueryResponse,
    },
};

use super::{query::PromQuery, transport::PrometheusClient};

const QUERY_RANGE_PATH: &str = "/api/v1/query_range";
const LABEL_VALUES_LOOKBACK_HOURS: i64 = 3;

/// Error categories reported by the Prometheus HTTP API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromErrorKind {
    Timeout,
    Canceled,
    Execution,
    BadData,
    Internal,
    Unavailable,
    NotFound,
    BadResponse,
    Server,
    Client,
}

impl PromErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Canceled => "canceled",
            Self::Execution => "execution",
            Self::BadData => "bad_data",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::NotFound => "not_found",
            Self::BadResponse => "bad_response",
            Self::Server => "server_error",
            Self::Client => "client_error",
        }
    }

    /// Map an `errorType` from a JSON error body
    fn from_api(error_type: &str) -> Self {
        match error_type {
            "timeout" => Self::Timeout,
            "canceled" => Self::Canceled,
            "execution" => Self::Execution,
            "bad_data" => Self::BadData,
            "internal" => Self::Internal,
            "unavailable" => Self::Unavailable,
            "not_found" => Self::NotFound,
            _ => Self::BadResponse,
        }
    }
}

impl std::fmt::Display for PromErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct PromError {
    pub kind: PromErrorKind,
    pub message: String,
}

impl PromError {
    fn new(kind: PromErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Status code for a failed metrics call
///
/// Auth failures are only recognizable from the text of a client error.
pub fn classify(err: &PromError) -> StatusCode {
    if err.kind == PromErrorKind::Client {
        if err.message.contains("401") {
            return StatusCode::UNAUTHORIZED;
        }
        if err.message.contains("403") {
            return StatusCode::FORBIDDEN;
        }
    }
    StatusCode::SERVICE_UNAVAILABLE
}

/// Statuses whose body is a regular API envelope rather than an opaque error
fn is_api_error(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// GET an API endpoint and unwrap its envelope
async fn api_get<T: DeserializeOwned>(
    client: &PrometheusClient,
    path: &str,
    params: &[(&str, String)],
) -> Result<(T, Vec<String>), PromError> {
    let response = client
        .http()
        .get(client.endpoint(path))
        .query(params)
        .send()
        .await
        .map_err(|e| {
            let kind = if e.is_timeout() {
                PromErrorKind::Timeout
            } else {
                PromErrorKind::Unavailable
            };
            PromError::new(kind, e.to_string())
        })?;

    let status = response.status();
    if !status.is_success() && !is_api_error(status) {
        let (kind, label) = if status.is_client_error() {
            (PromErrorKind::Client, "client error")
        } else {
            (PromErrorKind::Server, "server error")
        };
        return Err(PromError::new(kind, format!("{}: {}", label, status.as_u16())));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| PromError::new(PromErrorKind::Unavailable, e.to_string()))?;
    let envelope: ApiResponse<T> = serde_json::from_slice(&body)
        .map_err(|e| PromError::new(PromErrorKind::BadResponse, e.to_string()))?;

    if envelope.status == "error" {
        let kind = envelope
            .error_type
            .as_deref()
            .map(PromErrorKind::from_api)
            .unwrap_or(PromErrorKind::BadResponse);
        return Err(PromError::new(kind, envelope.error.unwrap_or_default()));
    }
    if is_api_error(status) {
        return Err(PromError::new(
            PromErrorKind::BadResponse,
            "inconsistent body for response code",
        ));
    }

    let data = envelope
        .data
        .ok_or_else(|| PromError::new(PromErrorKind::BadResponse, "missing data in response"))?;
    Ok((data, envelope.warnings))
}

/// Execute a range query, returning the backend's native result
pub async fn query_range(client: &PrometheusClient, query: &PromQuery) -> Result<PromValue, PromError> {
    let mut observer = CallObserver::start("prometheus");

    tracing::debug!(
        promql = %query.promql,
        start = query.start,
        end = query.end,
        step = query.step_seconds,
        "Executing Prometheus range query"
    );

    match api_get::<PromValue>(client, QUERY_RANGE_PATH, &query.query_pairs()).await {
        Ok((value, warnings)) => {
            observer.set_code(StatusCode::OK.as_u16());
            if !warnings.is_empty() {
                tracing::info!(warnings = ?warnings, "Prometheus range query warnings");
            }
            tracing::trace!(result_type = value.kind(), "Prometheus range query result");
            Ok(value)
        }
        Err(err) => {
            observer.set_code(classify(&err).as_u16());
            Err(err)
        }
    }
}

/// Execute a range query and convert the matrix into the uniform response
pub async fn query_matrix(
    client: &PrometheusClient,
    query: &PromQuery,
) -> Result<QueryResponse, AppError> {
    let value = query_range(client, query).await.map_err(|err| {
        tracing::error!(error = %err, "Error in QueryMatrix");
        AppError::from_status(classify(&err), format!("error from Prometheus query: {}", err))
    })?;

    matrix_to_response(value)
}

/// Distinct values of one label over the last three hours
pub async fn label_values(
    client: &PrometheusClient,
    label: &str,
    matches: &[String],
) -> Result<Vec<String>, AppError> {
    let mut observer = CallObserver::start("prometheus");
    tracing::debug!(label = %label, "GetLabelValues");

    let end = Utc::now();
    let start = end - ChronoDuration::hours(LABEL_VALUES_LOOKBACK_HOURS);
    let mut params: Vec<(&str, String)> = matches.iter().map(|m| ("match[]", m.clone())).collect();
    params.push(("start", start.timestamp().to_string()));
    params.push(("end", end.timestamp().to_string()));

    let path = format!("/api/v1/label/{}/values", label);
    let (values, warnings) = api_get::<Vec<String>>(client, &path, &params)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, label = %label, "Error in GetLabelValues");
            AppError::BackendUnavailable(format!("error from Prometheus query: {}", err))
        })?;

    observer.set_code(StatusCode::OK.as_u16());
    if !warnings.is_empty() {
        tracing::info!(warnings = ?warnings, "GetLabelValues warnings");
    }

    Ok(distinct_label_values(values))
}
