use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
///
/// Every variant crosses the HTTP boundary as the same `{"Message": ...}`
/// envelope; the variant only decides the status code.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed caller input, rejected before any backend call
    #[error("{0}")]
    InvalidParameter(String),
    /// Transport failure or generic backend error
    #[error("{0}")]
    BackendUnavailable(String),
    /// Backend rejected the forwarded credentials
    #[error("{0}")]
    BackendUnauthorized(String),
    /// Backend refused access for the forwarded credentials
    #[error("{0}")]
    BackendForbidden(String),
    /// Backend replied with an unexpected result shape
    #[error("{0}")]
    InternalError(String),
    /// Unreadable token file or CA bundle
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            Self::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BackendUnauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BackendForbidden(_) => StatusCode::FORBIDDEN,
            Self::InternalError(_) | Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the error matching a status code already decided by a backend classifier
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::BAD_REQUEST => Self::InvalidParameter(message),
            StatusCode::UNAUTHORIZED => Self::BackendUnauthorized(message),
            StatusCode::FORBIDDEN => Self::BackendForbidden(message),
            StatusCode::INTERNAL_SERVER_ERROR => Self::InternalError(message),
            _ => Self::BackendUnavailable(message),
        }
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::InvalidParameter(_) => "invalid_parameter",
        AppError::BackendUnavailable(_) => "backend_unavailable",
        AppError::BackendUnauthorized(_) => "backend_unauthorized",
        AppError::BackendForbidden(_) => "backend_forbidden",
        AppError::InternalError(_) => "internal_error",
        AppError::ConfigError(_) => "config_error",
    }
}

/// The only error shape returned to callers
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "Message")]
    pub message: String,
}

/// Write an error envelope; a body that cannot be encoded degrades to a bare 500
pub fn error_response(status: StatusCode, message: String) -> Response {
    let (status, body) = match serde_json::to_vec(&ErrorEnvelope { message }) {
        Ok(body) => (status, body),
        Err(err) => {
            tracing::error!(error = %err, "Failed to encode error envelope");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"Message":"internal error"}"#.to_vec(),
            )
        }
    };

    (
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        body,
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(
            error_type = error_type_name(&self),
            status = status.as_u16(),
            "Responding with error"
        );
        error_response(status, self.to_string())
    }
}
