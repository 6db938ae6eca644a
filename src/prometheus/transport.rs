use axum::http::HeaderMap;
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Certificate, Client,
};
use std::{fs, path::Path, time::Duration};

use crate::{auth, config::PrometheusConfig, error::AppError};

/// Where the bearer token of an outbound call comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// The caller's own token
    Forwarded(String),
    /// Content of the configured token file
    TokenFile(String),
    None,
}

/// HTTP client bound to one metrics backend and one set of credentials
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http: Client,
    base_url: String,
}

impl PrometheusClient {
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Pick the credentials of an outbound call
///
/// Forwarding mode is exclusive: a caller without a bearer token is sent
/// unauthenticated and never gets the token file.
pub fn resolve_credentials(
    config: &PrometheusConfig,
    headers: &HeaderMap,
) -> Result<Credentials, AppError> {
    if config.forward_user_token {
        return Ok(match auth::bearer_token(headers) {
            Some(token) => Credentials::Forwarded(token.to_string()),
            None => {
                tracing::debug!("Missing Authorization token in user request");
                Credentials::None
            }
        });
    }

    if let Some(path) = &config.token_path {
        return read_token_file(path).map(Credentials::TokenFile);
    }

    Ok(Credentials::None)
}

fn read_token_file(path: &Path) -> Result<String, AppError> {
    let token = fs::read_to_string(path).map_err(|e| {
        AppError::ConfigError(format!(
            "failed to read authorization token '{}': {}",
            path.display(),
            e
        ))
    })?;
    Ok(token.trim().to_string())
}

/// Build a client for one request
///
/// Nothing is cached: the token file is re-read and TLS settings re-applied
/// on every call, so rotated credentials take effect immediately.
pub fn build_client(
    config: &PrometheusConfig,
    headers: &HeaderMap,
) -> Result<PrometheusClient, AppError> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .danger_accept_invalid_certs(config.skip_tls);

    if let Some(ca_path) = &config.ca_path {
        let pem = fs::read(ca_path).map_err(|e| {
            AppError::ConfigError(format!(
                "failed to read CA bundle '{}': {}",
                ca_path.display(),
                e
            ))
        })?;
        let cert = Certificate::from_pem(&pem).map_err(|e| {
            AppError::ConfigError(format!("invalid CA bundle '{}': {}", ca_path.display(), e))
        })?;
        builder = builder.add_root_certificate(cert);
    }

    let token = match resolve_credentials(config, headers)? {
        Credentials::Forwarded(token) | Credentials::TokenFile(token) => Some(token),
        Credentials::None => None,
    };

    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| AppError::ConfigError("bearer token is not a valid header value".to_string()))?;
        value.set_sensitive(true);

        let mut default_headers = reqwest::header::HeaderMap::new();
        default_headers.insert(AUTHORIZATION, value);
        builder = builder.default_headers(default_headers);
    }

    let http = builder
        .build()
        .map_err(|e| AppError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

    Ok(PrometheusClient {
        http,
        base_url: config.url.clone(),
    })
}
