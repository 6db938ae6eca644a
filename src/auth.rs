use axum::http::{header::AUTHORIZATION, HeaderMap};

const BEARER_PREFIX: &str = "Bearer ";

/// Bearer token carried by an inbound request, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth_header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    extract_bearer_token(auth_header)
}

/// Extract Bearer token from an Authorization header value
fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
}
