use axum::{body::Bytes, http::StatusCode};
use std::collections::HashMap;

use crate::models::NormalizedResponse;

/// Successful Loki replies already have the shape the front end expects
pub fn raw_response(payload: Bytes) -> NormalizedResponse {
    NormalizedResponse::Raw(payload)
}

/// Diagnostic for a failed Loki call; never empty and always carries the status code
pub fn loki_error_message(body: &[u8], code: StatusCode) -> String {
    let code = code.as_u16();
    let fields: HashMap<String, String> = match serde_json::from_slice(body) {
        Ok(fields) => fields,
        Err(_) => {
            return format!(
                "Unknown error from Loki - cannot unmarshal (code: {})",
                code
            )
        }
    };

    match fields.get("message") {
        Some(message) => format!("Error from Loki (code: {}): {}", code, message),
        None => format!(
            "Unknown error from Loki - no message found (code: {})",
            code
        ),
    }
}
