use std::collections::BTreeSet;

use crate::{
    error::AppError,
    models::{prometheus::PromValue, QueryResponse},
};

/// Re-emit a range query matrix; any other result shape is a backend contract violation
pub fn matrix_to_response(value: PromValue) -> Result<QueryResponse, AppError> {
    match value {
        PromValue::Matrix(matrix) => Ok(QueryResponse::matrix(matrix)),
        other => {
            let message = format!("QueryMatrix: wrong return type: {}", other.kind());
            tracing::error!("{}", message);
            Err(AppError::InternalError(message))
        }
    }
}

/// Distinct label values; order carries no meaning
pub fn label_values(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
