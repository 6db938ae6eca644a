//! Uniform response returned to the front end

use axum::{
    body::Bytes,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::prometheus::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Matrix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponseData {
    #[serde(rename = "resultType")]
    pub result_type: ResultType,
    pub result: Matrix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: QueryResponseData,
}

impl QueryResponse {
    pub fn matrix(result: Matrix) -> Self {
        Self {
            data: QueryResponseData {
                result_type: ResultType::Matrix,
                result,
            },
        }
    }
}

/// Either converted series or an untouched backend payload, never both
#[derive(Debug, Clone)]
pub enum NormalizedResponse {
    Matrix(QueryResponse),
    Raw(Bytes),
}

impl IntoResponse for NormalizedResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Matrix(resp) => Json(resp).into_response(),
            Self::Raw(payload) => (
                StatusCode::OK,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )],
                payload,
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::prometheus::{SamplePair, SampleStream};
    use std::collections::BTreeMap;

    #[test]
    fn test_matrix_serialization() {
        let resp = QueryResponse::matrix(vec![SampleStream {
            metric: BTreeMap::from([("SrcK8S_Namespace".to_string(), "default".to_string())]),
            values: vec![SamplePair(serde_json::Number::from(1000), "42".to_string())],
        }]);

        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"data":{"resultType":"matrix","result":[{"metric":{"SrcK8S_Namespace":"default"},"values":[[1000,"42"]]}]}}"#
        );
    }

    #[tokio::test]
    async fn test_raw_response_is_untouched() {
        let payload = Bytes::from_static(br#"{"status":"success","data":{"resultType":"streams","result":[]}}"#);
        let response = NormalizedResponse::Raw(payload.clone()).into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, payload);
    }
}
