//! Prometheus HTTP API payloads

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Envelope of every `/api/v1/*` reply
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(rename = "errorType")]
    pub error_type: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// `[<unix seconds>, "<value>"]`
///
/// The timestamp keeps its JSON number form and the value its string form,
/// so samples are re-emitted exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePair(pub serde_json::Number, pub String);

/// One labeled series of a range query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStream {
    pub metric: BTreeMap<String, String>,
    #[serde(default)]
    pub values: Vec<SamplePair>,
}

pub type Matrix = Vec<SampleStream>;

/// One labeled sample of an instant query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub metric: BTreeMap<String, String>,
    pub value: SamplePair,
}

/// `data` of a query reply, tagged by `resultType`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum PromValue {
    Matrix(Matrix),
    Vector(Vec<Sample>),
    Scalar(SamplePair),
    String(SamplePair),
}

impl PromValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Matrix(_) => "matrix",
            Self::Vector(_) => "vector",
            Self::Scalar(_) => "scalar",
            Self::String(_) => "string",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_matrix() {
        let json = r#"{"resultType":"matrix","result":[{"metric":{"job":"flows"},"values":[[1435781430.781,"1"],[1435781445,"2.5"]]}]}"#;
        let value: PromValue = serde_json::from_str(json).unwrap();
        match value {
            PromValue::Matrix(matrix) => {
                assert_eq!(matrix.len(), 1);
                assert_eq!(matrix[0].metric["job"], "flows");
                assert_eq!(matrix[0].values[1].1, "2.5");
                assert_eq!(matrix[0].values[1].0.to_string(), "1435781445");
            }
            other => panic!("unexpected {}", other.kind()),
        }
    }

    #[test]
    fn test_decode_vector() {
        let json = r#"{"resultType":"vector","result":[{"metric":{},"value":[1435781451.781,"1"]}]}"#;
        let value: PromValue = serde_json::from_str(json).unwrap();
        assert_eq!(value.kind(), "vector");
    }

    #[test]
    fn test_decode_error_envelope() {
        let json = r#"{"status":"error","errorType":"bad_data","error":"parse error"}"#;
        let resp: ApiResponse<PromValue> = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, "error");
        assert_eq!(resp.error_type.as_deref(), Some("bad_data"));
        assert!(resp.data.is_none());
        assert!(resp.warnings.is_empty());
    }
}
