use axum::{
    extract::{Path, RawQuery, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::NormalizedResponse,
    prometheus::{self, TopologyMetricsQuery},
    query::QueryParameters,
};

use super::{respond, AppState};

pub const TOPOLOGY_ENDPOINT: &str = "/api/prometheus/topology";
pub const LABEL_VALUES_ENDPOINT: &str = "/api/prometheus/label/values";

const MATCH_PARAM: &str = "match[]";

/// Handle /api/prometheus/topology: top-k series from the flow counters
pub async fn get_topology_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Response {
    respond(
        TOPOLOGY_ENDPOINT,
        fetch_topology_metrics(&state, &headers, raw.as_deref()).await,
    )
}

/// Handle /api/prometheus/label/{name}/values
pub async fn get_label_values(
    State(state): State<AppState>,
    Path(label): Path<String>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Response {
    respond(
        LABEL_VALUES_ENDPOINT,
        fetch_label_values(&state, &label, &headers, raw.as_deref())
            .await
            .map(Json),
    )
}

async fn fetch_topology_metrics(
    state: &AppState,
    headers: &HeaderMap,
    raw: Option<&str>,
) -> Result<NormalizedResponse, AppError> {
    let params = QueryParameters::from_query_string(raw)?;
    let query = TopologyMetricsQuery::new(&state.config.query, &state.config.prometheus)
        .build(&params, Utc::now().timestamp())?;
    let client = prometheus::build_client(&state.config.prometheus, headers)?;

    let response = prometheus::query_matrix(&client, &query).await?;
    tracing::info!(series = response.data.result.len(), "Fetched topology metrics");
    Ok(NormalizedResponse::Matrix(response))
}

async fn fetch_label_values(
    state: &AppState,
    label: &str,
    headers: &HeaderMap,
    raw: Option<&str>,
) -> Result<Vec<String>, AppError> {
    if !is_valid_label_name(label) {
        return Err(AppError::InvalidParameter(format!(
            "invalid label name: {}",
            label
        )));
    }

    let matches = match_selectors(raw);
    let client = prometheus::build_client(&state.config.prometheus, headers)?;
    prometheus::label_values(&client, label, &matches).await
}

/// Every `match[]` selector of the query string, in order
fn match_selectors(raw: Option<&str>) -> Vec<String> {
    url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
        .filter(|(key, value)| key == MATCH_PARAM && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .collect()
}

/// Prometheus label names: `[a-zA-Z_][a-zA-Z0-9_]*`
fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::create_test_config;
    use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
    use httpmock::prelude::*;

    const MATRIX: &str = r#"{"status":"success","data":{"resultType":"matrix","result":[{"metric":{"SrcK8S_Namespace":"default"},"values":[[1000,"42"],[1060.5,"43"]]}]}}"#;

    fn state_for(server: &MockServer, forward_user_token: bool) -> AppState {
        let mut config = create_test_config();
        config.prometheus.url = server.base_url();
        config.prometheus.forward_user_token = forward_user_token;
        AppState::new(config).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_label_name_validation() {
        assert!(is_valid_label_name("SrcK8S_Namespace"));
        assert!(is_valid_label_name("_hidden"));
        assert!(!is_valid_label_name("1abc"));
        assert!(!is_valid_label_name("a-b"));
        assert!(!is_valid_label_name(""));
    }

    #[test]
    fn test_match_selectors() {
        let raw = "match%5B%5D=up&match%5B%5D=%7Bjob%3D%22x%22%7D&other=1&match[]=";
        assert_eq!(
            match_selectors(Some(raw)),
            vec!["up".to_string(), r#"{job="x"}"#.to_string()]
        );
        assert!(match_selectors(None).is_empty());
    }

    #[tokio::test]
    async fn test_topology_metrics_matrix() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/query_range")
                    .query_param("start", "1000")
                    .query_param("end", "1300")
                    .query_param("step", "60s");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(MATRIX);
            })
            .await;

        let response = get_topology_metrics(
            State(state_for(&server, false)),
            HeaderMap::new(),
            RawQuery(Some("start=1000&end=1300".to_string())),
        )
        .await;

        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["resultType"], "matrix");
        assert_eq!(json["data"]["result"][0]["metric"]["SrcK8S_Namespace"], "default");
        assert_eq!(json["data"]["result"][0]["values"][1][0], 1060.5);
        assert_eq!(json["data"]["result"][0]["values"][1][1], "43");
    }

    #[tokio::test]
    async fn test_forwarded_token_and_unauthorized() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/query_range")
                    .header("authorization", "Bearer user-token");
                then.status(401).body("Unauthorized");
            })
            .await;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer user-token"));

        let response =
            get_topology_metrics(State(state_for(&server, true)), headers, RawQuery(None)).await;

        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        let message = json["Message"].as_str().unwrap();
        assert!(message.starts_with("error from Prometheus query: "));
        assert!(message.contains("401"));
    }

    #[tokio::test]
    async fn test_forbidden_and_server_errors() {
        for (status, expected) in [
            (403, StatusCode::FORBIDDEN),
            (500, StatusCode::SERVICE_UNAVAILABLE),
        ] {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(GET).path("/api/v1/query_range");
                    then.status(status).body("nope");
                })
                .await;

            let response =
                get_topology_metrics(State(state_for(&server, false)), HeaderMap::new(), RawQuery(None))
                    .await;
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_bad_data_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/query_range");
                then.status(400)
                    .header("content-type", "application/json")
                    .body(r#"{"status":"error","errorType":"bad_data","error":"parse error at char 5"}"#);
            })
            .await;

        let response =
            get_topology_metrics(State(state_for(&server, false)), HeaderMap::new(), RawQuery(None))
                .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(
            json["Message"],
            "error from Prometheus query: bad_data: parse error at char 5"
        );
    }

    #[tokio::test]
    async fn test_non_matrix_result_is_internal_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/query_range");
                then.status(200).body(
                    r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#,
                );
            })
            .await;

        let response =
            get_topology_metrics(State(state_for(&server, false)), HeaderMap::new(), RawQuery(None))
                .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/query_range");
                then.status(200)
                    .delay(std::time::Duration::from_millis(2500))
                    .body(MATRIX);
            })
            .await;

        let mut config = create_test_config();
        config.prometheus.url = server.base_url();
        config.prometheus.timeout_seconds = 1;
        let state = AppState::new(config).unwrap();

        let err = fetch_topology_metrics(&state, &HeaderMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BackendUnavailable(_)));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().starts_with("error from Prometheus query: timeout: "));
    }

    #[tokio::test]
    async fn test_label_values() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/label/SrcK8S_Namespace/values")
                    .query_param("match[]", "netobserv_workload_flows_bytes_total")
                    .query_param_exists("start")
                    .query_param_exists("end");
                then.status(200).body(
                    r#"{"status":"success","data":["default","openshift","default"],"warnings":["partial"]}"#,
                );
            })
            .await;

        let response = get_label_values(
            State(state_for(&server, false)),
            Path("SrcK8S_Namespace".to_string()),
            HeaderMap::new(),
            RawQuery(Some("match[]=netobserv_workload_flows_bytes_total".to_string())),
        )
        .await;

        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!(["default", "openshift"])
        );
    }

    #[tokio::test]
    async fn test_label_values_failure_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/label/SrcK8S_Namespace/values");
                then.status(403).body("forbidden");
            })
            .await;

        let response = get_label_values(
            State(state_for(&server, false)),
            Path("SrcK8S_Namespace".to_string()),
            HeaderMap::new(),
            RawQuery(None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_invalid_label_name() {
        let server = MockServer::start_async().await;
        let response = get_label_values(
            State(state_for(&server, false)),
            Path("1bad".to_string()),
            HeaderMap::new(),
            RawQuery(None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
