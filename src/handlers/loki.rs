use axum::{
    extract::{RawQuery, State},
    response::Response,
};

use crate::{
    error::AppError,
    loki::{self, FlowQueryBuilder, TopologyQueryBuilder},
    models::NormalizedResponse,
    query::QueryParameters,
};

use super::{respond, AppState};

pub const FLOWS_ENDPOINT: &str = "/api/loki/flows";
pub const TOPOLOGY_ENDPOINT: &str = "/api/loki/topology";

/// Handle /api/loki/flows: raw flow logs matching the filters
pub async fn get_flows(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Response {
    respond(FLOWS_ENDPOINT, fetch_flows(&state, raw.as_deref()).await)
}

/// Handle /api/loki/topology: top-k aggregated flow series
pub async fn get_topology(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Response {
    respond(TOPOLOGY_ENDPOINT, fetch_topology(&state, raw.as_deref()).await)
}

async fn fetch_flows(state: &AppState, raw: Option<&str>) -> Result<NormalizedResponse, AppError> {
    let params = QueryParameters::from_query_string(raw)?;
    let query = FlowQueryBuilder::new(&state.config.query, &state.catalog).build(&params);

    tracing::info!(limit = query.limit, "Fetching flows");
    loki::client::query_range(&state.http_client, &state.config.loki, &query).await
}

async fn fetch_topology(
    state: &AppState,
    raw: Option<&str>,
) -> Result<NormalizedResponse, AppError> {
    let params = QueryParameters::from_query_string(raw)?;
    let query =
        TopologyQueryBuilder::new(FlowQueryBuilder::new(&state.config.query, &state.catalog))
            .build(&params);

    tracing::info!(
        limit = query.limit,
        range_seconds = query.range_seconds,
        "Fetching topology"
    );
    loki::client::query_range(&state.http_client, &state.config.loki, &query).await
}
