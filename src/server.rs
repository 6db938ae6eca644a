use anyhow::Result;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::Config,
    handlers::{self, AppState},
    metrics,
    signals::shutdown_signal,
};

/// Start the gateway server
///
/// Installs the metrics recorder, builds the router, then serves until
/// SIGTERM/SIGINT, draining in-flight requests before returning.
pub async fn start_server(config: Config) -> Result<()> {
    let metrics_handle = if config.metrics.enabled {
        info!("Initializing Prometheus metrics...");
        Some(Arc::new(metrics::init_metrics()?))
    } else {
        None
    };

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!(
        loki = %config.loki.url,
        prometheus = %config.prometheus.url,
        forward_user_token = config.prometheus.forward_user_token,
        "Starting flow query gateway on {}",
        addr
    );

    let metrics_endpoint = config.metrics.endpoint.clone();
    let state = AppState::new(config)?;
    let app = create_router(state, metrics_handle.map(|h| (metrics_endpoint, h)));

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: AppState, metrics: Option<(String, Arc<PrometheusHandle>)>) -> Router {
    let api_routes = Router::new()
        .route(
            handlers::loki::FLOWS_ENDPOINT,
            get(handlers::loki::get_flows),
        )
        .route(
            handlers::loki::TOPOLOGY_ENDPOINT,
            get(handlers::loki::get_topology),
        )
        .route(
            handlers::prometheus::TOPOLOGY_ENDPOINT,
            get(handlers::prometheus::get_topology_metrics),
        )
        .route(
            "/api/prometheus/label/:name/values",
            get(handlers::prometheus::get_label_values),
        )
        .with_state(state);

    let mut router = Router::new().route("/health", get(handlers::health::health_check));

    if let Some((endpoint, handle)) = metrics {
        router = router.merge(
            Router::new()
                .route(&endpoint, get(handlers::metrics_handler::metrics))
                .with_state(handle),
        );
    }

    router.merge(api_routes).layer(TraceLayer::new_for_http())
}
