use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::{Duration, Instant};

/// Initialize Prometheus metrics exporter
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "flow_gateway_requests_total",
        "Total number of front-end requests"
    );
    describe_counter!(
        "flow_gateway_backend_calls_total",
        "Total number of calls to Loki and Prometheus"
    );
    describe_histogram!(
        "flow_gateway_backend_call_duration_seconds",
        "Backend call duration in seconds"
    );
    describe_gauge!(
        "flow_gateway_info",
        "Gateway version and build information"
    );

    gauge!("flow_gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record a front-end request
pub fn record_request(endpoint: &str, code: u16) {
    counter!(
        "flow_gateway_requests_total",
        "endpoint" => endpoint.to_string(),
        "code" => code.to_string(),
    )
    .increment(1);
}

/// Record one backend call
pub fn record_backend_call(backend: &str, code: u16, duration: Duration) {
    counter!(
        "flow_gateway_backend_calls_total",
        "backend" => backend.to_string(),
        "code" => code.to_string(),
    )
    .increment(1);
    histogram!(
        "flow_gateway_backend_call_duration_seconds",
        "backend" => backend.to_string(),
        "code" => code.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Records a backend call when dropped
///
/// The code starts at 503 so that a call abandoned mid-flight (caller gone,
/// timeout) is still counted, with the status the caller would have seen.
pub struct CallObserver {
    backend: &'static str,
    started: Instant,
    code: u16,
}

impl CallObserver {
    pub fn start(backend: &'static str) -> Self {
        Self {
            backend,
            started: Instant::now(),
            code: 503,
        }
    }

    pub fn set_code(&mut self, code: u16) {
        self.code = code;
    }
}

impl Drop for CallObserver {
    fn drop(&mut self) {
        record_backend_call(self.backend, self.code, self.started.elapsed());
    }
}
