use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::query::QueryDefaults;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub loki: LokiConfig,
    pub prometheus: PrometheusConfig,
    #[serde(default)]
    pub query: QueryDefaults,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LokiConfig {
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Flow fields indexed as Loki stream labels
    #[serde(default = "default_loki_labels")]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrometheusConfig {
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Accept any certificate presented by the metrics backend
    #[serde(default)]
    pub skip_tls: bool,
    /// Extra PEM root certificate for the metrics backend
    #[serde(default)]
    pub ca_path: Option<PathBuf>,

    /// Forward the caller's bearer token; disables `token_path` entirely
    #[serde(default)]
    pub forward_user_token: bool,
    /// Static bearer token file, read on every request
    #[serde(default)]
    pub token_path: Option<PathBuf>,

    #[serde(default = "default_bytes_metric")]
    pub bytes_metric: String,
    #[serde(default = "default_packets_metric")]
    pub packets_metric: String,
    /// Labels carried by the flow counters
    #[serde(default = "default_prometheus_labels")]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "/metrics".to_string(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_loki_labels() -> Vec<String> {
    [
        "SrcK8S_Namespace",
        "SrcK8S_OwnerName",
        "DstK8S_Namespace",
        "DstK8S_OwnerName",
        "FlowDirection",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_prometheus_labels() -> Vec<String> {
    [
        "SrcK8S_Namespace",
        "SrcK8S_OwnerName",
        "SrcK8S_OwnerType",
        "DstK8S_Namespace",
        "DstK8S_OwnerName",
        "DstK8S_OwnerType",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_bytes_metric() -> String {
    "netobserv_workload_flows_bytes_total".to_string()
}

fn default_packets_metric() -> String {
    "netobserv_workload_flows_packets_total".to_string()
}

/// Load configuration from a TOML file layered with `FLOW_GATEWAY__*` environment variables
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix("FLOW_GATEWAY").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    for (name, raw) in [("loki", &cfg.loki.url), ("prometheus", &cfg.prometheus.url)] {
        let parsed = url::Url::parse(raw)
            .map_err(|e| anyhow::anyhow!("Invalid {} url '{}': {}", name, raw, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("{} url must use http or https, got '{}'", name, raw);
        }
    }

    if cfg.loki.timeout_seconds == 0 || cfg.prometheus.timeout_seconds == 0 {
        anyhow::bail!("Backend timeouts must be greater than 0");
    }

    if cfg.query.limit == 0 {
        anyhow::bail!("Default query limit must be greater than 0");
    }

    if cfg.query.step_seconds == 0 {
        anyhow::bail!("Query step must be greater than 0");
    }

    if cfg.query.topology_group_by.is_empty() {
        anyhow::bail!("Topology grouping keys cannot be empty");
    }

    if cfg.query.app_label.is_empty() {
        anyhow::bail!("Application label cannot be empty");
    }

    if cfg.prometheus.forward_user_token && cfg.prometheus.token_path.is_some() {
        tracing::warn!("Both forward_user_token and token_path are set; token_path is ignored while forwarding user tokens");
    }

    Ok(())
}

#[cfg(test)]
pub(crate) fn create_test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9001,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        },
        loki: LokiConfig {
            url: "http://localhost:3100".to_string(),
            timeout_seconds: 30,
            labels: default_loki_labels(),
        },
        prometheus: PrometheusConfig {
            url: "http://localhost:9090".to_string(),
            timeout_seconds: 30,
            skip_tls: false,
            ca_path: None,
            forward_user_token: false,
            token_path: None,
            bytes_metric: default_bytes_metric(),
            packets_metric: default_packets_metric(),
            labels: default_prometheus_labels(),
        },
        query: QueryDefaults::default(),
        metrics: MetricsConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_config_accepts_defaults() {
        assert!(validate_config(&create_test_config()).is_ok());
    }

    #[test]
    fn test_validate_config_rejects_bad_url() {
        let mut cfg = create_test_config();
        cfg.loki.url = "not a url".to_string();

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid loki url"));
    }

    #[test]
    fn test_validate_config_rejects_zero_limit() {
        let mut cfg = create_test_config();
        cfg.query.limit = 0;

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("limit"));
    }

    #[test]
    fn test_load_config_applies_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
host = "0.0.0.0"
port = 9001

[loki]
url = "http://loki:3100"

[prometheus]
url = "https://thanos:9091"
forward_user_token = true
"#
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.server.log_level, "info");
        assert_eq!(cfg.loki.timeout_seconds, 30);
        assert_eq!(cfg.loki.labels.len(), 5);
        assert!(cfg.prometheus.forward_user_token);
        assert_eq!(cfg.query.limit, 100);
        assert_eq!(cfg.query.range_seconds, 300);
        assert_eq!(cfg.query.step_seconds, 60);
        assert_eq!(cfg.query.topology_group_by.len(), 14);
        assert!(cfg.metrics.enabled);
    }
}
