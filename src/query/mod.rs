//! Caller-facing query parameters
//!
//! Parses the plain string parameters sent by the front end into an
//! immutable [`QueryParameters`], shared by the Loki and Prometheus
//! compilers. Numeric parameters are validated here so that a malformed
//! request never reaches a backend.

pub mod filters;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub use filters::{FieldCatalog, FieldKind, FilterMatch, LabelMatcher};

const START_PARAM: &str = "start";
const END_PARAM: &str = "end";
const LIMIT_PARAM: &str = "limit";
const FUNCTION_PARAM: &str = "function";
const TYPE_PARAM: &str = "type";
const REPORTER_PARAM: &str = "reporter";

/// Fixed compile-time knobs, overridable from the `[query]` config section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryDefaults {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_range_seconds")]
    pub range_seconds: u64,
    #[serde(default = "default_step_seconds")]
    pub step_seconds: u64,
    /// Value of the `app` stream label every flow query selects on
    #[serde(default = "default_app_label")]
    pub app_label: String,
    #[serde(default = "default_topology_group_by")]
    pub topology_group_by: Vec<String>,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            range_seconds: default_range_seconds(),
            step_seconds: default_step_seconds(),
            app_label: default_app_label(),
            topology_group_by: default_topology_group_by(),
        }
    }
}

fn default_limit() -> u32 {
    100
}

fn default_range_seconds() -> u64 {
    300
}

fn default_step_seconds() -> u64 {
    60
}

fn default_app_label() -> String {
    "netobserv-flowcollector".to_string()
}

fn default_topology_group_by() -> Vec<String> {
    [
        "SrcK8S_Name",
        "SrcK8S_Type",
        "SrcK8S_OwnerName",
        "SrcK8S_OwnerType",
        "SrcK8S_Namespace",
        "SrcAddr",
        "SrcK8S_HostIP",
        "DstK8S_Name",
        "DstK8S_Type",
        "DstK8S_OwnerName",
        "DstK8S_OwnerType",
        "DstK8S_Namespace",
        "DstAddr",
        "DstK8S_HostIP",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Per-series aggregation applied over the query range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricFunction {
    Avg,
    Max,
    Rate,
    #[default]
    Sum,
}

impl MetricFunction {
    /// Unknown values fall back to `Sum` instead of failing the request
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "avg" => Self::Avg,
            "max" => Self::Max,
            "rate" => Self::Rate,
            _ => Self::Sum,
        }
    }

    /// LogQL range aggregation keyword
    pub fn as_logql(&self) -> &'static str {
        match self {
            Self::Avg => "avg_over_time",
            Self::Max => "max_over_time",
            Self::Rate => "rate",
            Self::Sum => "sum_over_time",
        }
    }
}

/// Flow field aggregated by metric queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricField {
    #[default]
    Bytes,
    Packets,
}

impl MetricField {
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "packets" => Self::Packets,
            _ => Self::Bytes,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bytes => "Bytes",
            Self::Packets => "Packets",
        }
    }
}

impl std::fmt::Display for MetricField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the connection reported the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reporter {
    Source,
    Destination,
    #[default]
    Both,
}

impl Reporter {
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "source" => Self::Source,
            "destination" => Self::Destination,
            _ => Self::Both,
        }
    }

    /// `FlowDirection` value selecting this reporter, if any
    pub fn flow_direction(&self) -> Option<&'static str> {
        match self {
            Self::Source => Some("1"),
            Self::Destination => Some("0"),
            Self::Both => None,
        }
    }
}

/// Validated filter and aggregation intent for one request
#[derive(Debug, Clone, Default)]
pub struct QueryParameters {
    start: Option<i64>,
    end: Option<i64>,
    limit: Option<u32>,
    reporter: Reporter,
    function: MetricFunction,
    field: MetricField,
    filters: Vec<FilterMatch>,
}

impl QueryParameters {
    /// Parse a raw URL query string (`a=b&c=d`)
    pub fn from_query_string(raw: Option<&str>) -> Result<Self, AppError> {
        let pairs = url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()));
        Self::from_pairs(pairs)
    }

    /// Build parameters from decoded key/value pairs
    ///
    /// Recognized keys are `start`, `end`, `limit`, `function`, `type` and
    /// `reporter`; every other key is a filter. Empty values count as absent.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if value.is_empty() {
                continue;
            }
            match key {
                START_PARAM => params.start = Some(parse_epoch(START_PARAM, value)?),
                END_PARAM => params.end = Some(parse_epoch(END_PARAM, value)?),
                LIMIT_PARAM => {
                    let limit = value.parse::<u32>().map_err(|_| {
                        AppError::InvalidParameter(format!("can't parse limit param: {}", value))
                    })?;
                    params.limit = Some(limit);
                }
                FUNCTION_PARAM => params.function = MetricFunction::parse_lenient(value),
                TYPE_PARAM => params.field = MetricField::parse_lenient(value),
                REPORTER_PARAM => params.reporter = Reporter::parse_lenient(value),
                _ => params.filters.push(FilterMatch::parse(key, value)?),
            }
        }

        Ok(params)
    }

    pub fn start(&self) -> Option<i64> {
        self.start
    }

    pub fn end(&self) -> Option<i64> {
        self.end
    }

    pub fn reporter(&self) -> Reporter {
        self.reporter
    }

    pub fn function(&self) -> MetricFunction {
        self.function
    }

    pub fn field(&self) -> MetricField {
        self.field
    }

    pub fn filters(&self) -> &[FilterMatch] {
        &self.filters
    }

    pub fn resolve_limit(&self, defaults: &QueryDefaults) -> u32 {
        self.limit.unwrap_or(defaults.limit)
    }

    /// `end - start` when both bounds are present and the span is positive
    pub fn resolve_range(&self, defaults: &QueryDefaults) -> u64 {
        match (self.start, self.end) {
            (Some(start), Some(end)) if end > start => end.abs_diff(start),
            _ => defaults.range_seconds,
        }
    }
}

fn parse_epoch(name: &str, value: &str) -> Result<i64, AppError> {
    value
        .parse::<i64>()
        .map_err(|_| AppError::InvalidParameter(format!("can't parse {} param: {}", name, value)))
}
