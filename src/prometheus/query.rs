use std::fmt;

use crate::{
    config::PrometheusConfig,
    error::AppError,
    query::{LabelMatcher, MetricField, MetricFunction, QueryDefaults, QueryParameters},
};

/// Inner rate window used when averaging or maxing a counter
const SUBQUERY_RATE_WINDOW: &str = "1m";

/// A PromQL range query ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromQuery {
    pub promql: String,
    pub start: i64,
    pub end: i64,
    pub step_seconds: u64,
    pub range_seconds: u64,
    pub limit: u32,
}

impl PromQuery {
    /// Outbound `query_range` parameters
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.promql.clone()),
            ("start", self.start.to_string()),
            ("end", self.end.to_string()),
            ("step", format!("{}s", self.step_seconds)),
        ]
    }
}

struct Selector<'a> {
    metric: &'a str,
    matchers: &'a [LabelMatcher],
}

impl fmt::Display for Selector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.metric)?;
        for (i, matcher) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", matcher)?;
        }
        f.write_str("}")
    }
}

/// Compiles topology queries against the pre-aggregated flow counters
///
/// Only labels carried by the counters can be filtered on. The reporter
/// parameter has no meaning here and is ignored.
pub struct TopologyMetricsQuery<'a> {
    defaults: &'a QueryDefaults,
    config: &'a PrometheusConfig,
}

impl<'a> TopologyMetricsQuery<'a> {
    pub fn new(defaults: &'a QueryDefaults, config: &'a PrometheusConfig) -> Self {
        Self { defaults, config }
    }

    fn metric(&self, field: MetricField) -> &str {
        match field {
            MetricField::Bytes => &self.config.bytes_metric,
            MetricField::Packets => &self.config.packets_metric,
        }
    }

    fn matchers(&self, params: &QueryParameters) -> Result<Vec<LabelMatcher>, AppError> {
        params
            .filters()
            .iter()
            .map(|filter| {
                if self.config.labels.iter().any(|l| l == filter.key()) {
                    Ok(filter.label_matcher())
                } else {
                    Err(AppError::InvalidParameter(format!(
                        "filter on {} is not supported by the metrics backend",
                        filter.key()
                    )))
                }
            })
            .collect()
    }

    pub fn expression(&self, params: &QueryParameters) -> Result<String, AppError> {
        let matchers = self.matchers(params)?;
        let selector = Selector {
            metric: self.metric(params.field()),
            matchers: &matchers,
        };
        let range = params.resolve_range(self.defaults);

        let inner = match params.function() {
            MetricFunction::Rate => format!("rate({}[{}s])", selector, range),
            MetricFunction::Sum => format!("increase({}[{}s])", selector, range),
            function => format!(
                "{}(rate({}[{}])[{}s:])",
                function.as_logql(),
                selector,
                SUBQUERY_RATE_WINDOW,
                range
            ),
        };

        Ok(format!(
            "topk({},sum by({}) ({}))",
            params.resolve_limit(self.defaults),
            self.config.labels.join(","),
            inner
        ))
    }

    /// Compile the query; missing bounds end at `now` and span the range
    pub fn build(&self, params: &QueryParameters, now: i64) -> Result<PromQuery, AppError> {
        let range_seconds = params.resolve_range(self.defaults);
        let end = params.end().unwrap_or(now);
        let start = match params.start() {
            Some(start) => start,
            None => i64::try_from(range_seconds)
                .ok()
                .and_then(|range| end.checked_sub(range))
                .ok_or_else(|| {
                    AppError::InvalidParameter(format!(
                        "can't derive start param from end {} and range {}s",
                        end, range_seconds
                    ))
                })?,
        };

        let query = PromQuery {
            promql: self.expression(params)?,
            start,
            end,
            step_seconds: self.defaults.step_seconds,
            range_seconds,
            limit: params.resolve_limit(self.defaults),
        };
        tracing::debug!(
            promql = %query.promql,
            start,
            end,
            range_seconds = query.range_seconds,
            limit = query.limit,
            "Compiled topology metrics query"
        );
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::create_test_config;

    const LABELS: &str = "SrcK8S_Namespace,SrcK8S_OwnerName,SrcK8S_OwnerType,DstK8S_Namespace,DstK8S_OwnerName,DstK8S_OwnerType";

    fn compile(pairs: &[(&str, &str)]) -> Result<PromQuery, AppError> {
        let config = create_test_config();
        let params = QueryParameters::from_pairs(pairs.iter().copied())?;
        TopologyMetricsQuery::new(&config.query, &config.prometheus).build(&params, 10_000)
    }

    #[test]
    fn test_default_query() {
        let query = compile(&[]).unwrap();
        assert_eq!(
            query.promql,
            format!(
                "topk(100,sum by({}) (increase(netobserv_workload_flows_bytes_total{{}}[300s])))",
                LABELS
            )
        );
        assert_eq!(query.end, 10_000);
        assert_eq!(query.start, 9_700);
        assert_eq!(query.step_seconds, 60);
    }

    #[test]
    fn test_functions() {
        let query = compile(&[("function", "rate"), ("type", "packets")]).unwrap();
        assert!(query
            .promql
            .contains("(rate(netobserv_workload_flows_packets_total{}[300s]))"));

        let query = compile(&[("function", "avg"), ("start", "1000"), ("end", "1600")]).unwrap();
        assert!(query
            .promql
            .contains("(avg_over_time(rate(netobserv_workload_flows_bytes_total{}[1m])[600s:]))"));
        assert_eq!((query.start, query.end), (1000, 1600));

        let query = compile(&[("function", "max")]).unwrap();
        assert!(query.promql.contains("max_over_time(rate("));
    }

    #[test]
    fn test_label_filters() {
        let query = compile(&[
            ("SrcK8S_Namespace", "\"default\""),
            ("DstK8S_OwnerName", "api"),
            ("limit", "5"),
            ("reporter", "source"),
        ])
        .unwrap();
        assert!(query.promql.starts_with("topk(5,"));
        assert_eq!(query.limit, 5);
        assert_eq!(query.range_seconds, 300);
        assert!(query.promql.contains(
            r#"netobserv_workload_flows_bytes_total{SrcK8S_Namespace=~"default",DstK8S_OwnerName=~"(?i).*api.*"}"#
        ));
        assert!(!query.promql.contains("FlowDirection"));
    }

    #[test]
    fn test_unsupported_filter_rejected() {
        let err = compile(&[("SrcAddr", "10.0.0.1")]).unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
        assert!(err.to_string().contains("SrcAddr"));
    }

    #[test]
    fn test_start_underflow_rejected() {
        let err = compile(&[("end", "-9223372036854775808")]).unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));

        let query = compile(&[("end", "-9223372036854775508")]).unwrap();
        assert_eq!(query.start, i64::MIN);
        assert_eq!(query.range_seconds, 300);
    }

    #[test]
    fn test_range_beyond_i64_rejected_without_start() {
        let config = create_test_config();
        let defaults = QueryDefaults {
            range_seconds: u64::MAX,
            ..Default::default()
        };
        let params = QueryParameters::from_pairs([("end", "1300")]).unwrap();
        let err = TopologyMetricsQuery::new(&defaults, &config.prometheus)
            .build(&params, 0)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[test]
    fn test_query_pairs() {
        let query = compile(&[("start", "1000"), ("end", "1300")]).unwrap();
        let pairs = query.query_pairs();
        assert!(pairs.contains(&("start", "1000".to_string())));
        assert!(pairs.contains(&("end", "1300".to_string())));
        assert!(pairs.contains(&("step", "60s".to_string())));
    }
}
