use crate::query::QueryParameters;

use super::flow_query::{CompiledQuery, FlowQueryBuilder};
use super::logql::{RangeAggregation, TopK};

/// Compiles topology metric queries
///
/// The rendered query has the shape
///
/// ```text
/// topk(<k>,sum by(<grouping keys>) (<fn>(
///     {<labels>}|<line filters>|json|<json filters>|unwrap <field>|__error__=""[<range>s]
/// )))
/// ```
///
/// and is always sent with a fixed step so the front end gets a stable cadence.
pub struct TopologyQueryBuilder<'a> {
    flows: FlowQueryBuilder<'a>,
}

impl<'a> TopologyQueryBuilder<'a> {
    pub fn new(flows: FlowQueryBuilder<'a>) -> Self {
        Self { flows }
    }

    pub fn expression(&self, params: &QueryParameters) -> TopK {
        let defaults = self.flows.defaults();
        let selector = self.flows.selector(params, true);
        TopK {
            k: params.resolve_limit(defaults),
            group_by: defaults.topology_group_by.clone(),
            inner: RangeAggregation::new(
                params.function(),
                selector,
                params.field(),
                params.resolve_range(defaults),
            ),
        }
    }

    pub fn build(&self, params: &QueryParameters) -> CompiledQuery {
        let defaults = self.flows.defaults();
        let expression = self.expression(params);
        let compiled = CompiledQuery {
            query: expression.to_string(),
            range_seconds: expression.inner.range_seconds,
            limit: expression.k,
            start: params.start(),
            end: params.end(),
            step_seconds: Some(defaults.step_seconds),
        };
        tracing::debug!(
            logql = %compiled.query,
            range_seconds = compiled.range_seconds,
            limit = compiled.limit,
            "Compiled topology query"
        );
        compiled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FieldCatalog, QueryDefaults};

    const GROUP_BY: &str = "SrcK8S_Name,SrcK8S_Type,SrcK8S_OwnerName,SrcK8S_OwnerType,SrcK8S_Namespace,SrcAddr,SrcK8S_HostIP,DstK8S_Name,DstK8S_Type,DstK8S_OwnerName,DstK8S_OwnerType,DstK8S_Namespace,DstAddr,DstK8S_HostIP";

    fn compile(pairs: &[(&str, &str)]) -> CompiledQuery {
        let defaults = QueryDefaults::default();
        let catalog = FieldCatalog::new(["SrcK8S_Namespace", "FlowDirection"]);
        let params = QueryParameters::from_pairs(pairs.iter().copied()).unwrap();
        TopologyQueryBuilder::new(FlowQueryBuilder::new(&defaults, &catalog)).build(&params)
    }

    #[test]
    fn test_default_topology_query() {
        let compiled = compile(&[]);
        assert_eq!(
            compiled.query,
            format!(
                r#"topk(100,sum by({}) (sum_over_time({{app="netobserv-flowcollector"}}|json|unwrap Bytes|__error__=""[300s])))"#,
                GROUP_BY
            )
        );
        assert_eq!(compiled.range_seconds, 300);
        assert_eq!(compiled.limit, 100);
        assert_eq!(compiled.step_seconds, Some(60));
    }

    #[test]
    fn test_full_scenario() {
        let compiled = compile(&[
            ("start", "1000"),
            ("end", "1300"),
            ("limit", "50"),
            ("function", "avg"),
            ("type", "packets"),
        ]);

        assert!(compiled.query.starts_with("topk(50,"));
        assert!(compiled.query.contains("avg_over_time("));
        assert!(compiled.query.contains("|unwrap Packets|"));
        assert!(compiled.query.contains("[300s]"));
        assert_eq!(compiled.range_seconds, 300);
        assert_eq!(compiled.limit, 50);

        let pairs = compiled.query_pairs();
        assert!(pairs.contains(&("step", "60s".to_string())));
        assert!(pairs.contains(&("limit", "50".to_string())));
    }

    #[test]
    fn test_rate_topology_query() {
        let compiled = compile(&[("function", "rate"), ("type", "packets")]);
        assert!(!compiled.query.contains("unwrap"));
        assert!(compiled
            .query
            .contains(r#"(rate({app="netobserv-flowcollector"}|json[300s])))"#));
    }

    #[test]
    fn test_filters_inside_aggregation() {
        let compiled = compile(&[
            ("SrcK8S_Namespace", "default"),
            ("DstAddr", "10.0.0.1"),
            ("reporter", "source"),
        ]);
        assert!(compiled.query.contains(
            r#"sum_over_time({app="netobserv-flowcollector",FlowDirection="1",SrcK8S_Namespace=~"(?i).*default.*"}|json|DstAddr=ip("10.0.0.1")|unwrap Bytes|__error__=""[300s])"#
        ));
    }

    #[test]
    fn test_grouping_keys_are_injected() {
        let defaults = QueryDefaults {
            topology_group_by: vec!["SrcAddr".to_string(), "DstAddr".to_string()],
            step_seconds: 30,
            ..Default::default()
        };
        let catalog = FieldCatalog::default();
        let builder = TopologyQueryBuilder::new(FlowQueryBuilder::new(&defaults, &catalog));
        let compiled = builder.build(&QueryParameters::default());

        assert!(compiled.query.starts_with("topk(100,sum by(SrcAddr,DstAddr) ("));
        assert_eq!(compiled.step_seconds, Some(30));
    }
}
