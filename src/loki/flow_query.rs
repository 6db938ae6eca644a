use crate::query::{FieldCatalog, FieldKind, LabelMatcher, QueryDefaults, QueryParameters};

use super::logql::{JsonStage, LineFilter, LogSelector};

const APP_LABEL: &str = "app";
const FLOW_DIRECTION_LABEL: &str = "FlowDirection";

/// A backend query ready to send, built once per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub query: String,
    pub range_seconds: u64,
    pub limit: u32,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub step_seconds: Option<u64>,
}

impl CompiledQuery {
    /// Outbound `query_range` parameters
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("query", self.query.clone())];
        if let Some(start) = self.start {
            pairs.push(("start", start.to_string()));
        }
        if let Some(end) = self.end {
            pairs.push(("end", end.to_string()));
        }
        pairs.push(("limit", self.limit.to_string()));
        if let Some(step) = self.step_seconds {
            pairs.push(("step", format!("{}s", step)));
        }
        pairs
    }
}

/// Compiles flow log queries: stream selector plus filters
pub struct FlowQueryBuilder<'a> {
    defaults: &'a QueryDefaults,
    catalog: &'a FieldCatalog,
}

impl<'a> FlowQueryBuilder<'a> {
    pub fn new(defaults: &'a QueryDefaults, catalog: &'a FieldCatalog) -> Self {
        Self { defaults, catalog }
    }

    pub fn defaults(&self) -> &QueryDefaults {
        self.defaults
    }

    /// Route every filter to the pipeline stage able to evaluate it
    ///
    /// `force_json` keeps the `json` stage even without json filters, which
    /// metric queries need to unwrap fields.
    pub fn selector(&self, params: &QueryParameters, force_json: bool) -> LogSelector {
        let mut matchers = vec![LabelMatcher::equal(APP_LABEL, &self.defaults.app_label)];
        if let Some(direction) = params.reporter().flow_direction() {
            matchers.push(LabelMatcher::equal(FLOW_DIRECTION_LABEL, direction));
        }

        let mut line_filters = Vec::new();
        let mut json_filters = Vec::new();
        for filter in params.filters() {
            match self.catalog.classify(filter.key()) {
                FieldKind::Label => matchers.push(filter.label_matcher()),
                FieldKind::Ip => json_filters.push(filter.ip_matchers()),
                kind => line_filters.push(LineFilter(filter.line_regex(kind))),
            }
        }

        let json = (force_json || !json_filters.is_empty()).then_some(JsonStage {
            filters: json_filters,
        });

        LogSelector {
            matchers,
            line_filters,
            json,
        }
    }

    pub fn build(&self, params: &QueryParameters) -> CompiledQuery {
        let selector = self.selector(params, false);
        let compiled = CompiledQuery {
            query: selector.to_string(),
            range_seconds: params.resolve_range(self.defaults),
            limit: params.resolve_limit(self.defaults),
            start: params.start(),
            end: params.end(),
            step_seconds: None,
        };
        tracing::debug!(logql = %compiled.query, limit = compiled.limit, "Compiled flow query");
        compiled
    }
}
