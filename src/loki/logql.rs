//! Typed LogQL clauses
//!
//! Each clause renders itself through `Display`; composing them fixes the
//! pipeline order: stream selector, line filters, `json` stage, json
//! filters, then unwrap.

use std::fmt;

use crate::query::{LabelMatcher, MetricField, MetricFunction};

/// `|~` line filter over the raw log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFilter(pub String);

impl fmt::Display for LineFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|~`{}`", self.0)
    }
}

/// `|json` parser followed by groups of filters; matchers inside a group are OR-ed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonStage {
    pub filters: Vec<Vec<LabelMatcher>>,
}

impl fmt::Display for JsonStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("|json")?;
        for group in &self.filters {
            f.write_str("|")?;
            for (i, matcher) in group.iter().enumerate() {
                if i > 0 {
                    f.write_str(" or ")?;
                }
                write!(f, "{}", matcher)?;
            }
        }
        Ok(())
    }
}

/// Log stream selector with its filter pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSelector {
    pub matchers: Vec<LabelMatcher>,
    pub line_filters: Vec<LineFilter>,
    /// Omitted entirely when `None`
    pub json: Option<JsonStage>,
}

impl fmt::Display for LogSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, matcher) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", matcher)?;
        }
        f.write_str("}")?;
        for filter in &self.line_filters {
            write!(f, "{}", filter)?;
        }
        if let Some(json) = &self.json {
            write!(f, "{}", json)?;
        }
        Ok(())
    }
}

/// `|unwrap <field>|__error__=""`; drops samples whose field fails to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unwrap(pub MetricField);

impl fmt::Display for Unwrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|unwrap {}|__error__=\"\"", self.0)
    }
}

/// `<fn>(<selector>[<unwrap>][<range>s])`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeAggregation {
    pub function: MetricFunction,
    pub selector: LogSelector,
    pub unwrap: Option<Unwrap>,
    pub range_seconds: u64,
}

impl RangeAggregation {
    /// `rate` counts log lines, every other function unwraps `field`
    pub fn new(
        function: MetricFunction,
        selector: LogSelector,
        field: MetricField,
        range_seconds: u64,
    ) -> Self {
        let unwrap = (function != MetricFunction::Rate).then_some(Unwrap(field));
        Self {
            function,
            selector,
            unwrap,
            range_seconds,
        }
    }
}

impl fmt::Display for RangeAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.function.as_logql(), self.selector)?;
        if let Some(unwrap) = &self.unwrap {
            write!(f, "{}", unwrap)?;
        }
        write!(f, "[{}s])", self.range_seconds)
    }
}

/// `topk(<k>,sum by(<keys>) (<inner>))`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopK {
    pub k: u32,
    pub group_by: Vec<String>,
    pub inner: RangeAggregation,
}

impl fmt::Display for TopK {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "topk({},sum by({}) ({}))",
            self.k,
            self.group_by.join(","),
            self.inner
        )
    }
}
