//! Filter parameters and their classification against known flow fields

use std::collections::HashSet;
use std::fmt;

use crate::error::AppError;

/// Flow fields holding IP addresses, filtered with LogQL's `ip()` matcher
const IP_FIELDS: &[&str] = &["SrcAddr", "DstAddr", "SrcK8S_HostIP", "DstK8S_HostIP"];

/// Flow fields serialized as JSON numbers
const NUMERIC_FIELDS: &[&str] = &["SrcPort", "DstPort", "Proto", "Bytes", "Packets"];

/// How a filter key is matched in a log query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Indexed stream label, matched in the selector braces
    Label,
    /// IP field, matched after the `json` stage
    Ip,
    /// Numeric field, matched with a line filter on the raw JSON
    Numeric,
    /// Any other field, matched with a case-insensitive line filter
    Text,
}

/// Knows which flow fields are indexed as stream labels
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    labels: HashSet<String>,
}

impl FieldCatalog {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_label(&self, key: &str) -> bool {
        self.labels.contains(key)
    }

    pub fn classify(&self, key: &str) -> FieldKind {
        if self.is_label(key) {
            FieldKind::Label
        } else if IP_FIELDS.contains(&key) {
            FieldKind::Ip
        } else if NUMERIC_FIELDS.contains(&key) {
            FieldKind::Numeric
        } else {
            FieldKind::Text
        }
    }
}

/// Label matcher shared by LogQL selectors, LogQL json filters and PromQL selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelMatcher {
    Equal { key: String, value: String },
    Regex { key: String, value: String },
    Ip { key: String, value: String },
}

impl LabelMatcher {
    pub fn equal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equal {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn regex(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Regex {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn ip(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Ip {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal { key, value } => write!(f, "{}=\"{}\"", key, value),
            Self::Regex { key, value } => write!(f, "{}=~\"{}\"", key, value),
            Self::Ip { key, value } => write!(f, "{}=ip(\"{}\")", key, value),
        }
    }
}

/// One value of a filter; a double-quoted value asks for an exact match
#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterValue {
    text: String,
    exact: bool,
}

impl FilterValue {
    fn parse(raw: &str) -> Option<Self> {
        if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            let inner = &raw[1..raw.len() - 1];
            return (!inner.is_empty() && !inner.contains('"')).then(|| Self {
                text: inner.to_string(),
                exact: true,
            });
        }
        (!raw.is_empty() && !raw.contains('"')).then(|| Self {
            text: raw.to_string(),
            exact: false,
        })
    }

    fn pattern(&self) -> String {
        self.text.replace('*', ".*")
    }
}

/// A caller filter: one key, one or more OR-ed values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMatch {
    key: String,
    values: Vec<FilterValue>,
}

impl FilterMatch {
    /// Validate a raw `key=v1,v2` filter
    ///
    /// Values are limited to `[A-Za-z0-9_-.,"*:/]` so they can be embedded
    /// in LogQL and PromQL string literals without escaping.
    pub fn parse(key: &str, raw_values: &str) -> Result<Self, AppError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AppError::InvalidParameter(format!(
                "unauthorized filter name: {}",
                key
            )));
        }

        let allowed = |c: char| c.is_ascii_alphanumeric() || "_-.,\"*:/".contains(c);
        if !raw_values.chars().all(allowed) {
            return Err(AppError::InvalidParameter(format!(
                "unauthorized sign in flows request: {}",
                raw_values
            )));
        }

        let values = raw_values
            .split(',')
            .filter(|v| !v.is_empty())
            .map(|v| {
                FilterValue::parse(v).ok_or_else(|| {
                    AppError::InvalidParameter(format!("malformed value for filter {}: {}", key, v))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if values.is_empty() {
            return Err(AppError::InvalidParameter(format!(
                "filter {} has no value",
                key
            )));
        }

        Ok(Self {
            key: key.to_string(),
            values,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Regex matcher OR-ing every value, for label selectors
    pub fn label_matcher(&self) -> LabelMatcher {
        let regex = self
            .values
            .iter()
            .map(|v| {
                if v.exact {
                    v.pattern()
                } else {
                    format!("(?i).*{}.*", v.pattern())
                }
            })
            .collect::<Vec<_>>()
            .join("|");
        LabelMatcher::regex(&self.key, regex)
    }

    /// Regex over the raw JSON line, for fields that are not labels
    pub fn line_regex(&self, kind: FieldKind) -> String {
        self.values
            .iter()
            .map(|v| match kind {
                FieldKind::Numeric => format!("\"{}\":{}[,}}]", self.key, v.pattern()),
                _ if v.exact => format!("\"{}\":\"{}\"", self.key, v.pattern()),
                _ => format!("\"{}\":\"(?i)[^\"]*{}.*\"", self.key, v.pattern()),
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    /// One `ip()` matcher per value, OR-ed by the json stage
    pub fn ip_matchers(&self) -> Vec<LabelMatcher> {
        self.values
            .iter()
            .map(|v| LabelMatcher::ip(&self.key, &v.text))
            .collect()
    }
}
