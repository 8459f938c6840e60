//! Metadata sources for completion.
//!
//! The [`MetadataClient`] trait abstracts over where label names, label
//! values and metric metadata come from. The HTTP implementation talks to
//! the Prometheus API; [`CachedMetadataClient`] wraps any client with a
//! time-based cache shared between requests.

mod cache;
#[cfg(feature = "http")]
mod lsp;
#[cfg(feature = "http")]
mod prometheus;

pub use cache::CachedMetadataClient;
#[cfg(feature = "http")]
pub use lsp::{LspBody, LspClient, LspCompletionItem, LspDiagnostic, LspPosition, LspRange, LspTextEdit};
#[cfg(feature = "http")]
pub use prometheus::PrometheusClient;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::PromqlResult;
use crate::typechecker::Matcher;

/// Name of the label holding the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

/// One `/api/v1/metadata` entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricMetadata {
    #[serde(rename = "type")]
    pub metric_type: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub unit: String,
}

impl MetricMetadata {
    pub fn new(metric_type: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            metric_type: metric_type.into(),
            help: help.into(),
            unit: String::new(),
        }
    }
}

/// Metadata of every metric, keyed by metric name
pub type MetadataMap = IndexMap<String, Vec<MetricMetadata>>;

/// Labels of one series
pub type LabelSet = IndexMap<String, String>;

/// Source of label and metric metadata.
///
/// Implementations must be shareable across tasks; completion requests call
/// them concurrently.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Every label name, or those seen on series of `metric_name`
    async fn label_names(&self, metric_name: Option<&str>) -> PromqlResult<Vec<String>>;

    /// Values of `label_name`, optionally narrowed to series of
    /// `metric_name` that satisfy `matchers`
    async fn label_values(
        &self,
        label_name: &str,
        metric_name: Option<&str>,
        matchers: Option<&[Matcher]>,
    ) -> PromqlResult<Vec<String>>;

    async fn metric_metadata(&self) -> PromqlResult<MetadataMap>;

    /// Series selected by `metric_name` and `matchers`.
    ///
    /// `label_name` is a hint for backends that can restrict the returned
    /// label sets.
    async fn series(
        &self,
        metric_name: &str,
        matchers: Option<&[Matcher]>,
        label_name: Option<&str>,
    ) -> PromqlResult<Vec<LabelSet>>;

    /// Metric names starting with `prefix`
    async fn metric_names(&self, prefix: Option<&str>) -> PromqlResult<Vec<String>> {
        let names = self.label_values(METRIC_NAME_LABEL, None, None).await?;
        Ok(match prefix {
            Some(prefix) if !prefix.is_empty() => names
                .into_iter()
                .filter(|name| name.starts_with(prefix))
                .collect(),
            _ => names,
        })
    }
}

/// Render a series selector such as `up{job="api"}`
pub fn series_selector(metric_name: &str, matchers: Option<&[Matcher]>) -> String {
    let matchers: Vec<String> = matchers
        .unwrap_or_default()
        .iter()
        .filter(|m| !m.name.is_empty())
        .map(|m| m.to_string())
        .collect();
    if matchers.is_empty() {
        return metric_name.to_string();
    }
    format!("{}{{{}}}", metric_name, matchers.join(","))
}

/// Label names appearing in `series`, without `__name__`, first seen first
pub fn label_names_of(series: &[LabelSet]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for labels in series {
        for name in labels.keys() {
            if name != METRIC_NAME_LABEL && !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// Distinct values of `label_name` across `series`, first seen first
pub fn label_values_of(series: &[LabelSet], label_name: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for value in series.iter().filter_map(|labels| labels.get(label_name)) {
        if !values.contains(value) {
            values.push(value.clone());
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MatchOp;

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_series_selector() {
        assert_eq!(series_selector("up", None), "up");
        let matchers = [
            Matcher::new(MatchOp::EqlSingle, "job", "api"),
            Matcher::new(MatchOp::NeqRegex, "env", "dev.*"),
        ];
        assert_eq!(
            series_selector("up", Some(&matchers)),
            "up{job=\"api\",env!~\"dev.*\"}"
        );
        assert_eq!(series_selector("", Some(&matchers[..1])), "{job=\"api\"}");
    }

    #[test]
    fn test_label_names_skip_metric_name() {
        let series = vec![
            labels(&[("__name__", "up"), ("job", "api"), ("instance", "a")]),
            labels(&[("__name__", "up"), ("job", "db"), ("zone", "eu")]),
        ];
        assert_eq!(label_names_of(&series), vec!["job", "instance", "zone"]);
        assert_eq!(label_values_of(&series, "job"), vec!["api", "db"]);
        assert!(label_values_of(&series, "missing").is_empty());
    }

    #[test]
    fn test_metadata_decodes_type_field() {
        let meta: MetricMetadata =
            serde_json::from_str(r#"{"type":"counter","help":"Total requests","unit":""}"#)
                .unwrap();
        assert_eq!(meta, MetricMetadata::new("counter", "Total requests"));
    }
}
