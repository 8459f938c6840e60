//! Completion from the local analyzer plus a metadata client

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use indexmap::IndexMap;
use regex::Regex;

use super::analyzer::{analyze_node, compute_replacement_start};
use super::{terms, Candidate, CompleteStrategy, CompletionResult, Context, ContextKind, ErrorHandler};
use crate::client::{MetadataClient, MetadataMap, MetricMetadata};
use crate::errors::PromqlError;
use crate::parser::{parse, Side};

const DEFAULT_MAX_METRICS_METADATA: usize = 10_000;

/// Analyzes the expression locally and fetches names through a
/// [`MetadataClient`]. Without a client only static terms are offered.
pub struct HybridComplete {
    client: Option<Arc<dyn MetadataClient>>,
    max_metrics_metadata: usize,
    error_handler: Option<ErrorHandler>,
}

impl HybridComplete {
    pub fn new(client: Option<Arc<dyn MetadataClient>>) -> Self {
        Self {
            client,
            max_metrics_metadata: DEFAULT_MAX_METRICS_METADATA,
            error_handler: None,
        }
    }

    /// Skip the metadata request when more metric names than this came back
    pub fn with_max_metrics_metadata(mut self, max: usize) -> Self {
        self.max_metrics_metadata = max;
        self
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Turn contexts into one result replacing `[from, to)`.
    ///
    /// Candidate lists are fetched concurrently but concatenated in context
    /// order.
    pub async fn assemble(&self, contexts: &[Context], from: usize, to: usize) -> CompletionResult {
        let lists = join_all(contexts.iter().map(|ctx| self.candidates(ctx))).await;
        let span = if contexts.iter().any(|ctx| ctx.kind == ContextKind::Duration) {
            None
        } else {
            identifier_span()
        };
        CompletionResult {
            from,
            to,
            options: lists.into_iter().flatten().collect(),
            span,
        }
    }

    async fn candidates(&self, ctx: &Context) -> Vec<Candidate> {
        match ctx.kind {
            ContextKind::Function => terms::functions(),
            ContextKind::Aggregation => terms::aggregations(),
            ContextKind::BinOp => terms::bin_ops(),
            ContextKind::BinOpModifier => terms::bin_op_modifiers(),
            ContextKind::MatchOp => terms::match_ops(),
            ContextKind::AggregateOpModifier => terms::aggregate_op_modifiers(),
            ContextKind::Duration => terms::durations(),
            ContextKind::Offset => terms::offset(),
            ContextKind::MetricName => self.metric_names(ctx.metric_name.as_deref()).await,
            ContextKind::LabelName => self.label_names(ctx.metric_name.as_deref()).await,
            ContextKind::LabelValue => self.label_values(ctx).await,
        }
    }

    async fn metric_names(&self, prefix: Option<&str>) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        if let Some(client) = &self.client {
            match client.metric_names(prefix).await {
                Ok(names) => {
                    let mut metrics: IndexMap<String, Candidate> = IndexMap::new();
                    for name in names {
                        metrics
                            .entry(name.clone())
                            .or_insert_with(|| Candidate::metric(name));
                    }
                    if metrics.len() <= self.max_metrics_metadata {
                        match client.metric_metadata().await {
                            Ok(metadata) => decorate_metrics(&mut metrics, &metadata),
                            Err(err) => self.report(err),
                        }
                    }
                    candidates.extend(metrics.into_values());
                }
                Err(err) => self.report(err),
            }
        }
        candidates.extend(terms::snippets());
        candidates
    }

    async fn label_names(&self, metric_name: Option<&str>) -> Vec<Candidate> {
        let Some(client) = &self.client else {
            return Vec::new();
        };
        match client.label_names(metric_name).await {
            Ok(names) => names.into_iter().map(Candidate::label).collect(),
            Err(err) => {
                self.report(err);
                Vec::new()
            }
        }
    }

    async fn label_values(&self, ctx: &Context) -> Vec<Candidate> {
        let (Some(client), Some(label_name)) = (&self.client, ctx.label_name.as_deref()) else {
            return Vec::new();
        };
        let result = client
            .label_values(label_name, ctx.metric_name.as_deref(), ctx.matchers.as_deref())
            .await;
        match result {
            Ok(values) => values.into_iter().map(Candidate::label).collect(),
            Err(err) => {
                self.report(err);
                Vec::new()
            }
        }
    }

    fn report(&self, err: PromqlError) {
        tracing::warn!(error = %err.message(), "metadata fetch failed");
        if let Some(handler) = &self.error_handler {
            handler(&err);
        }
    }
}

#[async_trait]
impl CompleteStrategy for HybridComplete {
    async fn promql(&self, text: &str, pos: usize) -> Option<CompletionResult> {
        let pos = pos.min(text.len());
        let (contexts, from) = {
            let tree = parse(text);
            let node = tree.resolve(pos, Side::Before);
            (analyze_node(node, pos), compute_replacement_start(node, pos))
        };
        if contexts.is_empty() {
            return None;
        }
        Some(self.assemble(&contexts, from, pos).await)
    }
}

fn identifier_span() -> Option<Regex> {
    Regex::new(super::IDENTIFIER_SPAN).ok()
}

/// Metadata keyed by series name, with the series histograms and summaries
/// expand to
fn expand_metadata(metadata: &MetadataMap) -> IndexMap<String, Vec<MetricMetadata>> {
    let mut expanded: IndexMap<String, Vec<MetricMetadata>> = IndexMap::new();
    for (name, definitions) in metadata {
        expanded
            .entry(name.clone())
            .or_default()
            .extend(definitions.iter().cloned());

        for def in definitions {
            let mut derived = Vec::new();
            match def.metric_type.as_str() {
                "histogram" => {
                    derived.push((
                        "_bucket",
                        format!(
                            "The total count of observations for a bucket in the histogram: {}",
                            def.help
                        ),
                    ));
                    derived.push((
                        "_count",
                        format!("The total number of observations for: {}", def.help),
                    ));
                    derived.push((
                        "_sum",
                        format!("The total sum of observations for: {}", def.help),
                    ));
                }
                "summary" => {
                    derived.push((
                        "_count",
                        format!("The total number of observations for: {}", def.help),
                    ));
                    derived.push((
                        "_sum",
                        format!("The total sum of observations for: {}", def.help),
                    ));
                }
                _ => {}
            }
            for (suffix, help) in derived {
                let mut synthetic = MetricMetadata::new("counter", help);
                synthetic.unit = def.unit.clone();
                expanded
                    .entry(format!("{}{}", name, suffix))
                    .or_default()
                    .push(synthetic);
            }
        }
    }
    expanded
}

/// Attach type and help text to the metric candidates
fn decorate_metrics(metrics: &mut IndexMap<String, Candidate>, metadata: &MetadataMap) {
    let expanded = expand_metadata(metadata);
    for (name, candidate) in metrics.iter_mut() {
        let Some(definitions) = expanded.get(name) else {
            continue;
        };
        let mut distinct: Vec<&MetricMetadata> = Vec::new();
        for def in definitions {
            if !distinct
                .iter()
                .any(|d| d.metric_type == def.metric_type && d.help == def.help)
            {
                distinct.push(def);
            }
        }
        match distinct.as_slice() {
            [] => {}
            [only] => {
                candidate.detail = Some(only.metric_type.clone());
                candidate.info = Some(only.help.clone());
            }
            _ => {
                candidate.detail = Some("unknown".to_string());
                candidate.info = Some("multiple different definitions for this metric".to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(entries: &[(&str, &str, &str)]) -> MetadataMap {
        let mut map = MetadataMap::new();
        for (name, kind, help) in entries {
            map.entry(name.to_string())
                .or_insert_with(Vec::new)
                .push(MetricMetadata::new(*kind, *help));
        }
        map
    }

    fn decorated(names: &[&str], meta: &MetadataMap) -> IndexMap<String, Candidate> {
        let mut metrics: IndexMap<String, Candidate> = names
            .iter()
            .map(|n| (n.to_string(), Candidate::metric(*n)))
            .collect();
        decorate_metrics(&mut metrics, meta);
        metrics
    }

    #[test]
    fn test_plain_metadata() {
        let metrics = decorated(&["up"], &metadata(&[("up", "gauge", "Target is up")]));
        assert_eq!(metrics["up"].detail.as_deref(), Some("gauge"));
        assert_eq!(metrics["up"].info.as_deref(), Some("Target is up"));
    }

    #[test]
    fn test_histogram_series_are_remapped() {
        let meta = metadata(&[("latency", "histogram", "Request latency")]);
        let metrics = decorated(
            &["latency_bucket", "latency_count", "latency_sum"],
            &meta,
        );
        for name in ["latency_bucket", "latency_count", "latency_sum"] {
            assert_eq!(metrics[name].detail.as_deref(), Some("counter"));
        }
        assert_eq!(
            metrics["latency_count"].info.as_deref(),
            Some("The total number of observations for: Request latency")
        );
    }

    #[test]
    fn test_summary_has_no_bucket() {
        let meta = metadata(&[("rpc", "summary", "RPC duration")]);
        let metrics = decorated(&["rpc_bucket", "rpc_sum"], &meta);
        assert!(metrics["rpc_bucket"].detail.is_none());
        assert_eq!(
            metrics["rpc_sum"].info.as_deref(),
            Some("The total sum of observations for: RPC duration")
        );
    }

    #[test]
    fn test_ambiguous_metadata() {
        let meta = metadata(&[("jobs", "gauge", "Jobs running"), ("jobs", "counter", "Jobs run")]);
        let metrics = decorated(&["jobs"], &meta);
        assert_eq!(metrics["jobs"].detail.as_deref(), Some("unknown"));
        assert_eq!(
            metrics["jobs"].info.as_deref(),
            Some("multiple different definitions for this metric")
        );
    }

    #[test]
    fn test_identical_definitions_are_not_ambiguous() {
        let meta = metadata(&[("up", "gauge", "Target is up"), ("up", "gauge", "Target is up")]);
        let metrics = decorated(&["up"], &meta);
        assert_eq!(metrics["up"].detail.as_deref(), Some("gauge"));
    }

    #[tokio::test]
    async fn test_offline_completion_uses_static_terms() {
        let complete = HybridComplete::new(None);
        let result = complete.promql("sum by", 6).await.unwrap();
        let labels: Vec<_> = result.options.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["by", "without"]);
        assert_eq!(result.to, 6);
        assert!(result.span.is_some());
    }

    #[tokio::test]
    async fn test_duration_result_has_no_span() {
        let complete = HybridComplete::new(None);
        let result = complete.promql("foo[5", 5).await.unwrap();
        assert!(result.span.is_none());
        assert!(result.options.iter().any(|c| c.label == "ms"));
    }

    #[tokio::test]
    async fn test_no_context_no_result() {
        let complete = HybridComplete::new(None);
        assert!(complete.promql("foo + 1", 7).await.is_none());
    }
}
