use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use promql_editor::client::LabelSet;
use promql_editor::parser::MatchOp;
use promql_editor::{
    analyze, compute_replacement_start, parse, CandidateKind, CompleteStrategy, Context,
    ContextKind, HybridComplete, Matcher, MetadataClient, MetadataMap, MetricMetadata,
    PromqlError, PromqlResult, Side,
};
use ContextKind::*;

fn kinds(source: &str, pos: usize) -> Vec<ContextKind> {
    analyze(&parse(source), pos)
        .into_iter()
        .map(|c| c.kind)
        .collect()
}

fn start(source: &str, pos: usize) -> usize {
    let tree = parse(source);
    compute_replacement_start(tree.resolve(pos, Side::Before), pos)
}

#[test]
fn test_contexts() {
    let cases: Vec<(&str, usize, Vec<ContextKind>)> = vec![
        ("go_", 3, vec![MetricName, Function, Aggregation]),
        (
            "metric_name / ignor",
            19,
            vec![MetricName, Function, Aggregation, BinOpModifier],
        ),
        ("sum by ()", 8, vec![LabelName]),
        ("sum by (myL)", 11, vec![LabelName]),
        ("sum by (myLabel1, myLab)", 23, vec![LabelName]),
        ("{myL}", 4, vec![LabelName]),
        ("sum() b", 7, vec![AggregateOpModifier, BinOp]),
        ("sum b", 5, vec![AggregateOpModifier, BinOp, Offset]),
        ("metric_name unle", 16, vec![BinOp, Offset]),
        ("metric_name !", 13, vec![BinOp]),
        ("metric_name =", 13, vec![BinOp]),
        ("go{instance=\"\"}", 12, vec![MatchOp]),
        ("metric_name{labelName!}", 22, vec![MatchOp]),
        ("http_requests_total offset 5", 28, vec![Duration]),
        ("http_requests_total off", 23, vec![BinOp, Offset]),
    ];
    for (source, pos, expected) in cases {
        assert_eq!(kinds(source, pos), expected, "contexts of {:?} at {}", source, pos);
    }
}

#[test]
fn test_label_name_contexts_carry_metric() {
    let with_metric = Context::new(LabelName).with_metric_name(Some("metric_name".to_string()));
    assert_eq!(analyze(&parse("metric_name{}"), 12), vec![with_metric.clone()]);
    assert_eq!(analyze(&parse("metric_name{myL}"), 15), vec![with_metric]);
    assert_eq!(analyze(&parse("{}"), 1), vec![Context::new(LabelName)]);
}

#[test]
fn test_label_value_context() {
    assert_eq!(
        analyze(&parse("metric_name{labelName=\"\"}"), 23),
        vec![Context::new(LabelValue)
            .with_metric_name(Some("metric_name".to_string()))
            .with_label_name(Some("labelName".to_string()))]
    );
}

#[test]
fn test_metric_name_context_carries_prefix() {
    let contexts = analyze(&parse("go_"), 3);
    assert_eq!(contexts[0].metric_name.as_deref(), Some("go_"));
}

#[test]
fn test_replacement_start() {
    let cases = [
        ("{}", 1, 1),
        ("metricName{}", 11, 11),
        ("sum by()", 7, 7),
        ("{myL}", 4, 1),
        ("metricName{myL}", 14, 11),
        ("sum by(myL)", 10, 7),
        ("metric_name{labelName!}", 22, 21),
        ("metric_name{labelName!=\"labelValue\"}", 22, 21),
        ("http_requests_total offset 5", 28, 28),
        ("http_requests_total offset 587", 30, 30),
        ("http_requests_total offset 587", 29, 29),
    ];
    for (source, pos, expected) in cases {
        assert_eq!(start(source, pos), expected, "start of {:?} at {}", source, pos);
    }
}

/// In-memory metadata source recording what it was asked
#[derive(Default)]
struct FakeClient {
    fail: bool,
    metadata_calls: AtomicUsize,
    label_value_calls: Mutex<Vec<(String, Option<String>, Option<Vec<Matcher>>)>>,
}

impl FakeClient {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn check(&self) -> PromqlResult<()> {
        if self.fail {
            return Err(PromqlError::http("http://prometheus", "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataClient for FakeClient {
    async fn label_names(&self, metric_name: Option<&str>) -> PromqlResult<Vec<String>> {
        self.check()?;
        Ok(match metric_name {
            Some("metric_name") => vec!["job".to_string(), "instance".to_string()],
            _ => vec!["job".to_string()],
        })
    }

    async fn label_values(
        &self,
        label_name: &str,
        metric_name: Option<&str>,
        matchers: Option<&[Matcher]>,
    ) -> PromqlResult<Vec<String>> {
        self.check()?;
        self.label_value_calls.lock().unwrap().push((
            label_name.to_string(),
            metric_name.map(str::to_string),
            matchers.map(<[Matcher]>::to_vec),
        ));
        if label_name == "__name__" {
            return Ok(vec![
                "go_goroutines".to_string(),
                "go_gc_duration_seconds_count".to_string(),
                "up".to_string(),
            ]);
        }
        Ok(vec!["api".to_string(), "db".to_string()])
    }

    async fn metric_metadata(&self) -> PromqlResult<MetadataMap> {
        self.check()?;
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let mut metadata = MetadataMap::new();
        metadata.insert(
            "go_goroutines".to_string(),
            vec![MetricMetadata::new("gauge", "Number of goroutines that currently exist.")],
        );
        metadata.insert(
            "go_gc_duration_seconds".to_string(),
            vec![MetricMetadata::new("summary", "A summary of the GC invocation durations.")],
        );
        Ok(metadata)
    }

    async fn series(
        &self,
        _metric_name: &str,
        _matchers: Option<&[Matcher]>,
        _label_name: Option<&str>,
    ) -> PromqlResult<Vec<LabelSet>> {
        self.check()?;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_metric_names_with_metadata() {
    let client = Arc::new(FakeClient::default());
    let complete = HybridComplete::new(Some(client.clone()));
    let result = complete.promql("go_", 3).await.unwrap();

    assert_eq!((result.from, result.to), (0, 3));
    assert_eq!(result.options[0].label, "go_goroutines");
    assert_eq!(result.options[0].detail.as_deref(), Some("gauge"));
    assert_eq!(result.options[1].label, "go_gc_duration_seconds_count");
    assert_eq!(result.options[1].detail.as_deref(), Some("counter"));
    assert_eq!(
        result.options[1].info.as_deref(),
        Some("The total number of observations for: A summary of the GC invocation durations.")
    );
    // prefix filtering drops `up`
    assert!(result.options.iter().all(|c| c.label != "up"));
    // snippets follow the metrics, then functions and aggregations
    assert_eq!(result.options[2].label, "sum(rate(__input_vector__[5m]))");
    assert!(result
        .options
        .iter()
        .any(|c| c.label == "rate" && c.kind == Some(CandidateKind::Function)));
    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_metadata_skipped_above_limit() {
    let client = Arc::new(FakeClient::default());
    let complete = HybridComplete::new(Some(client.clone())).with_max_metrics_metadata(1);
    let result = complete.promql("go_", 3).await.unwrap();

    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 0);
    assert!(result.options[0].detail.is_none());
}

#[tokio::test]
async fn test_label_names_for_metric() {
    let complete = HybridComplete::new(Some(Arc::new(FakeClient::default())));
    let result = complete.promql("metric_name{}", 12).await.unwrap();

    let labels: Vec<_> = result.options.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["job", "instance"]);
    assert_eq!((result.from, result.to), (12, 12));
}

#[tokio::test]
async fn test_label_values_query() {
    let client = Arc::new(FakeClient::default());
    let complete = HybridComplete::new(Some(client.clone()));
    let result = complete
        .promql("metric_name{labelName=\"\"}", 23)
        .await
        .unwrap();

    let values: Vec<_> = result.options.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(values, vec!["api", "db"]);
    assert_eq!(result.from, 23);

    let calls = client.label_value_calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![(
            "labelName".to_string(),
            Some("metric_name".to_string()),
            None
        )]
    );
}

#[tokio::test]
async fn test_label_values_narrowed_by_typed_matchers() {
    let client = Arc::new(FakeClient::default());
    let complete = HybridComplete::new(Some(client.clone()));
    let source = "metric_name{labelName!=\"\",labelName2=\"\"}";
    let result = complete.promql(source, 38).await.unwrap();
    assert_eq!(result.from, 38);

    let calls = client.label_value_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (label, metric, matchers) = &calls[0];
    assert_eq!(label, "labelName2");
    assert_eq!(metric.as_deref(), Some("metric_name"));
    let matchers = matchers.as_ref().unwrap();
    assert_eq!(matchers, &vec![Matcher::new(MatchOp::Neq, "labelName", "")]);
    assert!(matchers.iter().all(|m| m.name != "labelName2"));
}

#[tokio::test]
async fn test_failures_reach_error_handler() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let complete = HybridComplete::new(Some(Arc::new(FakeClient::failing())))
        .with_error_handler(Arc::new(move |_err: &PromqlError| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    let result = complete.promql("go_", 3).await.unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 1);
    // static terms survive a failed metadata fetch
    assert_eq!(result.options[0].label, "sum(rate(__input_vector__[5m]))");
    assert!(result.options.iter().any(|c| c.label == "rate"));
}

#[tokio::test]
async fn test_assemble_keeps_context_order() {
    let complete = HybridComplete::new(None);
    let contexts = vec![Context::new(Offset), Context::new(BinOp)];
    let result = complete.assemble(&contexts, 4, 4).await;
    assert_eq!(result.options[0].label, "offset");
    assert!(result.options[1..].iter().all(|c| c.kind == Some(CandidateKind::Keyword)));
    assert!(result.span.is_some());

    let result = complete.assemble(&[Context::new(Duration)], 5, 5).await;
    assert!(result.span.is_none());
}
