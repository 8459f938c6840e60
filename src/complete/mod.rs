//! Context-aware completion for PromQL.
//!
//! Completion runs in two steps. The [`analyzer`] inspects the syntax tree
//! around the cursor and decides which kinds of suggestions fit there
//! ([`Context`]s). The [`HybridComplete`] strategy then turns those contexts
//! into [`Candidate`]s, using static term tables for keywords and a
//! [`MetadataClient`](crate::client::MetadataClient) for metric and label
//! names. [`LspComplete`] is the alternative that asks a remote language
//! server instead.

pub mod analyzer;
mod hybrid;
#[cfg(feature = "http")]
pub(crate) mod lsp;
pub mod terms;

pub use analyzer::{analyze, compute_replacement_start};
pub use hybrid::HybridComplete;
#[cfg(feature = "http")]
pub use lsp::LspComplete;

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{PromqlError, PromqlResult};
use crate::typechecker::Matcher;

/// Kind of suggestion that fits at the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextKind {
    MetricName,
    LabelName,
    LabelValue,
    Function,
    Aggregation,
    BinOpModifier,
    BinOp,
    MatchOp,
    AggregateOpModifier,
    Duration,
    Offset,
}

/// A kind of suggestion plus what is known to narrow it down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub kind: ContextKind,
    pub metric_name: Option<String>,
    pub label_name: Option<String>,
    pub matchers: Option<Vec<Matcher>>,
}

impl Context {
    pub fn new(kind: ContextKind) -> Self {
        Self {
            kind,
            metric_name: None,
            label_name: None,
            matchers: None,
        }
    }

    pub fn with_metric_name(mut self, metric_name: Option<String>) -> Self {
        self.metric_name = metric_name;
        self
    }

    pub fn with_label_name(mut self, label_name: Option<String>) -> Self {
        self.label_name = label_name;
        self
    }

    pub fn with_matchers(mut self, matchers: Vec<Matcher>) -> Self {
        self.matchers = if matchers.is_empty() {
            None
        } else {
            Some(matchers)
        };
        self
    }
}

/// Grouping tag the editor uses to pick an icon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Constant,
    Function,
    Keyword,
    Text,
}

/// A single suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<CandidateKind>,
    /// Text inserted instead of the label, possibly a `${placeholder}` template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply: Option<String>,
}

impl Candidate {
    fn with_kind(label: impl Into<String>, kind: CandidateKind) -> Self {
        Self {
            label: label.into(),
            detail: None,
            info: None,
            kind: Some(kind),
            apply: None,
        }
    }

    pub fn metric(name: impl Into<String>) -> Self {
        Self::with_kind(name, CandidateKind::Constant)
    }

    /// A label name or label value
    pub fn label(name: impl Into<String>) -> Self {
        Self::with_kind(name, CandidateKind::Text)
    }

    pub fn function(name: &str, info: Option<&str>) -> Self {
        let mut candidate = Self::with_kind(name, CandidateKind::Function);
        candidate.info = info.map(str::to_string);
        candidate
    }

    pub fn aggregation(name: &str, info: Option<&str>) -> Self {
        let mut candidate = Self::with_kind(name, CandidateKind::Keyword);
        candidate.info = info.map(str::to_string);
        candidate
    }

    pub fn keyword(keyword: &str) -> Self {
        Self::with_kind(keyword, CandidateKind::Keyword)
    }

    pub fn duration(unit: &str, detail: &str) -> Self {
        let mut candidate = Self::with_kind(unit, CandidateKind::Constant);
        candidate.detail = Some(detail.to_string());
        candidate
    }

    pub fn snippet(label: &str, detail: &str, template: &str) -> Self {
        let mut candidate = Self::with_kind(label, CandidateKind::Text);
        candidate.detail = Some(detail.to_string());
        candidate.apply = Some(template.to_string());
        candidate
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }
}

/// Characters a completion result stays valid for while the user types
pub const IDENTIFIER_SPAN: &str = "^[a-zA-Z0-9_:]+$";

/// Suggestions replacing the text in `[from, to)`
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub from: usize,
    pub to: usize,
    pub options: Vec<Candidate>,
    /// `None` when the result must not be filtered by word boundaries
    pub span: Option<Regex>,
}

/// Called with every metadata failure that completion swallowed
pub type ErrorHandler = Arc<dyn Fn(&PromqlError) + Send + Sync>;

/// A way of producing completions for an expression
#[async_trait]
pub trait CompleteStrategy: Send + Sync {
    /// Completions for the cursor at byte offset `pos` of `text`
    async fn promql(&self, text: &str, pos: usize) -> Option<CompletionResult>;
}

/// How completion (and linting) should be served
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CompleteConfiguration {
    /// Prometheus server, or language server when `enable_lsp` is set
    pub url: String,
    pub enable_lsp: bool,
    /// Static terms only; no metadata is fetched
    pub offline: bool,
    /// Seconds of history label queries look at
    pub lookback: u64,
    /// Above this many metric names, metadata is not fetched
    pub max_metrics_metadata: usize,
    /// Seconds a cached metadata answer stays valid
    pub cache_max_age: u64,
    /// Item limit passed to the language server
    pub limit: usize,
}

impl Default for CompleteConfiguration {
    fn default() -> Self {
        Self {
            url: String::new(),
            enable_lsp: false,
            offline: true,
            lookback: 12 * 60 * 60,
            max_metrics_metadata: 10_000,
            cache_max_age: 5 * 60,
            limit: 100,
        }
    }
}

impl CompleteConfiguration {
    /// Configuration for a live Prometheus at `url`
    pub fn online(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            offline: false,
            ..Self::default()
        }
    }

    pub(crate) fn require_url(&self) -> PromqlResult<&str> {
        if self.url.is_empty() {
            return Err(PromqlError::config(
                "no url configured",
                "set `complete.url` or pass --url",
            ));
        }
        Ok(&self.url)
    }
}

/// Pick the completion strategy described by `conf`
pub fn new_complete_strategy(conf: &CompleteConfiguration) -> PromqlResult<Box<dyn CompleteStrategy>> {
    if conf.enable_lsp {
        return new_lsp_strategy(conf);
    }
    if conf.offline {
        return Ok(Box::new(HybridComplete::new(None)));
    }
    new_prometheus_strategy(conf)
}

#[cfg(feature = "http")]
fn new_lsp_strategy(conf: &CompleteConfiguration) -> PromqlResult<Box<dyn CompleteStrategy>> {
    let client = crate::client::LspClient::new(conf.require_url()?);
    Ok(Box::new(LspComplete::new(client, conf.limit)))
}

#[cfg(feature = "http")]
fn new_prometheus_strategy(conf: &CompleteConfiguration) -> PromqlResult<Box<dyn CompleteStrategy>> {
    use crate::client::{CachedMetadataClient, PrometheusClient};
    use std::time::Duration;

    let client = PrometheusClient::new(conf.require_url()?)
        .with_lookback(Duration::from_secs(conf.lookback));
    let cached = CachedMetadataClient::new(client, Duration::from_secs(conf.cache_max_age));
    Ok(Box::new(
        HybridComplete::new(Some(Arc::new(cached)))
            .with_max_metrics_metadata(conf.max_metrics_metadata),
    ))
}

#[cfg(not(feature = "http"))]
fn new_lsp_strategy(_conf: &CompleteConfiguration) -> PromqlResult<Box<dyn CompleteStrategy>> {
    Err(PromqlError::config(
        "the language server strategy needs HTTP support",
        "rebuild with the `http` feature",
    ))
}

#[cfg(not(feature = "http"))]
fn new_prometheus_strategy(_conf: &CompleteConfiguration) -> PromqlResult<Box<dyn CompleteStrategy>> {
    Err(PromqlError::config(
        "fetching metadata needs HTTP support",
        "rebuild with the `http` feature or set `offline`",
    ))
}
