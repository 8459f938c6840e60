//! HTTP metadata client for the Prometheus API

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{label_names_of, label_values_of, series_selector, LabelSet, MetadataClient, MetadataMap};
use crate::errors::{PromqlError, PromqlResult};
use crate::typechecker::Matcher;

const API_PREFIX: &str = "/api/v1";
const DEFAULT_LOOKBACK: Duration = Duration::from_secs(12 * 60 * 60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Envelope of every Prometheus API answer
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    data: Option<T>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, url: &str) -> PromqlResult<T> {
        if self.status == "error" {
            return Err(PromqlError::api_status(
                self.error_type.unwrap_or_default(),
                self.error.unwrap_or_default(),
            ));
        }
        self.data
            .ok_or_else(|| PromqlError::decode(url, "response carries no data"))
    }
}

/// Blocking `ureq` client; every request runs on the blocking pool
#[derive(Clone)]
pub struct PrometheusClient {
    agent: ureq::Agent,
    url: String,
    lookback: Duration,
}

impl PrometheusClient {
    pub fn new(url: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            url: url.trim_end_matches('/').to_string(),
            lookback: DEFAULT_LOOKBACK,
        }
    }

    /// How far back label and series queries look
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn time_window(&self) -> Vec<(&'static str, String)> {
        let (start, end) = time_window(self.lookback);
        vec![("start", start), ("end", end)]
    }

    async fn fetch<T>(&self, endpoint: String, params: Vec<(&'static str, String)>) -> PromqlResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        let url = format!("{}{}{}", self.url, API_PREFIX, endpoint);
        tracing::debug!(url = %url, "querying prometheus");

        let error_url = url.clone();
        tokio::task::spawn_blocking(move || fetch_blocking(&agent, &url, &params))
            .await
            .map_err(|e| PromqlError::http(error_url, e.to_string()))?
    }
}

/// RFC 3339 `(start, end)` of a window ending now
fn time_window(lookback: Duration) -> (String, String) {
    let end = Utc::now();
    let start = end - chrono::Duration::from_std(lookback).unwrap_or_else(|_| chrono::Duration::zero());
    (
        start.to_rfc3339_opts(SecondsFormat::Millis, true),
        end.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

fn fetch_blocking<T: DeserializeOwned>(
    agent: &ureq::Agent,
    url: &str,
    params: &[(&'static str, String)],
) -> PromqlResult<T> {
    let mut request = agent.get(url);
    for (key, value) in params {
        request = request.query(key, value);
    }

    let response = match request.call() {
        Ok(response) => response,
        // API errors come with a 4xx/5xx status and a JSON body
        Err(ureq::Error::Status(code, response)) => {
            return match response.into_json::<ApiResponse<T>>() {
                Ok(body) => body.into_result(url),
                Err(_) => Err(PromqlError::http(url, format!("status {}", code))),
            };
        }
        Err(err) => return Err(PromqlError::http(url, err.to_string())),
    };

    let body: ApiResponse<T> = response
        .into_json()
        .map_err(|e| PromqlError::decode(url, e.to_string()))?;
    body.into_result(url)
}

fn is_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

#[async_trait]
impl MetadataClient for PrometheusClient {
    async fn label_names(&self, metric_name: Option<&str>) -> PromqlResult<Vec<String>> {
        match metric_name {
            Some(metric) if !metric.is_empty() => {
                let series = self.series(metric, None, None).await?;
                Ok(label_names_of(&series))
            }
            _ => self.fetch("/labels".to_string(), self.time_window()).await,
        }
    }

    async fn label_values(
        &self,
        label_name: &str,
        metric_name: Option<&str>,
        matchers: Option<&[Matcher]>,
    ) -> PromqlResult<Vec<String>> {
        let has_matchers = matchers.is_some_and(|list| list.iter().any(|m| !m.name.is_empty()));
        if !is_set(metric_name) && !has_matchers {
            let endpoint = format!("/label/{}/values", label_name);
            return self.fetch(endpoint, self.time_window()).await;
        }

        let series = self
            .series(metric_name.unwrap_or_default(), matchers, Some(label_name))
            .await?;
        Ok(label_values_of(&series, label_name))
    }

    async fn metric_metadata(&self) -> PromqlResult<MetadataMap> {
        self.fetch("/metadata".to_string(), Vec::new()).await
    }

    async fn series(
        &self,
        metric_name: &str,
        matchers: Option<&[Matcher]>,
        _label_name: Option<&str>,
    ) -> PromqlResult<Vec<LabelSet>> {
        let mut params = self.time_window();
        params.push(("match[]", series_selector(metric_name, matchers)));
        self.fetch("/series".to_string(), params).await
    }
}
