//! HTTP client for a remote PromQL language server

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{PromqlError, PromqlResult};

const COMPLETION_ENDPOINT: &str = "/completion";
const DIAGNOSTICS_ENDPOINT: &str = "/diagnostics";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body shared by both endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LspBody {
    pub expr: String,
    pub limit: usize,
    /// 0-based line of the cursor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_line: Option<usize>,
    /// 0-based character of the cursor within its line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_char: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LspPosition {
    pub line: usize,
    pub character: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LspRange {
    pub start: LspPosition,
    pub end: LspPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LspTextEdit {
    pub range: LspRange,
    pub new_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LspCompletionItem {
    pub label: String,
    #[serde(default)]
    pub kind: Option<u32>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub text_edit: Option<LspTextEdit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LspDiagnostic {
    pub range: LspRange,
    #[serde(default)]
    pub severity: Option<u32>,
    pub message: String,
}

/// POSTs expressions to `/completion` and `/diagnostics`
#[derive(Clone)]
pub struct LspClient {
    agent: ureq::Agent,
    url: String,
}

impl LspClient {
    pub fn new(url: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            url: url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn complete(&self, body: &LspBody) -> PromqlResult<Vec<LspCompletionItem>> {
        self.post(COMPLETION_ENDPOINT, body).await
    }

    pub async fn diagnostic(&self, body: &LspBody) -> PromqlResult<Vec<LspDiagnostic>> {
        self.post(DIAGNOSTICS_ENDPOINT, body).await
    }

    async fn post<T>(&self, endpoint: &str, body: &LspBody) -> PromqlResult<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        let url = format!("{}{}", self.url, endpoint);
        let body = body.clone();
        tracing::debug!(url = %url, "querying language server");

        let error_url = url.clone();
        tokio::task::spawn_blocking(move || post_blocking(&agent, &url, &body))
            .await
            .map_err(|e| PromqlError::http(error_url, e.to_string()))?
    }
}

fn post_blocking<T: DeserializeOwned>(
    agent: &ureq::Agent,
    url: &str,
    body: &LspBody,
) -> PromqlResult<Vec<T>> {
    let response = agent
        .post(url)
        .send_json(body)
        .map_err(|e| PromqlError::http(url, e.to_string()))?;
    if response.status() != 200 {
        return Err(PromqlError::http(
            url,
            format!("{} {}", response.status(), response.status_text()),
        ));
    }
    // `null` is a valid empty answer
    let items: Option<Vec<T>> = response
        .into_json()
        .map_err(|e| PromqlError::decode(url, e.to_string()))?;
    Ok(items.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_uses_camel_case() {
        let body = LspBody {
            expr: "up".to_string(),
            limit: 100,
            position_line: Some(0),
            position_char: Some(1),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"expr": "up", "limit": 100, "positionLine": 0, "positionChar": 1})
        );
    }

    #[test]
    fn test_diagnostics_body_omits_position() {
        let body = LspBody {
            expr: "up".to_string(),
            limit: 100,
            position_line: None,
            position_char: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"expr": "up", "limit": 100}));
    }

    #[test]
    fn test_completion_item_with_text_edit() {
        let item: LspCompletionItem = serde_json::from_str(
            r#"{"label":"rate","kind":3,"textEdit":{"range":{"start":{"line":0,"character":2},"end":{"line":0,"character":4}},"newText":"rate("}}"#,
        )
        .unwrap();
        assert_eq!(item.kind, Some(3));
        let edit = item.text_edit.unwrap();
        assert_eq!(edit.range.start.character, 2);
        assert_eq!(edit.new_text, "rate(");
    }
}
