//! Completion delegated to a remote PromQL language server

use async_trait::async_trait;

use super::{Candidate, CandidateKind, CompleteStrategy, CompletionResult};
use crate::client::{LspBody, LspClient, LspCompletionItem};

const KIND_FUNCTION: u32 = 3;
const KIND_CONSTANT: u32 = 12;

pub struct LspComplete {
    client: LspClient,
    limit: usize,
}

impl LspComplete {
    pub fn new(client: LspClient, limit: usize) -> Self {
        Self { client, limit }
    }
}

/// Byte offset where the line holding `pos` starts, and its 0-based number
pub(crate) fn line_at(text: &str, pos: usize) -> (usize, usize) {
    let before = &text[..pos];
    let from = before.rfind('\n').map_or(0, |i| i + 1);
    (from, before.matches('\n').count())
}

/// Byte offset of the first character of 0-based `line`
pub(crate) fn line_offset(text: &str, line: usize) -> usize {
    if line == 0 {
        return 0;
    }
    text.match_indices('\n')
        .nth(line - 1)
        .map_or(text.len(), |(i, _)| i + 1)
}

/// Character the server expects for the cursor. It counts the cursor as
/// sitting on the last typed character rather than after it.
fn position_char(pos: usize, line_from: usize) -> usize {
    let column = pos - line_from;
    if column > 1 {
        column - 1
    } else {
        column
    }
}

fn to_candidate(item: LspCompletionItem) -> Candidate {
    let kind = match item.kind {
        Some(KIND_CONSTANT) => Some(CandidateKind::Constant),
        Some(KIND_FUNCTION) => Some(CandidateKind::Function),
        _ => None,
    };
    let apply = item
        .text_edit
        .as_ref()
        .map(|edit| edit.new_text.clone())
        .unwrap_or_else(|| item.label.clone());
    Candidate {
        label: item.label,
        detail: item.detail,
        info: None,
        kind,
        apply: Some(apply),
    }
}

#[async_trait]
impl CompleteStrategy for LspComplete {
    async fn promql(&self, text: &str, pos: usize) -> Option<CompletionResult> {
        let mut pos = pos.min(text.len());
        while !text.is_char_boundary(pos) {
            pos -= 1;
        }
        let (line_from, line) = line_at(text, pos);
        let body = LspBody {
            expr: text.to_string(),
            limit: self.limit,
            position_line: Some(line),
            position_char: Some(position_char(pos, line_from)),
        };

        let items = match self.client.complete(&body).await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(error = %err.message(), "language server completion failed");
                return None;
            }
        };

        let from = items
            .iter()
            .rev()
            .find_map(|item| item.text_edit.as_ref())
            .map_or(line_from, |edit| (line_from + edit.range.start.character).min(pos));
        Some(CompletionResult {
            from,
            to: pos,
            options: items.into_iter().map(to_candidate).collect(),
            span: None,
        })
    }
}
