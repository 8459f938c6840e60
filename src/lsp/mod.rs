//! PromQL Language Server Protocol implementation.
//!
//! Each open document holds one expression. The server publishes lint
//! diagnostics on open, change and save, answers completion requests through
//! the configured [`CompleteStrategy`] and shows function documentation on
//! hover.

use std::sync::Arc;

use dashmap::DashMap;
use ropey::Rope;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::complete::terms::{aggregator_info, function_info};
use crate::complete::{Candidate, CandidateKind, CompleteStrategy, CompletionResult};
use crate::lint::LintStrategy;
use crate::parser::{Aggregator, Function};
use crate::typechecker::{Diagnostic as CheckDiagnostic, Severity};

/// Document state tracked by the server
#[derive(Debug)]
pub struct Document {
    pub content: Rope,
}

impl Document {
    pub fn new(content: &str) -> Self {
        Self {
            content: Rope::from_str(content),
        }
    }

    pub fn text(&self) -> String {
        self.content.to_string()
    }

    /// Byte offset of an LSP position, clamped to the document.
    ///
    /// `character` counts UTF-16 code units.
    pub fn offset(&self, position: Position) -> usize {
        let rope = &self.content;
        let line = (position.line as usize).min(rope.len_lines().saturating_sub(1));
        let line_start = rope.line_to_char(line);
        let line_end = line_start + rope.line(line).len_chars();
        let start_cu = rope.char_to_utf16_cu(line_start);
        let cu = (start_cu + position.character as usize).min(rope.char_to_utf16_cu(line_end));
        rope.char_to_byte(rope.utf16_cu_to_char(cu))
    }

    /// LSP position of a byte offset
    pub fn position(&self, offset: usize) -> Position {
        let rope = &self.content;
        let offset = offset.min(rope.len_bytes());
        let char_idx = rope.byte_to_char(offset);
        let line = rope.char_to_line(char_idx);
        let character =
            rope.char_to_utf16_cu(char_idx) - rope.char_to_utf16_cu(rope.line_to_char(line));
        Position::new(line as u32, character as u32)
    }
}

/// The PromQL Language Server
pub struct PromqlLanguageServer {
    client: Client,
    documents: DashMap<Url, Document>,
    capabilities: Arc<ServerCapabilities>,
    complete: Arc<dyn CompleteStrategy>,
    lint: Arc<dyn LintStrategy>,
}

impl PromqlLanguageServer {
    pub fn new(
        client: Client,
        complete: Arc<dyn CompleteStrategy>,
        lint: Arc<dyn LintStrategy>,
    ) -> Self {
        let capabilities = ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(true),
                    })),
                    ..Default::default()
                },
            )),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            completion_provider: Some(CompletionOptions {
                trigger_characters: Some(
                    ["{", "(", ",", "=", "[", " "].iter().map(|c| c.to_string()).collect(),
                ),
                resolve_provider: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };

        Self {
            client,
            documents: DashMap::new(),
            capabilities: Arc::new(capabilities),
            complete,
            lint,
        }
    }

    async fn publish(&self, uri: Url) {
        let Some(content) = self.documents.get(&uri).map(|doc| doc.text()) else {
            return;
        };
        let diagnostics = self.lint.promql(&content).await;
        let diagnostics: Vec<Diagnostic> = {
            let Some(doc) = self.documents.get(&uri) else {
                return;
            };
            diagnostics
                .iter()
                .map(|d| to_lsp_diagnostic(&doc, d))
                .collect()
        };
        self.client.publish_diagnostics(uri, diagnostics, None).await;
    }

    fn update(&self, uri: &Url, content: &str) {
        if let Some(mut doc) = self.documents.get_mut(uri) {
            doc.content = Rope::from_str(content);
        }
    }

    async fn get_completions(&self, uri: &Url, position: Position) -> Option<Vec<CompletionItem>> {
        let (text, pos) = {
            let doc = self.documents.get(uri)?;
            (doc.text(), doc.offset(position))
        };
        let result = self.complete.promql(&text, pos).await?;
        let doc = self.documents.get(uri)?;
        Some(completion_items(&doc, &result))
    }

    fn get_hover(&self, uri: &Url, position: Position) -> Option<Hover> {
        let doc = self.documents.get(uri)?;
        let text = doc.text();
        let offset = doc.offset(position);
        let (start, end) = word_at(&text, offset)?;
        let word = &text[start..end];

        let info = Function::from_name(word)
            .and_then(function_info)
            .or_else(|| Aggregator::from_name(word).and_then(aggregator_info))?;
        Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: format!("**{}**\n\n{}", word, info),
            }),
            range: Some(Range::new(doc.position(start), doc.position(end))),
        })
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for PromqlLanguageServer {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: (*self.capabilities).clone(),
            server_info: Some(ServerInfo {
                name: "promql-editor".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "PromQL language server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!(uri = %uri, "document opened");
        self.documents
            .insert(uri.clone(), Document::new(&params.text_document.text));
        self.publish(uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some(change) = params.content_changes.last() {
            self.update(&uri, &change.text);
            self.publish(uri).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some(content) = params.text {
            self.update(&uri, &content);
            self.publish(uri).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents.remove(&params.text_document.uri);
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        Ok(self.get_hover(&uri, position))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        Ok(self
            .get_completions(&uri, position)
            .await
            .map(CompletionResponse::Array))
    }
}

fn to_lsp_diagnostic(doc: &Document, diagnostic: &CheckDiagnostic) -> Diagnostic {
    let severity = match diagnostic.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
    };
    Diagnostic {
        range: Range::new(doc.position(diagnostic.from), doc.position(diagnostic.to)),
        severity: Some(severity),
        source: Some("promql".to_string()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}

fn completion_items(doc: &Document, result: &CompletionResult) -> Vec<CompletionItem> {
    let range = Range::new(doc.position(result.from), doc.position(result.to));
    result
        .options
        .iter()
        .map(|candidate| completion_item(candidate, range))
        .collect()
}

fn completion_item(candidate: &Candidate, range: Range) -> CompletionItem {
    let kind = candidate.kind.map(|kind| match kind {
        CandidateKind::Constant => CompletionItemKind::CONSTANT,
        CandidateKind::Function => CompletionItemKind::FUNCTION,
        CandidateKind::Keyword => CompletionItemKind::KEYWORD,
        CandidateKind::Text => CompletionItemKind::TEXT,
    });
    let apply = candidate.apply.as_deref().unwrap_or(&candidate.label);
    let (new_text, format) = if apply.contains("${") {
        (to_lsp_snippet(apply), InsertTextFormat::SNIPPET)
    } else {
        (apply.to_string(), InsertTextFormat::PLAIN_TEXT)
    };
    CompletionItem {
        label: candidate.label.clone(),
        kind,
        detail: candidate.detail.clone(),
        documentation: candidate.info.as_ref().map(|info| {
            Documentation::MarkupContent(MarkupContent {
                kind: MarkupKind::Markdown,
                value: info.clone(),
            })
        }),
        insert_text_format: Some(format),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit::new(range, new_text))),
        ..Default::default()
    }
}

/// `${name}` placeholders become numbered LSP tab stops
fn to_lsp_snippet(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut index = 1;
    while let Some(open) = rest.find("${") {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push_str(&format!("${{{}:{}}}", index, &rest[open + 2..open + close]));
        index += 1;
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

/// Byte range of the identifier touching `offset`
fn word_at(text: &str, offset: usize) -> Option<(usize, usize)> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == ':';
    let offset = offset.min(text.len());
    let start = text[..offset]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word(*c))
        .last()
        .map_or(offset, |(i, _)| i);
    let end = text[offset..]
        .char_indices()
        .find(|(_, c)| !is_word(*c))
        .map_or(text.len(), |(i, _)| offset + i);
    (start < end).then_some((start, end))
}

pub async fn run_server(complete: Arc<dyn CompleteStrategy>, lint: Arc<dyn LintStrategy>) {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = tower_lsp::LspService::new(move |client| {
        PromqlLanguageServer::new(client, complete, lint)
    });
    tower_lsp::Server::new(stdin, stdout, socket)
        .serve(service)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_offsets() {
        let doc = Document::new("sum(\n  rate(foo[5m])\n)");
        assert_eq!(doc.offset(Position::new(0, 0)), 0);
        assert_eq!(doc.offset(Position::new(1, 2)), 7);
        assert_eq!(doc.position(7), Position::new(1, 2));
        assert_eq!(doc.position(100), Position::new(2, 1));
    }

    #[test]
    fn test_positions_count_utf16_units() {
        // U+1F600 is two UTF-16 units and four bytes
        let doc = Document::new("{a=\"\u{1F600}\"} x");
        assert_eq!(doc.offset(Position::new(0, 6)), 8);
        assert_eq!(doc.offset(Position::new(0, 9)), 11);
        assert_eq!(doc.position(8), Position::new(0, 6));
        assert_eq!(doc.position(11), Position::new(0, 9));
    }

    #[test]
    fn test_offset_clamps_past_line_end() {
        let doc = Document::new("up");
        assert_eq!(doc.offset(Position::new(0, 10)), 2);
        assert_eq!(doc.offset(Position::new(4, 0)), 0);
    }

    #[test]
    fn test_snippet_placeholders() {
        assert_eq!(
            to_lsp_snippet("sum(rate(${metric}[${range}]))"),
            "sum(rate(${1:metric}[${2:range}]))"
        );
        assert_eq!(to_lsp_snippet("up"), "up");
    }

    #[test]
    fn test_word_at() {
        let text = "sum(rate(foo[5m]))";
        assert_eq!(word_at(text, 6), Some((4, 8)));
        assert_eq!(word_at(text, 4), Some((4, 8)));
        assert_eq!(word_at(text, 8), Some((4, 8)));
        assert_eq!(word_at("(", 0), None);
    }

    #[test]
    fn test_completion_item_edit() {
        let candidate = Candidate::function("rate", Some("per-second rate"));
        let range = Range::new(Position::new(0, 0), Position::new(0, 2));
        let item = completion_item(&candidate, range);
        assert_eq!(item.kind, Some(CompletionItemKind::FUNCTION));
        match item.text_edit {
            Some(CompletionTextEdit::Edit(edit)) => {
                assert_eq!(edit.new_text, "rate");
                assert_eq!(edit.range, range);
            }
            other => panic!("unexpected edit {:?}", other),
        }
    }

    #[test]
    fn test_diagnostic_range() {
        let doc = Document::new("foo and\n 1");
        let diagnostic = CheckDiagnostic {
            from: 0,
            to: 10,
            severity: Severity::Error,
            message: "set operator not allowed in binary scalar expression".to_string(),
        };
        let lsp = to_lsp_diagnostic(&doc, &diagnostic);
        assert_eq!(lsp.range, Range::new(Position::new(0, 0), Position::new(1, 2)));
        assert_eq!(lsp.severity, Some(DiagnosticSeverity::ERROR));
    }
}
