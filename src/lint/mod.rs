//! Linting strategies.
//!
//! [`HybridLint`] runs the local parser and type checker. [`LspLint`] sends
//! the expression to a remote language server and maps its line/character
//! ranges back to byte offsets.

use async_trait::async_trait;

use crate::complete::CompleteConfiguration;
use crate::errors::PromqlResult;
use crate::parser::parse;
use crate::typechecker::{check, Diagnostic};

/// A way of producing diagnostics for an expression
#[async_trait]
pub trait LintStrategy: Send + Sync {
    /// Diagnostics for `text`, sorted by `from`
    async fn promql(&self, text: &str) -> Vec<Diagnostic>;
}

/// Local type checking
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridLint;

impl HybridLint {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LintStrategy for HybridLint {
    async fn promql(&self, text: &str) -> Vec<Diagnostic> {
        let diagnostics = check(&parse(text));
        tracing::debug!(count = diagnostics.len(), "expression checked");
        diagnostics
    }
}

#[cfg(feature = "http")]
pub use remote::LspLint;

#[cfg(feature = "http")]
mod remote {
    use async_trait::async_trait;

    use super::LintStrategy;
    use crate::client::{LspBody, LspClient, LspDiagnostic};
    use crate::complete::lsp::line_offset;
    use crate::typechecker::{Diagnostic, Severity};

    /// Diagnostics from a remote language server
    pub struct LspLint {
        client: LspClient,
        limit: usize,
    }

    impl LspLint {
        pub fn new(client: LspClient, limit: usize) -> Self {
            Self { client, limit }
        }
    }

    pub(super) fn to_diagnostic(text: &str, diagnostic: LspDiagnostic) -> Diagnostic {
        let offset = |line: usize, character: usize| {
            (line_offset(text, line) + character).min(text.len())
        };
        let start = diagnostic.range.start;
        let end = diagnostic.range.end;
        let from = offset(start.line, start.character);
        Diagnostic {
            from,
            to: offset(end.line, end.character).max(from),
            severity: Severity::Error,
            message: diagnostic.message,
        }
    }

    #[async_trait]
    impl LintStrategy for LspLint {
        async fn promql(&self, text: &str) -> Vec<Diagnostic> {
            let body = LspBody {
                expr: text.to_string(),
                limit: self.limit,
                position_line: None,
                position_char: None,
            };
            match self.client.diagnostic(&body).await {
                Ok(items) => {
                    let mut diagnostics: Vec<Diagnostic> =
                        items.into_iter().map(|d| to_diagnostic(text, d)).collect();
                    diagnostics.sort_by_key(|d| d.from);
                    diagnostics
                }
                Err(err) => {
                    tracing::warn!(error = %err.message(), "language server diagnostics failed");
                    Vec::new()
                }
            }
        }
    }
}

/// Pick the lint strategy described by `conf`
pub fn new_lint_strategy(conf: &CompleteConfiguration) -> PromqlResult<Box<dyn LintStrategy>> {
    if conf.enable_lsp {
        return new_lsp_lint(conf);
    }
    Ok(Box::new(HybridLint::new()))
}

#[cfg(feature = "http")]
fn new_lsp_lint(conf: &CompleteConfiguration) -> PromqlResult<Box<dyn LintStrategy>> {
    let client = crate::client::LspClient::new(conf.require_url()?);
    Ok(Box::new(LspLint::new(client, conf.limit)))
}

#[cfg(not(feature = "http"))]
fn new_lsp_lint(_conf: &CompleteConfiguration) -> PromqlResult<Box<dyn LintStrategy>> {
    Err(crate::errors::PromqlError::config(
        "the language server strategy needs HTTP support",
        "rebuild with the `http` feature",
    ))
}
