//! Error types and result aliases.
//!
//! All user-facing errors are variants of [`PromqlError`], rendered via `miette` diagnostics.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::typechecker::Diagnostic as CheckDiagnostic;

/// Main error type
#[derive(Error, Debug, Diagnostic)]
pub enum PromqlError {
    #[error("{message}")]
    #[diagnostic(code(E0001))]
    InvalidExpression {
        #[source_code]
        src: String,
        #[label("{message}")]
        span: SourceSpan,
        message: String,
    },

    #[error("invalid expression ({count} error{s})")]
    #[diagnostic(code(E0001), help("fix all problems listed below"))]
    InvalidExpressions {
        #[source_code]
        src: String,
        #[label("in this expression")]
        span: SourceSpan,
        count: usize,
        s: String,
        #[related]
        errors: Vec<PromqlError>,
    },

    #[error("request to {url} failed")]
    #[diagnostic(code(E0101), help("{message}"))]
    Http { url: String, message: String },

    #[error("server answered with an error: {message}")]
    #[diagnostic(code(E0102), help("error type: {error_type}"))]
    ApiStatus { error_type: String, message: String },

    #[error("unexpected response from {url}")]
    #[diagnostic(code(E0103), help("{message}"))]
    Decode { url: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(E0201), help("{help}"))]
    Config { message: String, help: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

impl PromqlError {
    /// Turn checker diagnostics into a single reportable error, if there are any
    pub fn from_diagnostics(src: &str, diagnostics: &[CheckDiagnostic]) -> Option<Self> {
        let mut errors: Vec<PromqlError> = diagnostics
            .iter()
            .map(|d| PromqlError::InvalidExpression {
                src: src.to_string(),
                span: (d.from, d.to.saturating_sub(d.from)).into(),
                message: d.message.clone(),
            })
            .collect();

        match errors.len() {
            0 => None,
            1 => errors.pop(),
            count => Some(PromqlError::InvalidExpressions {
                src: src.to_string(),
                span: (0, src.len()).into(),
                count,
                s: "s".to_string(),
                errors,
            }),
        }
    }

    pub fn http(url: impl Into<String>, message: impl Into<String>) -> Self {
        PromqlError::Http {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn api_status(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        PromqlError::ApiStatus {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        PromqlError::Decode {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        PromqlError::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create an IoError
    pub fn io_error(message: impl Into<String>) -> Self {
        PromqlError::IoError {
            message: message.into(),
        }
    }

    /// Get the span (start, end) for this error, if it has one
    pub fn span(&self) -> Option<Span> {
        match self {
            PromqlError::InvalidExpression { span, .. } => Some(Span::from(*span)),
            PromqlError::InvalidExpressions { span, .. } => Some(Span::from(*span)),
            _ => None,
        }
    }

    /// Get a simple error message (without source context)
    pub fn message(&self) -> String {
        match self {
            PromqlError::InvalidExpression { message, .. } => message.clone(),
            PromqlError::InvalidExpressions { errors, .. } => {
                let msgs: Vec<String> = errors.iter().map(|e| e.message()).collect();
                msgs.join("; ")
            }
            PromqlError::Http { url, message } => format!("request to {} failed: {}", url, message),
            PromqlError::ApiStatus { message, .. } => message.clone(),
            PromqlError::Decode { url, message } => {
                format!("unexpected response from {}: {}", url, message)
            }
            PromqlError::Config { message, .. } => format!("invalid configuration: {}", message),
            PromqlError::IoError { message } => format!("I/O error: {}", message),
        }
    }
}

/// Simple span type (offset, length) -> (start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl From<SourceSpan> for Span {
    fn from(span: SourceSpan) -> Self {
        Self {
            start: span.offset(),
            end: span.offset() + span.len(),
        }
    }
}

/// Result type for fallible operations
pub type PromqlResult<T> = Result<T, PromqlError>;
