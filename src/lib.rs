// Rust 1.93+ triggers false positives on thiserror/miette derive macro fields
#![allow(unused_assignments)]

//! PromQL editor support
//!
//! Parses PromQL into an error-tolerant syntax tree, type checks it, and
//! computes context-aware completions. Metric and label names come from a
//! Prometheus server through a cached [`MetadataClient`]; the same features
//! are served to editors by a Language Server Protocol implementation.
//!
//! # Example
//!
//! ```
//! use promql_editor::{check, parse};
//!
//! let diagnostics = check(&parse("foo and 1"));
//! assert_eq!(
//!     diagnostics[0].message,
//!     "set operator not allowed in binary scalar expression"
//! );
//! ```

pub mod client;
pub mod complete;
pub mod config;
pub mod errors;
pub mod lexer;
pub mod lint;
pub mod logging;
#[cfg(feature = "lsp")]
pub mod lsp;
pub mod parser;
pub mod typechecker;

pub use client::{CachedMetadataClient, MetadataClient, MetadataMap, MetricMetadata};
pub use complete::{
    analyze, compute_replacement_start, new_complete_strategy, Candidate, CandidateKind,
    CompleteConfiguration, CompleteStrategy, CompletionResult, Context, ContextKind,
    HybridComplete,
};
pub use config::Config;
pub use errors::{PromqlError, PromqlResult};
pub use lexer::token::{Token, TokenKind};
pub use lexer::Lexer;
pub use lint::{new_lint_strategy, HybridLint, LintStrategy};
pub use logging::init_logger;
pub use parser::{parse, Node, NodeKind, Side, SyntaxTree};
pub use typechecker::{check, Diagnostic, Matcher, Severity, ValueType};
