//! Completion context analysis.
//!
//! [`analyze`] looks at the node under the cursor and its surroundings and
//! returns every [`Context`] that could apply there. Half-typed input is the
//! normal case, so most rules look at `Error` nodes and at what precedes
//! them.

use crate::parser::{
    retrieve_all_recursive_nodes, walk_backward, walk_through, Aggregator, Node, NodeKind, Side,
    SyntaxTree,
};
use crate::typechecker::build_label_matchers;

use super::{Context, ContextKind};

/// Completion contexts for the cursor at `pos`
pub fn analyze(tree: &SyntaxTree, pos: usize) -> Vec<Context> {
    let node = tree.resolve(pos, Side::Before);
    let contexts = analyze_node(node, pos);
    tracing::debug!(
        node = %node.kind(),
        pos,
        contexts = ?contexts.iter().map(|c| c.kind).collect::<Vec<_>>(),
        "analyzed completion position"
    );
    contexts
}

/// Completion contexts for the already resolved `node`
pub fn analyze_node(node: Node<'_>, pos: usize) -> Vec<Context> {
    use ContextKind::*;

    let parent = node.parent().map(|p| p.kind());
    match node.kind() {
        NodeKind::PromQL => after_expression(node, pos)
            .map(continuation)
            .unwrap_or_else(expression_start),

        NodeKind::Identifier => match parent {
            Some(NodeKind::Error) => erroring_identifier(node),
            Some(NodeKind::MetricIdentifier) => metric_identifier(node),
            Some(NodeKind::FunctionIdentifier) => contexts(&[Function]),
            _ => Vec::new(),
        },
        NodeKind::Function(_) => contexts(&[Function]),
        NodeKind::Aggregator(_) => contexts(&[Aggregation]),

        NodeKind::GroupingLabels => contexts(&[LabelName]),
        NodeKind::LabelName => match parent {
            Some(NodeKind::GroupingLabel) => contexts(&[LabelName]),
            Some(NodeKind::LabelMatcher) => {
                vec![Context::new(LabelName).with_metric_name(metric_name_of(node))]
            }
            _ => Vec::new(),
        },
        NodeKind::LabelMatchers => {
            vec![Context::new(LabelName).with_metric_name(metric_name_of(node))]
        }
        NodeKind::StringLiteral if parent == Some(NodeKind::LabelMatcher) => label_value(node),

        NodeKind::MatchOp | NodeKind::Match(_) => contexts(&[MatchOp]),
        NodeKind::Operator(_) => contexts(&[BinOp]),

        NodeKind::Error => match parent {
            Some(NodeKind::LabelMatcher) => contexts(&[MatchOp]),
            Some(NodeKind::OffsetExpr | NodeKind::MatrixSelector | NodeKind::SubqueryExpr) => {
                contexts(&[Duration])
            }
            _ if preceding_expression(node).is_some() => contexts(&[BinOp]),
            _ => Vec::new(),
        },

        NodeKind::Duration | NodeKind::OffsetExpr => contexts(&[Duration]),
        NodeKind::MatrixSelector | NodeKind::SubqueryExpr => {
            if pos == node.end() && node.text().ends_with(']') {
                continuation(node)
            } else {
                contexts(&[Duration])
            }
        }
        NodeKind::Offset => contexts(&[Offset]),

        NodeKind::By | NodeKind::Without | NodeKind::AggregateModifier => {
            contexts(&[AggregateOpModifier])
        }
        NodeKind::On
        | NodeKind::Ignoring
        | NodeKind::GroupLeft
        | NodeKind::GroupRight
        | NodeKind::Bool
        | NodeKind::BinModifiers => contexts(&[BinOpModifier]),

        NodeKind::BinaryExpr if node.last_child().is_some_and(|n| n.kind().is_error()) => {
            contexts(&[MetricName, Function, Aggregation, BinOpModifier])
        }
        NodeKind::ParenExpr | NodeKind::FunctionCallBody => after_expression(node, pos)
            .map(continuation)
            .unwrap_or_else(expression_start),

        _ => Vec::new(),
    }
}

/// Where the text to replace starts for a completion at `pos` in `node`
pub fn compute_replacement_start(node: Node<'_>, pos: usize) -> usize {
    let parent = node.parent().map(|p| p.kind());
    match node.kind() {
        NodeKind::LabelMatchers | NodeKind::GroupingLabels | NodeKind::FunctionCallBody => {
            if node.child_count() == 0 {
                // keep the opening bracket
                node.start() + 1
            } else {
                pos
            }
        }
        NodeKind::StringLiteral if parent == Some(NodeKind::LabelMatcher) => node.start() + 1,
        NodeKind::OffsetExpr
        | NodeKind::Duration
        | NodeKind::MatrixSelector
        | NodeKind::SubqueryExpr
        | NodeKind::PromQL
        | NodeKind::BinaryExpr
        | NodeKind::ParenExpr => pos,
        NodeKind::Error
            if matches!(
                parent,
                Some(NodeKind::OffsetExpr | NodeKind::MatrixSelector | NodeKind::SubqueryExpr)
            ) =>
        {
            pos
        }
        _ => node.start(),
    }
}

fn contexts(kinds: &[ContextKind]) -> Vec<Context> {
    kinds.iter().map(|&kind| Context::new(kind)).collect()
}

/// Nothing typed yet: any expression may start here
fn expression_start() -> Vec<Context> {
    contexts(&[
        ContextKind::MetricName,
        ContextKind::Function,
        ContextKind::Aggregation,
    ])
}

/// After a complete expression: an operator, or `offset` for selectors
fn continuation(expr: Node<'_>) -> Vec<Context> {
    let mut result = contexts(&[ContextKind::BinOp]);
    if accepts_offset(expr) {
        result.push(Context::new(ContextKind::Offset));
    }
    result
}

/// Whether `offset` may follow `expr`
fn accepts_offset(expr: Node<'_>) -> bool {
    let inner = if expr.is(NodeKind::Expr) {
        expr.first_child()
    } else {
        Some(expr)
    };
    matches!(
        inner.map(|n| n.kind()),
        Some(NodeKind::VectorSelector | NodeKind::MatrixSelector | NodeKind::SubqueryExpr)
    )
}

/// The last expression child of `node` when only blanks separate it from
/// `pos`
fn after_expression(node: Node<'_>, pos: usize) -> Option<Node<'_>> {
    let last = node.children().rev().find(|child| child.end() <= pos)?;
    let expr = match last.kind() {
        NodeKind::Expr => last,
        NodeKind::FunctionCallArgs => last.last_child().filter(|n| n.is(NodeKind::Expr))?,
        _ => return None,
    };
    let gap = node.tree().text().get(expr.end()..pos)?;
    if gap.trim().is_empty() {
        Some(expr)
    } else {
        None
    }
}

/// The expression an error node follows, if any
fn preceding_expression(error: Node<'_>) -> Option<Node<'_>> {
    let prev = error.prev_sibling()?;
    match prev.kind() {
        NodeKind::Expr => Some(prev),
        NodeKind::FunctionCallArgs => prev.last_child().filter(|n| n.is(NodeKind::Expr)),
        _ => None,
    }
}

/// An identifier the parser could not attach, such as `metric_name unle`
fn erroring_identifier(identifier: Node<'_>) -> Vec<Context> {
    use ContextKind::*;

    let Some(error) = identifier.parent() else {
        return Vec::new();
    };
    if error.parent().is_some_and(|p| p.is(NodeKind::AggregateExpr)) {
        // `sum() b`: the start of `by`/`without`, or of an operator
        return contexts(&[AggregateOpModifier, BinOp]);
    }

    let Some(prev) = preceding_expression(error) else {
        return Vec::new();
    };
    let mut result = Vec::new();
    if bare_aggregator_name(prev) {
        // `sum b`: the modifier comes before the body
        result.push(Context::new(AggregateOpModifier));
    }
    result.extend(continuation(prev));
    result
}

/// Whether `expr` is a bare selector spelled like an aggregator (`sum`)
fn bare_aggregator_name(expr: Node<'_>) -> bool {
    let Some(selector) = expr.first_child().filter(|n| n.is(NodeKind::VectorSelector)) else {
        return false;
    };
    selector.child_count() == 1
        && walk_through(selector, &[NodeKind::MetricIdentifier, NodeKind::Identifier])
            .found()
            .is_some_and(|ident| Aggregator::from_name(ident.text()).is_some())
}

fn metric_identifier(identifier: Node<'_>) -> Vec<Context> {
    use ContextKind::*;

    let prefix = Some(identifier.text().to_string());
    let mut result = vec![
        Context::new(MetricName).with_metric_name(prefix),
        Context::new(Function),
        Context::new(Aggregation),
    ];

    // Identifier > MetricIdentifier > VectorSelector > Expr > BinaryExpr
    let binary = identifier
        .ancestor(4)
        .filter(|n| n.is(NodeKind::BinaryExpr));
    if let Some(binary) = binary {
        let has_error = binary.children().any(|n| n.kind().is_error());
        let in_rhs = binary
            .last_child()
            .is_some_and(|rhs| rhs.start() <= identifier.start() && identifier.end() <= rhs.end());
        if !has_error && in_rhs {
            // `metric_name / ignor`
            result.push(Context::new(BinOpModifier));
        }
    }
    result
}

/// Metric name of the selector enclosing `node`
fn metric_name_of(node: Node<'_>) -> Option<String> {
    let selector = walk_backward(node, NodeKind::VectorSelector)?;
    walk_through(selector, &[NodeKind::MetricIdentifier, NodeKind::Identifier])
        .found()
        .map(|ident| ident.text().to_string())
}

fn label_value(literal: Node<'_>) -> Vec<Context> {
    let Some(matcher) = literal.parent() else {
        return Vec::new();
    };
    let label_name = matcher
        .child(NodeKind::LabelName)
        .map(|n| n.text().to_string());

    let list = walk_backward(matcher, NodeKind::LabelMatchers)
        .and_then(|matchers| walk_through(matchers, &[NodeKind::LabelMatchList]).found());
    let siblings: Vec<_> =
        retrieve_all_recursive_nodes(list, NodeKind::LabelMatchList, NodeKind::LabelMatcher)
            .into_iter()
            .filter(|m| *m != matcher)
            .collect();

    vec![Context::new(ContextKind::LabelValue)
        .with_metric_name(metric_name_of(matcher))
        .with_label_name(label_name)
        .with_matchers(build_label_matchers(&siblings))]
}
