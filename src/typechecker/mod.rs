//! Type checker for PromQL expressions
//!
//! Walks a parsed [`SyntaxTree`] and reports semantic problems: operand
//! types that do not fit an operator or a function, invalid vector matching,
//! selectors that would match every series, and input the parser could not
//! place. The checker never fails; it only collects [`Diagnostic`]s.

mod matcher;
mod types;
mod vector;

pub use matcher::{build_label_matchers, raw_value, unquote, Matcher};
pub use types::{get_type, signature, FunctionSignature, ValueType};
pub use vector::{build_vector_matching, grouping_labels, VectorMatchCardinality, VectorMatching};

use serde::{Deserialize, Serialize};

use crate::parser::{
    retrieve_all_recursive_nodes, walk_through, Aggregator, MatchOp, Node, NodeKind, Side,
    SyntaxTree,
};

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A problem found in an expression, over the byte range `[from, to)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub from: usize,
    pub to: usize,
    pub severity: Severity,
    pub message: String,
}

/// Check a parsed expression; diagnostics come back sorted by `from`
pub fn check(tree: &SyntaxTree) -> Vec<Diagnostic> {
    let mut checker = TypeChecker::new(tree);
    checker.check_ast(tree.root().first_child());
    checker.diagnose_error_nodes();
    checker.into_diagnostics()
}

/// Type checker over one syntax tree
struct TypeChecker<'t> {
    tree: &'t SyntaxTree,
    diagnostics: Vec<Diagnostic>,
}

impl<'t> TypeChecker<'t> {
    fn new(tree: &'t SyntaxTree) -> Self {
        Self {
            tree,
            diagnostics: Vec::new(),
        }
    }

    fn into_diagnostics(mut self) -> Vec<Diagnostic> {
        // stable: diagnostics on the same node keep their emission order
        self.diagnostics.sort_by_key(|d| d.from);
        self.diagnostics
    }

    /// Report every error node the parser produced before the end of input.
    ///
    /// An error at the very end usually means the user is still typing, and
    /// the structural checks already say more about it.
    fn diagnose_error_nodes(&mut self) {
        for node in self.tree.descendants() {
            if node.kind().is_error() && node.end() != self.tree.len() {
                let enclosing = self.tree.resolve(node.start(), Side::Before);
                self.add_diagnostic(enclosing, "unexpected expression");
            }
        }
    }

    /// Check a node and return its type
    fn check_ast(&mut self, node: Option<Node<'t>>) -> ValueType {
        let Some(node) = node else {
            return ValueType::None;
        };

        match node.kind() {
            NodeKind::Expr => return self.check_ast(node.first_child()),
            NodeKind::AggregateExpr => self.check_aggregation_expr(node),
            NodeKind::BinaryExpr => self.check_binary_expr(node),
            NodeKind::FunctionCall => self.check_call_function(node),
            NodeKind::ParenExpr | NodeKind::MatrixSelector | NodeKind::OffsetExpr => {
                self.check_ast(walk_through(node, &[NodeKind::Expr]).found());
            }
            NodeKind::UnaryExpr => {
                let t = self.check_ast(walk_through(node, &[NodeKind::Expr]).found());
                if t != ValueType::Scalar && t != ValueType::Vector {
                    self.add_diagnostic(
                        node,
                        format!(
                            "unary expression only allowed on expressions of type scalar or instant vector, got {}",
                            t
                        ),
                    );
                }
            }
            NodeKind::SubqueryExpr => {
                let t = self.check_ast(walk_through(node, &[NodeKind::Expr]).found());
                if t != ValueType::Vector {
                    self.add_diagnostic(
                        node,
                        format!(
                            "subquery is only allowed on instant vector, got {} in {} instead",
                            t,
                            node.kind()
                        ),
                    );
                }
            }
            NodeKind::VectorSelector => self.check_vector_selector(node),
            _ => {}
        }

        get_type(Some(node))
    }

    fn check_aggregation_expr(&mut self, node: Node<'t>) {
        let Some(op) = node.first_child().and_then(|op| op.first_child()) else {
            self.add_diagnostic(
                node,
                "aggregation operator expected in aggregation expression but got nothing",
            );
            return;
        };

        let expr = walk_through(
            node,
            &[
                NodeKind::FunctionCallBody,
                NodeKind::FunctionCallArgs,
                NodeKind::Expr,
            ],
        );
        let Some(expr) = expr.found() else {
            self.add_diagnostic(node, "unable to find the parameter for the expression");
            return;
        };
        self.expect_type(expr, ValueType::Vector, "aggregation expression");

        let want = match op.kind() {
            NodeKind::Aggregator(Aggregator::Topk)
            | NodeKind::Aggregator(Aggregator::Bottomk)
            | NodeKind::Aggregator(Aggregator::Quantile) => ValueType::Scalar,
            NodeKind::Aggregator(Aggregator::CountValues) => ValueType::String,
            _ => return,
        };
        let param = walk_through(
            node,
            &[
                NodeKind::FunctionCallBody,
                NodeKind::FunctionCallArgs,
                NodeKind::FunctionCallArgs,
                NodeKind::Expr,
            ],
        );
        match param.found() {
            Some(param) => self.expect_type(param, want, "aggregation parameter"),
            None => self.add_diagnostic(node, "no parameter found"),
        }
    }

    fn check_binary_expr(&mut self, node: Node<'t>) {
        let (Some(lhs), Some(rhs)) = (node.first_child(), node.last_child()) else {
            self.add_diagnostic(node, "left or right expression is missing in binary expression");
            return;
        };
        let lt = self.check_ast(Some(lhs));
        let rt = self.check_ast(Some(rhs));

        let op = node.children().find_map(|child| match child.kind() {
            NodeKind::Operator(op) => Some(op),
            _ => None,
        });
        let is_comparison = op.is_some_and(|op| op.is_comparison());
        let is_set_operator = op.is_some_and(|op| op.is_set_operator());
        let bool_used = walk_through(node, &[NodeKind::BinModifiers, NodeKind::Bool]).is_found();

        if bool_used {
            if !is_comparison {
                self.add_diagnostic(node, "bool modifier can only be used on comparison operators");
            }
        } else if is_comparison && lt == ValueType::Scalar && rt == ValueType::Scalar {
            self.add_diagnostic(node, "comparisons between scalars must use BOOL modifier");
        }

        let matching = build_vector_matching(node);
        if let Some(matching) = matching.as_ref().filter(|m| m.on) {
            for l1 in &matching.matching_labels {
                for l2 in &matching.include {
                    if l1 == l2 {
                        self.add_diagnostic(
                            node,
                            format!("label \"{}\" must not occur in ON and GROUP clause at once", l1),
                        );
                    }
                }
            }
        }

        if lt != ValueType::Scalar && lt != ValueType::Vector {
            self.add_diagnostic(lhs, "binary expression must contain only scalar and instant vector types");
        }
        if rt != ValueType::Scalar && rt != ValueType::Vector {
            self.add_diagnostic(rhs, "binary expression must contain only scalar and instant vector types");
        }

        let card = matching.as_ref().map(|m| m.card);
        match matching {
            Some(matching) if lt != ValueType::Vector || rt != ValueType::Vector => {
                if !matching.matching_labels.is_empty() {
                    self.add_diagnostic(node, "vector matching only allowed between instant vectors");
                }
            }
            _ if is_set_operator => {
                if matches!(
                    card,
                    Some(VectorMatchCardinality::OneToMany | VectorMatchCardinality::ManyToOne)
                ) {
                    self.add_diagnostic(node, "no grouping allowed for set operations");
                }
                if card != Some(VectorMatchCardinality::ManyToMany) {
                    self.add_diagnostic(node, "set operations must always be many-to-many");
                }
            }
            _ => {}
        }

        if (lt == ValueType::Scalar || rt == ValueType::Scalar) && is_set_operator {
            self.add_diagnostic(node, "set operator not allowed in binary scalar expression");
        }
    }

    fn check_call_function(&mut self, node: Node<'t>) {
        let Some(func_id) = node.first_child().and_then(|id| id.first_child()) else {
            self.add_diagnostic(node, "function not defined");
            return;
        };
        // an unknown function has no signature to check against
        let NodeKind::Function(func) = func_id.kind() else {
            return;
        };

        let args = retrieve_all_recursive_nodes(
            walk_through(node, &[NodeKind::FunctionCallBody]).found(),
            NodeKind::FunctionCallArgs,
            NodeKind::Expr,
        );
        let sig = signature(func);
        let nargs = sig.arg_types.len();

        if sig.variadic == 0 {
            if args.len() != nargs {
                self.add_diagnostic(
                    node,
                    format!(
                        "expected {} argument(s) in call to {}, got {}",
                        nargs,
                        sig.name,
                        args.len()
                    ),
                );
            }
        } else {
            let na = nargs.saturating_sub(1);
            if na > args.len() {
                self.add_diagnostic(
                    node,
                    format!(
                        "expected at least {} argument(s) in call to {}, got {}",
                        na,
                        sig.name,
                        args.len()
                    ),
                );
            } else if sig.variadic > 0 {
                let nargs_max = na + sig.variadic as usize;
                if nargs_max < args.len() {
                    self.add_diagnostic(
                        node,
                        format!(
                            "expected at most {} argument(s) in call to {}, got {}",
                            nargs_max,
                            sig.name,
                            args.len()
                        ),
                    );
                }
            }
        }

        let context = format!("call to function {}", sig.name);
        for (i, arg) in args.into_iter().enumerate() {
            let want = match sig.arg_types.get(i) {
                Some(want) => *want,
                None if sig.variadic == 0 => break,
                None => match sig.arg_types.last() {
                    Some(last) => *last,
                    None => break,
                },
            };
            self.expect_type(arg, want, &context);
        }
    }

    fn check_vector_selector(&mut self, node: Node<'t>) {
        let list = walk_through(node, &[NodeKind::LabelMatchers, NodeKind::LabelMatchList]).found();
        let nodes =
            retrieve_all_recursive_nodes(list, NodeKind::LabelMatchList, NodeKind::LabelMatcher);
        let mut matchers = build_label_matchers(&nodes);

        let name = walk_through(node, &[NodeKind::MetricIdentifier, NodeKind::Identifier])
            .found()
            .map(|ident| ident.text())
            .unwrap_or_default();
        if !name.is_empty() {
            if let Some(i) = matchers.iter().position(|m| m.name == "__name__") {
                let message = format!(
                    "metric name must not be set twice: {} or {}",
                    name,
                    raw_value(nodes[i])
                );
                self.add_diagnostic(node, message);
            }
            // `foo{bar=""}` is fine: the bare name is a non-empty matcher
            matchers.push(Matcher::new(MatchOp::EqlSingle, "__name__", name));
        }

        if !has_non_empty_matcher(&matchers) {
            self.add_diagnostic(node, "vector selector must contain at least one non-empty matcher");
        }
    }

    fn expect_type(&mut self, node: Node<'t>, want: ValueType, context: &str) {
        let t = self.check_ast(Some(node));
        if t != want {
            self.add_diagnostic(
                node,
                format!("expected type {} in {}, got {}", want, context, t),
            );
        }
    }

    fn add_diagnostic(&mut self, node: Node<'_>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            from: node.start(),
            to: node.end(),
            severity: Severity::Error,
            message: message.into(),
        });
    }
}

/// Whether the matcher list of a selector can select anything at all
pub fn has_non_empty_matcher(matchers: &[Matcher]) -> bool {
    !matchers.iter().all(|m| m.matches_empty())
}
