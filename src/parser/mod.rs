//! Parser for PromQL expressions
//!
//! This module implements an error-tolerant recursive descent parser with
//! precedence climbing for binary operators. Instead of failing on bad
//! input it records `Error` nodes in the tree: unplaceable tokens become
//! error nodes covering them, and missing pieces become zero-width error
//! nodes at the position where they were expected. This is what lets the
//! completion analyzer reason about half-typed expressions.

pub mod kind;
pub mod path;
pub mod tree;

pub use kind::{Aggregator, BinaryOp, Function, MatchOp, NodeKind};
pub use path::{
    contains_at_least_one_child, contains_child, retrieve_all_recursive_nodes, walk_backward,
    walk_through, PathResult,
};
pub use tree::{Node, Side, SyntaxTree};

use crate::lexer::token::{Token, TokenKind};
use crate::lexer::Lexer;
use tree::{NodeId, TreeBuilder};

/// Maximum parse recursion depth before the parser gives up on the
/// remaining input and turns it into a single error node.
const MAX_PARSE_DEPTH: usize = 128;

/// Parse an expression into a syntax tree. Never fails.
pub fn parse(source: &str) -> SyntaxTree {
    let tokens = Lexer::new(source).tokenize();
    Parser::new(tokens, source).parse()
}

/// Parser for PromQL source code
pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
    /// Current recursion depth
    depth: usize,
    builder: TreeBuilder,
}

impl<'a> Parser<'a> {
    /// Create a new parser from a token stream ending in `Eof`
    pub fn new(tokens: Vec<Token>, source: &'a str) -> Self {
        let mut tokens = tokens;
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let end = source.len();
            tokens.push(Token::new(
                TokenKind::Eof,
                crate::lexer::token::SourceLocation::new(end, 0),
            ));
        }
        Self {
            tokens,
            pos: 0,
            source,
            depth: 0,
            builder: TreeBuilder::new(),
        }
    }

    /// Parse the whole input
    pub fn parse(mut self) -> SyntaxTree {
        let mut children = Vec::new();
        if self.starts_expr() {
            children.push(self.parse_expr(0));
        }
        // Anything left over could not be attached to the expression
        while !self.is_at_end() {
            children.push(self.error_token());
        }
        let root = self
            .builder
            .node(NodeKind::PromQL, 0, self.source.len(), children);
        self.builder.finish(self.source.to_string(), root)
    }

    /// Parse an expression whose binary operators bind at least `min_prec`
    fn parse_expr(&mut self, min_prec: u8) -> NodeId {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            let node = self.swallow_rest();
            self.depth -= 1;
            return node;
        }
        let result = self.parse_binary(min_prec);
        self.depth -= 1;
        result
    }

    /// Precedence climbing over binary operators
    fn parse_binary(&mut self, min_prec: u8) -> NodeId {
        let mut lhs = self.parse_unary();

        while let Some(op) = self.current_binary_op() {
            if op.precedence() < min_prec {
                break;
            }
            let token = self.current().clone();
            self.advance();

            let mut children = vec![
                lhs,
                self.builder
                    .leaf(NodeKind::Operator(op), token.start(), token.end()),
            ];
            if let Some(modifiers) = self.parse_bin_modifiers() {
                children.push(modifiers);
            }

            let next_min = if op.is_right_associative() {
                op.precedence()
            } else {
                op.precedence() + 1
            };
            let rhs = if self.starts_expr() {
                self.parse_expr(next_min)
            } else {
                self.missing()
            };
            children.push(rhs);

            let start = self.builder.start_of(lhs);
            let binary = self.builder.node(NodeKind::BinaryExpr, start, start, children);
            lhs = self.wrap_expr(binary);
        }

        lhs
    }

    /// Parse `bool`, `on(...)`/`ignoring(...)` and `group_left/right(...)`
    fn parse_bin_modifiers(&mut self) -> Option<NodeId> {
        let mut children = Vec::new();

        if self.current().is_keyword("bool") {
            children.push(self.token_leaf(NodeKind::Bool));
        }

        let matching = if self.current().is_keyword("on") {
            Some(NodeKind::On)
        } else if self.current().is_keyword("ignoring") {
            Some(NodeKind::Ignoring)
        } else {
            None
        };
        if let Some(kind) = matching {
            children.push(self.token_leaf(kind));
            if self.check(&TokenKind::LeftParen) {
                children.push(self.parse_grouping_labels());
            } else {
                children.push(self.missing());
            }

            let group = if self.current().is_keyword("group_left") {
                Some(NodeKind::GroupLeft)
            } else if self.current().is_keyword("group_right") {
                Some(NodeKind::GroupRight)
            } else {
                None
            };
            if let Some(kind) = group {
                children.push(self.token_leaf(kind));
                if self.check(&TokenKind::LeftParen) {
                    children.push(self.parse_grouping_labels());
                }
            }
        }

        if children.is_empty() {
            return None;
        }
        let start = self.builder.start_of(children[0]);
        Some(self.builder.node(NodeKind::BinModifiers, start, start, children))
    }

    /// Parse a unary `-`/`+`; it binds looser than `^` only
    fn parse_unary(&mut self) -> NodeId {
        if !matches!(self.current().kind, TokenKind::Plus | TokenKind::Minus) {
            return self.parse_postfix();
        }
        let token = self.current().clone();
        self.advance();
        let op = self
            .builder
            .leaf(NodeKind::UnaryOp, token.start(), token.end());
        let operand = if self.starts_expr() {
            self.parse_expr(BinaryOp::Pow.precedence())
        } else {
            self.missing()
        };
        let unary = self
            .builder
            .node(NodeKind::UnaryExpr, token.start(), token.end(), vec![op, operand]);
        self.wrap_expr(unary)
    }

    /// Parse a primary expression followed by range selectors and offsets
    fn parse_postfix(&mut self) -> NodeId {
        let mut expr = self.parse_primary();
        if self.builder.kind_of(expr).is_error() {
            return expr;
        }

        loop {
            if self.check(&TokenKind::LeftBracket) {
                expr = self.parse_range(expr);
            } else if self.current().is_keyword("offset") {
                expr = self.parse_offset(expr);
            } else {
                break;
            }
        }

        expr
    }

    /// Parse `[range]` or `[range:step]` after an expression
    fn parse_range(&mut self, expr: NodeId) -> NodeId {
        self.advance(); // [
        let mut children = vec![expr];
        let mut subquery = false;

        match self.current().kind {
            TokenKind::Duration(_) => children.push(self.token_leaf(NodeKind::Duration)),
            TokenKind::Number(_) | TokenKind::Ident(_) => children.push(self.error_leaf()),
            _ => children.push(self.missing()),
        }

        if self.check(&TokenKind::Colon) {
            subquery = true;
            self.advance();
            if matches!(self.current().kind, TokenKind::Duration(_)) {
                children.push(self.token_leaf(NodeKind::Duration));
            } else if matches!(self.current().kind, TokenKind::Number(_)) {
                children.push(self.error_leaf());
            }
        }

        if self.check(&TokenKind::RightBracket) {
            self.advance();
        }

        let kind = if subquery {
            NodeKind::SubqueryExpr
        } else {
            NodeKind::MatrixSelector
        };
        let start = self.builder.start_of(expr);
        let end = self.previous_end();
        let node = self.builder.node(kind, start, end, children);
        self.wrap_expr(node)
    }

    /// Parse `offset <duration>` after an expression
    fn parse_offset(&mut self, expr: NodeId) -> NodeId {
        let offset = self.token_leaf(NodeKind::Offset);
        let mut children = vec![expr, offset];

        let negative = self.check(&TokenKind::Minus)
            && matches!(self.peek().kind, TokenKind::Duration(_));
        let duration_start = self.current().start();
        if negative {
            self.advance();
        }

        match self.current().kind {
            TokenKind::Duration(_) => {
                let end = self.current().end();
                self.advance();
                children.push(self.builder.leaf(NodeKind::Duration, duration_start, end));
            }
            TokenKind::Number(_) => children.push(self.error_leaf()),
            _ => children.push(self.missing()),
        }

        let start = self.builder.start_of(expr);
        let end = self.previous_end();
        let node = self.builder.node(NodeKind::OffsetExpr, start, end, children);
        self.wrap_expr(node)
    }

    /// Parse a primary expression
    fn parse_primary(&mut self) -> NodeId {
        match &self.current().kind {
            TokenKind::Number(_) => {
                let literal = self.token_leaf(NodeKind::NumberLiteral);
                self.wrap_expr(literal)
            }
            TokenKind::String { .. } => {
                let literal = self.token_leaf(NodeKind::StringLiteral);
                self.wrap_expr(literal)
            }
            TokenKind::LeftParen => self.parse_paren(),
            TokenKind::LeftBrace => {
                let matchers = self.parse_label_matchers();
                let (start, end) = self.range_of(matchers);
                let selector = self
                    .builder
                    .node(NodeKind::VectorSelector, start, end, vec![matchers]);
                self.wrap_expr(selector)
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.parse_identifier_expr(&name)
            }
            _ => self.missing(),
        }
    }

    /// An identifier starts an aggregation, a function call, a number
    /// (`Inf`, `NaN`) or a vector selector
    fn parse_identifier_expr(&mut self, name: &str) -> NodeId {
        if let Some(op) = Aggregator::from_name(name) {
            let next = self.peek();
            if next.kind == TokenKind::LeftParen
                || next.is_keyword("by")
                || next.is_keyword("without")
            {
                return self.parse_aggregate(op);
            }
        }
        if self.peek().kind == TokenKind::LeftParen {
            return self.parse_function_call(name);
        }
        if name.eq_ignore_ascii_case("inf") || name.eq_ignore_ascii_case("nan") {
            let literal = self.token_leaf(NodeKind::NumberLiteral);
            return self.wrap_expr(literal);
        }
        self.parse_vector_selector()
    }

    /// Parse `op [modifier] (args) [modifier]`
    fn parse_aggregate(&mut self, op: Aggregator) -> NodeId {
        let token = self.current().clone();
        self.advance();
        let op_leaf = self
            .builder
            .leaf(NodeKind::Aggregator(op), token.start(), token.end());
        let op_node = self.builder.node(
            NodeKind::AggregateOp,
            token.start(),
            token.end(),
            vec![op_leaf],
        );
        let mut children = vec![op_node];

        let modifier_first = self.at_grouping_keyword();
        if modifier_first {
            children.push(self.parse_aggregate_modifier());
        }

        if self.check(&TokenKind::LeftParen) {
            children.push(self.parse_function_call_body());
        } else {
            children.push(self.missing());
        }

        if !modifier_first && self.at_grouping_keyword() {
            children.push(self.parse_aggregate_modifier());
        } else if self.at_stray_identifier() {
            // `sum() b`: most likely the beginning of `by`
            children.push(self.error_token());
        }

        let node = self
            .builder
            .node(NodeKind::AggregateExpr, token.start(), token.end(), children);
        self.wrap_expr(node)
    }

    /// Parse `by (labels)` or `without (labels)`
    fn parse_aggregate_modifier(&mut self) -> NodeId {
        let kind = if self.current().is_keyword("by") {
            NodeKind::By
        } else {
            NodeKind::Without
        };
        let keyword = self.token_leaf(kind);
        let labels = if self.check(&TokenKind::LeftParen) {
            self.parse_grouping_labels()
        } else {
            self.missing()
        };
        let start = self.builder.start_of(keyword);
        self.builder
            .node(NodeKind::AggregateModifier, start, start, vec![keyword, labels])
    }

    /// Parse `( label, ... )`
    fn parse_grouping_labels(&mut self) -> NodeId {
        let start = self.current().start();
        self.advance(); // (
        let mut list: Option<NodeId> = None;
        let mut extra = Vec::new();

        loop {
            match &self.current().kind {
                TokenKind::RightParen => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => break,
                TokenKind::Ident(_) => {
                    let name = self.token_leaf(NodeKind::LabelName);
                    let (s, e) = self.range_of(name);
                    let label = self.builder.node(NodeKind::GroupingLabel, s, e, vec![name]);
                    list = Some(self.push_list(NodeKind::GroupingLabelList, list, label));
                    if self.check(&TokenKind::Comma) {
                        self.advance();
                    }
                }
                _ => extra.push(self.error_leaf()),
            }
        }

        let children = self.ordered(list.into_iter().chain(extra).collect());
        let end = self.previous_end();
        self.builder
            .node(NodeKind::GroupingLabels, start, end, children)
    }

    /// Parse `name(args)` where `name` may be an unknown function
    fn parse_function_call(&mut self, name: &str) -> NodeId {
        let token = self.current().clone();
        self.advance();
        let ident_kind = match Function::from_name(name) {
            Some(func) => NodeKind::Function(func),
            None => NodeKind::Identifier,
        };
        let ident = self.builder.leaf(ident_kind, token.start(), token.end());
        let identifier = self.builder.node(
            NodeKind::FunctionIdentifier,
            token.start(),
            token.end(),
            vec![ident],
        );
        let body = self.parse_function_call_body();
        let node = self.builder.node(
            NodeKind::FunctionCall,
            token.start(),
            token.end(),
            vec![identifier, body],
        );
        self.wrap_expr(node)
    }

    /// Parse `( expr, ... )` into a left-recursive `FunctionCallArgs` list
    fn parse_function_call_body(&mut self) -> NodeId {
        let start = self.current().start();
        self.advance(); // (
        let mut args: Option<NodeId> = None;
        let mut extra = Vec::new();

        if self.check(&TokenKind::RightParen) {
            self.advance();
        } else {
            'args: loop {
                if self.starts_expr() {
                    let arg = self.parse_expr(0);
                    args = Some(self.push_list(NodeKind::FunctionCallArgs, args, arg));
                } else {
                    extra.push(self.missing());
                }

                loop {
                    match &self.current().kind {
                        TokenKind::Comma => {
                            self.advance();
                            continue 'args;
                        }
                        TokenKind::RightParen => {
                            self.advance();
                            break 'args;
                        }
                        TokenKind::Eof => break 'args,
                        _ => extra.push(self.error_token()),
                    }
                }
            }
        }

        let children = self.ordered(args.into_iter().chain(extra).collect());
        let end = self.previous_end();
        self.builder
            .node(NodeKind::FunctionCallBody, start, end, children)
    }

    /// Parse `( expr )`
    fn parse_paren(&mut self) -> NodeId {
        let start = self.current().start();
        self.advance(); // (
        let mut children = Vec::new();

        if self.starts_expr() {
            children.push(self.parse_expr(0));
        } else {
            children.push(self.missing());
        }
        while !self.check(&TokenKind::RightParen) && !self.is_at_end() {
            children.push(self.error_token());
        }
        if self.check(&TokenKind::RightParen) {
            self.advance();
        }

        let end = self.previous_end();
        let node = self.builder.node(NodeKind::ParenExpr, start, end, children);
        self.wrap_expr(node)
    }

    /// Parse `metric_name` with optional `{matchers}`
    fn parse_vector_selector(&mut self) -> NodeId {
        let name = self.token_leaf(NodeKind::Identifier);
        let (start, end) = self.range_of(name);
        let metric = self
            .builder
            .node(NodeKind::MetricIdentifier, start, end, vec![name]);
        let mut children = vec![metric];
        if self.check(&TokenKind::LeftBrace) {
            children.push(self.parse_label_matchers());
        }
        let node = self
            .builder
            .node(NodeKind::VectorSelector, start, end, children);
        self.wrap_expr(node)
    }

    /// Parse `{ matcher, ... }` into a left-recursive `LabelMatchList`
    fn parse_label_matchers(&mut self) -> NodeId {
        let start = self.current().start();
        self.advance(); // {
        let mut list: Option<NodeId> = None;
        let mut extra = Vec::new();

        loop {
            match &self.current().kind {
                TokenKind::RightBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => break,
                TokenKind::Ident(_) => {
                    let matcher = self.parse_label_matcher();
                    list = Some(self.push_list(NodeKind::LabelMatchList, list, matcher));
                    if self.check(&TokenKind::Comma) {
                        self.advance();
                    }
                }
                _ => extra.push(self.error_leaf()),
            }
        }

        let children = self.ordered(list.into_iter().chain(extra).collect());
        let end = self.previous_end();
        self.builder
            .node(NodeKind::LabelMatchers, start, end, children)
    }

    /// Parse `label op "value"`
    fn parse_label_matcher(&mut self) -> NodeId {
        let name = self.token_leaf(NodeKind::LabelName);
        let mut children = vec![name];

        let op = match self.current().kind {
            TokenKind::Eq => Some(MatchOp::EqlSingle),
            TokenKind::NotEq => Some(MatchOp::Neq),
            TokenKind::EqTilde => Some(MatchOp::EqlRegex),
            TokenKind::NotTilde => Some(MatchOp::NeqRegex),
            _ => None,
        };

        match op {
            Some(op) => {
                let token = self.token_leaf(NodeKind::Match(op));
                let (s, e) = self.range_of(token);
                children.push(self.builder.node(NodeKind::MatchOp, s, e, vec![token]));
                match self.current().kind {
                    TokenKind::String { .. } => {
                        children.push(self.token_leaf(NodeKind::StringLiteral))
                    }
                    TokenKind::Comma | TokenKind::RightBrace | TokenKind::Eof => {
                        children.push(self.missing())
                    }
                    _ => children.push(self.error_leaf()),
                }
            }
            None => match self.current().kind {
                TokenKind::Comma
                | TokenKind::RightBrace
                | TokenKind::Eof
                | TokenKind::Ident(_) => children.push(self.missing()),
                _ => {
                    // `labelName!` or `labelName==`: an operator being typed
                    children.push(self.error_leaf());
                    if matches!(self.current().kind, TokenKind::String { .. }) {
                        children.push(self.token_leaf(NodeKind::StringLiteral));
                    }
                }
            },
        }

        let (start, end) = self.range_of(name);
        self.builder
            .node(NodeKind::LabelMatcher, start, end, children)
    }

    // Tree helpers

    /// Wrap a node in an `Expr` with the same range
    fn wrap_expr(&mut self, inner: NodeId) -> NodeId {
        let (start, end) = self.range_of(inner);
        self.builder.node(NodeKind::Expr, start, end, vec![inner])
    }

    /// Extend a left-recursive list production with one more item
    fn push_list(&mut self, kind: NodeKind, list: Option<NodeId>, item: NodeId) -> NodeId {
        let (start, end) = self.range_of(item);
        let children = match list {
            Some(prev) => vec![prev, item],
            None => vec![item],
        };
        self.builder.node(kind, start, end, children)
    }

    /// Sort sibling ids into source order
    fn ordered(&self, mut ids: Vec<NodeId>) -> Vec<NodeId> {
        ids.sort_by_key(|&id| (self.builder.start_of(id), self.builder.end_of(id)));
        ids
    }

    fn range_of(&self, id: NodeId) -> (usize, usize) {
        (self.builder.start_of(id), self.builder.end_of(id))
    }

    /// Consume the current token as a leaf of `kind`
    fn token_leaf(&mut self, kind: NodeKind) -> NodeId {
        let (start, end) = (self.current().start(), self.current().end());
        self.advance();
        self.builder.leaf(kind, start, end)
    }

    /// Consume the current token as an error leaf
    fn error_leaf(&mut self) -> NodeId {
        self.token_leaf(NodeKind::Error)
    }

    /// Consume the current token as an error; identifiers keep an
    /// `Identifier` child so completion can tell what is being typed
    fn error_token(&mut self) -> NodeId {
        if self.current().ident().is_some() {
            let ident = self.token_leaf(NodeKind::Identifier);
            let (start, end) = self.range_of(ident);
            self.builder.node(NodeKind::Error, start, end, vec![ident])
        } else {
            self.error_leaf()
        }
    }

    /// A zero-width error where something was expected
    fn missing(&mut self) -> NodeId {
        let at = self.current().start();
        self.builder.leaf(NodeKind::Error, at, at)
    }

    /// Consume the rest of the input as one error node
    fn swallow_rest(&mut self) -> NodeId {
        let start = self.current().start();
        while !self.is_at_end() {
            self.advance();
        }
        let end = self.previous_end().max(start);
        self.builder.leaf(NodeKind::Error, start, end)
    }

    // Token helpers

    /// Get the current token
    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    /// Get the token after the current one
    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + 1).min(last)]
    }

    /// End offset of the last consumed token
    fn previous_end(&self) -> usize {
        if self.pos > 0 {
            self.tokens[self.pos - 1].end()
        } else {
            0
        }
    }

    /// Check if we're at the end of input
    fn is_at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    /// Check if current token matches expected kind
    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    /// Advance to next token
    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    /// Whether the current token can begin an expression
    fn starts_expr(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Number(_)
                | TokenKind::String { .. }
                | TokenKind::Ident(_)
                | TokenKind::LeftParen
                | TokenKind::LeftBrace
                | TokenKind::Plus
                | TokenKind::Minus
        )
    }

    fn current_binary_op(&self) -> Option<BinaryOp> {
        let token = self.current();
        let op = match &token.kind {
            TokenKind::Caret => BinaryOp::Pow,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::EqEq => BinaryOp::Eql,
            TokenKind::NotEq => BinaryOp::Neq,
            TokenKind::LtEq => BinaryOp::Lte,
            TokenKind::Lt => BinaryOp::Lss,
            TokenKind::GtEq => BinaryOp::Gte,
            TokenKind::Gt => BinaryOp::Gtr,
            TokenKind::Ident(_) if token.is_keyword("and") => BinaryOp::And,
            TokenKind::Ident(_) if token.is_keyword("or") => BinaryOp::Or,
            TokenKind::Ident(_) if token.is_keyword("unless") => BinaryOp::Unless,
            _ => return None,
        };
        Some(op)
    }

    fn at_grouping_keyword(&self) -> bool {
        self.current().is_keyword("by") || self.current().is_keyword("without")
    }

    /// An identifier that cannot continue the expression
    fn at_stray_identifier(&self) -> bool {
        self.current().ident().is_some()
            && self.current_binary_op().is_none()
            && !self.current().is_keyword("offset")
            && !self.at_grouping_keyword()
    }
}
