//! Label matchers extracted from vector selectors

use crate::parser::{MatchOp, Node, NodeKind};

/// A single `name op "value"` matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub op: MatchOp,
    pub name: String,
    pub value: String,
}

impl Matcher {
    pub fn new(op: MatchOp, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Whether the matcher also selects series that lack the label.
    ///
    /// Regex matchers never count as empty.
    pub fn matches_empty(&self) -> bool {
        match self.op {
            MatchOp::EqlSingle => self.value.is_empty(),
            MatchOp::Neq => !self.value.is_empty(),
            MatchOp::EqlRegex | MatchOp::NeqRegex => false,
        }
    }
}

impl std::fmt::Display for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.op.symbol(), self.value)
    }
}

/// Build matchers from `LabelMatcher` nodes.
///
/// Incomplete matchers are kept: a missing operator defaults to `=` and a
/// missing value to the empty string.
pub fn build_label_matchers(nodes: &[Node<'_>]) -> Vec<Matcher> {
    nodes.iter().map(|node| create_matcher(*node)).collect()
}

fn create_matcher(node: Node<'_>) -> Matcher {
    let mut matcher = Matcher::new(MatchOp::EqlSingle, "", "");
    for child in node.children() {
        match child.kind() {
            NodeKind::LabelName => matcher.name = child.text().to_string(),
            NodeKind::MatchOp => {
                if let Some(NodeKind::Match(op)) = child.first_child().map(|op| op.kind()) {
                    matcher.op = op;
                }
            }
            NodeKind::StringLiteral => matcher.value = unquote(child.text()),
            _ => {}
        }
    }
    matcher
}

/// Raw value text of a matcher node, escapes left as written
pub fn raw_value<'t>(node: Node<'t>) -> &'t str {
    node.children()
        .find(|child| child.kind() == NodeKind::StringLiteral)
        .map(|literal| strip_quotes(literal.text()).1)
        .unwrap_or_default()
}

/// The opening quote of a literal and the text between its quotes.
///
/// Unterminated literals lose only their opening quote.
fn strip_quotes(literal: &str) -> (Option<char>, &str) {
    let mut chars = literal.chars();
    let Some(quote) = chars.next() else {
        return (None, literal);
    };
    if !matches!(quote, '"' | '\'' | '`') {
        return (None, literal);
    }
    let body = chars.as_str();
    (Some(quote), body.strip_suffix(quote).unwrap_or(body))
}

/// Strip the quotes of a string literal and resolve its escapes.
///
/// Backtick strings are raw.
pub fn unquote(literal: &str) -> String {
    let (quote, body) = strip_quotes(literal);
    match quote {
        None => return literal.to_string(),
        Some('`') => return body.to_string(),
        Some(_) => {}
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, retrieve_all_recursive_nodes, walk_through};

    fn matchers_of(source: &str) -> Vec<Matcher> {
        let tree = parse(source);
        let selector = tree.root().first_child().unwrap().first_child().unwrap();
        let list =
            walk_through(selector, &[NodeKind::LabelMatchers, NodeKind::LabelMatchList]).found();
        build_label_matchers(&retrieve_all_recursive_nodes(
            list,
            NodeKind::LabelMatchList,
            NodeKind::LabelMatcher,
        ))
    }

    #[test]
    fn test_matches_empty() {
        assert!(Matcher::new(MatchOp::EqlSingle, "a", "").matches_empty());
        assert!(!Matcher::new(MatchOp::EqlSingle, "a", "x").matches_empty());
        assert!(Matcher::new(MatchOp::Neq, "a", "x").matches_empty());
        assert!(!Matcher::new(MatchOp::Neq, "a", "").matches_empty());
        assert!(!Matcher::new(MatchOp::EqlRegex, "a", "").matches_empty());
        assert!(!Matcher::new(MatchOp::EqlRegex, "a", "x").matches_empty());
        assert!(!Matcher::new(MatchOp::NeqRegex, "a", ".+").matches_empty());
        assert!(!Matcher::new(MatchOp::NeqRegex, "a", "").matches_empty());
    }

    #[test]
    fn test_build_from_selector() {
        assert_eq!(
            matchers_of("up{job=\"api\",env!~'dev.*',empty=``}"),
            vec![
                Matcher::new(MatchOp::EqlSingle, "job", "api"),
                Matcher::new(MatchOp::NeqRegex, "env", "dev.*"),
                Matcher::new(MatchOp::EqlSingle, "empty", ""),
            ]
        );
    }

    #[test]
    fn test_incomplete_matcher() {
        assert_eq!(
            matchers_of("{myL}"),
            vec![Matcher::new(MatchOp::EqlSingle, "myL", "")]
        );
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"a\\\"b\""), "a\"b");
        assert_eq!(unquote("'tab\\t'"), "tab\t");
        assert_eq!(unquote("`raw\\n`"), "raw\\n");
        assert_eq!(unquote("\"open"), "open");
        assert_eq!(unquote("\"\""), "");
    }

    #[test]
    fn test_raw_value_keeps_escapes() {
        let tree = parse("{job=\"a\\\"b\",env=`x`,bare}");
        let selector = tree.root().first_child().unwrap().first_child().unwrap();
        let list =
            walk_through(selector, &[NodeKind::LabelMatchers, NodeKind::LabelMatchList]).found();
        let nodes =
            retrieve_all_recursive_nodes(list, NodeKind::LabelMatchList, NodeKind::LabelMatcher);
        let raw: Vec<&str> = nodes.iter().map(|node| raw_value(*node)).collect();
        assert_eq!(raw, vec!["a\\\"b", "x", ""]);
        assert_eq!(build_label_matchers(&nodes)[0].value, "a\"b");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Matcher::new(MatchOp::EqlRegex, "job", "a.*").to_string(),
            "job=~\"a.*\""
        );
    }
}
