//! Navigation helpers over the syntax tree.
//!
//! These are the primitives the checker and the completion analyzer use to
//! ask structural questions such as "is there a `FunctionCallArgs` under the
//! body" without matching whole subtrees.

use super::kind::NodeKind;
use super::tree::Node;

/// Outcome of [`walk_through`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathResult<'t> {
    /// Every step of the path matched
    Found(Node<'t>),
    /// A node without children was reached before the path ended
    Absent,
    /// A node had children but none of the expected kind
    Unsatisfied,
}

impl<'t> PathResult<'t> {
    pub fn found(self) -> Option<Node<'t>> {
        match self {
            PathResult::Found(node) => Some(node),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PathResult::Found(_))
    }
}

/// Closest node of `kind` going up from `node`, `node` included
pub fn walk_backward<'t>(node: Node<'t>, kind: NodeKind) -> Option<Node<'t>> {
    let mut current = Some(node);
    while let Some(n) = current {
        if n.kind() == kind {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Follow `path` downwards, taking the first direct child of each kind
pub fn walk_through<'t>(node: Node<'t>, path: &[NodeKind]) -> PathResult<'t> {
    let mut current = node;
    for &kind in path {
        if current.child_count() == 0 {
            return PathResult::Absent;
        }
        match current.child(kind) {
            Some(child) => current = child,
            None => return PathResult::Unsatisfied,
        }
    }
    PathResult::Found(current)
}

/// Whether any direct child of `node` has one of `kinds`
pub fn contains_at_least_one_child(node: Node<'_>, kinds: &[NodeKind]) -> bool {
    node.children().any(|child| kinds.contains(&child.kind()))
}

/// Whether the direct children of `node` contain `kinds` in that order,
/// not necessarily adjacent
pub fn contains_child(node: Node<'_>, kinds: &[NodeKind]) -> bool {
    let mut expected = kinds.iter().peekable();
    for child in node.children() {
        if expected.peek() == Some(&&child.kind()) {
            expected.next();
        }
    }
    expected.peek().is_none()
}

/// Flatten a left-recursive list production.
///
/// Descends through children of kind `recursive` and collects, deepest
/// first, every list node's last child of kind `leaf`.
pub fn retrieve_all_recursive_nodes<'t>(
    parent: Option<Node<'t>>,
    recursive: NodeKind,
    leaf: NodeKind,
) -> Vec<Node<'t>> {
    let mut chain = Vec::new();
    let mut current = parent;
    while let Some(node) = current {
        chain.push(node);
        current = node.child(recursive);
    }

    chain
        .into_iter()
        .rev()
        .filter_map(|node| node.last_child().filter(|last| last.kind() == leaf))
        .collect()
}
