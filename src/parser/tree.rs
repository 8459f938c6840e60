//! Immutable concrete syntax tree.
//!
//! Nodes live in an arena owned by [`SyntaxTree`] and are navigated through
//! the copyable [`Node`] handle, which exposes parent, child and sibling
//! links together with the byte range `[start, end)` of each node.

use std::fmt;

use super::kind::NodeKind;

pub(crate) type NodeId = usize;

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub kind: NodeKind,
    pub start: usize,
    pub end: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Which side of a position `resolve` should favor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Nodes ending at the position win: `start < pos <= end`
    Before,
    /// Nodes starting at the position win: `start <= pos < end`
    After,
}

/// A parsed expression: the source text plus its node arena
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    text: String,
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl SyntaxTree {
    pub(crate) fn new(text: String, nodes: Vec<NodeData>, root: NodeId) -> Self {
        Self { text, nodes, root }
    }

    /// The source text the tree was built from
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the source text; the root always spans `[0, len)`
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            tree: self,
            id: self.root,
        }
    }

    /// The innermost node covering `pos` on the given side.
    ///
    /// Falls back to the root when no child covers the position.
    pub fn resolve(&self, pos: usize, side: Side) -> Node<'_> {
        let mut node = self.root();
        'descend: loop {
            for child in node.children() {
                let covers = match side {
                    Side::Before => child.start() < pos && pos <= child.end(),
                    Side::After => child.start() <= pos && pos < child.end(),
                };
                if covers {
                    node = child;
                    continue 'descend;
                }
            }
            return node;
        }
    }

    /// All nodes in document order (pre-order)
    pub fn descendants(&self) -> Vec<Node<'_>> {
        let mut result = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            result.push(node);
            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev());
        }
        result
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id]
    }
}

impl fmt::Display for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root())
    }
}

/// Handle to a node inside a [`SyntaxTree`]
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> Node<'t> {
    fn data(&self) -> &'t NodeData {
        self.tree.data(self.id)
    }

    fn at(&self, id: NodeId) -> Node<'t> {
        Node { tree: self.tree, id }
    }

    pub fn tree(&self) -> &'t SyntaxTree {
        self.tree
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    pub fn is(&self, kind: NodeKind) -> bool {
        self.kind() == kind
    }

    pub fn start(&self) -> usize {
        self.data().start
    }

    pub fn end(&self) -> usize {
        self.data().end
    }

    /// Source text covered by the node
    pub fn text(&self) -> &'t str {
        &self.tree.text[self.start()..self.end()]
    }

    pub fn parent(&self) -> Option<Node<'t>> {
        self.data().parent.map(|id| self.at(id))
    }

    /// The n-th ancestor; `ancestor(1)` is the parent
    pub fn ancestor(&self, n: usize) -> Option<Node<'t>> {
        let mut node = *self;
        for _ in 0..n {
            node = node.parent()?;
        }
        Some(node)
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        self.data()
            .children
            .iter()
            .map(move |&id| Node { tree, id })
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn first_child(&self) -> Option<Node<'t>> {
        self.data().children.first().map(|&id| self.at(id))
    }

    pub fn last_child(&self) -> Option<Node<'t>> {
        self.data().children.last().map(|&id| self.at(id))
    }

    /// First direct child of the given kind
    pub fn child(&self, kind: NodeKind) -> Option<Node<'t>> {
        self.children().find(|c| c.kind() == kind)
    }

    fn index_in_parent(&self) -> Option<(Node<'t>, usize)> {
        let parent = self.parent()?;
        let index = parent.data().children.iter().position(|&id| id == self.id)?;
        Some((parent, index))
    }

    pub fn next_sibling(&self) -> Option<Node<'t>> {
        let (parent, index) = self.index_in_parent()?;
        parent.data().children.get(index + 1).map(|&id| self.at(id))
    }

    pub fn prev_sibling(&self) -> Option<Node<'t>> {
        let (parent, index) = self.index_in_parent()?;
        let prev = index.checked_sub(1)?;
        parent.data().children.get(prev).map(|&id| self.at(id))
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{}]", self.kind(), self.start(), self.end())
    }
}

/// Lezer-style rendering: `PromQL(Expr(VectorSelector(...)))`
impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        if self.child_count() > 0 {
            write!(f, "(")?;
            for (i, child) in self.children().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", child)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Bottom-up construction of a tree; children are created before parents
#[derive(Debug, Default)]
pub(crate) struct TreeBuilder {
    nodes: Vec<NodeData>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf node
    pub fn leaf(&mut self, kind: NodeKind, start: usize, end: usize) -> NodeId {
        self.node(kind, start, end, Vec::new())
    }

    /// Add a node over `children`, widening `[start, end)` to cover them
    pub fn node(
        &mut self,
        kind: NodeKind,
        start: usize,
        end: usize,
        children: Vec<NodeId>,
    ) -> NodeId {
        let id = self.nodes.len();
        let mut start = start;
        let mut end = end.max(start);
        for &child in &children {
            let data = &mut self.nodes[child];
            data.parent = Some(id);
            start = start.min(data.start);
            end = end.max(data.end);
        }
        self.nodes.push(NodeData {
            kind,
            start,
            end,
            parent: None,
            children,
        });
        id
    }

    pub fn start_of(&self, id: NodeId) -> usize {
        self.nodes[id].start
    }

    pub fn end_of(&self, id: NodeId) -> usize {
        self.nodes[id].end
    }

    pub fn kind_of(&self, id: NodeId) -> NodeKind {
        self.nodes[id].kind
    }

    pub fn finish(self, text: String, root: NodeId) -> SyntaxTree {
        SyntaxTree::new(text, self.nodes, root)
    }
}
