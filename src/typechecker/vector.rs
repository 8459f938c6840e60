//! Vector matching of binary expressions (`on`, `ignoring`, `group_x`)

use crate::parser::{retrieve_all_recursive_nodes, walk_through, Node, NodeKind};

/// How the series on both sides of a binary operation are paired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorMatchCardinality {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorMatching {
    pub card: VectorMatchCardinality,
    /// Labels listed in `on(...)` or `ignoring(...)`
    pub matching_labels: Vec<String>,
    /// True for `on`, false for `ignoring` or no clause
    pub on: bool,
    /// Labels listed in `group_left(...)` or `group_right(...)`
    pub include: Vec<String>,
}

/// Derive the vector matching of a `BinaryExpr` node
pub fn build_vector_matching(binary: Node<'_>) -> Option<VectorMatching> {
    let op = binary.children().find_map(|child| match child.kind() {
        NodeKind::Operator(op) => Some(op),
        _ => None,
    })?;

    let mut matching = VectorMatching {
        card: VectorMatchCardinality::OneToOne,
        matching_labels: Vec::new(),
        on: false,
        include: Vec::new(),
    };

    if let Some(modifiers) = binary.child(NodeKind::BinModifiers) {
        let mut in_group = false;
        for child in modifiers.children() {
            match child.kind() {
                NodeKind::On => matching.on = true,
                NodeKind::GroupLeft => {
                    matching.card = VectorMatchCardinality::ManyToOne;
                    in_group = true;
                }
                NodeKind::GroupRight => {
                    matching.card = VectorMatchCardinality::OneToMany;
                    in_group = true;
                }
                NodeKind::GroupingLabels => {
                    let labels = grouping_labels(child);
                    if in_group {
                        matching.include = labels;
                    } else {
                        matching.matching_labels = labels;
                    }
                }
                _ => {}
            }
        }
    }

    if op.is_set_operator() && matching.card == VectorMatchCardinality::OneToOne {
        matching.card = VectorMatchCardinality::ManyToMany;
    }
    Some(matching)
}

/// Label names of a `GroupingLabels` node, in source order
pub fn grouping_labels(labels: Node<'_>) -> Vec<String> {
    retrieve_all_recursive_nodes(
        walk_through(labels, &[NodeKind::GroupingLabelList]).found(),
        NodeKind::GroupingLabelList,
        NodeKind::GroupingLabel,
    )
    .into_iter()
    .filter_map(|label| label.child(NodeKind::LabelName))
    .map(|name| name.text().to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn matching_of(source: &str) -> Option<VectorMatching> {
        let tree = parse(source);
        let binary = tree.root().first_child()?.first_child()?;
        build_vector_matching(binary)
    }

    #[test]
    fn test_default_matching() {
        let matching = matching_of("foo + bar").unwrap();
        assert_eq!(matching.card, VectorMatchCardinality::OneToOne);
        assert!(!matching.on);
        assert!(matching.matching_labels.is_empty());
    }

    #[test]
    fn test_set_operator_is_many_to_many() {
        let matching = matching_of("foo and on() bar").unwrap();
        assert_eq!(matching.card, VectorMatchCardinality::ManyToMany);
        assert!(matching.on);
    }

    #[test]
    fn test_group_left_labels() {
        let matching = matching_of("foo / on(test,blub) group_left(bar) bar").unwrap();
        assert_eq!(matching.card, VectorMatchCardinality::ManyToOne);
        assert_eq!(matching.matching_labels, vec!["test", "blub"]);
        assert_eq!(matching.include, vec!["bar"]);
    }

    #[test]
    fn test_group_right_with_ignoring() {
        let matching = matching_of("foo - ignoring(test) group_right(bar,foo) bar").unwrap();
        assert_eq!(matching.card, VectorMatchCardinality::OneToMany);
        assert!(!matching.on);
        assert_eq!(matching.matching_labels, vec!["test"]);
        assert_eq!(matching.include, vec!["bar", "foo"]);
    }

    #[test]
    fn test_not_a_binary_expression() {
        assert!(matching_of("foo").is_none());
    }
}
