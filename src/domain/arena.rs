use generational_arena::{Arena, Index};
use itertools::Itertools;
use std::fmt;
use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::marker::Marker;

/// Name of the synthetic node summing all top-level records.
pub const ROOT_NAME: &str = "root";

const PATH_SEPARATOR: char = '/';

/// Round to 4 fractional decimal digits, half away from zero.
///
/// Rounds the exact binary value through its decimal rendering, so a value
/// stored just below a half step (like `2.00005`) rounds down and large
/// magnitudes never overflow.
pub fn round4(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    // k/32 with odd k is the only exact half step at 4 digits; `{:.4}` breaks
    // those ties to even, so step one ulp away from zero first.
    let scaled = value * 32.0;
    let value = if scaled.fract() == 0.0 && scaled % 2.0 != 0.0 {
        f64::from_bits(value.to_bits() + 1)
    } else {
        value
    };
    format!("{:.4}", value).parse().unwrap_or(value)
}

/// Format an aggregated value for display and value search.
///
/// Negative zero (an inverted zero sum) prints as `0`.
pub fn format_value(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    value.to_string()
}

/// Data payload for tree nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// Display label, not unique within a tree
    pub name: String,
    /// Literal leaf value; superseded by aggregation once the node has children
    pub raw_value: f64,
    marker: Marker,
}

impl NodeData {
    pub fn new(name: impl Into<String>, raw_value: f64) -> Self {
        Self {
            name: name.into(),
            raw_value,
            marker: Marker::None,
        }
    }

    pub fn marker(&self) -> Marker {
        self.marker
    }
}

impl fmt::Display for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub data: NodeData,
    /// Back link used only for upward marker re-inference, None for the root
    pub parent: Option<Index>,
    /// Indices of child nodes in insertion order
    pub children: Vec<Index>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena-based value tree.
///
/// The arena owns every node; ownership flows root to leaf through
/// `children`, while `parent` is a plain index and never keeps a node alive.
/// Markers change only through [`TreeArena::set_marker`] and the
/// re-inference it triggers.
#[derive(Debug, Clone)]
pub struct TreeArena {
    arena: Arena<TreeNode>,
    root: Option<Index>,
}

impl Default for TreeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeArena {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub fn insert_node(&mut self, data: NodeData, parent: Option<Index>) -> Index {
        let node = TreeNode {
            data,
            parent,
            children: Vec::new(),
        };
        let node_idx = self.arena.insert(node);

        if let Some(parent_idx) = parent {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.children.push(node_idx);
            }
        } else {
            self.root = Some(node_idx);
        }

        node_idx
    }

    pub fn get_node(&self, idx: Index) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub(crate) fn get_node_mut(&mut self, idx: Index) -> Option<&mut TreeNode> {
        self.arena.get_mut(idx)
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Pre-order traversal of the whole tree, children left to right.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self, self.root)
    }

    /// Pre-order traversal of the subtree rooted at `idx`.
    pub fn iter_from(&self, idx: Index) -> TreeIterator<'_> {
        TreeIterator::new(self, Some(idx))
    }

    pub fn iter_postorder(&self) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self, self.root)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        if let Some(root) = self.root {
            self.calculate_depth(root)
        } else {
            0
        }
    }

    fn calculate_depth(&self, node_idx: Index) -> usize {
        if let Some(node) = self.get_node(node_idx) {
            1 + node
                .children
                .iter()
                .map(|&child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }

    /// Collects all leaf nodes in pre-order.
    pub fn leaf_nodes(&self) -> Vec<Index> {
        self.iter()
            .filter(|(_, node)| node.is_leaf())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Displayed value of a node, computed bottom-up on every call.
    ///
    /// - `Skip` contributes 0 without looking at children
    /// - a non-leaf sums its children's aggregated values, a leaf uses `raw_value`
    /// - the total is rounded to 4 decimals, then `Invert` forces it negative
    ///
    /// Unknown indices aggregate to 0.
    pub fn aggregated_value(&self, idx: Index) -> f64 {
        let Some(node) = self.arena.get(idx) else {
            return 0.0;
        };
        match node.data.marker {
            Marker::Skip => 0.0,
            Marker::Invert => -self.magnitude(node).abs(),
            Marker::None => self.magnitude(node),
        }
    }

    fn magnitude(&self, node: &TreeNode) -> f64 {
        let total: f64 = if node.is_leaf() {
            node.data.raw_value
        } else {
            node.children
                .iter()
                .map(|&child| self.aggregated_value(child))
                .sum()
        };
        round4(total)
    }

    /// Raw value with one fractional digit, for debug display.
    pub fn display_raw_value(&self, idx: Index) -> Option<String> {
        self.arena
            .get(idx)
            .map(|node| format!("{:.1}", node.data.raw_value))
    }

    /// Aggregated value of the root, 0 for an empty tree.
    pub fn total(&self) -> f64 {
        self.root.map_or(0.0, |root| self.aggregated_value(root))
    }

    /// Set `marker` on `idx` and every descendant, then re-infer ancestors.
    ///
    /// The whole subtree write plus the upward walk completes before this
    /// returns; callers holding `&mut self` cannot observe a partial state.
    #[instrument(level = "debug", skip(self))]
    pub fn set_marker(&mut self, idx: Index, marker: Marker) -> DomainResult<()> {
        if !self.arena.contains(idx) {
            return Err(DomainError::StaleIndex(format!("{:?}", idx)));
        }

        let subtree: Vec<Index> = self.iter_from(idx).map(|(i, _)| i).collect();
        debug!("set_marker: {} on {} nodes", marker, subtree.len());
        for node_idx in subtree {
            if let Some(node) = self.arena.get_mut(node_idx) {
                node.data.marker = marker;
            }
        }

        self.reconcile_marker_from_children(idx);
        Ok(())
    }

    /// Menu toggle: requesting the node's current marker clears it.
    ///
    /// Returns the marker that was applied.
    pub fn toggle_marker(&mut self, idx: Index, requested: Marker) -> DomainResult<Marker> {
        let current = self
            .get_node(idx)
            .map(|node| node.data.marker)
            .ok_or_else(|| DomainError::StaleIndex(format!("{:?}", idx)))?;
        let next = current.toggled(requested);
        self.set_marker(idx, next)?;
        Ok(next)
    }

    /// Re-infer markers from `idx` up to the root.
    ///
    /// A node whose direct children all share `Skip` or `Invert` takes that
    /// marker, any other mix resets it to `None`. Leaves keep their marker.
    #[instrument(level = "trace", skip(self))]
    pub fn reconcile_marker_from_children(&mut self, idx: Index) {
        let mut current = Some(idx);
        while let Some(node_idx) = current {
            let Some(node) = self.arena.get(node_idx) else {
                break;
            };
            let inferred = self.inferred_marker(node);
            current = node.parent;

            if let (Some(marker), Some(node)) = (inferred, self.arena.get_mut(node_idx)) {
                node.data.marker = marker;
            }
        }
    }

    fn inferred_marker(&self, node: &TreeNode) -> Option<Marker> {
        if node.is_leaf() {
            return None;
        }
        let shared = node
            .children
            .iter()
            .filter_map(|&child| self.arena.get(child))
            .map(|child| child.data.marker)
            .all_equal_value();
        match shared {
            Ok(Marker::Skip) => Some(Marker::Skip),
            Ok(Marker::Invert) => Some(Marker::Invert),
            Ok(Marker::None) | Err(_) => Some(Marker::None),
        }
    }

    /// `/`-separated names from the root's children down to `idx`.
    ///
    /// The root itself has the empty path. A node sharing its name with
    /// earlier siblings gets the segment `name[n]`, `n` counting those
    /// siblings, so every node has a path that resolves back to it.
    pub fn node_path(&self, idx: Index) -> String {
        let mut segments = Vec::new();
        let mut current = idx;
        while let Some(node) = self.get_node(current) {
            let Some(parent) = node.parent else {
                break;
            };
            let position = self
                .get_node(parent)
                .map(|p| {
                    p.children
                        .iter()
                        .take_while(|&&sibling| sibling != current)
                        .filter(|&&sibling| {
                            self.get_node(sibling)
                                .is_some_and(|s| s.data.name == node.data.name)
                        })
                        .count()
                })
                .unwrap_or(0);
            segments.push(match position {
                0 => node.data.name.clone(),
                n => format!("{}[{}]", node.data.name, n),
            });
            current = parent;
        }
        segments.iter().rev().join(&PATH_SEPARATOR.to_string())
    }

    /// Resolve a `/`-separated name path.
    ///
    /// A segment matching a child's name exactly picks the first such child;
    /// otherwise `name[n]` picks the child after `n` earlier siblings of that
    /// name. An empty path (or `/`) resolves to the root.
    #[instrument(level = "debug", skip(self))]
    pub fn find_by_path(&self, path: &str) -> Option<Index> {
        let mut current = self.root?;
        for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            current = match self.children_named(current, segment).next() {
                Some(child) => child,
                None => {
                    let (name, nth) = split_indexed(segment)?;
                    self.children_named(current, name).nth(nth)?
                }
            };
        }
        Some(current)
    }

    fn children_named<'a>(
        &'a self,
        parent: Index,
        name: &'a str,
    ) -> impl Iterator<Item = Index> + 'a {
        self.get_node(parent)
            .into_iter()
            .flat_map(|node| node.children.iter().copied())
            .filter(move |&child| self.get_node(child).is_some_and(|c| c.data.name == name))
    }
}

/// Split `name[n]` into its name and sibling index.
fn split_indexed(segment: &str) -> Option<(&str, usize)> {
    let (name, index) = segment.strip_suffix(']')?.rsplit_once('[')?;
    Some((name, index.parse().ok()?))
}

pub struct TreeIterator<'a> {
    arena: &'a TreeArena,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(arena: &'a TreeArena, start: Option<Index>) -> Self {
        Self {
            arena,
            stack: start.into_iter().collect(),
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    arena: &'a TreeArena,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(arena: &'a TreeArena, start: Option<Index>) -> Self {
        Self {
            arena,
            stack: start.map(|idx| (idx, false)).into_iter().collect(),
        }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// root
    /// └── a
    ///     ├── x = 2
    ///     └── y = -3
    /// └── b = 1.5
    fn sample() -> (TreeArena, Index, Index, Index, Index) {
        let mut tree = TreeArena::new();
        let root = tree.insert_node(NodeData::new(ROOT_NAME, 0.0), None);
        let a = tree.insert_node(NodeData::new("a", 0.0), Some(root));
        let x = tree.insert_node(NodeData::new("x", 2.0), Some(a));
        let y = tree.insert_node(NodeData::new("y", -3.0), Some(a));
        tree.insert_node(NodeData::new("b", 1.5), Some(root));
        (tree, root, a, x, y)
    }

    #[test]
    fn test_aggregates_bottom_up() {
        let (tree, root, a, _, _) = sample();
        assert_eq!(tree.aggregated_value(a), -1.0);
        assert_eq!(tree.aggregated_value(root), 0.5);
    }

    #[rstest]
    #[case(1.23456, 1.2346)]
    #[case(-0.00004, 0.0)]
    #[case(10.0, 10.0)]
    #[case(2.00005, 2.0)]
    #[case(8.00005, 8.0)]
    #[case(0.03125, 0.0313)]
    #[case(-0.03125, -0.0313)]
    #[case(0.15625, 0.1563)]
    #[case(1e305, 1e305)]
    #[case(-1.7e308, -1.7e308)]
    fn test_leaf_value_rounded_to_four_digits(#[case] raw: f64, #[case] expected: f64) {
        let mut tree = TreeArena::new();
        let leaf = tree.insert_node(NodeData::new("leaf", raw), None);
        assert_eq!(tree.aggregated_value(leaf), expected);
    }

    #[test]
    fn test_huge_leaf_aggregates_without_overflow() {
        let mut tree = TreeArena::new();
        let root = tree.insert_node(NodeData::new(ROOT_NAME, 0.0), None);
        tree.insert_node(NodeData::new("a", 1e305), Some(root));
        assert_eq!(tree.total(), 1e305);
        assert!(format_value(tree.total()).starts_with("1000"));
    }

    #[test]
    fn test_sum_of_fractions_is_rounded() {
        let mut tree = TreeArena::new();
        let root = tree.insert_node(NodeData::new(ROOT_NAME, 0.0), None);
        tree.insert_node(NodeData::new("p", 0.1), Some(root));
        tree.insert_node(NodeData::new("q", 0.2), Some(root));
        assert_eq!(tree.aggregated_value(root), 0.3);
        assert_eq!(format_value(tree.aggregated_value(root)), "0.3");
    }

    #[test]
    fn test_skip_contributes_zero_regardless_of_children() {
        let (mut tree, root, a, _, _) = sample();
        tree.set_marker(a, Marker::Skip).unwrap();
        assert_eq!(tree.aggregated_value(a), 0.0);
        assert_eq!(tree.aggregated_value(root), 1.5);
    }

    #[test]
    fn test_invert_is_negative_magnitude() {
        let (mut tree, root, a, x, _) = sample();
        tree.set_marker(x, Marker::Invert).unwrap();
        assert_eq!(tree.aggregated_value(x), -2.0);
        assert_eq!(tree.aggregated_value(a), -5.0);

        tree.set_marker(a, Marker::Invert).unwrap();
        assert_eq!(tree.aggregated_value(a), -5.0);
        assert_eq!(tree.aggregated_value(root), -3.5);
    }

    #[test]
    fn test_aggregated_value_is_idempotent() {
        let (mut tree, root, _, _, y) = sample();
        tree.set_marker(y, Marker::Invert).unwrap();
        let first = tree.aggregated_value(root);
        let second = tree.aggregated_value(root);
        assert_eq!(first, second);
    }

    #[test]
    fn test_set_marker_propagates_to_descendants() {
        let (mut tree, root, a, x, y) = sample();
        tree.set_marker(y, Marker::Skip).unwrap();
        tree.set_marker(a, Marker::Invert).unwrap();
        for idx in [a, x, y] {
            assert_eq!(tree.get_node(idx).unwrap().data.marker(), Marker::Invert);
        }
        // root has mixed children: a inverted, b none
        assert_eq!(tree.get_node(root).unwrap().data.marker(), Marker::None);
    }

    #[test]
    fn test_all_children_skipped_promotes_parent() {
        let (mut tree, _, a, x, y) = sample();
        tree.set_marker(x, Marker::Skip).unwrap();
        assert_eq!(tree.get_node(a).unwrap().data.marker(), Marker::None);
        tree.set_marker(y, Marker::Skip).unwrap();
        assert_eq!(tree.get_node(a).unwrap().data.marker(), Marker::Skip);
    }

    #[test]
    fn test_mixed_children_reset_parent() {
        let (mut tree, _, a, x, y) = sample();
        tree.set_marker(a, Marker::Skip).unwrap();
        tree.set_marker(y, Marker::Invert).unwrap();
        assert_eq!(tree.get_node(x).unwrap().data.marker(), Marker::Skip);
        assert_eq!(tree.get_node(a).unwrap().data.marker(), Marker::None);
    }

    #[test]
    fn test_reinference_skips_leaves() {
        let mut tree = TreeArena::new();
        let leaf = tree.insert_node(NodeData::new("leaf", 4.0), None);
        tree.set_marker(leaf, Marker::Invert).unwrap();
        tree.reconcile_marker_from_children(leaf);
        assert_eq!(tree.get_node(leaf).unwrap().data.marker(), Marker::Invert);
    }

    #[test]
    fn test_reinference_walks_to_root() {
        let mut tree = TreeArena::new();
        let root = tree.insert_node(NodeData::new(ROOT_NAME, 0.0), None);
        let a = tree.insert_node(NodeData::new("a", 0.0), Some(root));
        let b = tree.insert_node(NodeData::new("b", 0.0), Some(a));
        let c = tree.insert_node(NodeData::new("c", 7.0), Some(b));

        tree.set_marker(c, Marker::Invert).unwrap();

        for idx in [root, a, b, c] {
            assert_eq!(tree.get_node(idx).unwrap().data.marker(), Marker::Invert);
        }
        assert_eq!(tree.total(), -7.0);
    }

    #[test]
    fn test_toggle_marker_clears_same_marker() {
        let (mut tree, _, a, _, _) = sample();
        assert_eq!(tree.toggle_marker(a, Marker::Skip).unwrap(), Marker::Skip);
        assert_eq!(tree.toggle_marker(a, Marker::Skip).unwrap(), Marker::None);
        assert_eq!(tree.aggregated_value(a), -1.0);
    }

    #[test]
    fn test_set_marker_on_removed_index_fails() {
        let (mut tree, _, _, x, _) = sample();
        tree.arena.remove(x);
        assert!(matches!(
            tree.set_marker(x, Marker::Skip),
            Err(DomainError::StaleIndex(_))
        ));
        assert_eq!(tree.aggregated_value(x), 0.0);
    }

    #[test]
    fn test_display_raw_value_ignores_markers() {
        let (mut tree, _, _, _, y) = sample();
        tree.set_marker(y, Marker::Skip).unwrap();
        assert_eq!(tree.display_raw_value(y).as_deref(), Some("-3.0"));
    }

    #[test]
    fn test_paths_resolve_both_ways() {
        let (tree, root, a, _, y) = sample();
        assert_eq!(tree.node_path(y), "a/y");
        assert_eq!(tree.node_path(root), "");
        assert_eq!(tree.find_by_path("a/y"), Some(y));
        assert_eq!(tree.find_by_path("/a/"), Some(a));
        assert_eq!(tree.find_by_path(""), Some(root));
        assert_eq!(tree.find_by_path("a/missing"), None);
    }

    #[test]
    fn test_duplicate_sibling_names_get_indexed_paths() {
        let mut tree = TreeArena::new();
        let root = tree.insert_node(NodeData::new(ROOT_NAME, 0.0), None);
        let first = tree.insert_node(NodeData::new("dup", 1.0), Some(root));
        tree.insert_node(NodeData::new("other", 2.0), Some(root));
        let second = tree.insert_node(NodeData::new("dup", 4.0), Some(root));
        let child = tree.insert_node(NodeData::new("dup", 8.0), Some(second));

        assert_eq!(tree.node_path(first), "dup");
        assert_eq!(tree.node_path(second), "dup[1]");
        assert_eq!(tree.node_path(child), "dup[1]/dup");
        for idx in [root, first, second, child] {
            assert_eq!(tree.find_by_path(&tree.node_path(idx)), Some(idx));
        }
        assert_eq!(tree.find_by_path("dup[0]"), Some(first));
        assert_eq!(tree.find_by_path("dup[2]"), None);
    }

    #[test]
    fn test_literal_bracket_name_wins_over_index() {
        let mut tree = TreeArena::new();
        let root = tree.insert_node(NodeData::new(ROOT_NAME, 0.0), None);
        tree.insert_node(NodeData::new("x", 1.0), Some(root));
        tree.insert_node(NodeData::new("x", 2.0), Some(root));
        let literal = tree.insert_node(NodeData::new("x[1]", 3.0), Some(root));

        assert_eq!(tree.find_by_path("x[1]"), Some(literal));
    }

    #[test]
    fn test_iterators_visit_in_child_order() {
        let (tree, _, _, _, _) = sample();
        let pre: Vec<_> = tree.iter().map(|(_, n)| n.data.name.as_str()).collect();
        assert_eq!(pre, vec![ROOT_NAME, "a", "x", "y", "b"]);
        let post: Vec<_> = tree
            .iter_postorder()
            .map(|(_, n)| n.data.name.as_str())
            .collect();
        assert_eq!(post, vec!["x", "y", "a", "b", ROOT_NAME]);
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.leaf_nodes().len(), 3);
    }

    #[test]
    fn test_format_value_normalizes_negative_zero() {
        assert_eq!(format_value(-0.0), "0");
        assert_eq!(format_value(8.0), "8");
        assert_eq!(format_value(-1.25), "-1.25");
    }
}
