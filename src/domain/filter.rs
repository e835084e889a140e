//! Search filtering into a pruned copy of the tree.

use generational_arena::Index;
use tracing::{debug, instrument};

use crate::domain::arena::{format_value, TreeArena};

/// What survives of one source node.
enum Keep {
    /// Node matched: copied with its whole subtree
    Subtree(Index),
    /// Node kept only as an ancestor of matches
    Path(Index, Vec<Keep>),
}

/// Prune `tree` to nodes matching `query` plus their ancestors.
///
/// A node matches when its name contains the query case-insensitively, or
/// when its formatted aggregated value contains the query verbatim. A
/// matching node keeps its entire subtree. Markers are copied, the source
/// tree is left untouched. Returns `None` when nothing matches.
#[instrument(level = "debug", skip(tree))]
pub fn filter_tree(tree: &TreeArena, query: &str) -> Option<TreeArena> {
    let root = tree.root()?;
    let needle = query.to_lowercase();
    let keep = select(tree, root, query, &needle)?;

    let mut view = TreeArena::new();
    copy_kept(tree, &keep, &mut view, None);
    debug!("filter: kept {} of {} nodes", view.len(), tree.len());
    Some(view)
}

fn matches(tree: &TreeArena, idx: Index, query: &str, needle: &str) -> bool {
    let Some(node) = tree.get_node(idx) else {
        return false;
    };
    node.data.name.to_lowercase().contains(needle)
        || format_value(tree.aggregated_value(idx)).contains(query)
}

fn select(tree: &TreeArena, idx: Index, query: &str, needle: &str) -> Option<Keep> {
    if matches(tree, idx, query, needle) {
        return Some(Keep::Subtree(idx));
    }
    let node = tree.get_node(idx)?;
    let kept: Vec<Keep> = node
        .children
        .iter()
        .filter_map(|&child| select(tree, child, query, needle))
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(Keep::Path(idx, kept))
    }
}

fn copy_kept(source: &TreeArena, keep: &Keep, view: &mut TreeArena, parent: Option<Index>) {
    match keep {
        Keep::Subtree(idx) => copy_subtree(source, *idx, view, parent),
        Keep::Path(idx, children) => {
            let Some(node) = source.get_node(*idx) else {
                return;
            };
            let copied = view.insert_node(node.data.clone(), parent);
            for child in children {
                copy_kept(source, child, view, Some(copied));
            }
        }
    }
}

fn copy_subtree(source: &TreeArena, idx: Index, view: &mut TreeArena, parent: Option<Index>) {
    let Some(node) = source.get_node(idx) else {
        return;
    };
    let copied = view.insert_node(node.data.clone(), parent);
    for &child in &node.children {
        copy_subtree(source, child, view, Some(copied));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builder::build_tree;
    use crate::domain::Marker;
    use serde_json::json;

    fn names(tree: &TreeArena) -> Vec<String> {
        tree.iter().map(|(_, n)| n.data.name.clone()).collect()
    }

    fn sample() -> TreeArena {
        build_tree(&json!([
            {"fruit": [
                {"apple": 3},
                {"citrus": [{"Lemon": 2}, {"orange": 4}]}
            ]},
            {"veg": [{"carrot": 1}]}
        ]))
    }

    #[test]
    fn test_deep_match_keeps_ancestor_path_only() {
        let tree = sample();
        let view = filter_tree(&tree, "lemon").unwrap();
        assert_eq!(names(&view), vec!["root", "fruit", "citrus", "Lemon"]);
        assert_eq!(view.total(), 2.0);
    }

    #[test]
    fn test_matching_branch_keeps_whole_subtree() {
        let tree = sample();
        let view = filter_tree(&tree, "citr").unwrap();
        assert_eq!(
            names(&view),
            vec!["root", "fruit", "citrus", "Lemon", "orange"]
        );
    }

    #[test]
    fn test_value_match_uses_aggregated_value() {
        let tree = sample();
        // citrus aggregates to 6
        let view = filter_tree(&tree, "6").unwrap();
        assert_eq!(
            names(&view),
            vec!["root", "fruit", "citrus", "Lemon", "orange"]
        );
    }

    #[test]
    fn test_no_match_returns_none() {
        let tree = sample();
        assert!(filter_tree(&tree, "xyz").is_none());
    }

    #[test]
    fn test_filter_copies_markers_without_touching_source() {
        let mut tree = sample();
        let apple = tree.find_by_path("fruit/apple").unwrap();
        tree.set_marker(apple, Marker::Skip).unwrap();
        let before: Vec<_> = tree
            .iter()
            .map(|(_, n)| (n.data.name.clone(), n.data.marker()))
            .collect();

        let view = filter_tree(&tree, "apple").unwrap();
        let copied = view.find_by_path("fruit/apple").unwrap();
        assert_eq!(view.get_node(copied).unwrap().data.marker(), Marker::Skip);

        let after: Vec<_> = tree
            .iter()
            .map(|(_, n)| (n.data.name.clone(), n.data.marker()))
            .collect();
        assert_eq!(before, after);
        assert_eq!(tree.len(), 8);
    }

    #[test]
    fn test_view_parent_links_point_into_view() {
        let tree = sample();
        let mut view = filter_tree(&tree, "orange").unwrap();
        let orange = view.find_by_path("fruit/citrus/orange").unwrap();
        view.set_marker(orange, Marker::Invert).unwrap();
        // orange is the only child left in the view, so re-inference reaches the root
        let root = view.root().unwrap();
        assert_eq!(view.get_node(root).unwrap().data.marker(), Marker::Invert);
    }
}
