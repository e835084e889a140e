//! Tree controller service
//!
//! Owns the currently selected tree. Marker changes take `&mut self` and
//! views borrow `&self`, so a render pass can never interleave with a
//! propagation in flight.

use std::borrow::Cow;

use generational_arena::Index;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::application::services::DatasetService;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{filter_tree, DomainError, Marker, MalformedRecord, TreeArena, TreeBuilder};

/// A built dataset.
#[derive(Debug, Clone)]
pub struct LoadedTree {
    /// Dataset name the tree was built from
    pub name: String,
    pub tree: TreeArena,
    /// Records degraded while building
    pub diagnostics: Vec<MalformedRecord>,
}

/// What a render pass should show.
#[derive(Debug)]
pub enum TreeView<'a> {
    /// No dataset selected yet
    NotLoaded,
    /// Dataset loaded, but nothing to show (empty data or no search match)
    NoResults,
    Ready(Cow<'a, TreeArena>),
}

impl TreeView<'_> {
    pub fn tree(&self) -> Option<&TreeArena> {
        match self {
            TreeView::Ready(tree) => Some(tree.as_ref()),
            TreeView::NotLoaded | TreeView::NoResults => None,
        }
    }
}

/// Controller for the tree of the selected dataset.
pub struct TreeService {
    min_query_len: usize,
    current: Option<LoadedTree>,
}

impl TreeService {
    pub fn new(min_query_len: usize) -> Self {
        Self {
            min_query_len,
            current: None,
        }
    }

    /// Load a dataset by name and rebuild the tree from scratch.
    pub fn select(&mut self, datasets: &DatasetService, name: &str) -> ApplicationResult<&LoadedTree> {
        let raw = datasets.load(name)?;
        Ok(self.load_value(name, &raw))
    }

    /// Replace the current tree with one built from in-memory data.
    #[instrument(level = "debug", skip(self, raw))]
    pub fn load_value(&mut self, name: &str, raw: &Value) -> &LoadedTree {
        let mut builder = TreeBuilder::new();
        let tree = builder.build_value(raw);
        info!(
            "loaded {}: {} nodes, total {}",
            name,
            tree.len(),
            tree.total()
        );
        self.current.insert(LoadedTree {
            name: name.to_string(),
            tree,
            diagnostics: builder.into_diagnostics(),
        })
    }

    pub fn current(&self) -> Option<&LoadedTree> {
        self.current.as_ref()
    }

    fn loaded_mut(&mut self) -> ApplicationResult<&mut LoadedTree> {
        self.current.as_mut().ok_or(ApplicationError::NotLoaded)
    }

    fn loaded(&self) -> ApplicationResult<&LoadedTree> {
        self.current.as_ref().ok_or(ApplicationError::NotLoaded)
    }

    fn resolve(tree: &TreeArena, path: &str) -> ApplicationResult<Index> {
        tree.find_by_path(path)
            .ok_or_else(|| DomainError::NodeNotFound(path.to_string()).into())
    }

    /// Set a marker on the node at `path` and its subtree.
    pub fn set_marker(&mut self, path: &str, marker: Marker) -> ApplicationResult<()> {
        let loaded = self.loaded_mut()?;
        let idx = Self::resolve(&loaded.tree, path)?;
        loaded.tree.set_marker(idx, marker)?;
        debug!("set_marker: '{}' -> {}", path, marker);
        Ok(())
    }

    /// Toggle a marker on the node at `path`, returning the applied marker.
    pub fn toggle_marker(&mut self, path: &str, marker: Marker) -> ApplicationResult<Marker> {
        let loaded = self.loaded_mut()?;
        let idx = Self::resolve(&loaded.tree, path)?;
        let applied = loaded.tree.toggle_marker(idx, marker)?;
        debug!("toggle_marker: '{}' -> {}", path, applied);
        Ok(applied)
    }

    pub fn aggregated_value(&self, path: &str) -> ApplicationResult<f64> {
        let loaded = self.loaded()?;
        let idx = Self::resolve(&loaded.tree, path)?;
        Ok(loaded.tree.aggregated_value(idx))
    }

    /// The tree to render for `query`.
    ///
    /// Queries shorter than the configured minimum show the full tree. A
    /// view whose root has no children is reported as `NoResults`.
    pub fn view(&self, query: &str) -> TreeView<'_> {
        let Some(loaded) = &self.current else {
            return TreeView::NotLoaded;
        };

        let view = if query.chars().count() < self.min_query_len {
            Cow::Borrowed(&loaded.tree)
        } else {
            match filter_tree(&loaded.tree, query) {
                Some(filtered) => Cow::Owned(filtered),
                None => return TreeView::NoResults,
            }
        };

        let has_children = view
            .root()
            .and_then(|root| view.get_node(root))
            .is_some_and(|root| !root.children.is_empty());
        if has_children {
            TreeView::Ready(view)
        } else {
            TreeView::NoResults
        }
    }
}
