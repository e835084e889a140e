//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem) but are themselves
//! concrete structs, not traits.

mod dataset;
mod render;
mod tree;

pub use dataset::{DatasetService, DATASET_EXTENSION};
pub use render::{color_class, ColorClass, Palette, RenderStats, TreeRenderer};
pub use tree::{LoadedTree, TreeService, TreeView};
