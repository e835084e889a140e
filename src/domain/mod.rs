//! Domain layer: the value tree and its aggregation/marker rules
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod error;
pub mod filter;
pub mod marker;

pub use arena::{format_value, round4, NodeData, TreeArena, TreeNode, ROOT_NAME};
pub use builder::{build_tree, MalformedReason, MalformedRecord, TreeBuilder, UNNAMED};
pub use error::{DomainError, DomainResult};
pub use filter::filter_tree;
pub use marker::Marker;
