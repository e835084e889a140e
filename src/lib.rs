//! Value trees with skip/invert markers.
//!
//! A dataset of nested single-key records is built into an arena-backed
//! tree whose node values aggregate bottom-up. Markers set on a node
//! propagate to its subtree and are re-inferred upward from children.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
