//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent invalid requests against the tree model.
/// Malformed dataset records are not errors: the builder degrades them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("stale node index: {0}")]
    StaleIndex(String),

    #[error("invalid marker '{0}' (expected none, invert or skip)")]
    InvalidMarker(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
