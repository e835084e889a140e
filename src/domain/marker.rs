//! Per-node marker controlling how a value contributes to its ancestors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Tri-state node annotation.
///
/// `Skip` removes a branch from every ancestor sum, `Invert` turns its
/// contribution into a negative magnitude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    #[default]
    None,
    Invert,
    Skip,
}

impl Marker {
    pub const ALL: [Marker; 3] = [Marker::None, Marker::Invert, Marker::Skip];

    pub fn as_str(&self) -> &'static str {
        match self {
            Marker::None => "none",
            Marker::Invert => "invert",
            Marker::Skip => "skip",
        }
    }

    /// Menu semantics: choosing the active marker again clears it.
    pub fn toggled(self, requested: Marker) -> Marker {
        if self == requested {
            Marker::None
        } else {
            requested
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Marker {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Marker::None),
            "invert" => Ok(Marker::Invert),
            "skip" => Ok(Marker::Skip),
            other => Err(DomainError::InvalidMarker(other.to_string())),
        }
    }
}
