//! Tree builder turning nested single-key records into a value tree.
//!
//! Input is a sequence of records, each a mapping with exactly one key: the
//! key is the node name, the value either a number (leaf) or a further
//! sequence of records (children). Irregular records never abort the build;
//! they degrade to zero-valued nodes and are reported as [`MalformedRecord`]s.

use std::fmt;

use generational_arena::Index;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::domain::arena::{NodeData, TreeArena, ROOT_NAME};

/// Name given to records that carry no usable key.
pub const UNNAMED: &str = "Unnamed";

/// Why a record was degraded during the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// Top-level input was not a sequence of records
    NotASequence(&'static str),
    /// Element was not a mapping at all
    NotARecord(&'static str),
    /// Mapping without any key
    EmptyRecord,
    /// Mapping with more than one key; only the first was used
    ExtraKeys(usize),
    /// Value was neither a number nor a sequence
    UnsupportedValue(&'static str),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::NotASequence(kind) => {
                write!(f, "expected a sequence of records, found {}", kind)
            }
            MalformedReason::NotARecord(kind) => write!(f, "expected a record, found {}", kind),
            MalformedReason::EmptyRecord => write!(f, "record has no key"),
            MalformedReason::ExtraKeys(n) => write!(f, "record has {} extra key(s), ignored", n),
            MalformedReason::UnsupportedValue(kind) => {
                write!(f, "value is {}, expected number or sequence", kind)
            }
        }
    }
}

/// Diagnostic for one degraded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// Path of the node that was created for the record
    pub path: String,
    pub reason: MalformedReason,
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Constructs value trees from nested records.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    diagnostics: Vec<MalformedRecord>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records degraded by the last build.
    pub fn diagnostics(&self) -> &[MalformedRecord] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<MalformedRecord> {
        self.diagnostics
    }

    /// Build from a parsed document; a lone mapping is treated as one record.
    pub fn build_value(&mut self, raw: &Value) -> TreeArena {
        match raw {
            Value::Array(records) => self.build(records),
            Value::Object(_) => {
                let tree = self.build(std::slice::from_ref(raw));
                self.note(String::new(), MalformedReason::NotASequence("mapping"));
                tree
            }
            other => {
                let tree = self.build(&[]);
                self.note(String::new(), MalformedReason::NotASequence(kind_of(other)));
                tree
            }
        }
    }

    /// Build the synthetic root and one child per record, in input order.
    #[instrument(level = "debug", skip_all, fields(records = records.len()))]
    pub fn build(&mut self, records: &[Value]) -> TreeArena {
        self.diagnostics.clear();

        let mut tree = TreeArena::new();
        let root = tree.insert_node(NodeData::new(ROOT_NAME, 0.0), None);
        for record in records {
            self.build_node(&mut tree, record, root);
        }
        settle_raw_value(&mut tree, root);

        debug!(
            "build: {} nodes, depth {}, {} malformed",
            tree.len(),
            tree.depth(),
            self.diagnostics.len()
        );
        tree
    }

    fn build_node(&mut self, tree: &mut TreeArena, record: &Value, parent: Index) -> Index {
        let mut reasons = Vec::new();
        let (name, value) = match record {
            Value::Object(map) => match map.iter().next() {
                Some((key, value)) => {
                    if map.len() > 1 {
                        reasons.push(MalformedReason::ExtraKeys(map.len() - 1));
                    }
                    (key.as_str(), Some(value))
                }
                None => {
                    reasons.push(MalformedReason::EmptyRecord);
                    (UNNAMED, None)
                }
            },
            other => {
                reasons.push(MalformedReason::NotARecord(kind_of(other)));
                (UNNAMED, None)
            }
        };

        let raw_value = match value {
            Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
            Some(Value::Array(_)) | None => 0.0,
            Some(other) => {
                reasons.push(MalformedReason::UnsupportedValue(kind_of(other)));
                0.0
            }
        };

        let idx = tree.insert_node(NodeData::new(name, raw_value), Some(parent));
        if !reasons.is_empty() {
            let path = tree.node_path(idx);
            for reason in reasons {
                self.note(path.clone(), reason);
            }
        }

        if let Some(Value::Array(children)) = value {
            for child in children {
                self.build_node(tree, child, idx);
            }
            settle_raw_value(tree, idx);
        }
        idx
    }

    fn note(&mut self, path: String, reason: MalformedReason) {
        let record = MalformedRecord { path, reason };
        warn!("malformed record: {}", record);
        self.diagnostics.push(record);
    }
}

/// Set a non-leaf node's raw value to the sum of its children's aggregates.
fn settle_raw_value(tree: &mut TreeArena, idx: Index) {
    let Some(node) = tree.get_node(idx) else {
        return;
    };
    if node.is_leaf() {
        return;
    }
    let sum: f64 = node
        .children
        .iter()
        .map(|&child| tree.aggregated_value(child))
        .sum();
    if let Some(node) = tree.get_node_mut(idx) {
        node.data.raw_value = sum;
    }
}

/// Build a tree from a parsed document, discarding diagnostics.
pub fn build_tree(raw: &Value) -> TreeArena {
    TreeBuilder::new().build_value(raw)
}
