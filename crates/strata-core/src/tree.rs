//! Vocabulary shared with the data tree engine
//!
//! The engine owns the tree itself; the ledger only needs paths to address
//! nodes, values to carry payloads, and modification batches to hand a
//! readied transaction's writes over for commit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON payload stored at a tree node.
pub type Value = serde_json::Value;

/// Path to a node in the data tree.
///
/// The empty path addresses the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreePath(Vec<String>);

impl TreePath {
    /// The root path
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from its segments
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Parse a `/`-separated path; empty segments are dropped
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// The path's segments
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Extend the path by one segment
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Whether `self` is `prefix` or a descendant of it
    pub fn starts_with(&self, prefix: &TreePath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// A single write against the data tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Create or replace the node at `path`
    Put {
        /// Node to write
        path: TreePath,
        /// Payload to store
        value: Value,
    },
    /// Remove the subtree rooted at `path`
    Delete {
        /// Root of the subtree to remove
        path: TreePath,
    },
}

/// An ordered, immutable batch of writes.
///
/// Produced by sealing an open transaction's overlay, or submitted directly
/// by a client that already applied the writes locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SealedModification {
    ops: Vec<WriteOp>,
}

impl SealedModification {
    /// Seal an ordered list of writes
    pub fn new(ops: Vec<WriteOp>) -> Self {
        Self { ops }
    }

    /// The writes, in application order
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Whether the batch carries no writes
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of writes in the batch
    pub fn len(&self) -> usize {
        self.ops.len()
    }
}
