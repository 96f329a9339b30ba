//! Resource-group tree seam.
//!
//! The tree's own lifecycle is owned elsewhere; the engine only needs parent
//! links and a pre-order walk of a subtree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a resource-group node (arena index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Read access to the resource-group tree.
///
/// Implementations must be acyclic and give a snapshot-consistent answer for
/// the duration of one engine transaction (the engine's writer lock is held
/// across it, so tree writers should take the same care).
pub trait Hierarchy: Send + Sync {
    /// Parent of `node`; `None` for the root or an unknown node.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Whether `node` currently exists.
    fn contains(&self, node: NodeId) -> bool;

    /// `node` followed by all of its descendants in pre-order.
    /// Empty when `node` does not exist.
    fn preorder_descendants(&self, node: NodeId) -> Vec<NodeId>;
}
