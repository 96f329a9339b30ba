//! Arena-backed resource-group tree.
//!
//! Reference implementation of the [`Hierarchy`] seam: nodes live in a flat
//! arena indexed by [`NodeId`], each with a parent link and an ordered child
//! list. Removed nodes leave a hole; ids are never reused.

use std::sync::{PoisonError, RwLock};

use hookchain_core::error::{HookchainError, Result};
use hookchain_core::{Hierarchy, NodeId};

#[derive(Debug)]
struct GroupNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

pub struct GroupTree {
    nodes: RwLock<Vec<Option<GroupNode>>>,
}

impl Default for GroupTree {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupTree {
    /// New tree holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(vec![Some(GroupNode {
                parent: None,
                children: Vec::new(),
            })]),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn create_child(&self, parent: NodeId) -> Result<NodeId> {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let id = NodeId(u32::try_from(nodes.len()).map_err(|_| {
            HookchainError::ResourceExhausted("group tree id space exhausted".into())
        })?);

        let p = nodes
            .get_mut(parent.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| HookchainError::NotFound(format!("parent group {parent}")))?;
        p.children.push(id);

        nodes.push(Some(GroupNode {
            parent: Some(parent),
            children: Vec::new(),
        }));
        Ok(id)
    }

    /// Remove a leaf group. The root and groups with children cannot be removed.
    pub fn remove(&self, node: NodeId) -> Result<()> {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let entry = nodes
            .get(node.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| HookchainError::NotFound(format!("group {node}")))?;

        let Some(parent) = entry.parent else {
            return Err(HookchainError::InvalidArgument("cannot remove the root group".into()));
        };
        if !entry.children.is_empty() {
            return Err(HookchainError::InvalidArgument(format!("group {node} still has children")));
        }

        if let Some(p) = nodes.get_mut(parent.index()).and_then(Option::as_mut) {
            p.children.retain(|c| *c != node);
        }
        nodes[node.index()] = None;
        Ok(())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes
            .get(node.index())
            .and_then(Option::as_ref)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Number of live groups.
    pub fn len(&self) -> usize {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Hierarchy for GroupTree {
    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.get(node.index()).and_then(Option::as_ref)?.parent
    }

    fn contains(&self, node: NodeId) -> bool {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        matches!(nodes.get(node.index()), Some(Some(_)))
    }

    fn preorder_descendants(&self, node: NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = Vec::new();
        let mut stack = vec![node];

        while let Some(id) = stack.pop() {
            let Some(Some(n)) = nodes.get(id.index()) else { continue };
            out.push(id);
            // reversed so the first child is visited first
            stack.extend(n.children.iter().rev().copied());
        }
        out
    }
}
