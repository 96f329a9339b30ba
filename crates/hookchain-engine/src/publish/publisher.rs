use std::sync::Arc;

use arc_swap::ArcSwap;

use hookchain_core::{HookType, NodeId};

use crate::chain::EffectiveChain;

/// Active chains of one node, one cell per hook.
struct NodeCell {
    chains: [ArcSwap<EffectiveChain>; HookType::COUNT],
}

impl NodeCell {
    fn new(empty: &Arc<EffectiveChain>) -> Self {
        Self {
            chains: std::array::from_fn(|_| ArcSwap::new(Arc::clone(empty))),
        }
    }
}

type NodeTable = Vec<Option<Arc<NodeCell>>>;

/// Lock-free read side of the engine.
///
/// The node table is itself an immutable snapshot behind an `ArcSwap`; it is
/// copied only when a node gains or loses its cell. Swapping a chain never
/// touches the table.
pub struct Publisher {
    table: ArcSwap<NodeTable>,
    empty: Arc<EffectiveChain>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(Vec::new()),
            empty: Arc::new(EffectiveChain::default()),
        }
    }

    /// Current chain for (node, hook). Unknown nodes see the shared empty chain.
    #[inline]
    pub fn load(&self, node: NodeId, hook: HookType) -> Arc<EffectiveChain> {
        let table = self.table.load();
        match table.get(node.index()).and_then(Option::as_ref) {
            Some(cell) => cell.chains[hook.index()].load_full(),
            None => Arc::clone(&self.empty),
        }
    }

    /// Swap in a new chain and return the one it replaced.
    ///
    /// Writer-only: callers hold the engine's writer lock.
    pub(crate) fn publish(
        &self,
        node: NodeId,
        hook: HookType,
        chain: EffectiveChain,
    ) -> Arc<EffectiveChain> {
        let cell = self.cell_or_insert(node);
        let next = if chain.is_empty() {
            Arc::clone(&self.empty)
        } else {
            Arc::new(chain)
        };
        cell.chains[hook.index()].swap(next)
    }

    /// Drop the node's cell, returning every chain it held.
    pub(crate) fn remove(&self, node: NodeId) -> Vec<Arc<EffectiveChain>> {
        let current = self.table.load_full();
        let Some(Some(cell)) = current.get(node.index()) else {
            return Vec::new();
        };
        let cell = Arc::clone(cell);

        let mut next: NodeTable = current.as_ref().clone();
        next[node.index()] = None;
        self.table.store(Arc::new(next));

        cell.chains.iter().map(|c| c.load_full()).collect()
    }

    fn cell_or_insert(&self, node: NodeId) -> Arc<NodeCell> {
        let current = self.table.load_full();
        if let Some(Some(cell)) = current.get(node.index()) {
            return Arc::clone(cell);
        }

        let mut next: NodeTable = current.as_ref().clone();
        if next.len() <= node.index() {
            next.resize_with(node.index() + 1, || None);
        }
        let cell = Arc::new(NodeCell::new(&self.empty));
        next[node.index()] = Some(Arc::clone(&cell));
        self.table.store(Arc::new(next));
        cell
    }

    #[cfg(test)]
    fn is_shared_empty(&self, chain: &Arc<EffectiveChain>) -> bool {
        Arc::ptr_eq(chain, &self.empty)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hookchain_core::{ExecMode, ProgramHandle, ProgramId};

    use super::*;
    use crate::chain::Attachment;
    use crate::store::FixedProgram;

    fn chain(ids: &[u32]) -> EffectiveChain {
        EffectiveChain::from_attachments(
            ids.iter()
                .map(|id| {
                    Attachment::new(
                        ProgramHandle::new(ProgramId(*id), Arc::new(FixedProgram(0))),
                        ExecMode::Classic,
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn unknown_node_reads_empty() {
        let p = Publisher::new();
        assert!(p.is_shared_empty(&p.load(NodeId(3), HookType::Ingress)));
    }

    #[test]
    fn publish_returns_old_and_reader_keeps_its_copy() {
        let p = Publisher::new();
        let n = NodeId(2);
        let old = p.publish(n, HookType::Egress, chain(&[1]));
        assert!(p.is_shared_empty(&old));

        let pinned = p.load(n, HookType::Egress);
        let old = p.publish(n, HookType::Egress, chain(&[2, 3]));
        assert!(Arc::ptr_eq(&old, &pinned));
        assert_eq!(pinned.program_ids(), vec![ProgramId(1)]);
        assert_eq!(
            p.load(n, HookType::Egress).program_ids(),
            vec![ProgramId(2), ProgramId(3)]
        );
        assert!(p.load(n, HookType::Ingress).is_empty());
    }

    #[test]
    fn remove_hands_back_chains() {
        let p = Publisher::new();
        let n = NodeId(0);
        p.publish(n, HookType::Ingress, chain(&[1]));
        let gone = p.remove(n);
        assert_eq!(gone.len(), HookType::COUNT);
        assert!(p.is_shared_empty(&p.load(n, HookType::Ingress)));
    }
}
