//! Hierarchy transaction coordinator.
//!
//! One attach or detach changes the registry of a single node but can change
//! the effective chain of every descendant. A transaction:
//!
//! 1. applies the registry mutation to the target node,
//! 2. compiles a candidate chain for every node of its subtree into a staging
//!    table (nothing is visible to readers yet),
//! 3. on any staging failure, reverts the registry mutation and drops the
//!    staging table,
//! 4. otherwise publishes every staged chain (cannot fail), retires the old
//!    chains, and hands displaced programs to the reclaimer.

use tracing::{debug, warn};

use hookchain_core::error::Result;
use hookchain_core::{Discipline, Hierarchy, HookType, NodeId, ProgramId};

use crate::chain::{Attachment, EffectiveChain};
use crate::compile::compile;
use crate::publish::{Publisher, Reclaimer};
use crate::registry::{AttachUndo, DetachUndo, Registry};

pub(crate) enum Mutation {
    Attach {
        attachment: Attachment,
        discipline: Discipline,
    },
    Detach {
        program: Option<ProgramId>,
    },
}

impl Mutation {
    fn op(&self) -> &'static str {
        match self {
            Mutation::Attach { .. } => "attach",
            Mutation::Detach { .. } => "detach",
        }
    }
}

enum Undo {
    Attach(AttachUndo),
    Detach(DetachUndo),
}

/// Net effect of a committed transaction on the number of live attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Committed {
    Added,
    Replaced,
    Removed,
}

/// Writer-side state: only reachable through the engine's writer lock.
pub(crate) struct WriterState {
    pub registry: Registry,
    pub reclaimer: Reclaimer,
}

pub(crate) struct Transaction<'a> {
    pub tree: &'a dyn Hierarchy,
    pub publisher: &'a Publisher,
    pub writer: &'a mut WriterState,
    pub max_programs: usize,
}

impl Transaction<'_> {
    pub fn apply(mut self, root: NodeId, hook: HookType, mutation: Mutation) -> Result<Committed> {
        let op = mutation.op();
        let undo = match mutation {
            Mutation::Attach {
                attachment,
                discipline,
            } => Undo::Attach(self.writer.registry.attach(
                self.tree,
                root,
                hook,
                attachment,
                discipline,
            )?),
            Mutation::Detach { program } => {
                Undo::Detach(self.writer.registry.detach(root, hook, program)?)
            }
        };

        let staged = match self.stage(root, hook) {
            Ok(staged) => staged,
            Err(e) => {
                warn!(node = %root, %hook, op, error = %e, "staging failed; rolling back");
                match undo {
                    Undo::Attach(u) => self.writer.registry.revert_attach(root, hook, u),
                    Undo::Detach(u) => self.writer.registry.revert_detach(root, hook, u),
                }
                return Err(e);
            }
        };

        let nodes = staged.len();
        self.commit(hook, staged);

        let committed = match undo {
            Undo::Attach(AttachUndo::Appended { .. }) => Committed::Added,
            Undo::Attach(AttachUndo::Replaced { previous, .. }) => {
                if let Some(old) = previous {
                    self.writer.reclaimer.retire_program(old.program);
                }
                Committed::Replaced
            }
            Undo::Detach(u) => {
                let gone = self.writer.registry.finish_detach(root, hook, u);
                self.writer.reclaimer.retire_program(gone.program);
                Committed::Removed
            }
        };
        self.writer.reclaimer.advance();

        debug!(node = %root, %hook, op, nodes, "transaction committed");
        Ok(committed)
    }

    /// Compile every node of `root`'s subtree without publishing anything.
    fn stage(&self, root: NodeId, hook: HookType) -> Result<Vec<(NodeId, EffectiveChain)>> {
        let nodes = self.tree.preorder_descendants(root);
        let mut staged = Vec::with_capacity(nodes.len());
        for node in nodes {
            let chain = compile(self.tree, &self.writer.registry, node, hook, self.max_programs)?;
            staged.push((node, chain));
        }
        Ok(staged)
    }

    fn commit(&mut self, hook: HookType, staged: Vec<(NodeId, EffectiveChain)>) {
        for (node, chain) in staged {
            let old = self.publisher.publish(node, hook, chain);
            self.writer.reclaimer.retire_chain(old);
        }
    }
}

/// Compute and publish every hook's chain for a freshly created node.
/// All hooks compile before any is published.
pub(crate) fn inherit(
    tree: &dyn Hierarchy,
    publisher: &Publisher,
    writer: &mut WriterState,
    node: NodeId,
    max_programs: usize,
) -> Result<()> {
    let mut staged = Vec::with_capacity(HookType::COUNT);
    for hook in HookType::ALL {
        staged.push((hook, compile(tree, &writer.registry, node, hook, max_programs)?));
    }
    for (hook, chain) in staged {
        let old = publisher.publish(node, hook, chain);
        writer.reclaimer.retire_chain(old);
    }
    writer.reclaimer.advance();
    Ok(())
}
