//! Attachment registry: per node, per hook, an ordered slot list plus the
//! discipline in force.
//!
//! Writer-only state. Every method here runs under the engine's writer lock;
//! readers never look at the registry, only at published chains.
//!
//! Mutations return an undo record so the transaction coordinator can put the
//! registry back exactly as it was when staging fails.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use hookchain_core::error::{HookchainError, Result};
use hookchain_core::{ClassId, Discipline, ExecMode, Hierarchy, HookType, NodeId, ProgramId};

use crate::chain::Attachment;

/// One attachment position. `attachment == None` is a tombstone that lives
/// only until the detach transaction commits or rolls back.
#[derive(Debug, Clone)]
pub(crate) struct AttachmentSlot {
    pub attachment: Option<Attachment>,
    pub order: u64,
}

#[derive(Debug, Default)]
pub(crate) struct SlotList {
    discipline: Discipline,
    slots: Vec<AttachmentSlot>,
    next_order: u64,
}

impl SlotList {
    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    pub fn live(&self) -> impl Iterator<Item = &Attachment> {
        self.slots.iter().filter_map(|s| s.attachment.as_ref())
    }

    pub fn live_len(&self) -> usize {
        self.live().count()
    }

    fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug, Default)]
struct NodeAttachments {
    hooks: [SlotList; HookType::COUNT],
}

impl NodeAttachments {
    fn is_empty(&self) -> bool {
        self.hooks.iter().all(SlotList::is_empty)
    }
}

/// Diagnostic view of one live slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    pub program: ProgramId,
    pub order: u64,
    pub mode: ExecMode,
    pub default_class: ClassId,
}

/// What `attach` changed.
#[derive(Debug)]
pub(crate) enum AttachUndo {
    /// A new slot was pushed at the end of the list.
    Appended { prev: Discipline },
    /// The sole slot's program was swapped out.
    Replaced {
        index: usize,
        previous: Option<Attachment>,
        prev: Discipline,
    },
}

/// What `detach` tombstoned.
#[derive(Debug)]
pub(crate) struct DetachUndo {
    index: usize,
    detached: Attachment,
}

#[derive(Debug)]
pub(crate) struct Registry {
    nodes: HashMap<NodeId, NodeAttachments>,
    max_attachments: usize,
}

impl Registry {
    pub fn new(max_attachments: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            max_attachments,
        }
    }

    pub fn slots(&self, node: NodeId, hook: HookType) -> Option<&SlotList> {
        self.nodes.get(&node).map(|n| &n.hooks[hook.index()])
    }

    fn slots_mut(&mut self, node: NodeId, hook: HookType) -> Option<&mut SlotList> {
        self.nodes.get_mut(&node).map(|n| &mut n.hooks[hook.index()])
    }

    pub fn discipline(&self, node: NodeId, hook: HookType) -> Discipline {
        self.slots(node, hook)
            .map(SlotList::discipline)
            .unwrap_or_default()
    }

    /// Nearest ancestor that decides: a multi ancestor allows, an ancestor
    /// with a program allows only if it is overridable.
    fn blocking_ancestor(
        &self,
        tree: &dyn Hierarchy,
        node: NodeId,
        hook: HookType,
    ) -> Option<NodeId> {
        let mut cur = tree.parent(node);
        while let Some(p) = cur {
            if let Some(list) = self.slots(p, hook) {
                if list.discipline().is_multi() {
                    return None;
                }
                if list.live_len() > 0 {
                    return (list.discipline() != Discipline::Override).then_some(p);
                }
            }
            cur = tree.parent(p);
        }
        None
    }

    pub fn attach(
        &mut self,
        tree: &dyn Hierarchy,
        node: NodeId,
        hook: HookType,
        attachment: Attachment,
        discipline: Discipline,
    ) -> Result<AttachUndo> {
        if let Some(p) = self.blocking_ancestor(tree, node, hook) {
            return Err(HookchainError::PermissionDenied(format!(
                "{p} holds a non-overridable {hook} program"
            )));
        }

        if let Some(list) = self.slots(node, hook) {
            if !list.is_empty() && list.discipline() != discipline {
                return Err(HookchainError::PermissionDenied(format!(
                    "{node} {hook} is attached as {:?}, cannot switch to {discipline:?}",
                    list.discipline()
                )));
            }
            let appends = discipline.is_multi() || list.is_empty();
            if appends && list.live_len() >= self.max_attachments {
                return Err(HookchainError::TooManyAttachments {
                    limit: self.max_attachments,
                });
            }
            if discipline.is_multi()
                && list
                    .live()
                    .any(|a| a.program.same_object(&attachment.program))
            {
                return Err(HookchainError::InvalidArgument(format!(
                    "{} already attached to {node} {hook}",
                    attachment.program_id()
                )));
            }
        }

        let list = &mut self.nodes.entry(node).or_default().hooks[hook.index()];
        let prev = list.discipline;
        list.discipline = discipline;

        if discipline.is_multi() || list.slots.is_empty() {
            let order = list.next_order;
            list.next_order += 1;
            list.slots.push(AttachmentSlot {
                attachment: Some(attachment),
                order,
            });
            return Ok(AttachUndo::Appended { prev });
        }

        let previous = list.slots[0].attachment.replace(attachment);
        Ok(AttachUndo::Replaced {
            index: 0,
            previous,
            prev,
        })
    }

    pub fn revert_attach(&mut self, node: NodeId, hook: HookType, undo: AttachUndo) {
        let Some(list) = self.slots_mut(node, hook) else { return };
        match undo {
            AttachUndo::Appended { prev } => {
                list.slots.pop();
                list.next_order -= 1;
                list.discipline = prev;
            }
            AttachUndo::Replaced {
                index,
                previous,
                prev,
            } => {
                if let Some(slot) = list.slots.get_mut(index) {
                    slot.attachment = previous;
                }
                list.discipline = prev;
            }
        }
        self.prune(node);
    }

    pub fn detach(
        &mut self,
        node: NodeId,
        hook: HookType,
        program: Option<ProgramId>,
    ) -> Result<DetachUndo> {
        let discipline = self.discipline(node, hook);

        if discipline.is_multi() {
            let Some(target) = program else {
                return Err(HookchainError::InvalidArgument(format!(
                    "{node} {hook} is multi-attach; detach needs a program"
                )));
            };
            let list = self
                .slots_mut(node, hook)
                .ok_or_else(|| HookchainError::NotFound(format!("{target} on {node} {hook}")))?;
            let index = list
                .slots
                .iter()
                .position(|s| s.attachment.as_ref().map(Attachment::program_id) == Some(target))
                .ok_or_else(|| HookchainError::NotFound(format!("{target} on {node} {hook}")))?;
            let detached = list.slots[index]
                .attachment
                .take()
                .ok_or_else(|| HookchainError::NotFound(format!("{target} on {node} {hook}")))?;
            return Ok(DetachUndo { index, detached });
        }

        // Non-multi: the sole slot goes regardless of which program was named.
        let detached = self
            .slots_mut(node, hook)
            .and_then(|list| list.slots.first_mut())
            .and_then(|slot| slot.attachment.take())
            .ok_or_else(|| HookchainError::NotFound(format!("nothing attached to {node} {hook}")))?;

        if let Some(named) = program.filter(|p| *p != detached.program_id()) {
            debug!(%node, %hook, named = %named, attached = %detached.program_id(),
                "detach named a different program; detaching the attached one");
        }
        Ok(DetachUndo { index: 0, detached })
    }

    pub fn revert_detach(&mut self, node: NodeId, hook: HookType, undo: DetachUndo) {
        if let Some(slot) = self
            .slots_mut(node, hook)
            .and_then(|list| list.slots.get_mut(undo.index))
        {
            slot.attachment = Some(undo.detached);
        }
    }

    /// Physically drop the tombstone after commit and hand back the program.
    pub fn finish_detach(&mut self, node: NodeId, hook: HookType, undo: DetachUndo) -> Attachment {
        if let Some(list) = self.slots_mut(node, hook) {
            if undo.index < list.slots.len() {
                list.slots.remove(undo.index);
            }
            if list.slots.is_empty() {
                list.discipline = Discipline::None;
            }
        }
        self.prune(node);
        undo.detached
    }

    pub fn list(&self, node: NodeId, hook: HookType) -> Vec<SlotInfo> {
        let Some(list) = self.slots(node, hook) else { return Vec::new() };
        list.slots
            .iter()
            .filter_map(|s| {
                s.attachment.as_ref().map(|a| SlotInfo {
                    program: a.program_id(),
                    order: s.order,
                    mode: a.mode,
                    default_class: a.default_class,
                })
            })
            .collect()
    }

    /// Drop every attachment of `node`, returning them per hook.
    pub fn remove_node(&mut self, node: NodeId) -> Vec<(HookType, Attachment)> {
        let Some(entry) = self.nodes.remove(&node) else { return Vec::new() };
        HookType::ALL
            .into_iter()
            .zip(entry.hooks)
            .flat_map(|(hook, list)| {
                list.slots
                    .into_iter()
                    .filter_map(move |s| s.attachment.map(|a| (hook, a)))
            })
            .collect()
    }

    /// Live attachments across every node and hook.
    #[cfg(test)]
    fn live_total(&self) -> usize {
        self.nodes
            .values()
            .flat_map(|n| n.hooks.iter())
            .map(SlotList::live_len)
            .sum()
    }

    fn prune(&mut self, node: NodeId) {
        if self.nodes.get(&node).is_some_and(NodeAttachments::is_empty) {
            self.nodes.remove(&node);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hookchain_core::{ProgramHandle, ProgramId};

    use super::*;
    use crate::store::FixedProgram;
    use crate::tree::GroupTree;

    fn att(id: u32) -> Attachment {
        Attachment::new(
            ProgramHandle::new(ProgramId(id), Arc::new(FixedProgram(1))),
            ExecMode::Classic,
        )
    }

    #[test]
    fn non_multi_replaces_sole_slot() {
        let t = GroupTree::new();
        let r = t.root();
        let mut reg = Registry::new(64);

        let u1 = reg.attach(&t, r, HookType::Ingress, att(1), Discipline::None).unwrap();
        assert!(matches!(u1, AttachUndo::Appended { .. }));
        let u2 = reg.attach(&t, r, HookType::Ingress, att(2), Discipline::None).unwrap();
        assert!(matches!(u2, AttachUndo::Replaced { .. }));

        let listed = reg.list(r, HookType::Ingress);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].program, ProgramId(2));
        assert_eq!(listed[0].order, 0);
    }

    #[test]
    fn discipline_switch_needs_empty_list() {
        let t = GroupTree::new();
        let r = t.root();
        let mut reg = Registry::new(64);
        reg.attach(&t, r, HookType::Egress, att(1), Discipline::Override).unwrap();

        let err = reg
            .attach(&t, r, HookType::Egress, att(2), Discipline::Multi)
            .expect_err("must fail");
        assert_eq!(err.code().as_str(), "PERMISSION_DENIED");
    }

    #[test]
    fn override_ancestor_allows_child_attach() {
        let t = GroupTree::new();
        let r = t.root();
        let c = t.create_child(r).unwrap();
        let mut reg = Registry::new(64);
        reg.attach(&t, r, HookType::Ingress, att(1), Discipline::Override).unwrap();

        reg.attach(&t, c, HookType::Ingress, att(2), Discipline::None).unwrap();
        assert_eq!(reg.discipline(c, HookType::Ingress), Discipline::None);
    }

    #[test]
    fn revert_attach_restores_previous_program() {
        let t = GroupTree::new();
        let r = t.root();
        let mut reg = Registry::new(64);
        reg.attach(&t, r, HookType::Ingress, att(1), Discipline::Override).unwrap();

        let undo = reg.attach(&t, r, HookType::Ingress, att(2), Discipline::Override).unwrap();
        reg.revert_attach(r, HookType::Ingress, undo);
        assert_eq!(reg.list(r, HookType::Ingress)[0].program, ProgramId(1));

        let undo = reg.attach(&t, r, HookType::Egress, att(3), Discipline::Multi).unwrap();
        reg.revert_attach(r, HookType::Egress, undo);
        assert!(reg.list(r, HookType::Egress).is_empty());
        assert_eq!(reg.discipline(r, HookType::Egress), Discipline::None);
    }

    #[test]
    fn multi_detach_without_program_is_invalid() {
        let t = GroupTree::new();
        let r = t.root();
        let mut reg = Registry::new(64);
        reg.attach(&t, r, HookType::Ingress, att(1), Discipline::Multi).unwrap();

        let err = reg.detach(r, HookType::Ingress, None).expect_err("must fail");
        assert_eq!(err.code().as_str(), "INVALID_ARGUMENT");
        let err = reg
            .detach(r, HookType::Ingress, Some(ProgramId(5)))
            .expect_err("must fail");
        assert_eq!(err.code().as_str(), "NOT_FOUND");
    }

    #[test]
    fn finish_detach_resets_discipline() {
        let t = GroupTree::new();
        let r = t.root();
        let mut reg = Registry::new(64);
        reg.attach(&t, r, HookType::Ingress, att(1), Discipline::Multi).unwrap();
        reg.attach(&t, r, HookType::Ingress, att(2), Discipline::Multi).unwrap();

        let undo = reg.detach(r, HookType::Ingress, Some(ProgramId(1))).unwrap();
        // tombstoned, still physically present
        assert_eq!(reg.list(r, HookType::Ingress).len(), 1);
        reg.finish_detach(r, HookType::Ingress, undo);
        assert_eq!(reg.discipline(r, HookType::Ingress), Discipline::Multi);

        let undo = reg.detach(r, HookType::Ingress, Some(ProgramId(2))).unwrap();
        let gone = reg.finish_detach(r, HookType::Ingress, undo);
        assert_eq!(gone.program_id(), ProgramId(2));
        assert_eq!(reg.discipline(r, HookType::Ingress), Discipline::None);
        assert_eq!(reg.live_total(), 0);
    }
}
