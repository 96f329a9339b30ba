//! Effective-set compiler.
//!
//! Pure: reads the registry and the tree, never the publisher.
//!
//! Walking up from the node, a level contributes its live slots when nothing
//! has been collected yet or when the level is multi-attach. Contributing
//! levels are then laid out root-most first, each in insertion order.

use hookchain_core::error::{HookchainError, Result};
use hookchain_core::{Hierarchy, HookType, NodeId};

use crate::chain::{Attachment, EffectiveChain};
use crate::registry::{Registry, SlotList};

pub(crate) fn compile(
    tree: &dyn Hierarchy,
    registry: &Registry,
    node: NodeId,
    hook: HookType,
    max_programs: usize,
) -> Result<EffectiveChain> {
    let mut levels: Vec<&SlotList> = Vec::new();
    let mut count = 0usize;
    let mut cur = Some(node);

    while let Some(n) = cur {
        if let Some(list) = registry.slots(n, hook) {
            if count == 0 || list.discipline().is_multi() {
                let live = list.live_len();
                if live > 0 {
                    count += live;
                    levels.push(list);
                }
            }
        }
        cur = tree.parent(n);
    }

    if count > max_programs {
        return Err(HookchainError::ResourceExhausted(format!(
            "{node} {hook} chain needs {count} programs, budget is {max_programs}"
        )));
    }

    let mut items: Vec<Attachment> = Vec::new();
    items.try_reserve_exact(count).map_err(|e| {
        HookchainError::ResourceExhausted(format!("{node} {hook} chain allocation: {e}"))
    })?;
    for list in levels.iter().rev() {
        items.extend(list.live().cloned());
    }

    Ok(EffectiveChain::from_attachments(items))
}
