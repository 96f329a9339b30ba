use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use tracing::debug;

use hookchain_core::{ProgramHandle, ProgramStore};

use crate::chain::EffectiveChain;

struct RetiredChain {
    epoch: u64,
    chain: Weak<EffectiveChain>,
}

struct RetiredProgram {
    epoch: u64,
    handle: ProgramHandle,
}

/// Deferred release of programs displaced by a transaction.
///
/// Every transaction is one epoch. A chain swapped out during epoch `e` is
/// kept as a weak reference; it is dead once the last reader drops its `Arc`.
/// A program retired in epoch `e` can only be reached through chains retired
/// in epochs `<= e`, so it is released once none of those is alive.
///
/// Writer-only: lives under the engine's writer lock.
#[derive(Default)]
pub struct Reclaimer {
    epoch: u64,
    chains: VecDeque<RetiredChain>,
    programs: VecDeque<RetiredProgram>,
}

impl Reclaimer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn retire_chain(&mut self, chain: Arc<EffectiveChain>) {
        if chain.is_empty() {
            return;
        }
        self.chains.push_back(RetiredChain {
            epoch: self.epoch,
            chain: Arc::downgrade(&chain),
        });
    }

    pub fn retire_program(&mut self, handle: ProgramHandle) {
        self.programs.push_back(RetiredProgram {
            epoch: self.epoch,
            handle,
        });
    }

    /// Close the current epoch.
    pub fn advance(&mut self) {
        self.epoch += 1;
    }

    /// Programs still waiting for release.
    pub fn pending(&self) -> usize {
        self.programs.len()
    }

    /// Release every program no live retired chain can reach. Returns how
    /// many were released.
    pub fn sweep(&mut self, store: &dyn ProgramStore) -> usize {
        self.chains.retain(|r| r.chain.strong_count() > 0);
        let oldest_live = self.chains.iter().map(|r| r.epoch).min();

        let mut released = 0;
        while let Some(front) = self.programs.front() {
            if oldest_live.is_some_and(|e| e <= front.epoch) {
                break;
            }
            if let Some(p) = self.programs.pop_front() {
                debug!(program = %p.handle.id(), epoch = p.epoch, "releasing retired program");
                store.release(p.handle);
                released += 1;
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use hookchain_core::error::{HookchainError, Result};
    use hookchain_core::{ExecMode, ProgramId};

    use super::*;
    use crate::chain::Attachment;
    use crate::store::FixedProgram;

    #[derive(Default)]
    struct RecordingStore {
        released: Mutex<Vec<ProgramId>>,
    }

    impl ProgramStore for RecordingStore {
        fn acquire(&self, id: ProgramId) -> Result<ProgramHandle> {
            Err(HookchainError::NotFound(format!("{id}")))
        }
        fn release(&self, handle: ProgramHandle) {
            self.released.lock().unwrap().push(handle.id());
        }
    }

    fn handle(id: u32) -> ProgramHandle {
        ProgramHandle::new(ProgramId(id), Arc::new(FixedProgram(0)))
    }

    fn chain_of(h: &ProgramHandle) -> Arc<EffectiveChain> {
        Arc::new(EffectiveChain::from_attachments(vec![Attachment::new(
            h.clone(),
            ExecMode::Classic,
        )]))
    }

    #[test]
    fn release_waits_for_reader() {
        let store = RecordingStore::default();
        let mut r = Reclaimer::new();
        let p = handle(1);

        let published = chain_of(&p);
        let reader = Arc::clone(&published);
        r.retire_chain(published);
        r.retire_program(p);
        r.advance();

        assert_eq!(r.sweep(&store), 0);
        assert_eq!(r.pending(), 1);

        drop(reader);
        assert_eq!(r.sweep(&store), 1);
        assert_eq!(*store.released.lock().unwrap(), vec![ProgramId(1)]);
    }

    #[test]
    fn later_chains_do_not_hold_earlier_programs() {
        let store = RecordingStore::default();
        let mut r = Reclaimer::new();

        r.retire_program(handle(1));
        r.advance();

        // a chain retired in a later epoch cannot contain program 1
        let later = chain_of(&handle(2));
        let _reader = Arc::clone(&later);
        r.retire_chain(later);
        r.advance();

        assert_eq!(r.sweep(&store), 1);
        assert_eq!(r.epoch(), 2);
    }

    #[test]
    fn earlier_live_chain_blocks_later_program() {
        let store = RecordingStore::default();
        let mut r = Reclaimer::new();

        let old = chain_of(&handle(1));
        let reader = Arc::clone(&old);
        r.retire_chain(old);
        r.advance();

        r.retire_program(handle(1));
        r.advance();

        assert_eq!(r.sweep(&store), 0);
        drop(reader);
        assert_eq!(r.sweep(&store), 1);
    }
}
