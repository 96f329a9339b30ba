//! In-memory program object store.
//!
//! Reference implementation of [`ProgramStore`]. Tracks how many references
//! the engine currently holds per program so callers (and tests) can see when
//! a displaced program is actually given back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use hookchain_core::error::{HookchainError, Result};
use hookchain_core::{Program, ProgramHandle, ProgramId, ProgramStore, TrafficContext};

struct StoreEntry {
    handle: ProgramHandle,
    refs: AtomicUsize,
}

#[derive(Default)]
pub struct InMemoryProgramStore {
    programs: DashMap<ProgramId, StoreEntry>,
}

impl InMemoryProgramStore {
    pub fn new() -> Self {
        Self {
            programs: DashMap::new(),
        }
    }

    /// Load a program object under `id`. Replaces nothing: a taken id is an error.
    pub fn insert(&self, id: ProgramId, program: Arc<dyn Program>) -> Result<()> {
        use dashmap::mapref::entry::Entry;
        match self.programs.entry(id) {
            Entry::Occupied(_) => Err(HookchainError::InvalidArgument(format!(
                "program {id} already loaded"
            ))),
            Entry::Vacant(v) => {
                v.insert(StoreEntry {
                    handle: ProgramHandle::new(id, program),
                    refs: AtomicUsize::new(0),
                });
                Ok(())
            }
        }
    }

    /// References currently held outside the store.
    pub fn refcount(&self, id: ProgramId) -> usize {
        self.programs
            .get(&id)
            .map(|e| e.refs.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}

impl ProgramStore for InMemoryProgramStore {
    fn acquire(&self, id: ProgramId) -> Result<ProgramHandle> {
        let entry = self
            .programs
            .get(&id)
            .ok_or_else(|| HookchainError::NotFound(format!("program {id}")))?;
        entry.refs.fetch_add(1, Ordering::AcqRel);
        Ok(entry.handle.clone())
    }

    fn release(&self, handle: ProgramHandle) {
        if let Some(entry) = self.programs.get(&handle.id()) {
            // saturating: a double release is a caller bug, not worth a panic
            let _ = entry
                .refs
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        }
    }
}

/// Program that always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedProgram(pub i32);

impl Program for FixedProgram {
    fn execute(&self, _ctx: &TrafficContext) -> i32 {
        self.0
    }
}

/// Program backed by a closure.
pub struct FnProgram<F>(pub F);

impl<F> Program for FnProgram<F>
where
    F: Fn(&TrafficContext) -> i32 + Send + Sync,
{
    fn execute(&self, ctx: &TrafficContext) -> i32 {
        (self.0)(ctx)
    }
}
