//! Attachments and the immutable effective chain built from them.

use std::fmt;
use std::sync::Arc;

use hookchain_core::{ClassId, ExecMode, Extension, ProgramHandle, ProgramId};

/// One program bound to a (node, hook), with its per-attachment options.
#[derive(Clone)]
pub struct Attachment {
    pub program: ProgramHandle,
    pub mode: ExecMode,
    /// Class used when a classic program returns -1, and the class reported
    /// by integrated programs.
    pub default_class: ClassId,
    pub extension: Option<Arc<dyn Extension>>,
}

impl Attachment {
    pub fn new(program: ProgramHandle, mode: ExecMode) -> Self {
        Self {
            program,
            mode,
            default_class: ClassId::default(),
            extension: None,
        }
    }

    pub fn program_id(&self) -> ProgramId {
        self.program.id()
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("program", &self.program.id())
            .field("mode", &self.mode)
            .field("default_class", &self.default_class)
            .field("extension", &self.extension.is_some())
            .finish()
    }
}

/// Flattened, ready-to-run sequence of attachments for one (node, hook).
///
/// Never mutated after construction; shared between the publisher and any
/// number of readers.
#[derive(Debug, Default)]
pub struct EffectiveChain {
    items: Vec<Attachment>,
}

impl EffectiveChain {
    pub(crate) fn from_attachments(items: Vec<Attachment>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.items.iter()
    }

    pub fn program_ids(&self) -> Vec<ProgramId> {
        self.items.iter().map(Attachment::program_id).collect()
    }
}
