//! hookchain core: identifiers, hook types, attach flags, verdicts, and the
//! seams to the program store and resource-group tree.
//!
//! This crate carries no runtime state. The engine crate builds the attachment
//! registry, effective-chain compiler, and publisher on top of these types.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `HookchainError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod flags;
pub mod hierarchy;
pub mod hook;
pub mod program;
pub mod verdict;

/// Shared result type.
pub use error::{ErrorCode, HookchainError, Result};
pub use flags::{AttachFlags, Discipline, ExecMode};
pub use hierarchy::{Hierarchy, NodeId};
pub use hook::HookType;
pub use program::{
    AddressFamily, ExtOutcome, Extension, Program, ProgramHandle, ProgramId, ProgramStore,
    TrafficContext,
};
pub use verdict::{Action, ClassId, Decision, Verdict};
