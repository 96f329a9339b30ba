//! hookchain engine library entry.
//!
//! Wires the attachment registry, effective-chain compiler, transaction
//! coordinator, publisher, and execution engine into [`AttachEngine`]. Also
//! ships an arena group tree and an in-memory program store implementing the
//! collaborator seams from `hookchain-core`, used by the binary and by tests.

pub mod chain;
mod compile;
pub mod config;
pub mod engine;
mod exec;
pub mod obs;
mod publish;
mod registry;
pub mod store;
pub mod tree;
mod txn;

pub use chain::{Attachment, EffectiveChain};
pub use engine::{AttachEngine, AttachRequest, SlotListing};
pub use registry::SlotInfo;
pub use store::{FixedProgram, FnProgram, InMemoryProgramStore};
pub use tree::GroupTree;
