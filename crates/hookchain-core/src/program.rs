//! Program handles, the program store seam, and the traffic context.
//!
//! Programs are compiled and verified elsewhere. The engine only holds
//! reference-counted handles, acquires them from a [`ProgramStore`], and gives
//! them back through [`ProgramStore::release`] once no published chain can
//! reach them any more.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::verdict::Decision;

/// Store-level identity of a program object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramId(pub u32);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prog#{}", self.0)
    }
}

/// Executable policy unit.
pub trait Program: Send + Sync {
    /// Run against one unit of traffic and return the raw result.
    fn execute(&self, ctx: &TrafficContext) -> i32;
}

/// Shared reference to a program object.
#[derive(Clone)]
pub struct ProgramHandle {
    id: ProgramId,
    inner: Arc<dyn Program>,
}

impl ProgramHandle {
    pub fn new(id: ProgramId, program: Arc<dyn Program>) -> Self {
        Self { id, inner: program }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    #[inline]
    pub fn execute(&self, ctx: &TrafficContext) -> i32 {
        self.inner.execute(ctx)
    }

    /// True when both handles point at the same program object.
    pub fn same_object(&self, other: &ProgramHandle) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.inner) as *const (),
            Arc::as_ptr(&other.inner) as *const (),
        )
    }
}

impl fmt::Debug for ProgramHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramHandle").field("id", &self.id).finish()
    }
}

/// Reference-counted program object store.
pub trait ProgramStore: Send + Sync {
    /// Take a reference on the program, or `NotFound`.
    fn acquire(&self, id: ProgramId) -> Result<ProgramHandle>;

    /// Give back a reference taken by `acquire`.
    fn release(&self, handle: ProgramHandle);
}

/// Outcome of a classic-mode extension stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtOutcome {
    /// Ignore this match and keep walking the chain.
    Continue,
    /// Stop the chain with this action.
    Act(crate::verdict::Action),
}

/// Post-classification stage attached next to a classic-mode program.
pub trait Extension: Send + Sync {
    fn exec(&self, ctx: &TrafficContext, decision: &Decision) -> ExtOutcome;
}

/// Address family of the traffic being filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFamily {
    Inet,
    Inet6,
    Other,
}

impl AddressFamily {
    pub fn is_ip(self) -> bool {
        matches!(self, AddressFamily::Inet | AddressFamily::Inet6)
    }
}

/// The slice of a unit of traffic a program runs against.
#[derive(Debug, Clone)]
pub struct TrafficContext {
    pub family: AddressFamily,
    pub data: Bytes,
}

impl TrafficContext {
    pub fn new(family: AddressFamily, data: impl Into<Bytes>) -> Self {
        Self {
            family,
            data: data.into(),
        }
    }

    pub fn inet(data: impl Into<Bytes>) -> Self {
        Self::new(AddressFamily::Inet, data)
    }
}
