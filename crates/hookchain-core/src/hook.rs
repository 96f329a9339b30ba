//! Hook types: the policy domains a program can be attached to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HookchainError, Result};

/// Policy domain an attachment applies to.
///
/// Every node keeps one slot list and one published chain per hook type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookType {
    /// Traffic entering the group.
    Ingress,
    /// Traffic leaving the group.
    Egress,
    /// Socket creation inside the group.
    SockCreate,
}

impl HookType {
    /// Number of hook types; sizes per-node tables.
    pub const COUNT: usize = 3;

    /// All hook types in index order.
    pub const ALL: [HookType; Self::COUNT] =
        [HookType::Ingress, HookType::Egress, HookType::SockCreate];

    /// Dense index in `0..COUNT`.
    pub fn index(self) -> usize {
        match self {
            HookType::Ingress => 0,
            HookType::Egress => 1,
            HookType::SockCreate => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookType::Ingress => "ingress",
            HookType::Egress => "egress",
            HookType::SockCreate => "sock_create",
        }
    }

    /// Hooks that see packets. Non-IP traffic passes through these untouched.
    pub fn is_network(self) -> bool {
        matches!(self, HookType::Ingress | HookType::Egress)
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookType {
    type Err = HookchainError;

    fn from_str(s: &str) -> Result<Self> {
        HookType::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| HookchainError::InvalidArgument(format!("unknown hook type: {s}")))
    }
}
