//! Attach flags and the attachment discipline derived from them.
//!
//! Callers hand in a raw [`AttachFlags`] word. It is converted once into a
//! [`Discipline`] and an [`ExecMode`]; past that point the invalid
//! override+multi combination cannot be represented.

use bitflags::bitflags;
use serde::Serialize;

use crate::error::{HookchainError, Result};

bitflags! {
    /// Raw attach flags as passed by callers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttachFlags: u32 {
        /// A single program that descendants may replace.
        const ALLOW_OVERRIDE = 1 << 0;
        /// Many programs per node, composed with multi ancestors.
        const ALLOW_MULTI = 1 << 1;
        /// Integrated execution: program results are actions, not class ids.
        const DIRECT = 1 << 2;
    }
}

impl AttachFlags {
    /// Parse a raw flags word, rejecting unknown bits.
    pub fn from_raw(raw: u32) -> Result<Self> {
        Self::from_bits(raw).ok_or_else(|| {
            HookchainError::InvalidArgument(format!("unknown attach flags: {raw:#x}"))
        })
    }

    /// Split into discipline and execution mode.
    pub fn split(self) -> Result<(Discipline, ExecMode)> {
        let discipline = Discipline::try_from(self)?;
        let mode = if self.contains(AttachFlags::DIRECT) {
            ExecMode::Integrated
        } else {
            ExecMode::Classic
        };
        Ok((discipline, mode))
    }
}

/// Attachment discipline in force for one (node, hook) slot list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    /// One program; descendants may not attach below it.
    #[default]
    None,
    /// One program; descendants may replace it.
    Override,
    /// Many programs; composed with multi ancestors.
    Multi,
}

impl Discipline {
    /// Flag bits this discipline corresponds to.
    pub fn flags(self) -> AttachFlags {
        match self {
            Discipline::None => AttachFlags::empty(),
            Discipline::Override => AttachFlags::ALLOW_OVERRIDE,
            Discipline::Multi => AttachFlags::ALLOW_MULTI,
        }
    }

    pub fn is_multi(self) -> bool {
        self == Discipline::Multi
    }
}

impl TryFrom<AttachFlags> for Discipline {
    type Error = HookchainError;

    fn try_from(flags: AttachFlags) -> Result<Self> {
        let over = flags.contains(AttachFlags::ALLOW_OVERRIDE);
        let multi = flags.contains(AttachFlags::ALLOW_MULTI);
        match (over, multi) {
            (true, true) => Err(HookchainError::InvalidArgument(
                "ALLOW_OVERRIDE and ALLOW_MULTI are mutually exclusive".into(),
            )),
            (true, false) => Ok(Discipline::Override),
            (false, true) => Ok(Discipline::Multi),
            (false, false) => Ok(Discipline::None),
        }
    }
}

/// How a program's return value is interpreted by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// 0 skip, -1 default class, anything else is the class id.
    #[default]
    Classic,
    /// Result is an action opcode.
    Integrated,
}
