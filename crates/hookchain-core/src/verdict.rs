//! Actions, decisions, and verdicts produced by running a chain.

use serde::Serialize;

/// Traffic class id assigned by a classic-mode program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ClassId(pub u32);

/// Action opcodes understood in integrated mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Ok,
    Deny,
    /// Traffic was taken over by the program.
    Consumed,
    Redirect,
    /// Keep going; the next program decides.
    Unspecified,
}

impl Action {
    pub const OPCODE_UNSPECIFIED: i32 = -1;
    pub const OPCODE_OK: i32 = 0;
    pub const OPCODE_DENY: i32 = 2;
    pub const OPCODE_CONSUMED: i32 = 4;
    pub const OPCODE_REDIRECT: i32 = 7;

    /// Map a raw program result. Anything outside the known set is `Unspecified`.
    pub fn from_opcode(code: i32) -> Self {
        match code {
            Self::OPCODE_OK => Action::Ok,
            Self::OPCODE_DENY => Action::Deny,
            Self::OPCODE_CONSUMED => Action::Consumed,
            Self::OPCODE_REDIRECT => Action::Redirect,
            _ => Action::Unspecified,
        }
    }
}

/// Final accept/deny answer handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::Deny => "deny",
        }
    }
}

/// Full result of running a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub action: Action,
    pub class: Option<ClassId>,
}

impl Decision {
    /// Nothing in the chain decided.
    pub const PASS: Decision = Decision {
        action: Action::Unspecified,
        class: None,
    };

    pub fn verdict(&self) -> Verdict {
        match self.action {
            Action::Deny | Action::Consumed => Verdict::Deny,
            Action::Ok | Action::Redirect | Action::Unspecified => Verdict::Allow,
        }
    }
}
