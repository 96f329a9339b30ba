use std::collections::HashSet;

use serde::Deserialize;

use hookchain_core::error::{HookchainError, Result};
use hookchain_core::{AttachFlags, HookType};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub version: u32,

    #[serde(default)]
    pub engine: EngineSection,

    /// Declarative policy, applied by the `hookchain-engine` binary.
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    #[serde(default)]
    pub programs: Vec<ProgramEntry>,
    #[serde(default)]
    pub attachments: Vec<AttachEntry>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(HookchainError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.engine.validate()?;
        self.validate_policy()?;

        Ok(())
    }

    fn validate_policy(&self) -> Result<()> {
        let mut groups = HashSet::new();
        let mut roots = 0;
        for g in &self.groups {
            match &g.parent {
                None => roots += 1,
                Some(p) if !groups.contains(p.as_str()) => {
                    return Err(HookchainError::Config(format!(
                        "group {} names parent {p} before it is declared",
                        g.name
                    )));
                }
                Some(_) => {}
            }
            if !groups.insert(g.name.as_str()) {
                return Err(HookchainError::Config(format!("duplicate group {}", g.name)));
            }
        }
        if !self.groups.is_empty() && roots != 1 {
            return Err(HookchainError::Config(format!(
                "groups must have exactly one root, found {roots}"
            )));
        }

        let mut programs = HashSet::new();
        for p in &self.programs {
            if !programs.insert(p.id) {
                return Err(HookchainError::Config(format!("duplicate program {}", p.id)));
            }
        }

        for a in &self.attachments {
            if !groups.contains(a.group.as_str()) {
                return Err(HookchainError::Config(format!(
                    "attachment refers to unknown group {}",
                    a.group
                )));
            }
            if !programs.contains(&a.program) {
                return Err(HookchainError::Config(format!(
                    "attachment refers to unknown program {}",
                    a.program
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Live attachments per (node, hook).
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,

    /// Upper bound on one compiled chain; larger chains fail staging.
    #[serde(default = "default_max_effective_programs")]
    pub max_effective_programs: usize,

    /// Sweep retired programs at the end of every transaction.
    #[serde(default = "default_reclaim_on_commit")]
    pub reclaim_on_commit: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_attachments: default_max_attachments(),
            max_effective_programs: default_max_effective_programs(),
            reclaim_on_commit: default_reclaim_on_commit(),
        }
    }
}

impl EngineSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=4096).contains(&self.max_attachments) {
            return Err(HookchainError::Config(
                "engine.max_attachments must be between 1 and 4096".into(),
            ));
        }
        if self.max_effective_programs < self.max_attachments {
            return Err(HookchainError::Config(
                "engine.max_effective_programs must be at least max_attachments".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_attachments() -> usize {
    64
}
fn default_max_effective_programs() -> usize {
    4096
}
fn default_reclaim_on_commit() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupEntry {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

/// A program that always returns `returns`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramEntry {
    pub id: u32,
    pub returns: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagName {
    AllowOverride,
    AllowMulti,
    Direct,
}

impl FlagName {
    pub fn bits(self) -> AttachFlags {
        match self {
            FlagName::AllowOverride => AttachFlags::ALLOW_OVERRIDE,
            FlagName::AllowMulti => AttachFlags::ALLOW_MULTI,
            FlagName::Direct => AttachFlags::DIRECT,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachEntry {
    pub group: String,
    pub hook: HookType,
    pub program: u32,
    #[serde(default)]
    pub flags: Vec<FlagName>,
    #[serde(default)]
    pub default_class: u32,
}

impl AttachEntry {
    pub fn attach_flags(&self) -> AttachFlags {
        self.flags
            .iter()
            .fold(AttachFlags::empty(), |acc, f| acc | f.bits())
    }
}
