//! Engine config loader (strict parsing).

pub mod schema;

use std::fs;

use hookchain_core::error::{HookchainError, Result};

pub use schema::{AttachEntry, EngineConfig, EngineSection, FlagName, GroupEntry, ProgramEntry};

pub fn load_from_file(path: &str) -> Result<EngineConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| HookchainError::Config(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<EngineConfig> {
    let cfg: EngineConfig = serde_yaml::from_str(s)
        .map_err(|e| HookchainError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
