//! hookchain-engine
//!
//! Loads a declarative policy (groups, programs, attachments), applies it to a
//! fresh engine, and prints every group's listing as JSON.
//!
//! Usage: `hookchain-engine [path]` (default `hookchain.yaml`).

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use hookchain_core::error::{HookchainError, Result};
use hookchain_core::{ClassId, HookType, NodeId, ProgramId};
use hookchain_engine::config::{self, EngineConfig};
use hookchain_engine::{
    AttachEngine, AttachRequest, FixedProgram, GroupTree, InMemoryProgramStore, SlotListing,
};

fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "hookchain.yaml".to_string());
    match run(&path) {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "hookchain-engine failed");
            ExitCode::FAILURE
        }
    }
}

fn run(path: &str) -> Result<String> {
    let cfg = config::load_from_file(path)?;
    tracing::info!(
        path,
        groups = cfg.groups.len(),
        programs = cfg.programs.len(),
        attachments = cfg.attachments.len(),
        "config loaded"
    );

    let tree = Arc::new(GroupTree::new());
    let store = Arc::new(InMemoryProgramStore::new());
    let engine = AttachEngine::from_config(tree.clone(), store.clone(), &cfg);

    let groups = build_groups(&tree, &engine, &cfg)?;
    for p in &cfg.programs {
        store.insert(ProgramId(p.id), Arc::new(FixedProgram(p.returns)))?;
    }

    for a in &cfg.attachments {
        let node = lookup(&groups, &a.group)?;
        let req = AttachRequest::new(ProgramId(a.program), a.attach_flags())
            .default_class(ClassId(a.default_class));
        engine.attach_with(node, a.hook, req)?;
    }

    let mut listings: Vec<SlotListing> = Vec::new();
    for g in &cfg.groups {
        let node = lookup(&groups, &g.name)?;
        for hook in HookType::ALL {
            listings.push(engine.listing(node, hook));
        }
    }

    tracing::debug!(metrics = %engine.metrics().render(), "final metrics");

    serde_json::to_string_pretty(&listings)
        .map_err(|e| HookchainError::InvalidArgument(format!("listing encode failed: {e}")))
}

/// Groups are declared parent-first (checked by `validate`), so a single pass
/// creates them in tree order.
fn build_groups(
    tree: &GroupTree,
    engine: &AttachEngine,
    cfg: &EngineConfig,
) -> Result<HashMap<String, NodeId>> {
    let mut groups = HashMap::new();
    for g in &cfg.groups {
        let node = match &g.parent {
            None => tree.root(),
            Some(parent) => {
                let node = tree.create_child(lookup(&groups, parent)?)?;
                engine.node_created(node)?;
                node
            }
        };
        groups.insert(g.name.clone(), node);
    }
    Ok(groups)
}

fn lookup(groups: &HashMap<String, NodeId>, name: &str) -> Result<NodeId> {
    groups
        .get(name)
        .copied()
        .ok_or_else(|| HookchainError::NotFound(format!("group {name}")))
}
