//! `AttachEngine`: the public face of the attachment engine.
//!
//! Mutations (attach, detach, node lifecycle) take the writer lock and run
//! as one transaction each. Reads (`run`, `classify`, `chain`, `effective`)
//! go straight to the publisher and never touch the lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

use hookchain_core::error::{HookchainError, Result};
use hookchain_core::{
    AttachFlags, ClassId, Decision, Discipline, Extension, Hierarchy, HookType, NodeId,
    ProgramId, ProgramStore, TrafficContext, Verdict,
};

use crate::chain::{Attachment, EffectiveChain};
use crate::compile::compile;
use crate::config::{EngineConfig, EngineSection};
use crate::exec::run_chain;
use crate::obs::metrics::EngineMetrics;
use crate::publish::{Publisher, Reclaimer};
use crate::registry::{Registry, SlotInfo};
use crate::txn::{inherit, Committed, Mutation, Transaction, WriterState};

/// Full attach request. `AttachEngine::attach` covers the common case.
#[derive(Clone)]
pub struct AttachRequest {
    pub program: ProgramId,
    pub flags: AttachFlags,
    pub default_class: ClassId,
    pub extension: Option<Arc<dyn Extension>>,
}

impl AttachRequest {
    pub fn new(program: ProgramId, flags: AttachFlags) -> Self {
        Self {
            program,
            flags,
            default_class: ClassId::default(),
            extension: None,
        }
    }

    pub fn default_class(mut self, class: ClassId) -> Self {
        self.default_class = class;
        self
    }

    pub fn extension(mut self, ext: Arc<dyn Extension>) -> Self {
        self.extension = Some(ext);
        self
    }
}

/// Diagnostic snapshot of one (node, hook).
#[derive(Debug, Clone, Serialize)]
pub struct SlotListing {
    pub node: NodeId,
    pub hook: HookType,
    pub discipline: Discipline,
    pub slots: Vec<SlotInfo>,
    pub effective: Vec<ProgramId>,
}

pub struct AttachEngine {
    tree: Arc<dyn Hierarchy>,
    store: Arc<dyn ProgramStore>,
    limits: EngineSection,
    writer: Mutex<WriterState>,
    publisher: Publisher,
    live: AtomicUsize,
    metrics: Arc<EngineMetrics>,
}

impl AttachEngine {
    pub fn new(
        tree: Arc<dyn Hierarchy>,
        store: Arc<dyn ProgramStore>,
        limits: EngineSection,
    ) -> Self {
        Self {
            tree,
            store,
            writer: Mutex::new(WriterState {
                registry: Registry::new(limits.max_attachments),
                reclaimer: Reclaimer::new(),
            }),
            limits,
            publisher: Publisher::new(),
            live: AtomicUsize::new(0),
            metrics: Arc::new(EngineMetrics::default()),
        }
    }

    pub fn from_config(
        tree: Arc<dyn Hierarchy>,
        store: Arc<dyn ProgramStore>,
        cfg: &EngineConfig,
    ) -> Self {
        Self::new(tree, store, cfg.engine.clone())
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// True while any attachment exists; callers may skip the engine otherwise.
    pub fn is_active(&self) -> bool {
        self.live.load(Ordering::Acquire) > 0
    }

    // --------------------
    // Mutations
    // --------------------

    pub fn attach(
        &self,
        node: NodeId,
        hook: HookType,
        program: ProgramId,
        flags: AttachFlags,
    ) -> Result<()> {
        self.attach_with(node, hook, AttachRequest::new(program, flags))
    }

    pub fn attach_with(&self, node: NodeId, hook: HookType, req: AttachRequest) -> Result<()> {
        let res = self.try_attach(node, hook, req);
        self.record("attach", &res);
        res
    }

    fn try_attach(&self, node: NodeId, hook: HookType, req: AttachRequest) -> Result<()> {
        let (discipline, mode) = req.flags.split()?;
        self.ensure_node(node)?;

        let program = self.store.acquire(req.program)?;
        let attachment = Attachment {
            program: program.clone(),
            mode,
            default_class: req.default_class,
            extension: req.extension,
        };

        let mut writer = self.lock_writer();
        let res = self.transaction(&mut writer).apply(
            node,
            hook,
            Mutation::Attach {
                attachment,
                discipline,
            },
        );

        match res {
            Ok(committed) => {
                if committed == Committed::Added {
                    self.live.fetch_add(1, Ordering::AcqRel);
                    self.metrics.attached_programs.add(&[("hook", hook.as_str())], 1);
                }
                info!(%node, %hook, program = %req.program, ?discipline, ?mode, "program attached");
                self.after_commit(&mut writer);
                Ok(())
            }
            Err(e) => {
                drop(writer);
                debug!(%node, %hook, program = %req.program, error = %e, "attach rejected");
                self.store.release(program);
                Err(e)
            }
        }
    }

    /// Detach from (node, hook). Under multi-attach `program` picks the slot;
    /// otherwise the sole attached program goes whatever `program` says.
    pub fn detach(&self, node: NodeId, hook: HookType, program: Option<ProgramId>) -> Result<()> {
        let res = self.try_detach(node, hook, program);
        self.record("detach", &res);
        res
    }

    fn try_detach(&self, node: NodeId, hook: HookType, program: Option<ProgramId>) -> Result<()> {
        self.ensure_node(node)?;

        let mut writer = self.lock_writer();
        self.transaction(&mut writer)
            .apply(node, hook, Mutation::Detach { program })
            .inspect_err(|e| debug!(%node, %hook, error = %e, "detach rejected"))?;

        self.live.fetch_sub(1, Ordering::AcqRel);
        self.metrics.attached_programs.add(&[("hook", hook.as_str())], -1);
        info!(%node, %hook, "program detached");
        self.after_commit(&mut writer);
        Ok(())
    }

    /// Publish inherited chains for a group that was just created in the tree.
    pub fn node_created(&self, node: NodeId) -> Result<()> {
        let res = self.ensure_node(node).and_then(|_| {
            let mut writer = self.lock_writer();
            inherit(
                self.tree.as_ref(),
                &self.publisher,
                &mut writer,
                node,
                self.limits.max_effective_programs,
            )
        });
        self.record("node_created", &res);
        if res.is_ok() {
            info!(%node, "group chains inherited");
        }
        res
    }

    /// Drop everything attached to a group that is going away, together with
    /// its published chains. The group must have no remaining descendants.
    pub fn node_released(&self, node: NodeId) -> Result<()> {
        let res = self.try_release_node(node);
        self.record("node_released", &res);
        res
    }

    fn try_release_node(&self, node: NodeId) -> Result<()> {
        if self.tree.preorder_descendants(node).len() > 1 {
            return Err(HookchainError::InvalidArgument(format!(
                "{node} still has descendants"
            )));
        }

        let mut writer = self.lock_writer();
        let attachments = writer.registry.remove_node(node);
        for old in self.publisher.remove(node) {
            writer.reclaimer.retire_chain(old);
        }
        for (hook, att) in &attachments {
            writer.reclaimer.retire_program(att.program.clone());
            self.metrics.attached_programs.add(&[("hook", hook.as_str())], -1);
        }
        writer.reclaimer.advance();
        self.live.fetch_sub(attachments.len(), Ordering::AcqRel);

        info!(%node, released = attachments.len(), "group attachments released");
        self.after_commit(&mut writer);
        Ok(())
    }

    /// Force a reclamation sweep. Returns how many programs were released.
    pub fn reclaim(&self) -> usize {
        let mut writer = self.lock_writer();
        self.sweep(&mut writer)
    }

    /// Programs retired but not yet released to the store.
    pub fn pending_reclaim(&self) -> usize {
        self.lock_writer().reclaimer.pending()
    }

    // --------------------
    // Reads
    // --------------------

    pub fn run(&self, node: NodeId, hook: HookType, ctx: &TrafficContext) -> Verdict {
        let verdict = self.classify(node, hook, ctx).verdict();
        self.metrics
            .verdicts
            .inc(&[("hook", hook.as_str()), ("verdict", verdict.as_str())]);
        verdict
    }

    pub fn classify(&self, node: NodeId, hook: HookType, ctx: &TrafficContext) -> Decision {
        if hook.is_network() && !ctx.family.is_ip() {
            return Decision::PASS;
        }
        let chain = self.publisher.load(node, hook);
        run_chain(&chain, ctx)
    }

    /// Currently published chain. Holding it keeps its programs from being
    /// released.
    pub fn chain(&self, node: NodeId, hook: HookType) -> Arc<EffectiveChain> {
        self.publisher.load(node, hook)
    }

    pub fn effective(&self, node: NodeId, hook: HookType) -> Vec<ProgramId> {
        self.publisher.load(node, hook).program_ids()
    }

    /// Compile (node, hook) from the registry as it is now, without publishing.
    pub fn compile(&self, node: NodeId, hook: HookType) -> Result<Vec<ProgramId>> {
        let writer = self.lock_writer();
        let chain = compile(
            self.tree.as_ref(),
            &writer.registry,
            node,
            hook,
            self.limits.max_effective_programs,
        )?;
        Ok(chain.program_ids())
    }

    pub fn list(&self, node: NodeId, hook: HookType) -> Vec<SlotInfo> {
        self.lock_writer().registry.list(node, hook)
    }

    pub fn discipline(&self, node: NodeId, hook: HookType) -> Discipline {
        self.lock_writer().registry.discipline(node, hook)
    }

    pub fn listing(&self, node: NodeId, hook: HookType) -> SlotListing {
        let writer = self.lock_writer();
        SlotListing {
            node,
            hook,
            discipline: writer.registry.discipline(node, hook),
            slots: writer.registry.list(node, hook),
            effective: self.effective(node, hook),
        }
    }

    pub fn list_json(&self, node: NodeId, hook: HookType) -> Result<String> {
        serde_json::to_string(&self.listing(node, hook))
            .map_err(|e| HookchainError::InvalidArgument(format!("listing encode failed: {e}")))
    }

    // --------------------
    // Internals
    // --------------------

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        // A panic under the lock cannot leave a half-applied transaction:
        // commit has no failure path.
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transaction<'a>(&'a self, writer: &'a mut WriterState) -> Transaction<'a> {
        Transaction {
            tree: self.tree.as_ref(),
            publisher: &self.publisher,
            writer,
            max_programs: self.limits.max_effective_programs,
        }
    }

    fn ensure_node(&self, node: NodeId) -> Result<()> {
        if self.tree.contains(node) {
            Ok(())
        } else {
            Err(HookchainError::InvalidArgument(format!("unknown group {node}")))
        }
    }

    fn after_commit(&self, writer: &mut WriterState) {
        if self.limits.reclaim_on_commit {
            self.sweep(writer);
        }
    }

    fn sweep(&self, writer: &mut WriterState) -> usize {
        let released = writer.reclaimer.sweep(self.store.as_ref());
        if released > 0 {
            self.metrics.programs_released.add(&[], released as u64);
        }
        released
    }

    fn record<T>(&self, op: &str, res: &Result<T>) {
        let outcome = match res {
            Ok(_) => "ok",
            Err(e) => e.code().as_str(),
        };
        self.metrics
            .transactions
            .inc(&[("op", op), ("outcome", outcome)]);
    }
}
