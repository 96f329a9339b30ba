//! Execution engine: run an effective chain against one unit of traffic.
//!
//! Integrated attachments return action opcodes; `Unspecified` moves on, any
//! other action ends the chain. Classic attachments return 0 (skip), -1 (the
//! attachment's default class) or any other value as the class id; a match goes
//! through the optional extension stage, which either ends the chain with an
//! action or asks to keep going.

use hookchain_core::{Action, ClassId, Decision, ExecMode, ExtOutcome, TrafficContext};

use crate::chain::{Attachment, EffectiveChain};

const CLASSIC_SKIP: i32 = 0;
const CLASSIC_DEFAULT: i32 = -1;

pub(crate) fn run_chain(chain: &EffectiveChain, ctx: &TrafficContext) -> Decision {
    for att in chain.iter() {
        let res = att.program.execute(ctx);
        let step = match att.mode {
            ExecMode::Integrated => integrated_step(att, res),
            ExecMode::Classic => classic_step(att, res, ctx),
        };
        if let Some(decision) = step {
            return decision;
        }
    }
    Decision::PASS
}

fn integrated_step(att: &Attachment, res: i32) -> Option<Decision> {
    match Action::from_opcode(res) {
        Action::Unspecified => None,
        action => Some(Decision {
            action,
            class: Some(att.default_class),
        }),
    }
}

fn classic_step(att: &Attachment, res: i32, ctx: &TrafficContext) -> Option<Decision> {
    let class = match res {
        CLASSIC_SKIP => return None,
        CLASSIC_DEFAULT => att.default_class,
        r => ClassId(r as u32),
    };

    let decision = Decision {
        action: Action::Ok,
        class: Some(class),
    };
    match &att.extension {
        None => Some(decision),
        Some(ext) => match ext.exec(ctx, &decision) {
            ExtOutcome::Continue => None,
            ExtOutcome::Act(action) => Some(Decision {
                action,
                class: Some(class),
            }),
        },
    }
}
