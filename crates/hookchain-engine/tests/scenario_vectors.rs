//! Scenario vector tests: build a hierarchy, replay attach/detach steps,
//! then check published chains and verdicts for sample traffic.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use hookchain_core::{
    AddressFamily, AttachFlags, ClassId, HookType, NodeId, Program, ProgramId, Result,
    TrafficContext,
};
use hookchain_engine::config::EngineSection;
use hookchain_engine::{
    AttachEngine, AttachRequest, FixedProgram, FnProgram, GroupTree, InMemoryProgramStore,
};

mod vector_loader;
use vector_loader::{ExpectError, ProgramData, ScenarioVector, Step};

fn load(name: &str) -> ScenarioVector {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

fn hook(s: &str) -> HookType {
    s.parse().unwrap()
}

fn flags(names: &[String]) -> AttachFlags {
    names.iter().fold(AttachFlags::empty(), |acc, n| {
        acc | match n.as_str() {
            "allow_override" => AttachFlags::ALLOW_OVERRIDE,
            "allow_multi" => AttachFlags::ALLOW_MULTI,
            "direct" => AttachFlags::DIRECT,
            other => panic!("unknown flag: {other}"),
        }
    })
}

fn family(s: &str) -> AddressFamily {
    match s {
        "inet" => AddressFamily::Inet,
        "inet6" => AddressFamily::Inet6,
        "other" => AddressFamily::Other,
        other => panic!("unknown family: {other}"),
    }
}

fn program(p: &ProgramData) -> Arc<dyn Program> {
    match p.if_first_byte {
        None => Arc::new(FixedProgram(p.returns)),
        Some(b) => {
            let (then, otherwise) = (p.then, p.returns);
            Arc::new(FnProgram(move |ctx: &TrafficContext| {
                if ctx.data.first() == Some(&b) {
                    then
                } else {
                    otherwise
                }
            }))
        }
    }
}

fn check(desc: &str, step: usize, res: Result<()>, expect: &Option<ExpectError>) {
    match (res, expect) {
        (Ok(()), None) => {}
        (Err(e), Some(ex)) => {
            assert_eq!(e.code().as_str(), ex.code, "vector={desc} step={step}");
        }
        (Ok(()), Some(ex)) => panic!("vector={desc} step={step}: expected {}", ex.code),
        (Err(e), None) => panic!("vector={desc} step={step}: unexpected {e}"),
    }
}

fn replay(v: &ScenarioVector) {
    let tree = Arc::new(GroupTree::new());
    let store = Arc::new(InMemoryProgramStore::new());
    for p in &v.programs {
        store.insert(ProgramId(p.id), program(p)).unwrap();
    }
    let engine = AttachEngine::new(tree.clone(), store.clone(), EngineSection::default());

    let mut groups: HashMap<&str, NodeId> = HashMap::new();
    for g in &v.groups {
        let node = match &g.parent {
            None => tree.root(),
            Some(parent) => {
                let n = tree.create_child(groups[parent.as_str()]).unwrap();
                engine.node_created(n).unwrap();
                n
            }
        };
        groups.insert(g.name.as_str(), node);
    }

    for (i, step) in v.steps.iter().enumerate() {
        match step {
            Step::Attach {
                group,
                hook: h,
                program,
                flags: f,
                default_class,
                expect_error,
            } => {
                let req = AttachRequest::new(ProgramId(*program), flags(f))
                    .default_class(ClassId(*default_class));
                let res = engine.attach_with(groups[group.as_str()], hook(h), req);
                check(&v.description, i, res, expect_error);
            }
            Step::Detach {
                group,
                hook: h,
                program,
                expect_error,
            } => {
                let res = engine.detach(groups[group.as_str()], hook(h), program.map(ProgramId));
                check(&v.description, i, res, expect_error);
            }
        }
    }

    for ex in &v.expect {
        let node = groups[ex.group.as_str()];
        let got: Vec<u32> = engine
            .effective(node, hook(&ex.hook))
            .into_iter()
            .map(|p| p.0)
            .collect();
        assert_eq!(got, ex.programs, "vector={} group={}", v.description, ex.group);
        let compiled: Vec<u32> = engine
            .compile(node, hook(&ex.hook))
            .unwrap()
            .into_iter()
            .map(|p| p.0)
            .collect();
        assert_eq!(compiled, got, "vector={} group={}", v.description, ex.group);
    }

    for t in &v.traffic {
        let node = groups[t.group.as_str()];
        let ctx = TrafficContext::new(family(&t.family), t.frame.decode());
        let h = hook(&t.hook);

        let decision = engine.classify(node, h, &ctx);
        assert_eq!(engine.run(node, h, &ctx).as_str(), t.verdict, "vector={}", v.description);
        if let Some(class) = t.class {
            assert_eq!(decision.class, Some(ClassId(class)), "vector={}", v.description);
        }
    }
}

#[test]
fn scenario_vectors() {
    let files = [
        "inherit_from_root.json",
        "multi_under_plain_parent.json",
        "detach_clears_subtree.json",
        "multi_compose_first_byte.json",
        "override_shadows_parent.json",
        "non_ip_traffic_passes.json",
        "classic_default_class.json",
    ];

    for f in files {
        replay(&load(f));
    }
}
