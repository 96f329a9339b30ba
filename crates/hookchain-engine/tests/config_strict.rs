#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use hookchain_core::{AttachFlags, HookType};
use hookchain_engine::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
engine:
  max_attachmentz: 8 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.engine.max_attachments, 64);
    assert_eq!(cfg.engine.max_effective_programs, 4096);
    assert!(cfg.engine.reclaim_on_commit);
    assert!(cfg.groups.is_empty());
}

#[test]
fn full_policy_parses() {
    let ok = r#"
version: 1
engine:
  max_attachments: 8
  max_effective_programs: 32
groups:
  - name: root
  - name: web
    parent: root
programs:
  - { id: 1, returns: 0 }
  - { id: 2, returns: 2 }
attachments:
  - { group: root, hook: egress, program: 1, flags: [allow_multi] }
  - { group: web, hook: sock_create, program: 2, flags: [allow_multi, direct], default_class: 3 }
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.groups[1].parent.as_deref(), Some("root"));
    assert_eq!(cfg.attachments[1].hook, HookType::SockCreate);
    assert_eq!(
        cfg.attachments[1].attach_flags(),
        AttachFlags::ALLOW_MULTI | AttachFlags::DIRECT
    );
    assert_eq!(cfg.attachments[0].default_class, 0);
}

#[test]
fn rejects_bad_policies() {
    let cases = [
        ("version: 2\n", "unsupported config version"),
        ("version: 1\nengine: { max_attachments: 0 }\n", "max_attachments"),
        (
            "version: 1\nengine: { max_attachments: 16, max_effective_programs: 8 }\n",
            "max_effective_programs",
        ),
        (
            "version: 1\ngroups: [ { name: a, parent: b }, { name: b } ]\n",
            "before it is declared",
        ),
        ("version: 1\ngroups: [ { name: a }, { name: b } ]\n", "exactly one root"),
        (
            "version: 1\ngroups: [ { name: a } ]\nprograms: [ { id: 1, returns: 0 }, { id: 1, returns: 2 } ]\n",
            "duplicate program",
        ),
        (
            "version: 1\ngroups: [ { name: a } ]\nattachments: [ { group: a, hook: ingress, program: 7 } ]\n",
            "unknown program",
        ),
        (
            "version: 1\ngroups: [ { name: a } ]\nprograms: [ { id: 1, returns: 0 } ]\nattachments: [ { group: a, hook: forward, program: 1 } ]\n",
            "invalid yaml",
        ),
    ];

    for (yaml, needle) in cases {
        let err = config::load_from_str(yaml).expect_err(yaml);
        assert_eq!(err.code().as_str(), "CONFIG", "case={yaml}");
        assert!(err.to_string().contains(needle), "case={yaml} err={err}");
    }
}
