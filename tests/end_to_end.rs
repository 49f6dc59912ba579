use std::io::Write;

use kubeka::error::Diagnostics;
use kubeka::node::registry::NodeRegistry;
use kubeka::{eval, exec::executor, parser, tree};

fn load(contents: &str) -> (NodeRegistry, Diagnostics) {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    let diags = Diagnostics::new(false);
    let mut nodes = Vec::new();
    parser::read_file(&mut nodes, f.path(), &diags).unwrap();
    (NodeRegistry::coalesce(nodes, &diags), diags)
}

#[test]
fn two_node_happy_path_runs_to_completion() {
    let (registry, diags) = load(
        "[entrypoint]\nID = root\nMESSAGE = hi\nJOBS += a\n\n\
         [job]\nID = a\nMESSAGE = m\nEXEC = echo ok\n",
    );
    registry.validate(&diags);
    assert_eq!(diags.nerrors(), 0);

    let mut t = tree::instantiate("root", &registry, &diags).unwrap();
    let root = t.root.unwrap();
    eval::eval(&mut t, root, &diags);
    assert_eq!(diags.nerrors(), 0);

    let rc = executor::run(&mut t, root, &diags, &mut Vec::new());
    assert_eq!(rc, 0);
}

#[test]
fn xor_violation_is_reported_at_validation() {
    let (registry, diags) = load(
        "[job]\nID = a\nMESSAGE = m\nEXEC = echo\nJOBS += b\n",
    );
    registry.validate(&diags);
    assert!(diags.nerrors() > 0);
}

#[test]
fn rollback_runs_in_reverse_on_job_failure() {
    let (registry, diags) = load(
        "[entrypoint]\nID = root\nMESSAGE = hi\nJOBS[] += j1\nJOBS[] += j2\nJOBS[] += j3\n\n\
         [job]\nID = j1\nMESSAGE = m\nEXEC = true\nROLLBACK = echo rb1\n\n\
         [job]\nID = j2\nMESSAGE = m\nEXEC = true\nROLLBACK = echo rb2\n\n\
         [job]\nID = j3\nMESSAGE = m\nEXEC = false\n",
    );
    registry.validate(&diags);
    assert_eq!(diags.nerrors(), 0);

    let mut t = tree::instantiate("root", &registry, &diags).unwrap();
    let root = t.root.unwrap();
    eval::eval(&mut t, root, &diags);
    assert_eq!(diags.nerrors(), 0);

    let mut reports = Vec::new();
    let rc = executor::run(&mut t, root, &diags, &mut reports);
    assert_ne!(rc, 0);

    let rb2_idx = reports
        .iter()
        .position(|l| l.starts_with("::ROLLBACK:echo rb2"))
        .expect("j2's rollback must have run");
    let rb1_idx = reports
        .iter()
        .position(|l| l.starts_with("::ROLLBACK:echo rb1"))
        .expect("j1's rollback must have run");
    assert!(rb2_idx < rb1_idx, "rollback must run in reverse sibling order");
}

#[test]
fn signal_handler_runs_before_emitting_nodes_exec() {
    let (registry, diags) = load(
        "[entrypoint]\nID = root\nMESSAGE = hi\nJOBS += a\n\n\
         [job]\nID = a\nMESSAGE = m\nEMITS += sig1\n\n\
         [job]\nID = b\nMESSAGE = m\nHANDLES += sig1\nEXEC = echo handled\n",
    );
    registry.validate(&diags);
    assert_eq!(diags.nerrors(), 0);

    let mut t = tree::instantiate("root", &registry, &diags).unwrap();
    let root = t.root.unwrap();
    eval::eval(&mut t, root, &diags);
    assert_eq!(diags.nerrors(), 0);

    let rc = executor::run(&mut t, root, &diags, &mut Vec::new());
    assert_eq!(rc, 0);
}

#[test]
fn reference_cycle_is_rejected_during_instantiation() {
    let (registry, diags) = load(
        "[job]\nID = a\nMESSAGE = m\nJOBS += b\n\n\
         [job]\nID = b\nMESSAGE = m\nJOBS += a\n",
    );
    let _tree = tree::instantiate("a", &registry, &diags);
    assert!(diags.nerrors() > 0);
}
