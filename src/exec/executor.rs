//! Drives one instantiated tree: handlers, then EXEC, then jobs, with
//! reverse-order rollback of prior siblings on job failure.

use crate::error::{Diagnostics, KubekaError};
use crate::exec::shell;
use crate::node::{NodeRef, Tree};

/// Runs `node` and returns its exit code. Recurses into handlers and job
/// children; never panics on a failing child, only propagates the code.
///
/// Every `::STARTING`/`::COMMAND`/`::ROLLBACK` line is appended to `reports`
/// rather than written straight to stdout, so a caller controls when (and
/// whether) they are flushed — the CLI and scheduler print them as they
/// come in, while tests can inspect the buffer directly.
pub fn run(tree: &mut Tree, node: NodeRef, diags: &Diagnostics, reports: &mut Vec<String>) -> i32 {
    let (id, message, emits, handler_children, has_exec, exec_cmds, job_children) = {
        let n = tree.get(node);
        (
            n.id(),
            n.message(),
            n.emits(),
            n.handlers.clone(),
            n.symtab.exists("EXEC"),
            n.symtab.get("EXEC").map(|v| v.to_vec()).unwrap_or_default(),
            n.jobs.clone(),
        )
    };

    reports.push(format!("::STARTING:{id}:{message}"));

    let mut matched_handlers = 0;
    let mut handler_rc = 0;
    for h in &handler_children {
        let h_handles = tree.get(*h).handles();
        if h_handles.iter().any(|s| emits.contains(s)) {
            matched_handlers += 1;
            handler_rc += run(tree, *h, diags, reports);
        }
    }
    if matched_handlers > 0 {
        return handler_rc;
    }

    if has_exec {
        let mut rc = 0;
        for cmd in &exec_cmds {
            let node_ref = tree.get(node);
            let outcome = match shell::run(node_ref, cmd) {
                Ok(o) => o,
                Err(e) => {
                    diags.error(KubekaError::execution(&id, e.to_string()));
                    rc |= 1;
                    continue;
                }
            };
            reports.push(format!(
                "::COMMAND:{cmd}:{}:{} bytes\n-----\n{}\n-----",
                outcome.exit_code,
                outcome.output.len(),
                String::from_utf8_lossy(&outcome.output),
            ));
            if outcome.exit_code != 0 {
                diags.error(KubekaError::execution(
                    &id,
                    format!("command '{cmd}' exited {}", outcome.exit_code),
                ));
            }
            rc |= outcome.exit_code;
        }
        return rc;
    }

    if !job_children.is_empty() {
        for (i, job) in job_children.iter().enumerate() {
            let rc = run(tree, *job, diags, reports);
            if rc != 0 {
                rollback(tree, &job_children[..=i], diags, reports);
                return rc;
            }
        }
        return 0;
    }

    diags.error(KubekaError::execution(
        &id,
        "none of EXEC, EMITS-with-handler, or JOBS applied",
    ));
    1
}

/// Walks `succeeded` in reverse, running each node's `ROLLBACK` commands.
/// A missing ROLLBACK is a warning; a failing rollback command is reported
/// but does not stop the remaining rollback commands from running.
fn rollback(tree: &Tree, succeeded: &[NodeRef], diags: &Diagnostics, reports: &mut Vec<String>) {
    for node in succeeded.iter().rev() {
        let n = tree.get(*node);
        let id = n.id();
        let commands = n.symtab.get("ROLLBACK").map(|v| v.to_vec()).unwrap_or_default();
        if commands.is_empty() {
            diags.warn(KubekaError::warning(format!("node '{id}': no ROLLBACK defined")));
            continue;
        }
        for cmd in &commands {
            match shell::run(n, cmd) {
                Ok(outcome) => {
                    reports.push(format!(
                        "::ROLLBACK:{cmd}:{}:{} bytes\n-----\n{}\n-----",
                        outcome.exit_code,
                        outcome.output.len(),
                        String::from_utf8_lossy(&outcome.output),
                    ));
                    if outcome.exit_code != 0 {
                        diags.error(KubekaError::execution(
                            &id,
                            format!("rollback command '{cmd}' exited {}", outcome.exit_code),
                        ));
                    }
                }
                Err(e) => diags.error(KubekaError::execution(
                    &id,
                    format!("rollback command '{cmd}' failed: {e}"),
                )),
            }
        }
    }
}
