//! One OS thread per PERIODIC root: parses the period, sleeps in 1s
//! increments so shutdown latency is bounded, optionally decrements a
//! persistent counter, and invokes the executor on each tick.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{Diagnostics, KubekaError};
use crate::exec::executor;
use crate::node::registry::NodeRegistry;
use crate::period::Period;
use crate::tree;

const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Shared, lock-free status a worker publishes for its owner to observe.
#[derive(Debug, Default)]
pub struct WorkerStatus {
    completed: AtomicBool,
    last_exit_code: AtomicI32,
}

impl WorkerStatus {
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn last_exit_code(&self) -> i32 {
        self.last_exit_code.load(Ordering::Acquire)
    }
}

pub struct Worker {
    pub root_id: String,
    pub status: Arc<WorkerStatus>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Blocks until the worker thread exits. Used by the daemon's shutdown
    /// path after the endflag has been raised.
    pub fn join(self) {
        let _ = self.handle.join();
    }
}

/// Spawns one worker for `root_id`. `registry` is shared read-only across
/// every worker; `shutdown` is the single flag flipped by the SIGINT
/// handler and polled cooperatively here.
pub fn launch(
    root_id: String,
    registry: Arc<NodeRegistry>,
    shutdown: Arc<AtomicBool>,
    diags: Arc<Diagnostics>,
) -> Option<Worker> {
    let status = Arc::new(WorkerStatus::default());
    let worker_status = status.clone();

    let source = registry.get(&root_id)?;
    let period = Period::parse(&source.symtab.get_string("PERIOD"))?;
    let mut counter = source.symtab.get_int("COUNTER");
    let worker_root_id = root_id.clone();
    let diags_for_spawn_error = diags.clone();

    let spawn_result = std::thread::Builder::new()
        .name(format!("kubeka-periodic-{root_id}"))
        .spawn(move || {
            let root_id = worker_root_id;
            let mut tree = match tree::instantiate(&root_id, &registry, &diags) {
                Some(t) => t,
                None => {
                    diags.error(KubekaError::execution(&root_id, "failed to instantiate"));
                    worker_status.completed.store(true, Ordering::Release);
                    return;
                }
            };
            let root = tree.root.expect("instantiate always sets root on success");
            crate::eval::eval(&mut tree, root, &diags);

            let mut consecutive_failures = 0u32;

            while !shutdown.load(Ordering::Acquire) {
                if counter == Some(0) {
                    break;
                }

                if !sleep_interruptible(period.duration(), &shutdown) {
                    break;
                }

                if let Some(c) = counter.as_mut() {
                    *c -= 1;
                    let _ = tree
                        .get_mut(root)
                        .symtab
                        .set("COUNTER", &c.to_string(), false);
                }

                let mut reports = Vec::new();
                let rc = executor::run(&mut tree, root, &diags, &mut reports);
                for line in &reports {
                    println!("{line}");
                }
                worker_status.last_exit_code.store(rc, Ordering::Release);
                if rc != 0 {
                    consecutive_failures += 1;
                    if consecutive_failures > MAX_CONSECUTIVE_FAILURES {
                        diags.error(KubekaError::execution(
                            &root_id,
                            format!("exceeded {MAX_CONSECUTIVE_FAILURES} consecutive failures, exiting"),
                        ));
                        break;
                    }
                } else {
                    consecutive_failures = 0;
                }
            }

            worker_status.completed.store(true, Ordering::Release);
        });

    let handle = match spawn_result {
        Ok(h) => h,
        Err(e) => {
            diags_for_spawn_error.error(KubekaError::internal(format!(
                "failed to spawn worker thread for periodic root '{root_id}': {e}"
            )));
            return None;
        }
    };

    Some(Worker {
        root_id,
        status,
        handle,
    })
}

/// Sleeps `total` in 1s chunks, returning `false` early if `shutdown` is
/// raised mid-sleep.
fn sleep_interruptible(total: Duration, shutdown: &AtomicBool) -> bool {
    let mut remaining = total;
    let step = Duration::from_secs(1);
    while remaining > Duration::ZERO {
        if shutdown.load(Ordering::Acquire) {
            return false;
        }
        let chunk = remaining.min(step);
        std::thread::sleep(chunk);
        remaining = remaining.saturating_sub(chunk);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeType, SourceNode};

    #[test]
    fn runs_counter_ticks_then_completes() {
        let diags = Arc::new(Diagnostics::new(false));
        let mut node = SourceNode::new(NodeType::Periodic, "t.kubeka", 1);
        node.symtab.set("ID", "tick", false).unwrap();
        node.symtab.set("MESSAGE", "m", false).unwrap();
        node.symtab.set("EXEC", "true", false).unwrap();
        node.symtab.set("PERIOD", "1s", false).unwrap();
        node.symtab.set("COUNTER", "2", false).unwrap();

        let registry = Arc::new(NodeRegistry::coalesce(vec![node], &diags));
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker = launch("tick".to_string(), registry, shutdown.clone(), diags.clone()).unwrap();
        worker.join();
    }

    #[test]
    fn unknown_period_syntax_refuses_to_launch() {
        let diags = Arc::new(Diagnostics::new(false));
        let mut node = SourceNode::new(NodeType::Periodic, "t.kubeka", 1);
        node.symtab.set("ID", "bad", false).unwrap();
        node.symtab.set("MESSAGE", "m", false).unwrap();
        node.symtab.set("EXEC", "true", false).unwrap();
        node.symtab.set("PERIOD", "notaperiod", false).unwrap();

        let registry = Arc::new(NodeRegistry::coalesce(vec![node], &diags));
        let shutdown = Arc::new(AtomicBool::new(false));

        assert!(launch("bad".to_string(), registry, shutdown, diags).is_none());
    }
}
