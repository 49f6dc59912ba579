//! Isolated per-command execution: working directory, privilege drop,
//! stdout capture, exit code propagation.
//!
//! The original multiplexes the child's stdout and exit code over a single
//! pipe with a NUL separator because `popen`/`pclose` hands back only a
//! `FILE *`. `std::process::Command::output()` returns both pieces from one
//! owned value, so that framing is not reproduced here; only the public
//! contract (captured bytes equal the command's actual stdout, returned
//! code equals the actual exit code) is preserved.

use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use nix::unistd::{Gid, Uid, User};

use crate::node::Node;

#[derive(Debug)]
pub struct ShellOutcome {
    pub exit_code: i32,
    pub output: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error("failed to create working directory: {0}")]
    WorkDir(#[source] std::io::Error),
    #[error("failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),
}

/// An RAII guard over the resolved working directory. When `WDIR` was not
/// set on the node, this owns a freshly-created `/tmp/node-<ID>XXXXXX`
/// directory and removes it on drop, on every exit path.
enum WorkDir {
    UserProvided(PathBuf),
    Scratch(tempfile::TempDir),
}

impl WorkDir {
    fn path(&self) -> &Path {
        match self {
            WorkDir::UserProvided(p) => p,
            WorkDir::Scratch(t) => t.path(),
        }
    }
}

fn resolve_workdir(node: &Node, user: Option<&User>) -> Result<WorkDir, ShellError> {
    let wdir = node.symtab.get_string("WDIR");
    if !wdir.is_empty() {
        return Ok(WorkDir::UserProvided(PathBuf::from(wdir)));
    }

    let prefix = format!("node-{}", node.id());
    let dir = tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir_in("/tmp")
        .map_err(ShellError::WorkDir)?;

    if let Some(user) = user {
        nix::unistd::chown(dir.path(), Some(user.uid), Some(user.gid))
            .map_err(|e| ShellError::WorkDir(std::io::Error::other(e)))?;
    }
    Ok(WorkDir::Scratch(dir))
}

fn resolve_user(node: &Node) -> Result<Option<User>, ShellError> {
    let wuser = node.symtab.get_string("WUSER");
    if wuser.is_empty() {
        return Ok(None);
    }
    User::from_name(&wuser)
        .map_err(|_| ShellError::UnknownUser(wuser.clone()))?
        .ok_or(ShellError::UnknownUser(wuser))
        .map(Some)
}

/// Runs `command` under `sh -c`, isolated per the node's `WDIR`/`WUSER`.
pub fn run(node: &Node, command: &str) -> Result<ShellOutcome, ShellError> {
    let user = resolve_user(node)?;
    let workdir = resolve_workdir(node, user.as_ref())?;

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(workdir.path());

    if let Some(user) = &user {
        let uid: Uid = user.uid;
        let gid: Gid = user.gid;
        // SAFETY: pre_exec runs in the forked child before exec; it only
        // touches process-local credentials, no shared state.
        unsafe {
            cmd.pre_exec(move || {
                nix::unistd::setgid(gid).map_err(std::io::Error::other)?;
                nix::unistd::setuid(uid).map_err(std::io::Error::other)?;
                Ok(())
            });
        }
    }

    let output = cmd.output().map_err(ShellError::Spawn)?;
    let exit_code = output.status.code().unwrap_or(-1);

    // `workdir` drops here regardless of the branch taken above, removing
    // any scratch directory unconditionally.
    Ok(ShellOutcome {
        exit_code,
        output: output.stdout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;
    use crate::symtab::SymbolTable;

    fn node_with(id: &str, exec_overrides: &[(&str, &str)]) -> Node {
        let mut symtab = SymbolTable::new();
        symtab.set("ID", id, false).unwrap();
        for (k, v) in exec_overrides {
            symtab.set(k, v, false).unwrap();
        }
        Node {
            ty: NodeType::Job,
            symtab,
            parent: None,
            jobs: Vec::new(),
            handlers: Vec::new(),
            flags: crate::node::NodeFlags::empty(),
        }
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let node = node_with("a", &[]);
        let outcome = run(&node, "echo -n hello").unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.output, b"hello");
    }

    #[test]
    fn propagates_nonzero_exit_code() {
        let node = node_with("a", &[]);
        let outcome = run(&node, "exit 7").unwrap();
        assert_eq!(outcome.exit_code, 7);
    }

    #[test]
    fn user_supplied_workdir_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let node = node_with("a", &[("WDIR", dir.path().to_str().unwrap())]);
        let outcome = run(&node, "pwd").unwrap();
        let printed = String::from_utf8(outcome.output).unwrap();
        assert_eq!(printed.trim(), dir.path().to_str().unwrap());
    }
}
