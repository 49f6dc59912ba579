//! Crate-wide error taxonomy and the error/warning counters threaded through
//! every stage of the pipeline.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One error kind per row of the propagation table. Every variant carries
/// enough context (file/line or node id) to produce a useful diagnostic
/// without a second lookup.
#[derive(Debug, thiserror::Error)]
pub enum KubekaError {
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("node {id}: {message}")]
    Semantic { id: String, message: String },

    #[error("{message}")]
    Link { message: String },

    #[error("{file}:{line}: {message}")]
    Resolution {
        file: String,
        line: usize,
        message: String,
    },

    #[error("node {id}: command failed: {message}")]
    Execution { id: String, message: String },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("{0}")]
    Warning(String),
}

impl KubekaError {
    pub fn parse(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        KubekaError::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn semantic(id: impl Into<String>, message: impl Into<String>) -> Self {
        KubekaError::Semantic {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn link(message: impl Into<String>) -> Self {
        KubekaError::Link {
            message: message.into(),
        }
    }

    pub fn resolution(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        KubekaError::Resolution {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn execution(id: impl Into<String>, message: impl Into<String>) -> Self {
        KubekaError::Execution {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        KubekaError::Internal {
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        KubekaError::Warning(message.into())
    }
}

/// Accumulates errors and warnings across an entire run. Every stage takes
/// `&Diagnostics` (or clones the `Arc` around it) instead of returning a hard
/// `Result` for recoverable conditions, so a bad node in file 3 of 10 does not
/// stop files 4 through 10 from being read.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: AtomicUsize,
    warnings: AtomicUsize,
    werror: bool,
}

impl Diagnostics {
    pub fn new(werror: bool) -> Self {
        Self {
            errors: AtomicUsize::new(0),
            warnings: AtomicUsize::new(0),
            werror,
        }
    }

    pub fn error(&self, err: impl fmt::Display) {
        tracing::error!("{err}");
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn warn(&self, msg: impl fmt::Display) {
        tracing::warn!("{msg}");
        self.warnings.fetch_add(1, Ordering::Relaxed);
        if self.werror {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn nerrors(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn nwarnings(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn is_clean(&self) -> bool {
        self.nerrors() == 0
    }
}
