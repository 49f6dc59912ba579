//! # kubeka
//!
//! Continuous-deployment orchestrator: load declarative node files, link
//! them into dependency trees rooted at entrypoints or periodic triggers,
//! and execute those trees.
//!
//! ## Module structure (dependency order)
//!
//! ```text
//! scheduler  → periodic worker threads
//!   ↓
//! exec       → shell isolation, tree dispatch with rollback
//!   ↓
//! eval       → $<...> substitution
//!   ↓
//! tree       → instantiation, cycle detection
//!   ↓
//! node       → node types, registry (dedup + validation)
//!   ↓
//! parser     → .kubeka file reader
//!   ↓
//! symtab     → typed key/value store
//!   ↓
//! period, builtins, error → shared primitives
//! ```

pub mod builtins;
pub mod error;
pub mod eval;
pub mod exec;
pub mod node;
pub mod parser;
pub mod period;
pub mod scheduler;
pub mod symtab;
pub mod tree;

pub use error::{Diagnostics, KubekaError};
pub use node::registry::NodeRegistry;
pub use node::{Node, NodeRef, NodeType, SourceNode, Tree};
pub use symtab::SymbolTable;
