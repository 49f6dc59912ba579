use indexmap::IndexMap;

use crate::error::{Diagnostics, KubekaError};
use crate::node::{NodeType, SourceNode};
use crate::period::Period;

/// A deduplicated, validated set of source nodes keyed by `ID`. Read-only
/// after construction; safe to share across scheduler worker threads behind
/// an `Arc` without locking.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: IndexMap<String, SourceNode>,
}

impl NodeRegistry {
    pub fn get(&self, id: &str) -> Option<&SourceNode> {
        self.nodes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceNode)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node whose `HANDLES` list contains `signal`.
    pub fn handlers_for(&self, signal: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, n)| {
                n.symtab
                    .get("HANDLES")
                    .map(|v| v.iter().any(|s| s == signal))
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Dedups `nodes` by `ID`. The first occurrence of a given id wins; every
    /// later occurrence is reported (both source locations) and dropped.
    /// Mirrors the original's "duplicate node found" report.
    pub fn coalesce(nodes: Vec<SourceNode>, diags: &Diagnostics) -> Self {
        let mut registry = IndexMap::new();
        let mut nduplicates = 0usize;

        for node in nodes {
            let id = node.id();
            if let Some(existing) = registry.get(&id) {
                let existing: &SourceNode = existing;
                diags.error(KubekaError::link(format!(
                    "duplicate node '{id}': first seen at {}:{}, again at {}:{}",
                    existing.filename(),
                    existing.line(),
                    node.filename(),
                    node.line(),
                )));
                nduplicates += 1;
                continue;
            }
            registry.insert(id, node);
        }
        if nduplicates > 0 {
            tracing::warn!(nduplicates, "dropped duplicate nodes during coalesce");
        }
        Self { nodes: registry }
    }

    /// Per-node structural validation: required keys, the EXEC/EMITS/JOBS
    /// XOR, and type-specific checks (PERIODIC's `PERIOD` syntax).
    pub fn validate(&self, diags: &Diagnostics) {
        for (id, node) in &self.nodes {
            if id.is_empty() {
                diags.error(KubekaError::semantic(id.as_str(), "missing required key ID"));
                continue;
            }
            if node.message().is_empty() {
                diags.error(KubekaError::semantic(id.as_str(), "missing required key MESSAGE"));
            }

            let has_exec = node.symtab.exists("EXEC");
            let has_emits = node.symtab.exists("EMITS");
            let has_jobs = node.symtab.exists("JOBS");
            let count = [has_exec, has_emits, has_jobs].iter().filter(|b| **b).count();
            if count != 1 {
                diags.error(KubekaError::semantic(
                    id.as_str(),
                    format!("must have exactly one of EXEC, EMITS, JOBS (found {count})"),
                ));
            }

            if node.ty == NodeType::Periodic {
                match node.symtab.get("PERIOD") {
                    None => diags.error(KubekaError::semantic(id.as_str(), "missing PERIOD")),
                    Some(v) if v.len() != 1 => diags.error(KubekaError::semantic(
                        id.as_str(),
                        "must have exactly one PERIOD value",
                    )),
                    Some(v) => {
                        if Period::parse(&v[0]).is_none() {
                            diags.error(KubekaError::semantic(
                                id.as_str(),
                                format!("invalid PERIOD syntax '{}'", v[0]),
                            ));
                        }
                    }
                }
            }
        }
    }
}
