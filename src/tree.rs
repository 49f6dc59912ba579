//! Recursive instantiation of entrypoint/periodic source nodes into owned
//! runnable trees, with cycle detection.

use crate::error::{Diagnostics, KubekaError};
use crate::node::registry::NodeRegistry;
use crate::node::{Node, NodeFlags, NodeRef, NodeType, Tree};

/// Instantiates the source node identified by `root_id` into a fresh tree.
/// Returns `None` if the root id is not present in the registry.
pub fn instantiate(root_id: &str, registry: &NodeRegistry, diags: &Diagnostics) -> Option<Tree> {
    let mut tree = Tree::new();
    let root_ref = instantiate_node(&mut tree, None, root_id, registry, diags)?;
    tree.root = Some(root_ref);
    Some(tree)
}

fn instantiate_node(
    tree: &mut Tree,
    parent: Option<NodeRef>,
    id: &str,
    registry: &NodeRegistry,
    diags: &Diagnostics,
) -> Option<NodeRef> {
    let source = registry.get(id).or_else(|| {
        diags.error(KubekaError::link(format!("reference to unknown node '{id}'")));
        None
    })?;

    let mut node = Node::from_source(source, parent);

    let jobs: Vec<String> = node.symtab.get("JOBS").map(|v| v.to_vec()).unwrap_or_default();
    let emits: Vec<String> = node.symtab.get("EMITS").map(|v| v.to_vec()).unwrap_or_default();
    node.flags.set(NodeFlags::INSTANTIATED);
    let node_ref = tree.push(node);

    for job_id in &jobs {
        if is_ancestor(tree, node_ref, job_id) {
            diags.error(KubekaError::link(format!(
                "reference cycle: node '{job_id}' is its own ancestor via '{id}'"
            )));
            continue;
        }
        if let Some(child_ref) = instantiate_node(tree, Some(node_ref), job_id, registry, diags) {
            tree.get_mut(node_ref).jobs.push(child_ref);
        }
    }

    for signal in &emits {
        let handler_ids: Vec<String> = registry
            .handlers_for(signal)
            .into_iter()
            .map(str::to_string)
            .collect();
        if handler_ids.is_empty() {
            diags.error(KubekaError::link(format!(
                "signal '{signal}' emitted by '{id}' has no handler"
            )));
            continue;
        }
        for handler_id in &handler_ids {
            if is_ancestor(tree, node_ref, handler_id) {
                diags.error(KubekaError::link(format!(
                    "reference cycle: node '{handler_id}' is its own ancestor via '{id}'"
                )));
                continue;
            }
            if let Some(child_ref) =
                instantiate_node(tree, Some(node_ref), handler_id, registry, diags)
            {
                tree.get_mut(node_ref).handlers.push(child_ref);
            }
        }
    }

    Some(node_ref)
}

fn is_ancestor(tree: &Tree, from: NodeRef, candidate_id: &str) -> bool {
    tree.ancestor_ids(from).iter().any(|id| id == candidate_id)
}

/// Convenience used by the scheduler/CLI: instantiates every registry node
/// of the given type as a fresh independent tree, reporting an error for
/// each id that fails to resolve.
pub fn instantiate_all_of_type(
    ty: NodeType,
    registry: &NodeRegistry,
    diags: &Diagnostics,
) -> Vec<(String, Tree)> {
    registry
        .iter()
        .filter(|(_, n)| n.ty == ty)
        .filter_map(|(id, _)| instantiate(id, registry, diags).map(|t| (id.to_string(), t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SourceNode;

    fn mk(id: &str, ty: NodeType, fields: &[(&str, &str)]) -> SourceNode {
        let mut n = SourceNode::new(ty, "t.kubeka", 1);
        n.symtab.set("ID", id, false).unwrap();
        n.symtab.set("MESSAGE", "m", false).unwrap();
        for (k, v) in fields {
            if k.ends_with("[]") {
                n.symtab.append(k, v, false).unwrap();
            } else {
                n.symtab.set(k, v, false).unwrap();
            }
        }
        n
    }

    #[test]
    fn instantiates_job_children() {
        let diags = Diagnostics::new(false);
        let nodes = vec![
            mk("root", NodeType::Entrypoint, &[("JOBS[]", "a")]),
            mk("a", NodeType::Job, &[("EXEC", "echo hi")]),
        ];
        let reg = NodeRegistry::coalesce(nodes, &diags);
        let tree = instantiate("root", &reg, &diags).unwrap();
        let root = tree.get(tree.root.unwrap());
        assert_eq!(root.jobs.len(), 1);
        assert_eq!(diags.nerrors(), 0);
    }

    #[test]
    fn missing_reference_is_an_error() {
        let diags = Diagnostics::new(false);
        let nodes = vec![mk("root", NodeType::Entrypoint, &[("JOBS[]", "ghost")])];
        let reg = NodeRegistry::coalesce(nodes, &diags);
        let tree = instantiate("root", &reg, &diags).unwrap();
        assert!(diags.nerrors() > 0);
        assert!(tree.get(tree.root.unwrap()).jobs.is_empty());
    }

    #[test]
    fn cycle_is_detected() {
        let diags = Diagnostics::new(false);
        let nodes = vec![
            mk("a", NodeType::Job, &[("JOBS[]", "b")]),
            mk("b", NodeType::Job, &[("JOBS[]", "a")]),
        ];
        let reg = NodeRegistry::coalesce(nodes, &diags);
        let _tree = instantiate("a", &reg, &diags);
        assert!(diags.nerrors() > 0);
    }

    #[test]
    fn unhandled_signal_is_an_error() {
        let diags = Diagnostics::new(false);
        let nodes = vec![mk("a", NodeType::Job, &[("EMITS[]", "sig1")])];
        let reg = NodeRegistry::coalesce(nodes, &diags);
        let _tree = instantiate("a", &reg, &diags);
        assert!(diags.nerrors() > 0);
    }

    #[test]
    fn signal_resolves_to_handler() {
        let diags = Diagnostics::new(false);
        let nodes = vec![
            mk("a", NodeType::Job, &[("EMITS[]", "sig1")]),
            mk("b", NodeType::Job, &[("HANDLES[]", "sig1"), ("EXEC", "echo h")]),
        ];
        let reg = NodeRegistry::coalesce(nodes, &diags);
        let tree = instantiate("a", &reg, &diags).unwrap();
        let root = tree.get(tree.root.unwrap());
        assert_eq!(root.handlers.len(), 1);
    }
}
