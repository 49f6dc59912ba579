//! Post-order substitution of `$<KEY>` symbol references and `$<name args>`
//! built-in calls inside every node's values.

use crate::builtins;
use crate::error::{Diagnostics, KubekaError};
use crate::node::{NodeRef, Tree};

/// Evaluates `root` and everything beneath it, in place. Handlers and jobs
/// are evaluated before the node itself, because the node's own values may
/// reference keys that only exist on its dependents.
pub fn eval(tree: &mut Tree, root: NodeRef, diags: &Diagnostics) {
    let (handlers, jobs) = {
        let node = tree.get(root);
        (node.handlers.clone(), node.jobs.clone())
    };
    for h in handlers {
        eval(tree, h, diags);
    }
    for j in jobs {
        eval(tree, j, diags);
    }
    eval_self(tree, root, diags);
}

fn eval_self(tree: &mut Tree, root: NodeRef, diags: &Diagnostics) {
    let (fname, line, keys) = {
        let node = tree.get(root);
        (
            node.symtab.get_string("_FILENAME"),
            node.symtab.get_int("_LINE").unwrap_or(0) as usize,
            node.symtab.keys().map(str::to_string).collect::<Vec<_>>(),
        )
    };

    for key in keys {
        let values = tree.get(root).symtab.get(&key).unwrap_or(&[]).to_vec();
        for (idx, original) in values.iter().enumerate() {
            let mut current = original.clone();
            let mut had_error = false;

            while let Some((start, end)) = find_next_ref(&current) {
                let reference = &current[start..end];
                match resolve(tree, root, reference) {
                    Ok(resolved) => {
                        current.replace_range(start..end, &resolved);
                    }
                    Err(msg) => {
                        diags.error(KubekaError::resolution(&fname, line, msg));
                        had_error = true;
                        break;
                    }
                }
            }

            if !had_error {
                let node = tree.get_mut(root);
                // Writing through `set(..., force=true)` lets this path touch
                // `_`-prefixed keys too (none are expected to contain
                // references, but evaluation should not special-case them).
                let list = node.symtab.get(&key).map(|v| v.len()).unwrap_or(0);
                if idx < list {
                    let _ = node.symtab.set(&format!("{key}[{idx}]"), &current, true);
                }
            }
        }
    }
}

/// Finds the next `$<...>` span in `src`, returning byte offsets of the
/// whole reference including the `$<`/`>` delimiters. References never
/// nest: the first `>` after `$<` closes it.
fn find_next_ref(src: &str) -> Option<(usize, usize)> {
    let start = src.find("$<")?;
    let rel_end = src[start + 2..].find('>')?;
    let end = start + 2 + rel_end + 1;
    Some((start, end))
}

fn resolve(tree: &Tree, node: NodeRef, reference: &str) -> Result<String, String> {
    let inner = &reference[2..reference.len() - 1];
    if let Some(sp) = inner.find(' ') {
        let name = &inner[..sp];
        let args = &inner[sp + 1..];
        let f = builtins::lookup(name).ok_or_else(|| format!("call to undefined function '{name}'"))?;
        f(args)
    } else {
        resolve_symbol(tree, node, inner)
            .map(|values| format_values(&values))
            .ok_or_else(|| format!("failed to find values for symbol {inner}"))
    }
}

/// Walks the parent chain looking up `key_ref`, stopping at the first node
/// (innermost to outermost) whose symtab has the key.
fn resolve_symbol(tree: &Tree, node: NodeRef, key_ref: &str) -> Option<Vec<String>> {
    let mut cur = Some(node);
    while let Some(r) = cur {
        let n = tree.get(r);
        if let Some(v) = n.symtab.resolve(key_ref) {
            return Some(v);
        }
        cur = n.parent;
    }
    None
}

/// Mirrors `kbutil_strarray_format`: a multi-element resolution is rendered
/// space-joined; a single element is rendered bare.
fn format_values(values: &[String]) -> String {
    values.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeType};
    use crate::symtab::SymbolTable;

    fn node(ty: NodeType) -> Node {
        Node {
            ty,
            symtab: SymbolTable::new(),
            parent: None,
            jobs: Vec::new(),
            handlers: Vec::new(),
            flags: crate::node::NodeFlags::empty(),
        }
    }

    #[test]
    fn resolves_parent_symbol() {
        let mut tree = Tree::new();
        let mut parent = node(NodeType::Entrypoint);
        parent.symtab.set("HOST", "example.com", false).unwrap();
        let parent_ref = tree.push(parent);

        let mut child = node(NodeType::Job);
        child.parent = Some(parent_ref);
        child.symtab.set("EXEC", "curl $<HOST>", false).unwrap();
        let child_ref = tree.push(child);
        tree.get_mut(parent_ref).jobs.push(child_ref);

        let diags = Diagnostics::new(false);
        eval(&mut tree, parent_ref, &diags);
        assert_eq!(diags.nerrors(), 0);
        assert_eq!(tree.get(child_ref).symtab.get_string("EXEC"), "curl example.com");
    }

    #[test]
    fn unresolved_symbol_is_an_error() {
        let mut tree = Tree::new();
        let mut n = node(NodeType::Job);
        n.symtab.set("EXEC", "echo $<NOPE>", false).unwrap();
        let r = tree.push(n);

        let diags = Diagnostics::new(false);
        eval(&mut tree, r, &diags);
        assert!(diags.nerrors() > 0);
    }

    #[test]
    fn builtin_call_is_dispatched() {
        let mut tree = Tree::new();
        let mut n = node(NodeType::Job);
        n.symtab
            .set("EXEC", "echo $<setenv FOO=bar>", false)
            .unwrap();
        let r = tree.push(n);

        let diags = Diagnostics::new(false);
        eval(&mut tree, r, &diags);
        assert_eq!(diags.nerrors(), 0);
        assert_eq!(tree.get(r).symtab.get_string("EXEC"), "echo bar");
    }

    #[test]
    fn find_next_ref_locates_span() {
        assert_eq!(find_next_ref("a $<X> b"), Some((2, 6)));
        assert_eq!(find_next_ref("no refs here"), None);
    }
}
