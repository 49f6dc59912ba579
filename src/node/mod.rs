//! Node types: the parsed (source) form and the arena-backed instantiated
//! form used once a tree has been built.

pub mod registry;

use crate::symtab::SymbolTable;

/// Discriminant used for both validation and scheduling dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Periodic,
    Job,
    Entrypoint,
}

impl NodeType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "periodic" => Some(NodeType::Periodic),
            "job" => Some(NodeType::Job),
            "entrypoint" => Some(NodeType::Entrypoint),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Periodic => "periodic",
            NodeType::Job => "job",
            NodeType::Entrypoint => "entrypoint",
        }
    }
}

/// A node as parsed, before instantiation. Owned by the flat registry.
#[derive(Debug, Clone)]
pub struct SourceNode {
    pub ty: NodeType,
    pub symtab: SymbolTable,
}

impl SourceNode {
    pub fn new(ty: NodeType, filename: &str, line: usize) -> Self {
        let mut symtab = SymbolTable::new();
        symtab.set_forced("_FILENAME", filename);
        symtab.set_forced("_LINE", line.to_string());
        Self { ty, symtab }
    }

    pub fn id(&self) -> String {
        self.symtab.get_string("ID")
    }

    pub fn message(&self) -> String {
        self.symtab.get_string("MESSAGE")
    }

    pub fn filename(&self) -> String {
        self.symtab.get_string("_FILENAME")
    }

    pub fn line(&self) -> usize {
        self.symtab.get_int("_LINE").unwrap_or(0) as usize
    }
}

/// Index into a [`Tree`]'s node arena. Cheap to copy, stable for the
/// lifetime of the tree that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(pub usize);

/// Only one flag exists today; kept as a bitset rather than a bool so
/// additional lifecycle flags can be added without another struct field
/// migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags(u8);

impl NodeFlags {
    pub const INSTANTIATED: NodeFlags = NodeFlags(0b0000_0001);

    pub fn empty() -> Self {
        NodeFlags(0)
    }

    pub fn set(&mut self, flag: NodeFlags) {
        self.0 |= flag.0;
    }

    pub fn contains(self, flag: NodeFlags) -> bool {
        self.0 & flag.0 == flag.0
    }
}

/// An instantiated node, living in a [`Tree`]'s arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub ty: NodeType,
    pub symtab: SymbolTable,
    pub parent: Option<NodeRef>,
    pub jobs: Vec<NodeRef>,
    pub handlers: Vec<NodeRef>,
    pub flags: NodeFlags,
}

impl Node {
    pub fn from_source(source: &SourceNode, parent: Option<NodeRef>) -> Self {
        Self {
            ty: source.ty,
            symtab: source.symtab.copy(),
            parent,
            jobs: Vec::new(),
            handlers: Vec::new(),
            flags: NodeFlags::empty(),
        }
    }

    pub fn id(&self) -> String {
        self.symtab.get_string("ID")
    }

    pub fn message(&self) -> String {
        self.symtab.get_string("MESSAGE")
    }

    /// Space-separated EMITS set for this node.
    pub fn emits(&self) -> Vec<String> {
        self.symtab.get("EMITS").map(|v| v.to_vec()).unwrap_or_default()
    }

    /// Space-separated HANDLES set for this node.
    pub fn handles(&self) -> Vec<String> {
        self.symtab.get("HANDLES").map(|v| v.to_vec()).unwrap_or_default()
    }
}

/// Owning arena for one instantiated tree. The root (index 0) owns every
/// other node transitively through `jobs`/`handlers`; there is no reference
/// counting and no cycle, because the builder refuses to create one.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    pub root: Option<NodeRef>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) -> NodeRef {
        let r = NodeRef(self.nodes.len());
        self.nodes.push(node);
        r
    }

    pub fn get(&self, r: NodeRef) -> &Node {
        &self.nodes[r.0]
    }

    pub fn get_mut(&mut self, r: NodeRef) -> &mut Node {
        &mut self.nodes[r.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walks the parent chain from `from` up to and including the root,
    /// yielding each ancestor's id. Used for cycle detection during
    /// instantiation.
    pub fn ancestor_ids(&self, from: NodeRef) -> Vec<String> {
        let mut ids = Vec::new();
        let mut cur = Some(from);
        while let Some(r) = cur {
            let n = self.get(r);
            ids.push(n.id());
            cur = n.parent;
        }
        ids
    }
}
