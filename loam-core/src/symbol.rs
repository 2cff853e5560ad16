//! Per-document symbol table: the ownership arena for built values.
//!
//! Ids are assigned append-only during one document's parse and are
//! meaningless outside it. Parents reference already-built children
//! through the table by id; anchored nodes are additionally indexed by
//! name so engines that emit `Alias` events can resolve them. The whole
//! table - and with it every value not yielded to the caller - is
//! dropped when the document concludes by any path.

use std::collections::HashMap;
use std::rc::Rc;

use unicode_xid::UnicodeXID;

use crate::error::LoadError;
use crate::node::Node;

/// Handle assigned to a node on successful completion.
///
/// Unique within one document's parse, monotonically assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Reserved sentinel: construction of this node failed.
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_none(self) -> bool {
        self == NodeId::NONE
    }

    fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Append-only id -> value registry, scoped to one document.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<Rc<Node>>,
    anchors: HashMap<String, NodeId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Append a value, returning its new id.
    pub fn register(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.entries.len());
        self.entries.push(Rc::new(node));
        id
    }

    /// Look up a previously registered value.
    ///
    /// An out-of-range id never happens in a correctly sequenced parse;
    /// it indicates the engine and builder have desynchronized.
    pub fn get(&self, id: NodeId) -> Result<Rc<Node>, LoadError> {
        self.entries.get(id.index()).cloned().ok_or_else(|| {
            LoadError::build(format!(
                "no value registered for id {} (engine desynchronization)",
                id.0
            ))
        })
    }

    /// Bind an anchor name to an id. A later binding of the same name
    /// shadows the earlier one.
    pub fn bind_anchor(&mut self, name: impl Into<String>, id: NodeId) {
        self.anchors.insert(name.into(), id);
    }

    pub fn lookup_anchor(&self, name: &str) -> Option<NodeId> {
        self.anchors.get(name).copied()
    }

    /// The most recently assigned value - the document root once the
    /// parse completes, since the root node is always completed last.
    pub fn last(&self) -> Option<Rc<Node>> {
        self.entries.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries and anchor bindings.
    pub fn reset(&mut self) {
        *self = SymbolTable::new();
    }
}

/// Anchor names are identifiers: XID start (or `_`) followed by XID
/// continue characters, `-` permitted after the first character.
pub fn is_anchor_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if UnicodeXID::is_xid_start(c) || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| UnicodeXID::is_xid_continue(c) || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_sequential_ids() {
        let mut table = SymbolTable::new();
        let a = table.register(Node::scalar("a"));
        let b = table.register(Node::scalar("b"));
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(a).unwrap().as_str(), Some("a"));
        assert_eq!(table.get(b).unwrap().as_str(), Some("b"));
        assert_eq!(table.last().unwrap().as_str(), Some("b"));
    }

    #[test]
    fn out_of_range_lookup_is_a_build_error() {
        let table = SymbolTable::new();
        let err = table.get(NodeId::new(7)).unwrap_err();
        assert!(matches!(err, LoadError::Build { .. }));
    }

    #[test]
    fn anchor_rebinding_shadows() {
        let mut table = SymbolTable::new();
        let a = table.register(Node::scalar("a"));
        let b = table.register(Node::scalar("b"));
        table.bind_anchor("x", a);
        table.bind_anchor("x", b);
        assert_eq!(table.lookup_anchor("x"), Some(b));
        assert_eq!(table.lookup_anchor("y"), None);
    }

    #[test]
    fn reset_drops_everything() {
        let mut table = SymbolTable::new();
        let id = table.register(Node::scalar("a"));
        table.bind_anchor("x", id);
        table.reset();
        assert!(table.is_empty());
        assert_eq!(table.lookup_anchor("x"), None);
    }

    #[test]
    fn anchor_name_syntax() {
        assert!(is_anchor_name("base"));
        assert!(is_anchor_name("_private"));
        assert!(is_anchor_name("step-2"));
        assert!(!is_anchor_name(""));
        assert!(!is_anchor_name("2steps"));
        assert!(!is_anchor_name("a b"));
        assert!(!is_anchor_name("-lead"));
    }

    #[test]
    fn sentinel_id() {
        assert!(NodeId::NONE.is_none());
        assert!(!NodeId::new(0).is_none());
    }
}
