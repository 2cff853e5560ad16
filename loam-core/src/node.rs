//! Materialized tree values.
//!
//! A `Node` is the fully-built result for one document node: a structural
//! kind (scalar, sequence, or mapping), an optional type tag, and an
//! optional anchor name recorded during construction. Parents hold
//! `Rc<Node>` handles to children, so a node referenced through an alias
//! is identity-shared, never duplicated. Nodes are immutable once
//! registered in the symbol table.

use std::rc::Rc;

/// Presentation style recorded for a scalar.
///
/// The style is a hint carried through from the source form; it does not
/// affect the scalar's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// Literal block (`|`), newlines preserved.
    Literal,
    /// Folded block (`>`), newlines collapsed.
    Folded,
}

/// Structural kind of a node, with its content.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar { text: String, style: ScalarStyle },

    Seq(Vec<Rc<Node>>),

    /// Insertion-ordered key/value pairs. Keys are nodes, not restricted
    /// to scalars. Duplicate keys are preserved exactly as supplied - no
    /// dedup, no sort; the typed loader decides the dictionary policy.
    Map(Vec<(Rc<Node>, Rc<Node>)>),
}

/// A materialized document node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: NodeKind,
    tag: Option<String>,
    anchor: Option<String>,
}

impl Node {
    /// Plain, untagged scalar.
    pub fn scalar(text: impl Into<String>) -> Node {
        Node::scalar_styled(text, ScalarStyle::Plain)
    }

    pub fn scalar_styled(text: impl Into<String>, style: ScalarStyle) -> Node {
        Node {
            kind: NodeKind::Scalar {
                text: text.into(),
                style,
            },
            tag: None,
            anchor: None,
        }
    }

    pub fn seq(items: Vec<Rc<Node>>) -> Node {
        Node {
            kind: NodeKind::Seq(items),
            tag: None,
            anchor: None,
        }
    }

    pub fn map(entries: Vec<(Rc<Node>, Rc<Node>)>) -> Node {
        Node {
            kind: NodeKind::Map(entries),
            tag: None,
            anchor: None,
        }
    }

    /// Attach a type tag. An untagged node stays `None` - "untyped" is
    /// explicit absence, never an empty string.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Node {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Node {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Short kind name, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Scalar { .. } => "scalar",
            NodeKind::Seq(_) => "seq",
            NodeKind::Map(_) => "map",
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Anchor name recorded at construction time, if any.
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar { .. })
    }

    pub fn is_seq(&self) -> bool {
        matches!(self.kind, NodeKind::Seq(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.kind, NodeKind::Map(_))
    }

    /// Scalar text, if this is a scalar.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Scalar style, if this is a scalar.
    pub fn style(&self) -> Option<ScalarStyle> {
        match &self.kind {
            NodeKind::Scalar { style, .. } => Some(*style),
            _ => None,
        }
    }

    /// Sequence items, if this is a sequence.
    pub fn items(&self) -> Option<&[Rc<Node>]> {
        match &self.kind {
            NodeKind::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Mapping entries, if this is a mapping.
    pub fn entries(&self) -> Option<&[(Rc<Node>, Rc<Node>)]> {
        match &self.kind {
            NodeKind::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a mapping value by scalar key text. With duplicate keys
    /// the last entry wins, matching the typed loader's dictionary
    /// policy.
    pub fn get(&self, key: &str) -> Option<&Rc<Node>> {
        match &self.kind {
            NodeKind::Map(entries) => entries
                .iter()
                .rev()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Number of items (seq) or entries (map); scalars have length 0.
    pub fn len(&self) -> usize {
        match &self.kind {
            NodeKind::Scalar { .. } => 0,
            NodeKind::Seq(items) => items.len(),
            NodeKind::Map(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_accessors() {
        let node = Node::scalar("hello");
        assert!(node.is_scalar());
        assert_eq!(node.as_str(), Some("hello"));
        assert_eq!(node.style(), Some(ScalarStyle::Plain));
        assert_eq!(node.tag(), None);
        assert_eq!(node.kind_name(), "scalar");
    }

    #[test]
    fn tagged_and_anchored() {
        let node = Node::scalar("42")
            .with_tag("tag:yaml.org,2002:int")
            .with_anchor("answer");
        assert_eq!(node.tag(), Some("tag:yaml.org,2002:int"));
        assert_eq!(node.anchor(), Some("answer"));
    }

    #[test]
    fn map_lookup_last_entry_wins() {
        let map = Node::map(vec![
            (Rc::new(Node::scalar("k")), Rc::new(Node::scalar("first"))),
            (Rc::new(Node::scalar("k")), Rc::new(Node::scalar("second"))),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("k").unwrap().as_str(), Some("second"));
    }

    #[test]
    fn shared_children_are_identical() {
        let child = Rc::new(Node::scalar("shared"));
        let seq = Node::seq(vec![Rc::clone(&child), Rc::clone(&child)]);
        let items = seq.items().unwrap();
        assert!(Rc::ptr_eq(&items[0], &items[1]));
    }
}
