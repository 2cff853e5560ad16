//! Node builder: materializes one value per completed-node event.
//!
//! Invoked once per event, bottom-up. Children are looked up in the
//! symbol table by id, the new value is (optionally) piped through the
//! caller's resolver hook, registered, and its id handed back so parent
//! containers can reference it. Once the error latch is set the builder
//! does no further work and answers every event with the sentinel id -
//! the first failure is the only one the caller ever sees.

use std::rc::Rc;

use crate::error::{BoxError, ErrorLatch, LoadError};
use crate::event::ParseEvent;
use crate::node::Node;
use crate::symbol::{is_anchor_name, NodeId, SymbolTable};

/// Post-construction transformation applied to every node before
/// registration. Its output - not the original node - is what parents
/// and later aliases see.
pub type Resolver<'a> = dyn Fn(Node) -> Result<Node, BoxError> + 'a;

/// Consumes completed-node events and materializes values in the
/// symbol table.
pub struct NodeBuilder<'r> {
    symbols: SymbolTable,
    resolver: Option<&'r Resolver<'r>>,
}

impl<'r> NodeBuilder<'r> {
    pub fn new(resolver: Option<&'r Resolver<'r>>) -> Self {
        NodeBuilder {
            symbols: SymbolTable::new(),
            resolver,
        }
    }

    /// Handle one completed node, returning its id or `NodeId::NONE` on
    /// failure. The first failure latches; later events are no-ops.
    pub fn handle_event(&mut self, event: ParseEvent, latch: &mut ErrorLatch) -> NodeId {
        if latch.is_set() {
            return NodeId::NONE;
        }
        match self.build(event) {
            Ok(id) => id,
            Err(err) => {
                latch.set(err);
                NodeId::NONE
            }
        }
    }

    fn build(&mut self, event: ParseEvent) -> Result<NodeId, LoadError> {
        let (node, tag, anchor) = match event {
            ParseEvent::Scalar {
                text,
                style,
                tag,
                anchor,
            } => {
                let text = String::from_utf8(text)
                    .map_err(|_| LoadError::build("scalar text is not valid UTF-8"))?;
                (Node::scalar_styled(text, style), tag, anchor)
            }

            ParseEvent::Sequence { items, tag, anchor } => {
                let mut children = Vec::with_capacity(items.len());
                for id in items {
                    children.push(self.symbols.get(id)?);
                }
                (Node::seq(children), tag, anchor)
            }

            ParseEvent::Mapping {
                entries,
                tag,
                anchor,
            } => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    pairs.push((self.symbols.get(key)?, self.symbols.get(value)?));
                }
                (Node::map(pairs), tag, anchor)
            }

            // An alias resolves to the already-registered node: same id,
            // no re-construction, no second resolver run.
            ParseEvent::Alias { name } => {
                return self.symbols.lookup_anchor(&name).ok_or_else(|| {
                    LoadError::build(format!("alias refers to unknown anchor '{name}'"))
                });
            }
        };

        if let Some(name) = &anchor {
            if !is_anchor_name(name) {
                return Err(LoadError::build(format!("invalid anchor name '{name}'")));
            }
        }

        let mut node = match tag {
            Some(tag) => node.with_tag(tag),
            None => node,
        };
        if let Some(name) = &anchor {
            node = node.with_anchor(name.clone());
        }

        let node = match self.resolver {
            Some(resolve) => resolve(node)
                .map_err(|err| LoadError::build(format!("resolver failed: {err}")))?,
            None => node,
        };

        let id = self.symbols.register(node);
        if let Some(name) = anchor {
            self.symbols.bind_anchor(name, id);
        }
        Ok(id)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// The document root: the most recently registered value.
    pub fn root(&self) -> Option<Rc<Node>> {
        self.symbols.last()
    }
}
