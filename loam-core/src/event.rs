//! Completed-node construction events - the input to the node builder.
//!
//! The grammar engine emits exactly one event per completed node, in
//! document order, depth-first: children are always completed (and
//! assigned ids) before their parent's event arrives. Container events
//! therefore reference children by `NodeId`, never by value.
//!
//! Events own their payload - the engine hands over the completed node's
//! raw data by move, so there is no shared buffer to invalidate.
//!
//! ## Event sequences
//!
//! The document `[a, a]` with `a` anchored emits:
//! ```text
//! Scalar { text: "a", anchor: Some("x") }   -> id 0
//! Alias { name: "x" }                       -> id 0 (same node)
//! Sequence { items: [0, 0] }                -> id 1
//! ```
//!
//! Engines that pre-resolve anchors themselves simply pass the child id
//! twice and never emit `Alias`.

use crate::node::ScalarStyle;
use crate::symbol::NodeId;

/// One completed node, ready to be materialized.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    Scalar {
        /// Raw scalar bytes, copied as given. Must be valid UTF-8.
        text: Vec<u8>,
        style: ScalarStyle,
        tag: Option<String>,
        anchor: Option<String>,
    },

    Sequence {
        /// Child ids, in order. All must already be registered.
        items: Vec<NodeId>,
        tag: Option<String>,
        anchor: Option<String>,
    },

    Mapping {
        /// Key/value id pairs, in order. Duplicate keys are passed
        /// through untouched.
        entries: Vec<(NodeId, NodeId)>,
        tag: Option<String>,
        anchor: Option<String>,
    },

    /// Back-reference by anchor name, for engines that do not
    /// pre-resolve anchors to ids.
    Alias { name: String },
}

impl ParseEvent {
    /// Plain untagged scalar event.
    pub fn scalar(text: impl Into<Vec<u8>>) -> ParseEvent {
        ParseEvent::Scalar {
            text: text.into(),
            style: ScalarStyle::Plain,
            tag: None,
            anchor: None,
        }
    }

    pub fn sequence(items: Vec<NodeId>) -> ParseEvent {
        ParseEvent::Sequence {
            items,
            tag: None,
            anchor: None,
        }
    }

    pub fn mapping(entries: Vec<(NodeId, NodeId)>) -> ParseEvent {
        ParseEvent::Mapping {
            entries,
            tag: None,
            anchor: None,
        }
    }

    pub fn alias(name: impl Into<String>) -> ParseEvent {
        ParseEvent::Alias { name: name.into() }
    }

    /// Attach a type tag. No effect on `Alias`.
    pub fn with_tag(mut self, value: impl Into<String>) -> ParseEvent {
        match &mut self {
            ParseEvent::Scalar { tag, .. }
            | ParseEvent::Sequence { tag, .. }
            | ParseEvent::Mapping { tag, .. } => *tag = Some(value.into()),
            ParseEvent::Alias { .. } => {}
        }
        self
    }

    /// Attach an anchor name. No effect on `Alias`.
    pub fn with_anchor(mut self, value: impl Into<String>) -> ParseEvent {
        match &mut self {
            ParseEvent::Scalar { anchor, .. }
            | ParseEvent::Sequence { anchor, .. }
            | ParseEvent::Mapping { anchor, .. } => *anchor = Some(value.into()),
            ParseEvent::Alias { .. } => {}
        }
        self
    }

    pub fn with_style(mut self, value: ScalarStyle) -> ParseEvent {
        if let ParseEvent::Scalar { style, .. } = &mut self {
            *style = value;
        }
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ParseEvent::Scalar { .. } => "scalar",
            ParseEvent::Sequence { .. } => "seq",
            ParseEvent::Mapping { .. } => "map",
            ParseEvent::Alias { .. } => "alias",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_helpers_compose() {
        let event = ParseEvent::scalar("x")
            .with_tag("tag:yaml.org,2002:str")
            .with_anchor("a")
            .with_style(ScalarStyle::DoubleQuoted);
        assert_eq!(
            event,
            ParseEvent::Scalar {
                text: b"x".to_vec(),
                style: ScalarStyle::DoubleQuoted,
                tag: Some("tag:yaml.org,2002:str".into()),
                anchor: Some("a".into()),
            }
        );
    }

    #[test]
    fn alias_ignores_tag_and_anchor() {
        let event = ParseEvent::alias("x").with_tag("t").with_anchor("a");
        assert_eq!(event, ParseEvent::alias("x"));
    }
}
