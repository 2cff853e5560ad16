//! Grammar engine boundary.
//!
//! The engine that recognizes line structure, indentation, and quoting
//! is an external collaborator; this module pins down the contract it
//! is driven through. One `next_document` call runs one document cycle:
//! the engine pulls bytes through the input adapter, emits one event
//! per completed node, and reports grammar failures with a source
//! position. All state flows through the explicit `BuildContext` - no
//! callbacks, no userdata pointers.
//!
//! `ScriptEngine` replays a pre-recorded step script and is the engine
//! used by the test suite and for programmatic tree construction.

use std::collections::VecDeque;

use log::trace;

use crate::builder::NodeBuilder;
use crate::error::{ErrorLatch, LoadError};
use crate::event::ParseEvent;
use crate::node::ScalarStyle;
use crate::source::InputSource;
use crate::symbol::NodeId;

/// Flags forwarded to the grammar engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Tag plain scalars by their recognized form (`tag:yaml.org,2002:int`
    /// and friends).
    pub implicit_typing: bool,
    /// Expand shorthand tags to full tag URIs.
    pub taguri_expansion: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            implicit_typing: true,
            taguri_expansion: true,
        }
    }
}

/// Result of one document cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A document was recognized; its root is the last value the
    /// builder registered.
    Document,
    /// The stream ended with no further document.
    EndOfStream,
}

/// The builder-side surface an engine drives during one document cycle.
pub struct BuildContext<'c, 'r> {
    builder: &'c mut NodeBuilder<'r>,
    source: &'c mut InputSource,
    latch: &'c mut ErrorLatch,
    options: EngineOptions,
}

impl<'c, 'r> BuildContext<'c, 'r> {
    pub(crate) fn new(
        builder: &'c mut NodeBuilder<'r>,
        source: &'c mut InputSource,
        latch: &'c mut ErrorLatch,
        options: EngineOptions,
    ) -> Self {
        BuildContext {
            builder,
            source,
            latch,
            options,
        }
    }

    /// Hand one completed node to the builder. Returns the node's id,
    /// or `NodeId::NONE` once a failure has latched.
    pub fn emit(&mut self, event: ParseEvent) -> NodeId {
        self.builder.handle_event(event, self.latch)
    }

    /// Report a grammar-level failure at a source position (1-based
    /// line, 0-based column). First failure wins.
    pub fn fail(&mut self, message: impl Into<String>, line: u32, column: u32) {
        self.latch.set(LoadError::grammar(message, line, column));
    }

    /// Chunked read through the input adapter; see `InputSource::fill`.
    pub fn fill(&mut self, buf: &mut [u8], skip: usize) -> usize {
        self.source.fill(buf, skip, self.latch)
    }

    /// Whether a failure has latched this cycle. Engines should unwind
    /// promptly once this is true.
    pub fn failed(&self) -> bool {
        self.latch.is_set()
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }
}

/// The wrapped grammar engine, at its interface boundary.
///
/// After `next_document` returns - with a document, end of stream, or a
/// latched failure - the engine must be positioned at the start of the
/// next document, or be prepared to report end of stream.
pub trait GrammarEngine {
    fn next_document(&mut self, ctx: &mut BuildContext<'_, '_>) -> Outcome;

    /// Release engine-held resources. Called once on close or fatal
    /// error; the engine is not used again afterwards.
    fn release(&mut self) {}
}

/// One pre-recorded construction step.
///
/// Ids are assigned by the symbol table at replay time, so a script
/// cannot carry real `NodeId`s; container steps reference children by
/// the zero-based index of the step that built them within the same
/// document.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Scalar {
        text: Vec<u8>,
        style: ScalarStyle,
        tag: Option<String>,
        anchor: Option<String>,
    },
    Sequence {
        items: Vec<usize>,
        tag: Option<String>,
        anchor: Option<String>,
    },
    Mapping {
        entries: Vec<(usize, usize)>,
        tag: Option<String>,
        anchor: Option<String>,
    },
    Alias { name: String },
}

impl ScriptStep {
    pub fn scalar(text: impl Into<Vec<u8>>) -> ScriptStep {
        ScriptStep::Scalar {
            text: text.into(),
            style: ScalarStyle::Plain,
            tag: None,
            anchor: None,
        }
    }

    pub fn sequence(items: Vec<usize>) -> ScriptStep {
        ScriptStep::Sequence {
            items,
            tag: None,
            anchor: None,
        }
    }

    pub fn mapping(entries: Vec<(usize, usize)>) -> ScriptStep {
        ScriptStep::Mapping {
            entries,
            tag: None,
            anchor: None,
        }
    }

    pub fn alias(name: impl Into<String>) -> ScriptStep {
        ScriptStep::Alias { name: name.into() }
    }

    /// Attach a type tag. No effect on `Alias`.
    pub fn with_tag(mut self, value: impl Into<String>) -> ScriptStep {
        match &mut self {
            ScriptStep::Scalar { tag, .. }
            | ScriptStep::Sequence { tag, .. }
            | ScriptStep::Mapping { tag, .. } => *tag = Some(value.into()),
            ScriptStep::Alias { .. } => {}
        }
        self
    }

    /// Attach an anchor name. No effect on `Alias`.
    pub fn with_anchor(mut self, value: impl Into<String>) -> ScriptStep {
        match &mut self {
            ScriptStep::Scalar { anchor, .. }
            | ScriptStep::Sequence { anchor, .. }
            | ScriptStep::Mapping { anchor, .. } => *anchor = Some(value.into()),
            ScriptStep::Alias { .. } => {}
        }
        self
    }

    pub fn with_style(mut self, value: ScalarStyle) -> ScriptStep {
        if let ScriptStep::Scalar { style, .. } = &mut self {
            *style = value;
        }
        self
    }

    /// Resolve step indices to the ids assigned so far. An index with
    /// no assigned id maps to the sentinel, which the builder reports
    /// as a desynchronization.
    fn resolve(self, assigned: &[NodeId]) -> ParseEvent {
        let id_at = |index: usize| assigned.get(index).copied().unwrap_or(NodeId::NONE);
        match self {
            ScriptStep::Scalar {
                text,
                style,
                tag,
                anchor,
            } => ParseEvent::Scalar {
                text,
                style,
                tag,
                anchor,
            },
            ScriptStep::Sequence { items, tag, anchor } => ParseEvent::Sequence {
                items: items.into_iter().map(id_at).collect(),
                tag,
                anchor,
            },
            ScriptStep::Mapping {
                entries,
                tag,
                anchor,
            } => ParseEvent::Mapping {
                entries: entries
                    .into_iter()
                    .map(|(k, v)| (id_at(k), id_at(v)))
                    .collect(),
                tag,
                anchor,
            },
            ScriptStep::Alias { name } => ParseEvent::Alias { name },
        }
    }
}

/// Replay engine: emits pre-recorded step scripts, one script per
/// document.
///
/// The input source is drained through the chunk contract before the
/// first document, the way a buffering engine would consume it, so
/// source failures surface through a `ScriptEngine` exactly as they
/// would through a real grammar engine.
pub struct ScriptEngine {
    documents: VecDeque<Vec<ScriptStep>>,
    chunk_len: usize,
    drained: bool,
}

/// Default engine-side read chunk size.
const DEFAULT_CHUNK_LEN: usize = 4096;

impl ScriptEngine {
    pub fn new(documents: Vec<Vec<ScriptStep>>) -> Self {
        ScriptEngine {
            documents: documents.into(),
            chunk_len: DEFAULT_CHUNK_LEN,
            drained: false,
        }
    }

    /// Single-document convenience.
    pub fn single(steps: Vec<ScriptStep>) -> Self {
        ScriptEngine::new(vec![steps])
    }

    /// Use a smaller read chunk, forcing multiple fill cycles.
    pub fn with_chunk_len(mut self, chunk_len: usize) -> Self {
        self.chunk_len = chunk_len.max(2);
        self
    }
}

impl GrammarEngine for ScriptEngine {
    fn next_document(&mut self, ctx: &mut BuildContext<'_, '_>) -> Outcome {
        if !self.drained {
            let mut buf = vec![0u8; self.chunk_len];
            let mut total = 0usize;
            loop {
                let len = ctx.fill(&mut buf, 0);
                if len == 0 || ctx.failed() {
                    break;
                }
                total += len;
            }
            trace!("script engine drained {total} input bytes");
            self.drained = true;
        }

        if ctx.failed() {
            return Outcome::EndOfStream;
        }

        let Some(steps) = self.documents.pop_front() else {
            return Outcome::EndOfStream;
        };
        let mut assigned = Vec::with_capacity(steps.len());
        for step in steps {
            let event = step.resolve(&assigned);
            assigned.push(ctx.emit(event));
        }
        Outcome::Document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_parts() -> (NodeBuilder<'static>, InputSource, ErrorLatch) {
        (
            NodeBuilder::new(None),
            InputSource::buffer(Vec::new()),
            ErrorLatch::new(),
        )
    }

    #[test]
    fn script_engine_emits_documents_in_order() {
        let mut engine = ScriptEngine::new(vec![
            vec![ScriptStep::scalar("one")],
            vec![ScriptStep::scalar("two")],
        ]);
        let (mut builder, mut source, mut latch) = ctx_parts();

        let mut ctx =
            BuildContext::new(&mut builder, &mut source, &mut latch, EngineOptions::default());
        assert_eq!(engine.next_document(&mut ctx), Outcome::Document);
        assert_eq!(engine.next_document(&mut ctx), Outcome::Document);
        assert_eq!(engine.next_document(&mut ctx), Outcome::EndOfStream);
    }

    #[test]
    fn script_steps_resolve_to_assigned_ids() {
        let mut engine = ScriptEngine::single(vec![
            ScriptStep::scalar("a"),
            ScriptStep::scalar("b"),
            ScriptStep::sequence(vec![0, 1]),
        ]);
        let (mut builder, mut source, mut latch) = ctx_parts();

        let mut ctx =
            BuildContext::new(&mut builder, &mut source, &mut latch, EngineOptions::default());
        assert_eq!(engine.next_document(&mut ctx), Outcome::Document);
        assert!(!latch.is_set());

        let root = builder.root().unwrap();
        let texts: Vec<_> = root
            .items()
            .unwrap()
            .iter()
            .map(|n| n.as_str().unwrap().to_owned())
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn unassigned_script_index_desynchronizes() {
        let mut engine = ScriptEngine::single(vec![ScriptStep::sequence(vec![5])]);
        let (mut builder, mut source, mut latch) = ctx_parts();

        let mut ctx =
            BuildContext::new(&mut builder, &mut source, &mut latch, EngineOptions::default());
        engine.next_document(&mut ctx);
        assert!(matches!(latch.take(), Some(LoadError::Build { .. })));
    }

    #[test]
    fn script_engine_drains_the_source() {
        let mut engine = ScriptEngine::single(vec![ScriptStep::scalar("x")]).with_chunk_len(4);
        let mut builder = NodeBuilder::new(None);
        let mut source = InputSource::buffer(&b"0123456789"[..]);
        let mut latch = ErrorLatch::new();

        let mut ctx =
            BuildContext::new(&mut builder, &mut source, &mut latch, EngineOptions::default());
        assert_eq!(engine.next_document(&mut ctx), Outcome::Document);

        // Fully consumed.
        let mut buf = [0u8; 4];
        assert_eq!(source.fill(&mut buf, 0, &mut latch), 0);
    }

    #[test]
    fn fail_latches_a_grammar_error() {
        let (mut builder, mut source, mut latch) = ctx_parts();

        let mut ctx =
            BuildContext::new(&mut builder, &mut source, &mut latch, EngineOptions::default());
        ctx.fail("unexpected flow end", 4, 11);
        assert!(ctx.failed());
        assert_eq!(ctx.emit(ParseEvent::scalar("late")), NodeId::NONE);

        assert_eq!(
            latch.take(),
            Some(LoadError::grammar("unexpected flow end", 4, 11))
        );
    }
}
