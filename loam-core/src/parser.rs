//! Document iterator: the public control surface.
//!
//! Runs the grammar engine one document at a time. Each cycle gets a
//! fresh symbol table; the latch is drained exactly once per cycle,
//! after the engine returns. Source and grammar failures release the
//! engine and close the iterator; build failures are scoped to the one
//! document and the iterator stays usable.

use std::rc::Rc;

use log::debug;

use crate::builder::{NodeBuilder, Resolver};
use crate::engine::{BuildContext, EngineOptions, GrammarEngine, Outcome};
use crate::error::{BoxError, ErrorLatch, LoadError};
use crate::node::Node;
use crate::source::InputSource;

/// Streaming document iterator over a grammar engine and input source.
///
/// States: Open (engine live) -> Exhausted (clean end of stream;
/// `parse_one` keeps answering `Ok(None)`) or Closed (explicit
/// `close()` or a fatal source/grammar error; every call answers
/// `Err(Closed)`). Nothing leaves Closed.
///
/// `parse_one`/`parse_all` take `&mut self`, so reentrant parsing is a
/// compile error rather than a runtime check.
pub struct Parser<E> {
    engine: Option<E>,
    source: InputSource,
    options: EngineOptions,
    resolver: Option<Box<Resolver<'static>>>,
    latch: ErrorLatch,
    closed: bool,
}

impl<E: GrammarEngine> Parser<E> {
    pub fn new(engine: E, source: InputSource) -> Self {
        Parser {
            engine: Some(engine),
            source,
            options: EngineOptions::default(),
            resolver: None,
            latch: ErrorLatch::new(),
            closed: false,
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Install a resolver hook, applied to every node immediately after
    /// construction and before registration.
    pub fn with_resolver(
        mut self,
        resolver: impl Fn(Node) -> Result<Node, BoxError> + 'static,
    ) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Parse the next document. `Ok(None)` is end of stream, and stays
    /// `Ok(None)` on repeated calls unless the iterator is closed.
    pub fn parse_one(&mut self) -> Result<Option<Rc<Node>>, LoadError> {
        if self.closed {
            return Err(LoadError::Closed);
        }
        let Some(engine) = self.engine.as_mut() else {
            // Exhausted: idempotent end.
            return Ok(None);
        };

        debug!("document cycle: start");
        let mut builder = NodeBuilder::new(self.resolver.as_deref());
        let outcome = {
            let mut ctx =
                BuildContext::new(&mut builder, &mut self.source, &mut self.latch, self.options);
            engine.next_document(&mut ctx)
        };

        // Drain the latch exactly once, after the engine has unwound.
        if let Some(err) = self.latch.take() {
            debug!("document cycle: failed: {err}");
            if err.is_fatal() {
                self.shutdown();
                self.closed = true;
            }
            return Err(err);
        }

        match outcome {
            Outcome::EndOfStream => {
                debug!("document cycle: end of stream");
                self.shutdown();
                Ok(None)
            }
            Outcome::Document => {
                let root = builder
                    .root()
                    .ok_or_else(|| LoadError::build("document completed without a root value"))?;
                debug!("document cycle: ok ({} nodes)", builder.symbols().len());
                Ok(Some(root))
            }
        }
        // builder - and with it the document's symbol table - drops here.
    }

    /// Parse every remaining document. Any failure discards the
    /// documents collected by this call.
    pub fn parse_all(&mut self) -> Result<Vec<Rc<Node>>, LoadError> {
        let mut documents = Vec::new();
        while let Some(root) = self.parse_one()? {
            documents.push(root);
        }
        Ok(documents)
    }

    /// Release the engine and input source immediately. Idempotent;
    /// afterwards `parse_one`/`parse_all` fail with `Closed`.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.shutdown();
        self.closed = true;
        debug!("parser closed");
    }

    /// True once the stream ended or the iterator was closed.
    pub fn is_exhausted(&self) -> bool {
        self.engine.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn shutdown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.release();
        }
        self.source.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ScriptEngine, ScriptStep};

    fn scalar_doc(text: &str) -> Vec<ScriptStep> {
        vec![ScriptStep::scalar(text)]
    }

    #[test]
    fn parse_one_then_end_of_stream() {
        let engine = ScriptEngine::new(vec![scalar_doc("only")]);
        let mut parser = Parser::new(engine, InputSource::buffer(&b"only"[..]));

        let root = parser.parse_one().unwrap().unwrap();
        assert_eq!(root.as_str(), Some("only"));

        assert!(parser.parse_one().unwrap().is_none());
        assert!(parser.is_exhausted());
        // Idempotent end.
        assert!(parser.parse_one().unwrap().is_none());
        assert!(!parser.is_closed());
    }

    #[test]
    fn close_is_idempotent_and_terminal() {
        let engine = ScriptEngine::new(vec![scalar_doc("doc")]);
        let mut parser = Parser::new(engine, InputSource::buffer(Vec::new()));

        parser.close();
        parser.close();
        assert!(parser.is_closed());
        assert_eq!(parser.parse_one(), Err(LoadError::Closed));
        assert_eq!(parser.parse_all(), Err(LoadError::Closed));
    }

    #[test]
    fn close_after_exhaustion_turns_end_into_closed() {
        let engine = ScriptEngine::new(vec![]);
        let mut parser = Parser::new(engine, InputSource::buffer(Vec::new()));

        assert!(parser.parse_one().unwrap().is_none());
        parser.close();
        assert_eq!(parser.parse_one(), Err(LoadError::Closed));
    }

    #[test]
    fn build_error_leaves_the_iterator_usable() {
        let engine = ScriptEngine::new(vec![
            vec![ScriptStep::alias("missing")],
            scalar_doc("after"),
        ]);
        let mut parser = Parser::new(engine, InputSource::buffer(Vec::new()));

        let err = parser.parse_one().unwrap_err();
        assert!(matches!(err, LoadError::Build { .. }));
        assert!(!parser.is_closed());

        let root = parser.parse_one().unwrap().unwrap();
        assert_eq!(root.as_str(), Some("after"));
    }
}
