//! Failure taxonomy and the single-slot error latch.
//!
//! Every failure path in the loader - pull-read violations, engine-reported
//! grammar errors, and builder-side construction failures - funnels into one
//! `ErrorLatch` per document cycle. The first error wins; everything after it
//! is short-circuited until the document iterator drains the latch.

use thiserror::Error;

/// Boxed error returned by caller-supplied hooks (resolver, pull source).
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Structured failure surfaced to callers of the document iterator.
///
/// Grammar errors carry a source position (1-based line, 0-based column
/// within that line). Build errors have no natural position.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// The pull-read operation failed or violated its contract.
    #[error("source error: {message}")]
    Source { message: String },

    /// The grammar engine reported malformed structure.
    #[error("{message} at line {line}, column {column}")]
    Grammar {
        message: String,
        line: u32,
        column: u32,
    },

    /// A value could not be constructed or looked up.
    #[error("build error: {message}")]
    Build { message: String },

    /// A tagged value could not be converted by the typed loader.
    #[error("cannot construct {tag}: {message}")]
    Construct { tag: String, message: String },

    /// Operation on a closed iterator.
    #[error("source is closed")]
    Closed,
}

impl LoadError {
    pub fn source(message: impl Into<String>) -> Self {
        LoadError::Source {
            message: message.into(),
        }
    }

    pub fn grammar(message: impl Into<String>, line: u32, column: u32) -> Self {
        LoadError::Grammar {
            message: message.into(),
            line,
            column,
        }
    }

    pub fn build(message: impl Into<String>) -> Self {
        LoadError::Build {
            message: message.into(),
        }
    }

    pub fn construct(tag: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::Construct {
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Source and grammar errors leave the underlying engine unusable;
    /// the iterator transitions to Closed. Build errors are scoped to
    /// the failed document.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoadError::Source { .. } | LoadError::Grammar { .. })
    }
}

/// Single-assignment failure cell.
///
/// The first `set` wins; later attempts are ignored while the cell is
/// occupied. Drained exactly once per document cycle via `take`, after
/// control returns from the engine.
#[derive(Debug, Default)]
pub struct ErrorLatch {
    slot: Option<LoadError>,
}

impl ErrorLatch {
    pub fn new() -> Self {
        ErrorLatch { slot: None }
    }

    /// Capture an error unless one is already latched.
    pub fn set(&mut self, error: LoadError) {
        if self.slot.is_none() {
            self.slot = Some(error);
        }
    }

    pub fn is_set(&self) -> bool {
        self.slot.is_some()
    }

    /// Read and clear the latched error, if any.
    pub fn take(&mut self) -> Option<LoadError> {
        self.slot.take()
    }
}
