//! LOAM Core Loader
//!
//! Streaming, anchor-resolving document builder: converts completed-node
//! parse events from a grammar engine into materialized tree values,
//! one document at a time, with identity-shared back-references.
//!
//! # Architecture
//!
//! - **source.rs** - buffer/pull input adapter behind the chunked read contract
//! - **symbol.rs** - per-document id -> value arena backing anchor resolution
//! - **builder.rs** - completed-node event handler with resolver hook
//! - **error.rs** - failure taxonomy and the first-error-wins latch
//! - **parser.rs** - document iterator (parse_one / parse_all / close)
//! - **loader.rs** - tag-driven typed value construction
//! - **engine.rs** - grammar engine boundary + scripted replay engine

pub mod builder;
pub mod engine;
pub mod error;
pub mod event;
pub mod loader;
pub mod node;
pub mod parser;
pub mod source;
pub mod symbol;

pub use builder::{NodeBuilder, Resolver};
pub use engine::{BuildContext, EngineOptions, GrammarEngine, Outcome, ScriptEngine, ScriptStep};
pub use error::{BoxError, ErrorLatch, LoadError};
pub use event::ParseEvent;
pub use loader::{Loader, Timestamp, Value};
pub use node::{Node, NodeKind, ScalarStyle};
pub use parser::Parser;
pub use source::{InputSource, PullSource, ReadSource, SourceError};
pub use symbol::{NodeId, SymbolTable};
