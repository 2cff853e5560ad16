//! Shared helpers for integration tests: scripted parsers and common
//! document shapes.

#![allow(dead_code)]

use std::rc::Rc;

use loam_core::{InputSource, Node, Parser, ScriptEngine, ScriptStep};

/// Parser over a scripted engine with an empty buffer source.
pub fn scripted(documents: Vec<Vec<ScriptStep>>) -> Parser<ScriptEngine> {
    Parser::new(
        ScriptEngine::new(documents),
        InputSource::buffer(Vec::new()),
    )
}

pub fn scalar_doc(text: &str) -> Vec<ScriptStep> {
    vec![ScriptStep::scalar(text)]
}

/// Sequence-of-scalars document.
pub fn seq_doc(texts: &[&str]) -> Vec<ScriptStep> {
    let mut steps: Vec<ScriptStep> = texts.iter().map(|t| ScriptStep::scalar(*t)).collect();
    steps.push(ScriptStep::sequence((0..texts.len()).collect()));
    steps
}

/// Mapping document of scalar key/value pairs.
pub fn map_doc(pairs: &[(&str, &str)]) -> Vec<ScriptStep> {
    let mut steps = Vec::new();
    let mut entries = Vec::new();
    for (i, (key, value)) in pairs.iter().enumerate() {
        steps.push(ScriptStep::scalar(*key));
        steps.push(ScriptStep::scalar(*value));
        entries.push((2 * i, 2 * i + 1));
    }
    steps.push(ScriptStep::mapping(entries));
    steps
}

/// Scalar texts of a sequence node.
pub fn item_texts(node: &Rc<Node>) -> Vec<String> {
    node.items()
        .expect("expected a sequence")
        .iter()
        .map(|n| n.as_str().expect("expected scalar items").to_owned())
        .collect()
}

/// Scalar key/value texts of a mapping node, in entry order.
pub fn entry_texts(node: &Rc<Node>) -> Vec<(String, String)> {
    node.entries()
        .expect("expected a mapping")
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().expect("expected scalar keys").to_owned(),
                v.as_str().expect("expected scalar values").to_owned(),
            )
        })
        .collect()
}
