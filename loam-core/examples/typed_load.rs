//! Example: Load tagged documents into plain typed values.
//!
//! Run with: cargo run --example typed_load

use loam_core::{InputSource, Loader, Parser, ScriptEngine, ScriptStep};

fn tagged(text: &str, suffix: &str) -> ScriptStep {
    ScriptStep::scalar(text).with_tag(format!("tag:yaml.org,2002:{suffix}"))
}

fn main() {
    // retries: 3
    // timeout: 2.5
    // deadline: 2026-08-06 09:00:00 -05:00
    // token: aGVsbG8=        (!!binary)
    let steps = vec![
        ScriptStep::scalar("retries"),
        tagged("3", "int"),
        ScriptStep::scalar("timeout"),
        tagged("2.5", "float#fix"),
        ScriptStep::scalar("deadline"),
        tagged("2026-08-06 09:00:00 -05:00", "timestamp"),
        ScriptStep::scalar("token"),
        tagged("aGVsbG8=", "binary"),
        ScriptStep::mapping(vec![(0, 1), (2, 3), (4, 5), (6, 7)]),
    ];

    let engine = ScriptEngine::single(steps);
    let mut parser = Parser::new(engine, InputSource::buffer(Vec::new()));

    let loader = Loader::new();
    let value = loader
        .load_next(&mut parser)
        .expect("load failed")
        .expect("expected one document");

    println!("retries  = {:?}", value.get("retries"));
    println!("timeout  = {:?}", value.get("timeout"));
    println!("deadline = {:?}", value.get("deadline"));
    println!("token    = {:?}", value.get("token"));
}
