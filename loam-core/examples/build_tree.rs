//! Example: Build a document tree from a scripted event stream and
//! navigate it.
//!
//! Run with: cargo run --example build_tree

use loam_core::{InputSource, Node, NodeKind, Parser, ScriptEngine, ScriptStep};

fn main() {
    // servers:
    //   - &defaults { host: db1, port: "5432" }
    //   - *defaults
    // name: cluster-a
    let steps = vec![
        ScriptStep::scalar("host"),
        ScriptStep::scalar("db1"),
        ScriptStep::scalar("port"),
        ScriptStep::scalar("5432"),
        ScriptStep::mapping(vec![(0, 1), (2, 3)]).with_anchor("defaults"),
        ScriptStep::alias("defaults"),
        ScriptStep::sequence(vec![4, 5]),
        ScriptStep::scalar("servers"),
        ScriptStep::scalar("name"),
        ScriptStep::scalar("cluster-a"),
        ScriptStep::mapping(vec![(7, 6), (8, 9)]),
    ];

    let engine = ScriptEngine::single(steps);
    let mut parser = Parser::new(engine, InputSource::buffer(Vec::new()));

    let root = parser
        .parse_one()
        .expect("parse failed")
        .expect("expected one document");

    println!("=== Document Tree ===\n");
    print_node(&root, 0);

    let servers = root.get("servers").expect("servers entry");
    let items = servers.items().expect("servers is a sequence");
    println!(
        "\nboth slots share one value: {}",
        std::rc::Rc::ptr_eq(&items[0], &items[1])
    );
}

fn print_node(node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    match node.kind() {
        NodeKind::Scalar { text, .. } => println!("{indent}scalar {text:?}"),
        NodeKind::Seq(items) => {
            println!("{indent}seq ({} items)", items.len());
            for item in items {
                print_node(item, depth + 1);
            }
        }
        NodeKind::Map(entries) => {
            println!("{indent}map ({} entries)", entries.len());
            for (key, value) in entries {
                print_node(key, depth + 1);
                print_node(value, depth + 2);
            }
        }
    }
}
