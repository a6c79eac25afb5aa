//! Integration tests for Aggregraph
//!
//! These tests run the CLI on scenario files and drive the core crate across
//! module boundaries.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{Value, json};
use tempfile::TempDir;

const ABCD: &str = r#"
{
  "nodes": [
    { "name": "A", "x": 0, "y": 0 },
    { "name": "B", "x": 0, "y": 100 },
    { "name": "C", "x": 200, "y": 0 },
    { "name": "D", "x": 200, "y": 100 }
  ],
  "edges": [
    { "source": "A", "target": "C" },
    { "source": "B", "target": "C" },
    { "source": "B", "target": "D" }
  ]
}
"#;

fn aggregraph(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_aggregraph"))
        .args(args)
        .output()
        .expect("Failed to execute aggregraph")
}

/// Write the ABCD graph with the given operations (and optional hierarchy) to a file.
fn write_scenario(dir: &TempDir, operations: Value, hierarchy: Option<Value>) -> PathBuf {
    let mut scenario: Value = serde_json::from_str(ABCD).unwrap();
    scenario["operations"] = operations;
    if let Some(hierarchy) = hierarchy {
        scenario["hierarchy"] = hierarchy;
    }
    let path = dir.path().join("scenario.json");
    std::fs::write(&path, serde_json::to_string_pretty(&scenario).unwrap()).unwrap();
    path
}

fn run_scenario(scenario: &Path, config: Option<&Path>) -> Value {
    let mut args = Vec::new();
    if let Some(config) = config {
        args.extend(["--config", config.to_str().unwrap()]);
    }
    args.extend(["run", scenario.to_str().unwrap()]);
    let output = aggregraph(&args);
    assert!(
        output.status.success(),
        "aggregraph failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("Report is not JSON")
}

fn node_names(report: &Value) -> BTreeSet<String> {
    report["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["name"].as_str().unwrap().to_string())
        .collect()
}

fn edge_triples(report: &Value) -> BTreeSet<(String, String, u64)> {
    report["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["source"].as_str().unwrap().to_string(),
                e["target"].as_str().unwrap().to_string(),
                e["replaces"].as_u64().unwrap(),
            )
        })
        .collect()
}

fn triple(source: &str, target: &str, replaces: u64) -> (String, String, u64) {
    (source.to_string(), target.to_string(), replaces)
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_invocation() {
    let output = aggregraph(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("aggregraph"));
    assert!(stdout.contains("Fold graph nodes into aggregates and back"));

    let output = aggregraph(&["version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Aggregraph v"));
}

#[test]
fn test_run_aggregate() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(
        &dir,
        json!([{ "op": "aggregate", "members": ["A", "B"], "name": "X" }]),
        None,
    );

    let report = run_scenario(&scenario, None);

    assert_eq!(
        node_names(&report),
        BTreeSet::from(["C".to_string(), "D".to_string(), "X".to_string()])
    );
    assert_eq!(
        edge_triples(&report),
        BTreeSet::from([triple("X", "C", 2), triple("X", "D", 1)])
    );
    let x = report["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["name"] == "X")
        .unwrap();
    assert_eq!(x["aggregation"], true);
    assert_eq!(x["members"], json!(["A", "B"]));

    let batches = report["batches"].as_array().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0]["sequence"], 1);
    assert_eq!(batches[0]["events"][0]["type"], "node_created");
}

#[test]
fn test_run_round_trip() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(
        &dir,
        json!([
            { "op": "aggregate", "members": ["A", "B"], "name": "X" },
            { "op": "aggregate", "members": ["X", "C"], "name": "Y" },
            { "op": "separate_all" }
        ]),
        None,
    );

    let report = run_scenario(&scenario, None);

    assert_eq!(node_names(&report).len(), 4);
    assert_eq!(
        edge_triples(&report),
        BTreeSet::from([triple("A", "C", 1), triple("B", "C", 1), triple("B", "D", 1)])
    );
    assert_eq!(report["batches"].as_array().unwrap().len(), 3);
    assert!(report.get("rejected").is_none());
}

#[test]
fn test_run_with_directed_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("aggregraph.toml");
    std::fs::write(&config, "edge_replacement_policy = \"directed\"\n").unwrap();
    let scenario = write_scenario(
        &dir,
        json!([
            { "op": "aggregate", "members": ["A", "C"], "name": "X" }
        ]),
        None,
    );

    let report = run_scenario(&scenario, Some(&config));

    // B→C enters X, B→D stays outside
    assert_eq!(
        edge_triples(&report),
        BTreeSet::from([triple("B", "D", 1), triple("B", "X", 1)])
    );
}

#[test]
fn test_set_policy_operation() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(
        &dir,
        json!([
            { "op": "set_policy", "policy": "none" },
            { "op": "aggregate", "members": ["A", "B"], "name": "X" }
        ]),
        None,
    );

    let report = run_scenario(&scenario, None);

    assert!(report["edges"].as_array().unwrap().is_empty());
    assert_eq!(node_names(&report).len(), 3);
}

#[test]
fn test_rejected_operation_is_reported() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, json!([{ "op": "separate", "node": "A" }]), None);

    let report = run_scenario(&scenario, None);

    let rejected = report["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].as_str().unwrap().contains("not an aggregation node"));
    assert_eq!(node_names(&report).len(), 4);
}

#[test]
fn test_unknown_node_fails() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, json!([{ "op": "separate", "node": "Z" }]), None);

    let output = aggregraph(&["run", scenario.to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No visible node named Z"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "edge_replacement_policy = 3\n").unwrap();
    let scenario = write_scenario(&dir, json!([]), None);

    let output = aggregraph(&[
        "--config",
        config.to_str().unwrap(),
        "run",
        scenario.to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid config"));
}

#[test]
fn test_hierarchy_expand_and_collapse() {
    let dir = TempDir::new().unwrap();
    // C anchors {A, B}; the root holds that aggregate and D
    let hierarchy = json!([
        {
            "weight": 0,
            "children": [
                { "node": "C", "weight": 2, "children": [
                    { "node": "A", "weight": 1 },
                    { "node": "B", "weight": 4 }
                ] },
                { "node": "D", "weight": 8 }
            ]
        }
    ]);
    let scenario = write_scenario(
        &dir,
        json!([
            { "op": "aggregate_roots" },
            { "op": "expand", "node": "D" },
            { "op": "expand", "node": "C" }
        ]),
        Some(hierarchy.clone()),
    );

    let report = run_scenario(&scenario, None);

    // The placeholder for C carries C's label
    assert_eq!(
        node_names(&report),
        BTreeSet::from(["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()])
    );
    let placeholder = report["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["name"] == "C")
        .unwrap();
    assert_eq!(placeholder["aggregation"], true);
    assert_eq!(placeholder["members"], json!(["C"]));

    let scenario = write_scenario(
        &dir,
        json!([
            { "op": "aggregate_roots" },
            { "op": "expand_all" },
            { "op": "collapse", "node": "C" }
        ]),
        Some(hierarchy),
    );

    let report = run_scenario(&scenario, None);

    assert_eq!(
        node_names(&report),
        BTreeSet::from(["C".to_string(), "D".to_string()])
    );
    assert_eq!(edge_triples(&report), BTreeSet::from([triple("C", "D", 1)]));
}

#[test]
fn test_rejected_collapse_keeps_placeholder() {
    let dir = TempDir::new().unwrap();
    let hierarchy = json!([{ "node": "C", "children": [{ "node": "A" }] }]);
    let scenario = write_scenario(
        &dir,
        json!([
            { "op": "aggregate_roots" },
            { "op": "expand", "node": "C" },
            { "op": "aggregate", "members": ["A", "D"], "name": "M" },
            { "op": "collapse", "node": "C" }
        ]),
        Some(hierarchy),
    );

    let report = run_scenario(&scenario, None);

    let rejected = report["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].as_str().unwrap().contains("not in the graph"));
    assert_eq!(
        node_names(&report),
        BTreeSet::from(["B".to_string(), "C".to_string(), "M".to_string()])
    );
    let placeholder = report["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["name"] == "C")
        .unwrap();
    assert_eq!(placeholder["members"], json!(["C"]));
}

#[test]
fn test_inspect() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, json!([{ "op": "separate_all" }]), None);

    let output = aggregraph(&["inspect", scenario.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("4 nodes, 3 edges"));
    assert!(stdout.contains("edge B -> D"));
    assert!(stdout.contains("1 operations"));
}

/// Test the core crate end to end without the CLI
#[test]
fn test_core_round_trip() {
    use aggregraph_core::{
        AggregateGraph, Graph, GraphEdge, GraphNode, NodeRef, Point, Rect, Size,
    };

    let mut graph = Graph::new();
    let layout = |x: f64| Rect::from_center(Point::new(x, 0.0), Size::new(30.0, 30.0));
    let a = graph.add_node(GraphNode::labeled("a", layout(0.0))).unwrap();
    let b = graph.add_node(GraphNode::labeled("b", layout(100.0))).unwrap();
    let c = graph.add_node(GraphNode::labeled("c", layout(200.0))).unwrap();
    graph.add_edge(GraphEdge::between(a, b)).unwrap();
    graph.add_edge(GraphEdge::between(b, c)).unwrap();

    let mut graph = AggregateGraph::new(graph);
    let x = graph
        .aggregate(&[NodeRef::Original(a), NodeRef::Original(b)], None, None, None)
        .unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edges_between(NodeRef::Aggregation(x), NodeRef::Original(c)).len(), 1);

    let wrapped = graph.into_wrapped_graph();
    assert_eq!(wrapped.node_count(), 3);
    assert_eq!(wrapped.edge_count(), 2);
}
