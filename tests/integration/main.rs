//! Integration tests for Strata
//!
//! These tests drive the CLI binary end to end and exercise the core
//! library through its public API.

use std::process::Command;
use tempfile::TempDir;

const SCRIPT: &str = r#"
[graph]
root = "A"
out_degree = 2
in_degree = 2

[[ops]]
op = "add_node"
name = "B"
data = "B"

[[ops]]
op = "add_edge"
from = "root"
slot = 0
to = "B"

[[ops]]
op = "edge"
node = "root"
slot = 0
version = 0

[[ops]]
op = "edge"
node = "root"
slot = 0
"#;

fn strata() -> Command {
    Command::new(env!("CARGO_BIN_EXE_strata"))
}

fn write_script(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_invocation() {
    let output = strata().arg("--help").output().expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("partially persistent graph"));
}

/// Test that replay prints one JSON result per operation
#[test]
fn test_replay_prints_outcomes() {
    let dir = TempDir::new().unwrap();
    let path = write_script(&dir, "ops.toml", SCRIPT);

    let output = strata().arg("replay").arg(&path).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1]["result"], "version");
    assert_eq!(lines[1]["version"], 1);
    assert_eq!(lines[2]["target"], serde_json::Value::Null);
    assert_eq!(lines[3]["target"], "B");
}

/// Test that render dumps the requested version
#[test]
fn test_render_historic_version() {
    let dir = TempDir::new().unwrap();
    let path = write_script(&dir, "ops.toml", SCRIPT);

    let output = strata().args(["render", "--at", "0"]).arg(&path).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "@v0\nn0 A -> [-, -]\n");

    let output = strata().arg("render").arg(&path).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "@v1\nn0 A -> [n1, -]\nn1 B -> [-, -]\n");
}

/// Test that a failing operation exits non-zero and names the op
#[test]
fn test_replay_reports_failed_op() {
    let dir = TempDir::new().unwrap();
    let path = write_script(
        &dir,
        "bad.json",
        r#"{"graph": {"root": "A", "out_degree": 1, "in_degree": 1},
            "ops": [{"op": "add_edge", "from": "root", "slot": 3, "to": "root"}]}"#,
    );

    let output = strata().arg("replay").arg(&path).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("op #0"));
}

/// Test that a render past the last version is refused
#[test]
fn test_render_unknown_version() {
    let dir = TempDir::new().unwrap();
    let path = write_script(&dir, "ops.toml", SCRIPT);

    let output = strata().args(["render", "--at", "9"]).arg(&path).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown version"));
}

/// Test the library end to end: shared handle, history, snapshot export
#[test]
fn test_shared_graph_history() {
    use strata_core::{PersistentGraph, SharedGraph, VersionId, to_petgraph};

    let shared = SharedGraph::new(PersistentGraph::create("A".to_string(), 2, 2).unwrap());
    let root = shared.read(|g| g.root());
    let b = shared.add_node("B".to_string());
    let v1 = shared.add_edge(root, 0, b).unwrap();
    let v2 = shared.set_data(b, "B2".to_string()).unwrap();

    assert_eq!(shared.query(b, v1).unwrap(), "B");
    assert_eq!(shared.query(b, v2).unwrap(), "B2");
    let snapshot = shared.read(|g| to_petgraph(g, VersionId(0))).unwrap();
    assert_eq!(snapshot.graph.node_count(), 1);
}
