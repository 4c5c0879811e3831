//! Operation scripts replayed against a persistent graph

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use strata_core::{GraphConfig, NodeRef, PersistentGraph, SlotId, VersionId, VertexId};

/// Name under which the graph's root is addressed in scripts.
pub const ROOT_NAME: &str = "root";

/// A graph definition plus the operations to run on it.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub graph: GraphSection,
    #[serde(default)]
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphSection {
    /// Payload of the root node.
    pub root: String,
    #[serde(flatten)]
    pub config: GraphConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    AddNode { name: String, data: String },
    InsertNode { name: String, from: String, slot: SlotId, data: String },
    AddEdge { from: String, slot: SlotId, to: String },
    RemoveEdge { from: String, slot: SlotId },
    SetData { node: String, data: String },
    Query { node: String, version: Option<u64> },
    Edge { node: String, slot: SlotId, version: Option<u64> },
    Root { version: Option<u64> },
}

/// What one operation produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Node { name: String, node: NodeRef },
    Version { version: VersionId },
    Data { node: String, version: VersionId, data: String },
    Edge { node: String, slot: SlotId, version: VersionId, target: Option<String> },
    Root { version: VersionId, node: NodeRef },
}

/// Graph state left behind by a replay.
#[derive(Debug)]
pub struct Replay {
    pub graph: PersistentGraph<String>,
    pub outcomes: Vec<Outcome>,
}

impl Script {
    /// Load a script, picking the format from the file extension.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("toml") | None => Self::from_toml(&text),
            Some(other) => bail!("unsupported script format: .{}", other),
        }
        .with_context(|| format!("failed to parse script {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Run every operation in order, stopping at the first failure.
    pub fn run(&self) -> anyhow::Result<Replay> {
        let mut graph = PersistentGraph::with_config(self.graph.root.clone(), self.graph.config)?;
        let mut names = Names::default();
        names.insert(ROOT_NAME.to_string(), graph.root(), &graph)?;

        let mut outcomes = Vec::with_capacity(self.ops.len());
        for (i, op) in self.ops.iter().enumerate() {
            let outcome = apply(&mut graph, &mut names, op)
                .with_context(|| format!("op #{} ({:?}) failed", i, op))?;
            tracing::debug!(?outcome, "op #{} applied", i);
            outcomes.push(outcome);
        }

        tracing::info!(
            "Replayed {} ops, {} versions, {} node copies",
            outcomes.len(),
            graph.current_version().0,
            graph.stats().copies
        );
        Ok(Replay { graph, outcomes })
    }
}

#[derive(Default)]
struct Names {
    by_name: HashMap<String, NodeRef>,
    by_vertex: HashMap<VertexId, String>,
}

impl Names {
    fn insert(&mut self, name: String, node: NodeRef, graph: &PersistentGraph<String>) -> anyhow::Result<()> {
        if self.by_name.contains_key(&name) {
            bail!("node name {:?} is already taken", name);
        }
        self.by_vertex.insert(graph.node(node)?.vertex(), name.clone());
        self.by_name.insert(name, node);
        Ok(())
    }

    fn get(&self, name: &str) -> anyhow::Result<NodeRef> {
        self.by_name
            .get(name)
            .copied()
            .with_context(|| format!("unknown node name {:?}", name))
    }

    fn name_of(&self, node: NodeRef, graph: &PersistentGraph<String>) -> anyhow::Result<String> {
        let vertex = graph.node(node)?.vertex();
        Ok(self
            .by_vertex
            .get(&vertex)
            .cloned()
            .unwrap_or_else(|| node.to_string()))
    }
}

fn version_or_current(graph: &PersistentGraph<String>, version: Option<u64>) -> VersionId {
    version.map(VersionId).unwrap_or_else(|| graph.current_version())
}

fn apply(graph: &mut PersistentGraph<String>, names: &mut Names, op: &Op) -> anyhow::Result<Outcome> {
    let outcome = match op {
        Op::AddNode { name, data } => {
            let node = graph.add_node(data.clone());
            names.insert(name.clone(), node, graph)?;
            Outcome::Node { name: name.clone(), node }
        }
        Op::InsertNode { name, from, slot, data } => {
            let (node, version) = graph.insert_node(names.get(from)?, *slot, data.clone())?;
            names.insert(name.clone(), node, graph)?;
            Outcome::Version { version }
        }
        Op::AddEdge { from, slot, to } => Outcome::Version {
            version: graph.add_edge(names.get(from)?, *slot, names.get(to)?)?,
        },
        Op::RemoveEdge { from, slot } => Outcome::Version {
            version: graph.remove_edge(names.get(from)?, *slot)?,
        },
        Op::SetData { node, data } => Outcome::Version {
            version: graph.set_data(names.get(node)?, data.clone())?,
        },
        Op::Query { node, version } => {
            let version = version_or_current(graph, *version);
            Outcome::Data {
                node: node.clone(),
                version,
                data: graph.query(names.get(node)?, version)?.clone(),
            }
        }
        Op::Edge { node, slot, version } => {
            let version = version_or_current(graph, *version);
            let target = graph.edge_at(names.get(node)?, *slot, version)?;
            Outcome::Edge {
                node: node.clone(),
                slot: *slot,
                version,
                target: target.map(|t| names.name_of(t, &*graph)).transpose()?,
            }
        }
        Op::Root { version } => {
            let version = version_or_current(graph, *version);
            Outcome::Root {
                version,
                node: graph.root_at(version)?,
            }
        }
    };
    Ok(outcome)
}
