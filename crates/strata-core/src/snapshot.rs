//! Materialize the graph as it stood at one version

use crate::error::GraphResult;
use crate::graph::PersistentGraph;
use crate::model::{NodeRef, SlotId, VersionId};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Display;

/// The subgraph reachable from the root at one version, copied into a
/// plain `petgraph` graph. Edge weights are the out-slot indices.
#[derive(Debug)]
pub struct VersionSnapshot<T> {
    pub version: VersionId,
    pub root: NodeIndex,
    pub graph: StableDiGraph<T, SlotId>,
    /// Node object behind each snapshot node.
    pub index: HashMap<NodeRef, NodeIndex>,
}

impl<T> VersionSnapshot<T> {
    pub fn node_index(&self, node: NodeRef) -> Option<NodeIndex> {
        self.index.get(&node).copied()
    }
}

/// Node objects reachable from the root at `version`, in breadth-first
/// order with out-slots visited in index order.
pub fn reachable_at<T: Clone>(graph: &PersistentGraph<T>, version: VersionId) -> GraphResult<Vec<NodeRef>> {
    let root = graph.root_at(version)?;
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();

    visited.insert(root);
    queue.push_back(root);
    while let Some(current) = queue.pop_front() {
        order.push(current);
        for (_, target) in graph.successors_at(current, version)? {
            if visited.insert(target) {
                queue.push_back(target);
            }
        }
    }

    Ok(order)
}

/// Copy the graph as of `version` into a `StableDiGraph`.
pub fn to_petgraph<T: Clone>(graph: &PersistentGraph<T>, version: VersionId) -> GraphResult<VersionSnapshot<T>> {
    let nodes = reachable_at(graph, version)?;
    let mut inner = StableDiGraph::new();
    let mut index = HashMap::with_capacity(nodes.len());

    for &node in &nodes {
        let idx = inner.add_node(graph.query(node, version)?.clone());
        index.insert(node, idx);
    }
    for &node in &nodes {
        for (slot, target) in graph.successors_at(node, version)? {
            inner.add_edge(index[&node], index[&target], slot);
        }
    }

    Ok(VersionSnapshot {
        version,
        root: index[&nodes[0]],
        graph: inner,
        index,
    })
}

/// Text dump of the graph at `version`, one reachable node per line:
/// `n<ref> <payload> -> [<target per out-slot>]`.
pub fn render<T: Clone + Display>(graph: &PersistentGraph<T>, version: VersionId) -> GraphResult<String> {
    let mut out = format!("@{}\n", version);
    for node in reachable_at(graph, version)? {
        let slots: Vec<String> = (0..graph.config().out_degree)
            .map(|slot| {
                graph
                    .edge_at(node, slot, version)
                    .map(|target| target.map_or_else(|| "-".to_string(), |t| t.to_string()))
            })
            .collect::<GraphResult<_>>()?;
        out.push_str(&format!("{} {} -> [{}]\n", node, graph.query(node, version)?, slots.join(", ")));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::visit::EdgeRef;

    #[test]
    fn test_snapshot_tracks_version() {
        let mut g = PersistentGraph::create("a", 2, 2).unwrap();
        let root = g.root();
        let b = g.add_node("b");
        let c = g.add_node("c");
        let v1 = g.add_edge(root, 0, b).unwrap();
        let v2 = g.add_edge(b, 1, c).unwrap();

        let early = to_petgraph(&g, v1).unwrap();
        assert_eq!(early.graph.node_count(), 2);
        assert_eq!(early.graph.edge_count(), 1);

        let late = to_petgraph(&g, v2).unwrap();
        assert_eq!(late.graph.node_count(), 3);
        let b_idx = late.node_index(b).unwrap();
        let edge = late.graph.edges(b_idx).next().unwrap();
        assert_eq!(*edge.weight(), 1);
        assert_eq!(late.graph[edge.target()], "c");
        assert_eq!(late.graph[late.root], "a");
    }

    #[test]
    fn test_cycles_visit_each_node_once() {
        let mut g = PersistentGraph::create(1, 1, 1).unwrap();
        let root = g.root();
        let other = g.add_node(2);
        g.add_edge(root, 0, other).unwrap();
        let v = g.add_edge(other, 0, root).unwrap();

        let order = reachable_at(&g, v).unwrap();
        assert_eq!(order.len(), 2);
        assert_eq!(to_petgraph(&g, v).unwrap().graph.edge_count(), 2);
    }
}
