//! Partially persistent directed graph built from fat nodes with node copying

use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::model::*;
use crate::node::{RecordOutcome, VersionedNode};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, error};

/// A bounded-degree directed graph in which every mutation produces a new
/// version and every earlier version stays queryable.
///
/// Node objects live in an arena and are addressed by [`NodeRef`]. When a
/// node's modification log is full, the node is copied and every live
/// predecessor is rewired to the copy. Old copies stay in the arena and keep
/// answering reads for the versions they were live at.
pub struct PersistentGraph<T> {
    arena: Vec<VersionedNode<T>>,
    /// Physical copies of each vertex, oldest first.
    lineages: Vec<Vec<NodeRef>>,
    root: VertexId,
    root_by_version: BTreeMap<VersionId, NodeRef>,
    current_version: VersionId,
    config: GraphConfig,
    stats: GraphStats,
    /// Set once a commit fails with a fatal error.
    poisoned: bool,
}

impl<T> std::fmt::Debug for PersistentGraph<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentGraph")
            .field("current_version", &self.current_version)
            .field("node_count", &self.arena.len())
            .field("vertex_count", &self.lineages.len())
            .field("config", &self.config)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

impl<T: Clone> PersistentGraph<T> {
    /// Create a graph whose root holds `data`, at version 0.
    pub fn create(data: T, out_degree: usize, in_degree: usize) -> GraphResult<Self> {
        Self::with_config(data, GraphConfig::new(out_degree, in_degree))
    }

    pub fn with_config(data: T, config: GraphConfig) -> GraphResult<Self> {
        config.validate()?;
        let mut graph = PersistentGraph {
            arena: Vec::new(),
            lineages: Vec::new(),
            root: VertexId(0),
            root_by_version: BTreeMap::new(),
            current_version: VersionId(0),
            config,
            stats: GraphStats::default(),
            poisoned: false,
        };
        let root = graph.alloc_node(data, VersionId(0));
        graph.root_by_version.insert(VersionId(0), root);
        Ok(graph)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Latest published version.
    pub fn current_version(&self) -> VersionId {
        self.current_version
    }

    pub fn stats(&self) -> GraphStats {
        self.stats
    }

    /// Whether a fatal error has made the graph read-only.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Number of physical node objects, retired copies included.
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of logical vertices.
    pub fn vertex_count(&self) -> usize {
        self.lineages.len()
    }

    /// Get a node object by handle.
    pub fn node(&self, node: NodeRef) -> GraphResult<&VersionedNode<T>> {
        self.arena.get(node.index()).ok_or(GraphError::UnknownNode(node))
    }

    /// The root as of the latest version.
    pub fn root(&self) -> NodeRef {
        let copies = self.lineage(self.root);
        copies[copies.len() - 1]
    }

    /// Every physical copy of `node`'s vertex, oldest first.
    pub fn copies_of(&self, node: NodeRef) -> GraphResult<&[NodeRef]> {
        let vertex = self.node(node)?.vertex();
        Ok(self.lineage(vertex))
    }

    fn lineage(&self, vertex: VertexId) -> &[NodeRef] {
        &self.lineages[vertex.0 as usize]
    }

    /// Newest copy of `node`'s vertex; the only one that accepts writes.
    pub fn live(&self, node: NodeRef) -> GraphResult<NodeRef> {
        let copies = self.copies_of(node)?;
        copies.last().copied().ok_or(GraphError::UnknownNode(node))
    }

    fn check_version(&self, version: VersionId) -> GraphResult<()> {
        if version > self.current_version {
            return Err(GraphError::UnknownVersion {
                requested: version,
                current: self.current_version,
            });
        }
        Ok(())
    }

    /// The copy of `node`'s vertex that answered reads at `version`.
    pub fn resolve(&self, node: NodeRef, version: VersionId) -> GraphResult<NodeRef> {
        self.check_version(version)?;
        let copies = self.copies_of(node)?;
        let live = copies.partition_point(|c| self.arena[c.index()].live_since() <= version);
        if live == 0 {
            return Err(GraphError::NotLiveAt { node, version });
        }
        Ok(copies[live - 1])
    }

    /// Payload of `node` as of `version`.
    pub fn query(&self, node: NodeRef, version: VersionId) -> GraphResult<&T> {
        let resolved = self.resolve(node, version)?;
        Ok(self.arena[resolved.index()].data_at(version))
    }

    /// Any field of `node` as of `version`.
    pub fn value_at(&self, node: NodeRef, field: Field, version: VersionId) -> GraphResult<Value<'_, T>> {
        let resolved = self.resolve(node, version)?;
        self.arena[resolved.index()].value_at(field, version)
    }

    /// Target of out-slot `slot` of `node` as of `version`.
    ///
    /// The target is the copy that was live at `version`, so it matches the
    /// handle passed to [`add_edge`](Self::add_edge) by vertex, not always
    /// by `NodeRef`: if that write itself copied the target, this returns
    /// the copy.
    pub fn edge_at(&self, node: NodeRef, slot: SlotId, version: VersionId) -> GraphResult<Option<NodeRef>> {
        let resolved = self.resolve(node, version)?;
        self.arena[resolved.index()].edge_at(Side::Out, slot, version)
    }

    /// Occupied out-slots of `node` as of `version`.
    pub fn successors_at(&self, node: NodeRef, version: VersionId) -> GraphResult<Vec<(SlotId, NodeRef)>> {
        let resolved = self.resolve(node, version)?;
        Ok(self.arena[resolved.index()]
            .edges_at(Side::Out, version)
            .into_iter()
            .enumerate()
            .filter_map(|(slot, target)| target.map(|t| (slot, t)))
            .collect())
    }

    /// Nodes with an edge into `node` as of `version`, each resolved to the
    /// copy live at that version.
    pub fn predecessors_at(&self, node: NodeRef, version: VersionId) -> GraphResult<Vec<NodeRef>> {
        let resolved = self.resolve(node, version)?;
        self.arena[resolved.index()]
            .edges_at(Side::In, version)
            .into_iter()
            .flatten()
            .map(|pred| self.resolve(pred, version))
            .collect()
    }

    /// Root node object effective at `version`.
    pub fn root_at(&self, version: VersionId) -> GraphResult<NodeRef> {
        self.check_version(version)?;
        self.root_by_version
            .range(..=version)
            .next_back()
            .map(|(_, root)| *root)
            .ok_or(GraphError::UnknownVersion {
                requested: version,
                current: self.current_version,
            })
    }

    /// Versions at which the root object changed, with the new root.
    pub fn root_history(&self) -> impl Iterator<Item = (VersionId, NodeRef)> + '_ {
        self.root_by_version.iter().map(|(v, r)| (*v, *r))
    }

    /// Allocate an unlinked node. It is unreachable from the root, so no
    /// version is consumed.
    pub fn add_node(&mut self, data: T) -> NodeRef {
        self.alloc_node(data, self.current_version)
    }

    /// Point out-slot `slot` of `u` at `v`. Returns the new version.
    pub fn add_edge(&mut self, u: NodeRef, slot: SlotId, v: NodeRef) -> GraphResult<VersionId> {
        let version = self.pending_version()?;
        let u_live = self.live(u)?;
        let v_live = self.live(v)?;
        let old = self.arena[u_live.index()].edge_at(Side::Out, slot, version)?;

        let mut changes = Vec::with_capacity(3);
        if old != Some(v_live) {
            let in_slot = self.free_in_slot(v_live, version)?;
            changes.push((u_live, Change::Out { slot, target: Some(v_live) }));
            if let Some(old_target) = old {
                let back = self.back_slot(old_target, u_live, version)?;
                changes.push((old_target, Change::In { slot: back, source: None }));
            }
            changes.push((v_live, Change::In { slot: in_slot, source: Some(u_live) }));
        }

        self.commit(version, changes)?;
        Ok(version)
    }

    /// Clear out-slot `slot` of `u`. Returns the new version.
    pub fn remove_edge(&mut self, u: NodeRef, slot: SlotId) -> GraphResult<VersionId> {
        let version = self.pending_version()?;
        let u_live = self.live(u)?;
        let target = self.arena[u_live.index()]
            .edge_at(Side::Out, slot, version)?
            .ok_or(GraphError::EmptySlot { node: u_live, slot })?;
        let back = self.back_slot(target, u_live, version)?;

        self.commit(
            version,
            vec![
                (u_live, Change::Out { slot, target: None }),
                (target, Change::In { slot: back, source: None }),
            ],
        )?;
        Ok(version)
    }

    /// Replace the payload of `u`. Returns the new version.
    pub fn set_data(&mut self, u: NodeRef, data: T) -> GraphResult<VersionId> {
        let version = self.pending_version()?;
        let u_live = self.live(u)?;
        self.commit(version, vec![(u_live, Change::Data(data))])?;
        Ok(version)
    }

    /// Splice a new node holding `data` between `u` and the current target
    /// of its out-slot `slot`. The new node's own `slot` points at that
    /// former target.
    pub fn insert_node(&mut self, u: NodeRef, slot: SlotId, data: T) -> GraphResult<(NodeRef, VersionId)> {
        let version = self.pending_version()?;
        let u_live = self.live(u)?;
        let old = self.arena[u_live.index()].edge_at(Side::Out, slot, version)?;
        let back = match old {
            Some(target) => Some((target, self.back_slot(target, u_live, version)?)),
            None => None,
        };

        let inserted = self.alloc_node(data, version);
        let mut changes = vec![
            (inserted, Change::Out { slot, target: old }),
            (inserted, Change::In { slot: 0, source: Some(u_live) }),
            (u_live, Change::Out { slot, target: Some(inserted) }),
        ];
        if let Some((target, back_slot)) = back {
            changes.push((target, Change::In { slot: back_slot, source: Some(inserted) }));
        }

        self.commit(version, changes)?;
        Ok((inserted, version))
    }

    /// Version the next write will publish.
    fn pending_version(&self) -> GraphResult<VersionId> {
        if self.poisoned {
            return Err(GraphError::Poisoned);
        }
        Ok(self.current_version.next())
    }

    fn alloc_node(&mut self, data: T, live_since: VersionId) -> NodeRef {
        let id = NodeRef(self.arena.len() as u64);
        let vertex = VertexId(self.lineages.len() as u64);
        self.arena.push(VersionedNode::new(
            id,
            vertex,
            data,
            self.config.bounds(),
            self.config.effective_log_capacity(),
            live_since,
        ));
        self.lineages.push(vec![id]);
        self.stats.nodes += 1;
        id
    }

    fn free_in_slot(&self, node: NodeRef, version: VersionId) -> GraphResult<SlotId> {
        let n = &self.arena[node.index()];
        n.edges_at(Side::In, version)
            .iter()
            .position(Option::is_none)
            .ok_or(GraphError::InDegreeExhausted {
                node,
                bound: n.bounds().in_degree,
            })
    }

    /// In-slot of `node` holding a back-reference to `pred`'s vertex.
    fn back_slot(&self, node: NodeRef, pred: NodeRef, version: VersionId) -> GraphResult<SlotId> {
        let pred_vertex = self.arena[pred.index()].vertex();
        self.arena[node.index()]
            .edges_at(Side::In, version)
            .iter()
            .position(|source| source.is_some_and(|s| self.arena[s.index()].vertex() == pred_vertex))
            .ok_or(GraphError::MissingBackEdge { node, predecessor: pred })
    }

    /// Apply `changes` and everything they cascade into at `version`, then
    /// publish the version.
    ///
    /// The operation's own changes all land before any redirect is worked
    /// out. Redirects only touch out-slots, so from then on every in-edge
    /// names a predecessor that really points at the node.
    fn commit(&mut self, version: VersionId, changes: Vec<(NodeRef, Change<T>)>) -> GraphResult<()> {
        self.cascade(version, changes).inspect_err(|e| {
            if e.is_fatal() {
                self.poisoned = true;
                error!(%version, error = %e, "fatal error, graph is now read-only");
            }
        })?;
        self.current_version = version;
        debug!(%version, "published version");
        Ok(())
    }

    fn cascade(&mut self, version: VersionId, changes: Vec<(NodeRef, Change<T>)>) -> GraphResult<()> {
        let mut copied = Vec::new();
        for (target, change) in changes {
            if let Some(pair) = self.record(target, change, version)? {
                copied.push(pair);
            }
        }

        let mut pending = VecDeque::new();
        for (old, copy) in copied {
            self.redirect_predecessors(old, copy, version, &mut pending)?;
        }
        while let Some((target, change)) = pending.pop_front() {
            if let Some((old, copy)) = self.record(target, change, version)? {
                self.redirect_predecessors(old, copy, version, &mut pending)?;
            }
        }
        Ok(())
    }

    /// Offer `change` to the live copy of `target`. Returns the retired
    /// object and its replacement when the log overflowed.
    fn record(
        &mut self,
        target: NodeRef,
        change: Change<T>,
        version: VersionId,
    ) -> GraphResult<Option<(NodeRef, NodeRef)>> {
        let live = self.live(target)?;
        let node = &mut self.arena[live.index()];
        let logged = node.live_since() != version;
        match node.try_record(change, version)? {
            RecordOutcome::Recorded => {
                if logged {
                    self.stats.log_records += 1;
                }
                Ok(None)
            }
            RecordOutcome::Overflow(change) => {
                let copy = self.copy_node(live, version, change)?;
                Ok(Some((live, copy)))
            }
        }
    }

    /// Replace the full node `old` by a copy that absorbs `change`.
    fn copy_node(&mut self, old: NodeRef, version: VersionId, change: Change<T>) -> GraphResult<NodeRef> {
        let id = NodeRef(self.arena.len() as u64);
        let mut copy = self.arena[old.index()].materialize_copy(id, version);
        copy.absorb(change)?;
        let vertex = copy.vertex();

        self.arena[old.index()].retire(version, id);
        self.arena.push(copy);
        self.lineages[vertex.0 as usize].push(id);
        if vertex == self.root {
            self.root_by_version.insert(version, id);
        }
        self.stats.nodes += 1;
        self.stats.copies += 1;

        debug!(%old, copy = %id, %version, "log overflow, node copied");
        Ok(id)
    }

    /// Queue a redirect to `copy` for every out-slot of every live
    /// predecessor that still points at `old`.
    fn redirect_predecessors(
        &mut self,
        old: NodeRef,
        copy: NodeRef,
        version: VersionId,
        pending: &mut VecDeque<(NodeRef, Change<T>)>,
    ) -> GraphResult<()> {
        let preds: Vec<NodeRef> = self.arena[copy.index()]
            .edges_at(Side::In, version)
            .into_iter()
            .flatten()
            .collect();

        let mut seen = HashSet::new();
        for pred in preds {
            let pred_live = self.live(pred)?;
            if !seen.insert(pred_live) {
                continue;
            }
            let slots: Vec<SlotId> = self.arena[pred_live.index()]
                .edges_at(Side::Out, version)
                .into_iter()
                .enumerate()
                .filter(|(_, target)| *target == Some(old))
                .map(|(slot, _)| slot)
                .collect();
            if slots.is_empty() {
                return Err(GraphError::LogOverflowUnrecoverable {
                    node: old,
                    predecessor: pred_live,
                });
            }
            for slot in slots {
                pending.push_back((pred_live, Change::Out { slot, target: Some(copy) }));
                self.stats.redirects += 1;
            }
        }

        if !seen.is_empty() {
            debug!(%old, %copy, predecessors = seen.len(), "queued predecessor redirects");
        }
        Ok(())
    }
}
