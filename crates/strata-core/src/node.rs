//! Fat node: one physical copy of a bounded-degree vertex plus its modification log

use crate::error::{GraphError, GraphResult};
use crate::model::*;
use tracing::trace;

/// Result of offering a change to a node's modification log.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome<T> {
    /// The change is now part of the node's history.
    Recorded,
    /// The log is full; the change is handed back so the caller can fold it
    /// into a fresh copy.
    Overflow(Change<T>),
}

/// One physical node object.
///
/// The base arrays hold the state as of `live_since`; every later change is
/// an entry in `mod_log` until the log fills up and the node is copied.
#[derive(Debug, Clone)]
pub struct VersionedNode<T> {
    id: NodeRef,
    vertex: VertexId,
    data: T,
    out_edges: Box<[Option<NodeRef>]>,
    in_edges: Box<[Option<NodeRef>]>,
    mod_log: Vec<Modification<T>>,
    capacity: usize,
    live_since: VersionId,
    superseded_at: Option<VersionId>,
    previous: Option<NodeRef>,
    next: Option<NodeRef>,
}

impl<T: Clone> VersionedNode<T> {
    pub fn new(
        id: NodeRef,
        vertex: VertexId,
        data: T,
        bounds: DegreeBounds,
        capacity: usize,
        live_since: VersionId,
    ) -> Self {
        VersionedNode {
            id,
            vertex,
            data,
            out_edges: vec![None; bounds.out_degree].into_boxed_slice(),
            in_edges: vec![None; bounds.in_degree].into_boxed_slice(),
            mod_log: Vec::with_capacity(capacity),
            capacity,
            live_since,
            superseded_at: None,
            previous: None,
            next: None,
        }
    }

    pub fn id(&self) -> NodeRef {
        self.id
    }

    pub fn vertex(&self) -> VertexId {
        self.vertex
    }

    pub fn bounds(&self) -> DegreeBounds {
        DegreeBounds::new(self.out_edges.len(), self.in_edges.len())
    }

    pub fn live_since(&self) -> VersionId {
        self.live_since
    }

    /// Version at which a newer copy took over, if any.
    pub fn superseded_at(&self) -> Option<VersionId> {
        self.superseded_at
    }

    /// The copy this node replaced.
    pub fn previous(&self) -> Option<NodeRef> {
        self.previous
    }

    /// The copy that replaced this node.
    pub fn next(&self) -> Option<NodeRef> {
        self.next
    }

    /// Whether this object answers reads for `version`.
    pub fn covers(&self, version: VersionId) -> bool {
        self.live_since <= version && self.superseded_at.map_or(true, |end| version < end)
    }

    pub fn log_len(&self) -> usize {
        self.mod_log.len()
    }

    pub fn log_capacity(&self) -> usize {
        self.capacity
    }

    fn check_field(&self, field: Field) -> GraphResult<()> {
        let (side, slot) = match field {
            Field::Out(slot) => (Side::Out, slot),
            Field::In(slot) => (Side::In, slot),
            Field::Data => return Ok(()),
        };
        let bound = self.bounds().bound(side);
        if slot >= bound {
            return Err(GraphError::InvalidSlot {
                node: self.id,
                side,
                slot,
                bound,
            });
        }
        Ok(())
    }

    fn base_value(&self, field: Field) -> Value<'_, T> {
        match field {
            Field::Out(slot) => Value::Edge(self.out_edges[slot]),
            Field::In(slot) => Value::Edge(self.in_edges[slot]),
            Field::Data => Value::Data(&self.data),
        }
    }

    /// Effective value of `field` at `version`: the latest log entry for
    /// the field with `entry.version <= version`, else the base value.
    pub fn value_at(&self, field: Field, version: VersionId) -> GraphResult<Value<'_, T>> {
        self.check_field(field)?;
        let logged = self
            .mod_log
            .iter()
            .rev()
            .filter(|m| m.version <= version)
            .find(|m| m.change.field() == field);
        Ok(match logged {
            Some(Modification { change: Change::Out { target, .. }, .. }) => Value::Edge(*target),
            Some(Modification { change: Change::In { source, .. }, .. }) => Value::Edge(*source),
            Some(Modification { change: Change::Data(data), .. }) => Value::Data(data),
            None => self.base_value(field),
        })
    }

    pub fn data_at(&self, version: VersionId) -> &T {
        self.mod_log
            .iter()
            .rev()
            .filter(|m| m.version <= version)
            .find_map(|m| match &m.change {
                Change::Data(data) => Some(data),
                _ => None,
            })
            .unwrap_or(&self.data)
    }

    pub fn edge_at(&self, side: Side, slot: SlotId, version: VersionId) -> GraphResult<Option<NodeRef>> {
        let field = match side {
            Side::Out => Field::Out(slot),
            Side::In => Field::In(slot),
        };
        Ok(self.value_at(field, version)?.as_edge())
    }

    /// Every slot of one edge table as of `version`.
    pub fn edges_at(&self, side: Side, version: VersionId) -> Vec<Option<NodeRef>> {
        let bound = self.bounds().bound(side);
        let mut edges = match side {
            Side::Out => self.out_edges.to_vec(),
            Side::In => self.in_edges.to_vec(),
        };
        for m in self.mod_log.iter().filter(|m| m.version <= version) {
            match (&m.change, side) {
                (Change::Out { slot, target }, Side::Out) if *slot < bound => edges[*slot] = *target,
                (Change::In { slot, source }, Side::In) if *slot < bound => edges[*slot] = *source,
                _ => {}
            }
        }
        edges
    }

    /// Offer a change effective at `version`.
    ///
    /// A node created at `version` itself is not yet visible to any
    /// published version, so the change goes straight into its base arrays.
    /// A repeated change to the same field at the same version replaces the
    /// earlier entry.
    pub fn try_record(&mut self, change: Change<T>, version: VersionId) -> GraphResult<RecordOutcome<T>> {
        self.check_field(change.field())?;

        if version == self.live_since {
            self.apply_to_base(change);
            return Ok(RecordOutcome::Recorded);
        }

        let field = change.field();
        if let Some(existing) = self
            .mod_log
            .iter_mut()
            .rev()
            .take_while(|m| m.version == version)
            .find(|m| m.change.field() == field)
        {
            existing.change = change;
            trace!(node = %self.id, ?field, %version, "overwrote log entry");
            return Ok(RecordOutcome::Recorded);
        }

        if self.mod_log.len() >= self.capacity {
            return Ok(RecordOutcome::Overflow(change));
        }

        self.mod_log.push(Modification { change, version });
        trace!(node = %self.id, ?field, %version, len = self.mod_log.len(), "recorded log entry");
        Ok(RecordOutcome::Recorded)
    }

    fn apply_to_base(&mut self, change: Change<T>) {
        match change {
            Change::Out { slot, target } => self.out_edges[slot] = target,
            Change::In { slot, source } => self.in_edges[slot] = source,
            Change::Data(data) => self.data = data,
        }
    }

    /// Build a replacement whose base arrays hold this node's effective
    /// state at `as_of`, with an empty log.
    pub fn materialize_copy(&self, id: NodeRef, as_of: VersionId) -> VersionedNode<T> {
        VersionedNode {
            id,
            vertex: self.vertex,
            data: self.data_at(as_of).clone(),
            out_edges: self.edges_at(Side::Out, as_of).into_boxed_slice(),
            in_edges: self.edges_at(Side::In, as_of).into_boxed_slice(),
            mod_log: Vec::with_capacity(self.capacity),
            capacity: self.capacity,
            live_since: as_of,
            superseded_at: None,
            previous: Some(self.id),
            next: None,
        }
    }

    /// Fold `change` into a freshly materialized copy.
    pub(crate) fn absorb(&mut self, change: Change<T>) -> GraphResult<()> {
        self.check_field(change.field())?;
        self.apply_to_base(change);
        Ok(())
    }

    pub(crate) fn retire(&mut self, at: VersionId, successor: NodeRef) {
        self.superseded_at = Some(at);
        self.next = Some(successor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(capacity: usize) -> VersionedNode<&'static str> {
        VersionedNode::new(NodeRef(0), VertexId(0), "a", DegreeBounds::new(2, 2), capacity, VersionId(0))
    }

    #[test]
    fn test_value_at_falls_back_to_base() {
        let n = node(4);
        assert_eq!(n.edge_at(Side::Out, 0, VersionId(7)).unwrap(), None);
        assert_eq!(n.data_at(VersionId(7)), &"a");
    }

    #[test]
    fn test_value_at_picks_latest_entry_not_after_version() {
        let mut n = node(4);
        n.try_record(Change::Out { slot: 1, target: Some(NodeRef(5)) }, VersionId(2)).unwrap();
        n.try_record(Change::Out { slot: 1, target: Some(NodeRef(6)) }, VersionId(4)).unwrap();
        n.try_record(Change::Data("b"), VersionId(5)).unwrap();

        assert_eq!(n.edge_at(Side::Out, 1, VersionId(1)).unwrap(), None);
        assert_eq!(n.edge_at(Side::Out, 1, VersionId(2)).unwrap(), Some(NodeRef(5)));
        assert_eq!(n.edge_at(Side::Out, 1, VersionId(3)).unwrap(), Some(NodeRef(5)));
        assert_eq!(n.edge_at(Side::Out, 1, VersionId(4)).unwrap(), Some(NodeRef(6)));
        assert_eq!(n.data_at(VersionId(4)), &"a");
        assert_eq!(n.value_at(Field::Data, VersionId(5)).unwrap(), Value::Data(&"b"));
    }

    #[test]
    fn test_slot_out_of_range() {
        let mut n = node(4);
        let err = n.edge_at(Side::In, 2, VersionId(0)).unwrap_err();
        assert_eq!(
            err,
            GraphError::InvalidSlot { node: NodeRef(0), side: Side::In, slot: 2, bound: 2 }
        );
        assert!(n.try_record(Change::Out { slot: 9, target: None }, VersionId(1)).is_err());
        assert_eq!(n.log_len(), 0);
    }

    #[test]
    fn test_overflow_hands_change_back() {
        let mut n = node(2);
        for v in 1..=2 {
            let outcome = n.try_record(Change::Data("x"), VersionId(v)).unwrap();
            assert_eq!(outcome, RecordOutcome::Recorded);
        }
        let outcome = n.try_record(Change::Data("y"), VersionId(3)).unwrap();
        assert_eq!(outcome, RecordOutcome::Overflow(Change::Data("y")));
        assert_eq!(n.log_len(), 2);
    }

    #[test]
    fn test_same_version_same_field_overwrites() {
        let mut n = node(1);
        n.try_record(Change::Out { slot: 0, target: Some(NodeRef(1)) }, VersionId(1)).unwrap();
        let outcome = n
            .try_record(Change::Out { slot: 0, target: Some(NodeRef(2)) }, VersionId(1))
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Recorded);
        assert_eq!(n.log_len(), 1);
        assert_eq!(n.edge_at(Side::Out, 0, VersionId(1)).unwrap(), Some(NodeRef(2)));
    }

    #[test]
    fn test_fresh_node_writes_base() {
        let mut n = VersionedNode::new(NodeRef(3), VertexId(3), 1u32, DegreeBounds::new(1, 1), 0, VersionId(9));
        n.try_record(Change::Data(2), VersionId(9)).unwrap();
        assert_eq!(n.log_len(), 0);
        assert_eq!(n.data_at(VersionId(9)), &2);
    }

    #[test]
    fn test_materialize_copy_folds_log() {
        let mut n = node(4);
        n.try_record(Change::Out { slot: 0, target: Some(NodeRef(4)) }, VersionId(1)).unwrap();
        n.try_record(Change::In { slot: 1, source: Some(NodeRef(8)) }, VersionId(2)).unwrap();
        n.try_record(Change::Data("c"), VersionId(3)).unwrap();

        let copy = n.materialize_copy(NodeRef(10), VersionId(2));
        assert_eq!(copy.id(), NodeRef(10));
        assert_eq!(copy.vertex(), n.vertex());
        assert_eq!(copy.live_since(), VersionId(2));
        assert_eq!(copy.log_len(), 0);
        assert_eq!(copy.previous(), Some(NodeRef(0)));
        assert_eq!(copy.edges_at(Side::Out, VersionId(2)), vec![Some(NodeRef(4)), None]);
        assert_eq!(copy.edges_at(Side::In, VersionId(2)), vec![None, Some(NodeRef(8))]);
        assert_eq!(copy.data_at(VersionId(2)), &"a");
    }

    #[test]
    fn test_covers_interval() {
        let mut n = node(0);
        n.retire(VersionId(5), NodeRef(1));
        assert!(n.covers(VersionId(0)));
        assert!(n.covers(VersionId(4)));
        assert!(!n.covers(VersionId(5)));
        assert_eq!(n.superseded_at(), Some(VersionId(5)));
        assert_eq!(n.next(), Some(NodeRef(1)));
    }
}
