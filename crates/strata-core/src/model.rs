//! Core identifiers and field/value types shared by nodes and the graph

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to one physical node object in the graph arena.
///
/// Copies of the same vertex get distinct handles; every handle stays valid
/// for the lifetime of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeRef(pub u64);

impl NodeRef {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Logical identity shared by every physical copy of one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct VertexId(pub u64);

/// Globally numbered graph version. Version 0 is the freshly created graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct VersionId(pub u64);

impl VersionId {
    pub fn next(self) -> Self {
        VersionId(self.0 + 1)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Index into a node's out- or in-edge table.
pub type SlotId = usize;

/// Which edge table a slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Out,
    In,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Out => f.write_str("out"),
            Side::In => f.write_str("in"),
        }
    }
}

/// Addressable field of a node: an edge slot or the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Out(SlotId),
    In(SlotId),
    Data,
}

/// A single recorded change to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change<T> {
    Out { slot: SlotId, target: Option<NodeRef> },
    In { slot: SlotId, source: Option<NodeRef> },
    Data(T),
}

impl<T> Change<T> {
    pub fn field(&self) -> Field {
        match self {
            Change::Out { slot, .. } => Field::Out(*slot),
            Change::In { slot, .. } => Field::In(*slot),
            Change::Data(_) => Field::Data,
        }
    }
}

/// Modification log entry: the change and the version it took effect at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification<T> {
    pub change: Change<T>,
    pub version: VersionId,
}

/// Effective value of a field at some version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a, T> {
    Edge(Option<NodeRef>),
    Data(&'a T),
}

impl<'a, T> Value<'a, T> {
    pub fn as_edge(&self) -> Option<NodeRef> {
        match self {
            Value::Edge(target) => *target,
            Value::Data(_) => None,
        }
    }
}

/// Fixed degree bounds of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DegreeBounds {
    pub out_degree: usize,
    pub in_degree: usize,
}

impl DegreeBounds {
    pub fn new(out_degree: usize, in_degree: usize) -> Self {
        DegreeBounds { out_degree, in_degree }
    }

    pub fn bound(&self, side: Side) -> usize {
        match side {
            Side::Out => self.out_degree,
            Side::In => self.in_degree,
        }
    }
}

/// Counters describing the physical growth of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphStats {
    /// Physical node objects in the arena, including retired copies.
    pub nodes: u64,
    /// Node copies forced by log overflow.
    pub copies: u64,
    /// Entries appended to (or overwritten in) modification logs.
    pub log_records: u64,
    /// Predecessor out-slots rewired to point at a fresh copy.
    pub redirects: u64,
}
