//! Error types for persistent graph operations

use crate::model::{NodeRef, Side, SlotId, VersionId};
use thiserror::Error;

/// Errors that can occur in graph operations.
///
/// Validation failures are reported before any state changes, so a failed
/// call never consumes a version. `LogOverflowUnrecoverable` and
/// `MissingBackEdge` mean the in/out bookkeeping is inconsistent; once
/// either fails a write midway through applying it, every later write
/// fails with `Poisoned`.
///
/// A target with every in-slot taken is reported as `InDegreeExhausted`
/// rather than `InvalidSlot`: the requested out-slot is in range, it is the
/// target's in-edge table that is full.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("slot {slot} is out of range for {side}-edges of {node} (bound {bound})")]
    InvalidSlot {
        node: NodeRef,
        side: Side,
        slot: SlotId,
        bound: usize,
    },

    #[error("unknown version {requested} (current version is {current})")]
    UnknownVersion {
        requested: VersionId,
        current: VersionId,
    },

    #[error("copy of {node} could not be linked: predecessor {predecessor} has no slot pointing at it")]
    LogOverflowUnrecoverable { node: NodeRef, predecessor: NodeRef },

    #[error("unknown node: {0}")]
    UnknownNode(NodeRef),

    #[error("{node} did not exist at version {version}")]
    NotLiveAt { node: NodeRef, version: VersionId },

    #[error("{node} has no free in-edge slot (bound {bound})")]
    InDegreeExhausted { node: NodeRef, bound: usize },

    #[error("out-slot {slot} of {node} is empty")]
    EmptySlot { node: NodeRef, slot: SlotId },

    #[error("{node} holds no back-reference to {predecessor}")]
    MissingBackEdge { node: NodeRef, predecessor: NodeRef },

    #[error("invalid graph config: {0}")]
    InvalidConfig(String),

    #[error("graph refuses writes after an earlier fatal error")]
    Poisoned,
}

impl GraphError {
    /// Whether the graph is left in an inconsistent state by this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GraphError::LogOverflowUnrecoverable { .. } | GraphError::MissingBackEdge { .. }
        )
    }
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;
