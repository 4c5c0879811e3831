//! Strata Core — partially persistent bounded-degree directed graph

pub mod model;
pub mod error;
pub mod config;
pub mod node;
pub mod graph;
pub mod shared;
pub mod snapshot;


pub use model::{NodeRef, VertexId, VersionId, SlotId, Side, Field, Change, Modification, Value, DegreeBounds, GraphStats};
pub use error::{GraphError, GraphResult};
pub use config::GraphConfig;
pub use node::{VersionedNode, RecordOutcome};
pub use graph::PersistentGraph;
pub use shared::SharedGraph;
pub use snapshot::{VersionSnapshot, reachable_at, to_petgraph, render};
