//! Graph construction parameters

use crate::error::{GraphError, GraphResult};
use crate::model::DegreeBounds;
use serde::{Deserialize, Serialize};

/// Degree bounds and log sizing fixed when a graph is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Maximum out-edges per node.
    pub out_degree: usize,
    /// Maximum in-edges per node.
    pub in_degree: usize,
    /// Modification log capacity. Defaults to `2 * in_degree`.
    pub log_capacity: Option<usize>,
}

impl GraphConfig {
    pub fn new(out_degree: usize, in_degree: usize) -> Self {
        GraphConfig {
            out_degree,
            in_degree,
            log_capacity: None,
        }
    }

    /// Override the modification log capacity.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = Some(capacity);
        self
    }

    pub fn bounds(&self) -> DegreeBounds {
        DegreeBounds::new(self.out_degree, self.in_degree)
    }

    /// Capacity actually used for every node's log.
    pub fn effective_log_capacity(&self) -> usize {
        self.log_capacity.unwrap_or(2 * self.in_degree)
    }

    pub fn validate(&self) -> GraphResult<()> {
        // An edge always lands in some in-slot of its target.
        if self.out_degree > 0 && self.in_degree == 0 {
            return Err(GraphError::InvalidConfig(
                "nodes with out-edges need at least one in-edge slot".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::new(2, 2)
    }
}
