//! Pattern shapes and the metric space over them.
//!
//! This module handles:
//! - The shape forest arena (dense indices, depth levels, descendant closures)
//! - Structural length, pairwise distance and total order of shapes
//! - Greedy clustering of similar shapes
//! - Verification of the metric axioms

pub mod cluster;
pub mod forest;
pub mod metric;
pub mod verify;

use crate::utils::config::{NULL_FUNCTION_ID, NULL_PATTERN_ID};
use serde::{Deserialize, Serialize};

/// Pattern id; ids below `PATTERN_BASE` are single-function patterns
pub type PatternId = u32;

/// Function id; `NULL_FUNCTION_ID` means "no function"
pub type FunctionId = i32;

pub fn is_null_pattern(id: PatternId) -> bool {
    id == NULL_PATTERN_ID
}

/// A pattern shape reduced to what the metric needs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrippedPatternShape {
    pub id: PatternId,
    pub depth: u32,
    pub base_function: FunctionId,
    /// Ordered child ids, may repeat the null id
    pub pattern_ids: Vec<PatternId>,
}

impl StrippedPatternShape {
    pub fn new(
        id: PatternId,
        depth: u32,
        base_function: FunctionId,
        pattern_ids: Vec<PatternId>,
    ) -> Self {
        Self {
            id,
            depth,
            base_function,
            pattern_ids,
        }
    }

    /// The shape standing for "no pattern"
    pub fn null() -> Self {
        Self::new(NULL_PATTERN_ID, 0, NULL_FUNCTION_ID, Vec::new())
    }

    pub fn is_null(&self) -> bool {
        is_null_pattern(self.id)
    }
}

// Re-export main types
pub use cluster::{Cluster, ClusterGroup, ShapeClusterer};
pub use forest::ShapeForest;
pub use metric::{CancellationToken, ShapeMetric};
pub use verify::{verify_metric, verify_order};
