//! Structural length, distance and total order over a shape forest.
//!
//! Distances are computed bottom-up one depth level at a time. A shape's
//! distance to another only needs the distances between their children, and
//! children are always on shallower levels, so the rows of one level are
//! independent and are computed in parallel with a barrier between levels.
//!
//! `d(a, b) = f(base(a), base(b)) + hausdorff(children(a), children(b))`
//!
//! where `f` is 0 for equal functions, `null_function_distance` when exactly
//! one side is the null function and `function_distance` otherwise. The null
//! shape's children are read as `[null]`, which keeps `d` a pseudometric:
//! structurally identical shapes with different ids are at distance 0.

use super::forest::{ShapeForest, NULL_INDEX};
use super::{is_null_pattern, FunctionId, PatternId, StrippedPatternShape};
use crate::utils::config::{ShapeConfig, NULL_FUNCTION_ID};
use crate::utils::error::ShapeError;
use log::{debug, info};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Forests up to this size are self-checked in debug builds
const DEBUG_VERIFY_LIMIT: usize = 48;

/// Cooperative cancellation flag for the distance pass
///
/// Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Relaxed)
    }
}

/// Precomputed lengths, distances and ranks of a shape forest
#[derive(Debug, Clone)]
pub struct ShapeMetric {
    forest: ShapeForest,
    function_distance: f64,
    null_function_distance: f64,
    /// Indexed like the forest; the null slot is unused
    lengths: Vec<u64>,
    /// Lower triangle: `rows[i][j]` for `j < i`
    rows: Vec<Vec<f64>>,
    /// Position of each shape in the total order
    ranks: Vec<usize>,
}

impl ShapeMetric {
    /// Validate `shapes` into a forest and build its metric
    pub fn from_shapes(
        shapes: Vec<StrippedPatternShape>,
        config: &ShapeConfig,
    ) -> Result<Self, ShapeError> {
        let forest = ShapeForest::new(shapes)?;
        Self::build(forest, config, &CancellationToken::new())
    }

    /// Build the metric, polling `cancel` between rows and levels
    ///
    /// # Errors
    /// * `ShapeError::Cancelled` - the token was cancelled before completion
    pub fn build(
        forest: ShapeForest,
        config: &ShapeConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, ShapeError> {
        info!("Computing shape metric over {} shapes", forest.len());

        let lengths = compute_lengths(&forest);

        let mut metric = Self {
            forest,
            function_distance: config.function_distance,
            null_function_distance: config.null_function_distance,
            lengths,
            rows: Vec::new(),
            ranks: Vec::new(),
        };

        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(metric.forest.len());
        for level in metric.forest.levels() {
            if cancel.is_cancelled() {
                return Err(ShapeError::Cancelled);
            }
            let level_rows: Option<Vec<Vec<f64>>> = level
                .clone()
                .into_par_iter()
                .map(|index| {
                    if cancel.is_cancelled() {
                        None
                    } else {
                        Some(metric.compute_row(index, &rows))
                    }
                })
                .collect();
            rows.extend(level_rows.ok_or(ShapeError::Cancelled)?);
            debug!("Distances done through shape index {}", level.end);
        }
        metric.rows = rows;
        metric.ranks = compute_ranks(&metric.forest);

        if cfg!(debug_assertions) && metric.forest.len() <= DEBUG_VERIFY_LIMIT {
            debug_assert_eq!(super::verify::verify_metric(&metric), Ok(()));
            debug_assert_eq!(super::verify::verify_order(&metric), Ok(()));
        }

        Ok(metric)
    }

    fn function_distance(&self, f1: FunctionId, f2: FunctionId) -> f64 {
        if f1 == f2 {
            0.0
        } else if f1 == NULL_FUNCTION_ID || f2 == NULL_FUNCTION_ID {
            self.null_function_distance
        } else {
            self.function_distance
        }
    }

    /// Distances from `index` to every shape before it
    fn compute_row(&self, index: usize, rows: &[Vec<f64>]) -> Vec<f64> {
        let base = self.forest.shape(index).base_function;
        let children = self.forest.children(index);
        (0..index)
            .map(|other| {
                let other_base = self.forest.shape(other).base_function;
                self.function_distance(base, other_base)
                    + hausdorff(children, self.forest.children(other), rows)
            })
            .collect()
    }

    pub fn forest(&self) -> &ShapeForest {
        &self.forest
    }

    /// `1 + #non-null children + sum of non-null child lengths`
    ///
    /// Returns `None` for an unknown id.
    ///
    /// # Panics
    /// When asked for the null pattern, which has no length.
    pub fn length(&self, id: PatternId) -> Option<u64> {
        assert!(!is_null_pattern(id), "length of the null pattern is undefined");
        self.forest.index_of(id).map(|index| self.lengths[index])
    }

    /// Distance between two dense indices
    pub fn distance_by_index(&self, a: usize, b: usize) -> f64 {
        lookup(&self.rows, a, b)
    }

    /// Distance between two shape ids, `None` if either is unknown
    pub fn distance(&self, id1: PatternId, id2: PatternId) -> Option<f64> {
        let a = self.forest.index_of(id1)?;
        let b = self.forest.index_of(id2)?;
        Some(self.distance_by_index(a, b))
    }

    pub fn rank(&self, index: usize) -> usize {
        self.ranks[index]
    }

    /// Compare two shape ids in the total order, `None` if either is unknown
    pub fn compare(&self, id1: PatternId, id2: PatternId) -> Option<Ordering> {
        let a = self.forest.index_of(id1)?;
        let b = self.forest.index_of(id2)?;
        Some(self.ranks[a].cmp(&self.ranks[b]))
    }

    /// All shape ids in the total order, null first
    pub fn sorted_ids(&self) -> Vec<PatternId> {
        let mut indices: Vec<usize> = (0..self.forest.len()).collect();
        indices.sort_by_key(|&index| self.ranks[index]);
        indices
            .into_iter()
            .map(|index| self.forest.shape(index).id)
            .collect()
    }

    /// Non-null shapes within `radius` of `id` (itself included), in the
    /// total order. `None` for an unknown id.
    ///
    /// # Panics
    /// When `id` is the null pattern.
    pub fn within(&self, id: PatternId, radius: f64) -> Option<Vec<PatternId>> {
        assert!(!is_null_pattern(id), "the null pattern cannot be a search origin");
        let origin = self.forest.index_of(id)?;
        let mut found: Vec<usize> = self
            .forest
            .non_null_indices()
            .filter(|&index| self.distance_by_index(origin, index) <= radius)
            .collect();
        found.sort_by_key(|&index| self.ranks[index]);
        Some(
            found
                .into_iter()
                .map(|index| self.forest.shape(index).id)
                .collect(),
        )
    }
}

fn lookup(rows: &[Vec<f64>], a: usize, b: usize) -> f64 {
    match a.cmp(&b) {
        Ordering::Equal => 0.0,
        Ordering::Greater => rows[a][b],
        Ordering::Less => rows[b][a],
    }
}

fn hausdorff(first: &[usize], second: &[usize], rows: &[Vec<f64>]) -> f64 {
    directed_hausdorff(first, second, rows).max(directed_hausdorff(second, first, rows))
}

/// Worst-case nearest-neighbour distance from `from` into `to`
fn directed_hausdorff(from: &[usize], to: &[usize], rows: &[Vec<f64>]) -> f64 {
    from.iter()
        .map(|&a| {
            to.iter()
                .map(|&b| lookup(rows, a, b))
                .fold(f64::INFINITY, f64::min)
        })
        .fold(0.0, f64::max)
}

fn compute_lengths(forest: &ShapeForest) -> Vec<u64> {
    let mut lengths = vec![0u64; forest.len()];
    for index in forest.non_null_indices() {
        let mut length = 1;
        for &child in forest.children(index) {
            if child != NULL_INDEX {
                length += 1 + lengths[child];
            }
        }
        lengths[index] = length;
    }
    lengths
}

/// Rank shapes by depth, then base function, then the ranks of their
/// children compared lexicographically, then id
fn compute_ranks(forest: &ShapeForest) -> Vec<usize> {
    let mut ranks = vec![0usize; forest.len()];
    let mut next = 0;
    for level in forest.levels() {
        let mut keyed: Vec<(FunctionId, Vec<usize>, PatternId, usize)> = level
            .clone()
            .map(|index| {
                let shape = forest.shape(index);
                let child_ranks = if shape.is_null() {
                    Vec::new()
                } else {
                    forest.children(index).iter().map(|&c| ranks[c]).collect()
                };
                (shape.base_function, child_ranks, shape.id, index)
            })
            .collect();
        keyed.sort();
        for (_, _, _, index) in keyed {
            ranks[index] = next;
            next += 1;
        }
    }
    ranks
}
