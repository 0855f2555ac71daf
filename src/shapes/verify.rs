//! Exhaustive checks of the metric axioms and the total order.
//!
//! These are O(n³) and meant for tests, debug builds and `shapes --verify`.

use super::metric::ShapeMetric;
use crate::utils::error::ShapeError;
use std::cmp::Ordering;

/// Slack for floating-point sums in the triangle inequality
const EPSILON: f64 = 1e-9;

/// Check self-distance, symmetry and the triangle inequality
///
/// # Errors
/// * `ShapeError::MetricInconsistency` - naming the first violating ids
pub fn verify_metric(metric: &ShapeMetric) -> Result<(), ShapeError> {
    let forest = metric.forest();
    let n = forest.len();
    let id = |index: usize| forest.shape(index).id;

    for a in 0..n {
        let d = metric.distance_by_index(a, a);
        if d != 0.0 {
            return Err(ShapeError::MetricInconsistency(format!(
                "distance from shape {} to itself is {}",
                id(a),
                d
            )));
        }
        for b in 0..a {
            let (ab, ba) = (metric.distance_by_index(a, b), metric.distance_by_index(b, a));
            if ab != ba || ab < 0.0 {
                return Err(ShapeError::MetricInconsistency(format!(
                    "distance between {} and {} is not symmetric and non-negative ({} / {})",
                    id(a),
                    id(b),
                    ab,
                    ba
                )));
            }
        }
    }

    for a in 0..n {
        for b in 0..n {
            let ab = metric.distance_by_index(a, b);
            for c in 0..n {
                let ac = metric.distance_by_index(a, c);
                let bc = metric.distance_by_index(b, c);
                if ac > ab + bc + EPSILON {
                    return Err(ShapeError::MetricInconsistency(format!(
                        "triangle inequality fails for {}, {}, {}: {} > {} + {}",
                        id(a),
                        id(b),
                        id(c),
                        ac,
                        ab,
                        bc
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Check that `compare` is a strict total order consistent with id equality
///
/// # Errors
/// * `ShapeError::MetricInconsistency` - naming the first violating ids
pub fn verify_order(metric: &ShapeMetric) -> Result<(), ShapeError> {
    let forest = metric.forest();
    let ids: Vec<_> = forest.shapes().iter().map(|shape| shape.id).collect();
    let compare = |a, b| metric.compare(a, b).unwrap_or(Ordering::Equal);

    for &a in &ids {
        for &b in &ids {
            let ab = compare(a, b);
            if (ab == Ordering::Equal) != (a == b) {
                return Err(ShapeError::MetricInconsistency(format!(
                    "order treats {} and {} as {:?}",
                    a, b, ab
                )));
            }
            if ab != compare(b, a).reverse() {
                return Err(ShapeError::MetricInconsistency(format!(
                    "order is not antisymmetric for {} and {}",
                    a, b
                )));
            }
            if ab != Ordering::Less {
                continue;
            }
            for &c in &ids {
                if compare(b, c) == Ordering::Less && compare(a, c) != Ordering::Less {
                    return Err(ShapeError::MetricInconsistency(format!(
                        "order is not transitive for {}, {}, {}",
                        a, b, c
                    )));
                }
            }
        }
    }

    // Depth must never decrease along the order
    let sorted = metric.sorted_ids();
    for pair in sorted.windows(2) {
        let depth = |id| forest.index_of(id).map(|index| forest.shape(index).depth);
        if depth(pair[0]) > depth(pair[1]) {
            return Err(ShapeError::MetricInconsistency(format!(
                "shape {} sorts before shallower shape {}",
                pair[0], pair[1]
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::StrippedPatternShape;
    use crate::utils::config::{ShapeConfig, NULL_PATTERN_ID};

    #[test]
    fn test_small_forest_passes() {
        let shapes = vec![
            StrippedPatternShape::new(1, 1, 1, vec![NULL_PATTERN_ID]),
            StrippedPatternShape::new(2, 1, 2, vec![NULL_PATTERN_ID]),
            StrippedPatternShape::new(10001, 2, 1, vec![NULL_PATTERN_ID, 1, 2]),
        ];
        let metric = ShapeMetric::from_shapes(shapes, &ShapeConfig::default()).unwrap();
        assert_eq!(verify_metric(&metric), Ok(()));
        assert_eq!(verify_order(&metric), Ok(()));
    }
}
