//! Arena of pattern shapes.
//!
//! Shapes are stored sorted by `(depth, id)`, so every child has a smaller
//! dense index than its parent and each depth level is a contiguous range.
//! The null shape is always at index 0.

use super::{is_null_pattern, PatternId, StrippedPatternShape};
use crate::utils::error::ShapeError;
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

/// Dense index of the null shape
pub const NULL_INDEX: usize = 0;

/// Validated, depth-ordered shape arena
#[derive(Debug, Clone)]
pub struct ShapeForest {
    shapes: Vec<StrippedPatternShape>,
    index_by_id: HashMap<PatternId, usize>,
    /// Child indices; an empty child list is read as `[null]`
    children: Vec<Vec<usize>>,
    levels: Vec<Range<usize>>,
    /// Transitive children, excluding the shape itself
    descendants: Vec<BTreeSet<usize>>,
}

impl ShapeForest {
    /// Build and validate a forest
    ///
    /// The null shape is added when missing.
    ///
    /// # Errors
    /// * `ShapeError::DuplicateShape` - two shapes share an id
    /// * `ShapeError::UnknownChild` - a child id has no shape
    /// * `ShapeError::InconsistentDepth` - a declared depth is not one more
    ///   than the deepest child (0 for the null shape)
    pub fn new(shapes: Vec<StrippedPatternShape>) -> Result<Self, ShapeError> {
        let mut by_id: HashMap<PatternId, StrippedPatternShape> = HashMap::with_capacity(shapes.len() + 1);
        for shape in shapes {
            if by_id.contains_key(&shape.id) {
                return Err(ShapeError::DuplicateShape(shape.id));
            }
            by_id.insert(shape.id, shape);
        }
        let null = StrippedPatternShape::null();
        by_id.entry(null.id).or_insert(null);

        for shape in by_id.values() {
            let expected = if shape.is_null() {
                0
            } else {
                let mut deepest = 0;
                for child in &shape.pattern_ids {
                    let child_shape = by_id.get(child).ok_or(ShapeError::UnknownChild {
                        parent: shape.id,
                        child: *child,
                    })?;
                    deepest = deepest.max(child_shape.depth);
                }
                deepest + 1
            };
            if shape.depth != expected {
                return Err(ShapeError::InconsistentDepth {
                    id: shape.id,
                    declared: shape.depth,
                    expected,
                });
            }
        }

        let mut shapes: Vec<StrippedPatternShape> = by_id.into_values().collect();
        shapes.sort_by_key(|shape| (shape.depth, shape.id));

        let index_by_id: HashMap<PatternId, usize> = shapes
            .iter()
            .enumerate()
            .map(|(index, shape)| (shape.id, index))
            .collect();

        let children: Vec<Vec<usize>> = shapes
            .iter()
            .map(|shape| {
                if shape.pattern_ids.is_empty() {
                    vec![NULL_INDEX]
                } else {
                    shape.pattern_ids.iter().map(|id| index_by_id[id]).collect()
                }
            })
            .collect();

        let mut levels: Vec<Range<usize>> = Vec::new();
        for (index, shape) in shapes.iter().enumerate() {
            match levels.last_mut() {
                Some(level) if shapes[level.start].depth == shape.depth => level.end = index + 1,
                _ => levels.push(index..index + 1),
            }
        }

        let mut descendants: Vec<BTreeSet<usize>> = Vec::with_capacity(shapes.len());
        for (index, shape) in shapes.iter().enumerate() {
            let mut closure = BTreeSet::new();
            if !shape.is_null() {
                for &child in &children[index] {
                    closure.insert(child);
                    closure.extend(descendants[child].iter().copied());
                }
            }
            descendants.push(closure);
        }

        debug!(
            "Shape forest: {} shapes over {} depth levels",
            shapes.len(),
            levels.len()
        );

        Ok(Self {
            shapes,
            index_by_id,
            children,
            levels,
            descendants,
        })
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// True when only the null shape is present
    pub fn is_empty(&self) -> bool {
        self.shapes.len() <= 1
    }

    pub fn shape(&self, index: usize) -> &StrippedPatternShape {
        &self.shapes[index]
    }

    pub fn shapes(&self) -> &[StrippedPatternShape] {
        &self.shapes
    }

    pub fn index_of(&self, id: PatternId) -> Option<usize> {
        self.index_by_id.get(&id).copied()
    }

    pub fn require_index(&self, id: PatternId) -> Result<usize, ShapeError> {
        self.index_of(id).ok_or(ShapeError::UnknownShape(id))
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    /// Contiguous index ranges, one per depth, shallowest first
    pub fn levels(&self) -> &[Range<usize>] {
        &self.levels
    }

    pub fn descendants(&self, index: usize) -> &BTreeSet<usize> {
        &self.descendants[index]
    }

    /// Whether one shape is the other or one of its descendants
    pub fn is_related(&self, a: usize, b: usize) -> bool {
        a == b || self.descendants[a].contains(&b) || self.descendants[b].contains(&a)
    }

    /// Descendant closure as pattern ids
    pub fn descendant_ids(&self, index: usize) -> BTreeSet<PatternId> {
        self.descendants[index]
            .iter()
            .map(|&i| self.shapes[i].id)
            .collect()
    }

    /// Indices of every shape except the null shape
    pub fn non_null_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.shapes.len()).filter(move |&index| !is_null_pattern(self.shapes[index].id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::NULL_PATTERN_ID;

    const NULL: PatternId = NULL_PATTERN_ID;

    fn shape(id: PatternId, depth: u32, base: i32, children: &[PatternId]) -> StrippedPatternShape {
        StrippedPatternShape::new(id, depth, base, children.to_vec())
    }

    #[test]
    fn test_depth_order_and_levels() {
        let forest = ShapeForest::new(vec![
            shape(10002, 2, 1, &[NULL, 3]),
            shape(3, 1, 3, &[NULL]),
            shape(4, 1, 4, &[NULL]),
        ])
        .unwrap();

        let ids: Vec<PatternId> = forest.shapes().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![NULL, 3, 4, 10002]);
        assert_eq!(forest.levels(), &[0..1, 1..3, 3..4]);
        assert_eq!(forest.children(3), &[NULL_INDEX, 1]);
        assert_eq!(forest.children(NULL_INDEX), &[NULL_INDEX]);
    }

    #[test]
    fn test_descendants_exclude_self() {
        let forest = ShapeForest::new(vec![
            shape(1, 1, 1, &[NULL]),
            shape(10001, 2, 2, &[NULL, 1]),
            shape(10002, 3, 3, &[NULL, 10001]),
        ])
        .unwrap();

        let top = forest.index_of(10002).unwrap();
        assert_eq!(
            forest.descendant_ids(top),
            [NULL, 1, 10001].into_iter().collect()
        );
        assert!(!forest.descendants(top).contains(&top));
        assert!(forest.is_related(top, forest.index_of(1).unwrap()));
        assert!(forest.descendants(NULL_INDEX).is_empty());
    }

    #[test]
    fn test_rejects_invalid_forests() {
        assert_eq!(
            ShapeForest::new(vec![shape(1, 1, 1, &[NULL]), shape(1, 1, 2, &[NULL])]).unwrap_err(),
            ShapeError::DuplicateShape(1)
        );
        assert_eq!(
            ShapeForest::new(vec![shape(10001, 2, 1, &[NULL, 7])]).unwrap_err(),
            ShapeError::UnknownChild { parent: 10001, child: 7 }
        );
        assert_eq!(
            ShapeForest::new(vec![shape(1, 3, 1, &[NULL])]).unwrap_err(),
            ShapeError::InconsistentDepth { id: 1, declared: 3, expected: 1 }
        );
    }
}
