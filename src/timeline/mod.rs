//! Timeline programs: patterns placed on per-thread, per-depth lanes.
//!
//! This module handles:
//! - The program model shared by mined documents and the reducer
//! - Pattern selection before rendering
//! - Resolution reduction to one pattern per pixel column
//! - Piecewise time-to-pixel conversion over timeframe panels

pub mod cycle;
pub mod panels;
pub mod reducer;

use crate::shapes::{FunctionId, PatternId, StrippedPatternShape};
use crate::utils::error::TimelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed time interval, serialized as `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "[u64; 2]", into = "[u64; 2]")]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

impl From<[u64; 2]> for Interval {
    fn from([start, end]: [u64; 2]) -> Self {
        Self::new(start, end)
    }
}

impl From<Interval> for [u64; 2] {
    fn from(interval: Interval) -> Self {
        [interval.start, interval.end]
    }
}

/// What a pattern stands for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Representation {
    Shape(StrippedPatternShape),
    #[serde(rename_all = "camelCase")]
    Cluster {
        cluster_id: usize,
        base_function: FunctionId,
        /// Lane depth of the merged patterns
        depth: u32,
        shape_ids: Vec<PatternId>,
    },
}

/// A recurring pattern and where it occurs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub representation: Representation,
    /// Sorted by start time
    pub intervals: Vec<Interval>,
}

impl Pattern {
    /// Lane depth
    pub fn depth(&self) -> u32 {
        match &self.representation {
            Representation::Shape(shape) => shape.depth,
            Representation::Cluster { depth, .. } => *depth,
        }
    }

    pub fn frequency(&self) -> usize {
        self.intervals.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub patterns: Vec<Pattern>,
}

impl Thread {
    /// Patterns grouped by lane depth
    pub fn lanes(&self) -> BTreeMap<u32, Vec<&Pattern>> {
        let mut lanes: BTreeMap<u32, Vec<&Pattern>> = BTreeMap::new();
        for pattern in &self.patterns {
            lanes.entry(pattern.depth()).or_default().push(pattern);
        }
        lanes
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.patterns.iter().map(Pattern::depth).max()
    }
}

/// Patterns of every thread, with times relative to the program start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    /// Absolute timestamp of time 0, kept as a string to preserve precision
    pub absolute_start_time: String,
    pub duration: u64,
    pub threads: Vec<Thread>,
}

/// Keep the `count` most frequent patterns of each thread
///
/// Ties keep their original order.
pub fn select_top_patterns(program: &Program, count: usize) -> Program {
    let threads = program
        .threads
        .iter()
        .map(|thread| {
            let mut patterns = thread.patterns.clone();
            patterns.sort_by(|a, b| b.frequency().cmp(&a.frequency()));
            patterns.truncate(count);
            Thread {
                id: thread.id.clone(),
                patterns,
            }
        })
        .collect();

    Program {
        absolute_start_time: program.absolute_start_time.clone(),
        duration: program.duration,
        threads,
    }
}

/// Check that intervals on each (thread, depth) lane never overlap
///
/// Intervals may touch at an endpoint.
///
/// # Errors
/// * `TimelineError::OverlappingIntervals` - the first overlap found
pub fn verify_disjoint_lanes(program: &Program) -> Result<(), TimelineError> {
    for thread in &program.threads {
        for (depth, patterns) in thread.lanes() {
            let mut placed: Vec<(Interval, PatternId)> = patterns
                .iter()
                .flat_map(|pattern| pattern.intervals.iter().map(move |&i| (i, pattern.id)))
                .collect();
            placed.sort();
            // Furthest end seen so far and the pattern it belongs to
            let mut reach: Option<(u64, PatternId)> = None;
            for (interval, id) in placed {
                if let Some((end, owner)) = reach {
                    if interval.start < end {
                        return Err(TimelineError::OverlappingIntervals {
                            thread: thread.id.clone(),
                            depth,
                            first: owner,
                            second: id,
                            start: interval.start,
                        });
                    }
                }
                if reach.map_or(true, |(end, _)| interval.end > end) {
                    reach = Some((interval.end, id));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::NULL_PATTERN_ID;

    fn pattern(id: PatternId, depth: u32, intervals: &[(u64, u64)]) -> Pattern {
        Pattern {
            id,
            representation: Representation::Shape(StrippedPatternShape::new(
                id,
                depth,
                1,
                vec![NULL_PATTERN_ID],
            )),
            intervals: intervals.iter().map(|&(s, e)| Interval::new(s, e)).collect(),
        }
    }

    fn program(patterns: Vec<Pattern>) -> Program {
        Program {
            absolute_start_time: "0".to_string(),
            duration: 1000,
            threads: vec![Thread {
                id: "1".to_string(),
                patterns,
            }],
        }
    }

    #[test]
    fn test_interval_serializes_as_pair() {
        let json = serde_json::to_string(&Interval::new(3, 9)).unwrap();
        assert_eq!(json, "[3,9]");
    }

    #[test]
    fn test_select_top_patterns_by_frequency() {
        let selected = select_top_patterns(
            &program(vec![
                pattern(1, 1, &[(0, 1)]),
                pattern(2, 1, &[(2, 3), (4, 5), (6, 7)]),
                pattern(3, 1, &[(8, 9), (10, 11)]),
                pattern(4, 1, &[(12, 13), (14, 15)]),
            ]),
            2,
        );
        let ids: Vec<PatternId> = selected.threads[0].patterns.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_disjoint_lanes() {
        let ok = program(vec![
            pattern(1, 1, &[(0, 10), (20, 30)]),
            pattern(2, 1, &[(10, 20)]),
            // Other depth may overlap freely
            pattern(3, 2, &[(5, 25)]),
        ]);
        assert_eq!(verify_disjoint_lanes(&ok), Ok(()));

        let bad = program(vec![pattern(1, 1, &[(0, 10)]), pattern(2, 1, &[(5, 8)])]);
        assert_eq!(
            verify_disjoint_lanes(&bad),
            Err(TimelineError::OverlappingIntervals {
                thread: "1".to_string(),
                depth: 1,
                first: 1,
                second: 2,
                start: 5,
            })
        );
    }
}
