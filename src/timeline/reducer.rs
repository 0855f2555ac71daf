//! Resolution reduction: one representative pattern per pixel column.
//!
//! Each (thread, depth) lane is cut into `width` equal partitions. For every
//! column the patterns of the lane, plus "no pattern", form a distribution
//! proportional to the time they cover. The distribution is dampened by a
//! root (so a dominant pattern cannot starve the others), renormalized and
//! sampled by walking a deterministic number cycle along its cumulative sum.

use super::cycle::NumberCycle;
use super::{Interval, Pattern, Program, Representation};
use crate::shapes::PatternId;
use crate::utils::config::TimelineConfig;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A pattern and the columns where it was chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowResolutionPattern {
    pub id: PatternId,
    pub representation: Representation,
    pub pixel_offsets: Vec<u32>,
}

/// Reduced view of one lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReducedLane {
    pub depth: u32,
    pub patterns: Vec<LowResolutionPattern>,
    /// Per column, the chosen pattern's latest interval starting before the
    /// column end
    pub sample_interval_per_offset: Vec<Option<Interval>>,
    pub pattern_per_offset: Vec<Option<PatternId>>,
}

/// Reduced lanes of one thread, one per depth from 0 to the deepest pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedThread {
    pub id: String,
    pub lanes: Vec<ReducedLane>,
}

/// Column sampler for a fixed pixel width
#[derive(Debug, Clone)]
pub struct ResolutionReducer {
    width: u32,
    config: TimelineConfig,
}

impl ResolutionReducer {
    pub fn new(width: u32, config: &TimelineConfig) -> Self {
        Self {
            width,
            config: config.clone(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Reduce every lane of every thread; threads run in parallel
    pub fn reduce_program(&self, program: &Program) -> Vec<ReducedThread> {
        program
            .threads
            .par_iter()
            .map(|thread| {
                let by_depth = thread.lanes();
                let lanes = match thread.max_depth() {
                    Some(max_depth) => (0..=max_depth)
                        .map(|depth| {
                            let patterns = by_depth.get(&depth).map(Vec::as_slice).unwrap_or(&[]);
                            self.reduce_lane(depth, patterns, program.duration)
                        })
                        .collect(),
                    None => Vec::new(),
                };
                ReducedThread {
                    id: thread.id.clone(),
                    lanes,
                }
            })
            .collect()
    }

    /// Reduce the competing patterns of one lane
    ///
    /// The patterns' intervals must be sorted by start time and must not
    /// overlap each other.
    pub fn reduce_lane(&self, depth: u32, patterns: &[&Pattern], duration: u64) -> ReducedLane {
        let width = self.width as usize;
        let mut lane = ReducedLane {
            depth,
            patterns: Vec::new(),
            sample_interval_per_offset: vec![None; width],
            pattern_per_offset: vec![None; width],
        };
        if patterns.is_empty() || width == 0 {
            return lane;
        }

        let partition = self.partition_length(duration);
        let spans: Vec<Vec<u64>> = patterns
            .iter()
            .map(|pattern| span_per_partition(&pattern.intervals, partition, width))
            .collect();

        let mut offsets: Vec<Vec<u32>> = vec![Vec::new(); patterns.len()];
        let mut cycle = NumberCycle::new(
            self.config.cycle_seed,
            self.config.cycle_increment,
            self.config.cycle_modulus,
        );

        for column in 0..width {
            let Some(distribution) = self.column_distribution(&spans, column, partition) else {
                continue;
            };
            let chosen = select(&distribution, cycle.next_fraction());
            if chosen < patterns.len() {
                let column_end = partition * (column as u64 + 1);
                offsets[chosen].push(column as u32);
                lane.sample_interval_per_offset[column] =
                    find_sample_interval(&patterns[chosen].intervals, column_end);
                lane.pattern_per_offset[column] = Some(patterns[chosen].id);
            }
        }

        lane.patterns = patterns
            .iter()
            .zip(offsets)
            .map(|(pattern, pixel_offsets)| LowResolutionPattern {
                id: pattern.id,
                representation: pattern.representation.clone(),
                pixel_offsets,
            })
            .collect();
        debug!(
            "Depth {}: {} patterns over {} columns of {} ns",
            depth,
            patterns.len(),
            width,
            partition
        );
        lane
    }

    /// Time covered by one column, at least 1
    pub fn partition_length(&self, duration: u64) -> u64 {
        (duration / self.width.max(1) as u64).max(1)
    }

    /// Dampened, normalized distribution over the patterns followed by
    /// "no pattern". `None` when nothing has weight.
    fn column_distribution(&self, spans: &[Vec<u64>], column: usize, partition: u64) -> Option<Vec<f64>> {
        let partition = partition as f64;
        let mut covered = 0.0;
        let mut distribution: Vec<f64> = spans
            .iter()
            .map(|span| {
                let span = span[column] as f64;
                covered += span;
                span / partition
            })
            .collect();
        distribution.push(((partition - covered) / partition).max(0.0));

        let exponent = self.config.dampening_exponent;
        for weight in &mut distribution {
            *weight = weight.powf(exponent);
        }
        let total: f64 = distribution.iter().sum();
        if total <= 0.0 {
            return None;
        }
        for weight in &mut distribution {
            *weight /= total;
        }
        Some(distribution)
    }
}

/// Walk `value` down the cumulative distribution; the last entry absorbs
/// any remainder
fn select(distribution: &[f64], mut value: f64) -> usize {
    let last = distribution.len() - 1;
    let mut index = 0;
    while index < last && distribution[index] <= value {
        value -= distribution[index];
        index += 1;
    }
    index
}

/// Summed interval overlap with each of `width` partitions
///
/// One forward sweep: the cursor only advances past intervals that end
/// inside the current partition, so no interval is revisited.
fn span_per_partition(intervals: &[Interval], partition: u64, width: usize) -> Vec<u64> {
    let overlap = |interval: &Interval, start: u64, end: u64| {
        let clamped_start = interval.start.clamp(start, end);
        let clamped_end = interval.end.clamp(start, end);
        clamped_end.saturating_sub(clamped_start)
    };

    let mut spans = Vec::with_capacity(width);
    let mut cursor = 0;
    for column in 0..width {
        let start = partition * column as u64;
        let end = start + partition;
        let mut span = 0;
        while cursor < intervals.len() && intervals[cursor].end < end {
            span += overlap(&intervals[cursor], start, end);
            cursor += 1;
        }
        if let Some(interval) = intervals.get(cursor) {
            span += overlap(interval, start, end);
        }
        spans.push(span);
    }
    spans
}

/// Latest interval starting strictly before `time`
fn find_sample_interval(intervals: &[Interval], time: u64) -> Option<Interval> {
    let after = intervals.partition_point(|interval| interval.start < time);
    after.checked_sub(1).map(|index| intervals[index])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intervals(pairs: &[(u64, u64)]) -> Vec<Interval> {
        pairs.iter().map(|&(s, e)| Interval::new(s, e)).collect()
    }

    #[test]
    fn test_span_sweep() {
        let spans = span_per_partition(&intervals(&[(5, 15), (18, 19), (25, 45)]), 10, 5);
        assert_eq!(spans, vec![5, 6, 5, 10, 5]);
    }

    #[test]
    fn test_select_walks_cumulative_sum() {
        let distribution = [0.5, 0.25, 0.25];
        assert_eq!(select(&distribution, 0.31), 0);
        assert_eq!(select(&distribution, 0.62), 1);
        assert_eq!(select(&distribution, 0.93), 2);
    }

    #[test]
    fn test_find_sample_interval() {
        let list = intervals(&[(0, 5), (10, 15), (20, 25)]);
        assert_eq!(find_sample_interval(&list, 10), Some(Interval::new(0, 5)));
        assert_eq!(find_sample_interval(&list, 11), Some(Interval::new(10, 15)));
        assert_eq!(find_sample_interval(&list, 100), Some(Interval::new(20, 25)));
        assert_eq!(find_sample_interval(&list, 0), None);
    }

    #[test]
    fn test_empty_lane() {
        let reducer = ResolutionReducer::new(10, &TimelineConfig::default());
        let lane = reducer.reduce_lane(1, &[], 1000);
        assert!(lane.patterns.is_empty());
        assert!(lane.pattern_per_offset.iter().all(Option::is_none));
    }

    #[test]
    fn test_partition_length_never_zero() {
        let reducer = ResolutionReducer::new(100, &TimelineConfig::default());
        assert_eq!(reducer.partition_length(50), 1);
        assert_eq!(reducer.partition_length(1000), 10);
    }
}
