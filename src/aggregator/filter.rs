//! Structured predicates ("sift" queries) over finalized call intervals.
//!
//! A filter is a conjunction of constraints; an empty filter matches
//! everything.
//!
//! ```ignore
//! let filter = EventFilter::new().start_time(1_000, 2_000).threads([1, 3]);
//! let selected = processed.filter(&filter);
//! ```

use super::stack_builder::CallInterval;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Half-open time range `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: u64,
    pub to: u64,
}

impl TimeRange {
    pub fn contains(&self, time: u64) -> bool {
        self.from <= time && time < self.to
    }
}

/// One constraint of a filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Interval starts inside the range
    StartTime(TimeRange),
    /// Interval ends inside the range
    EndTime(TimeRange),
    /// Interval intersects the range
    Overlaps(TimeRange),
    /// Interval belongs to one of the threads
    Threads(BTreeSet<u32>),
}

impl Constraint {
    pub fn matches(&self, interval: &CallInterval) -> bool {
        match self {
            Constraint::StartTime(range) => range.contains(interval.start_time),
            Constraint::EndTime(range) => range.contains(interval.end_time),
            Constraint::Overlaps(range) => {
                interval.start_time < range.to && interval.end_time >= range.from
            }
            Constraint::Threads(threads) => threads.contains(&interval.thread_id),
        }
    }
}

/// Conjunction of constraints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_time(mut self, from: u64, to: u64) -> Self {
        self.constraints.push(Constraint::StartTime(TimeRange { from, to }));
        self
    }

    pub fn end_time(mut self, from: u64, to: u64) -> Self {
        self.constraints.push(Constraint::EndTime(TimeRange { from, to }));
        self
    }

    pub fn overlapping(mut self, from: u64, to: u64) -> Self {
        self.constraints.push(Constraint::Overlaps(TimeRange { from, to }));
        self
    }

    pub fn threads(mut self, threads: impl IntoIterator<Item = u32>) -> Self {
        self.constraints
            .push(Constraint::Threads(threads.into_iter().collect()));
        self
    }

    pub fn matches(&self, interval: &CallInterval) -> bool {
        self.constraints.iter().all(|c| c.matches(interval))
    }

    /// Select the matching subsequence, preserving order
    pub fn apply<'a>(&self, intervals: &'a [CallInterval]) -> Vec<&'a CallInterval> {
        intervals.iter().filter(|i| self.matches(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(thread_id: u32, start_time: u64, end_time: u64) -> CallInterval {
        CallInterval {
            thread_id,
            function_name: "f".to_string(),
            lock_name: String::new(),
            start_time,
            end_time,
            relative_stack_depth: 0,
            absolute_stack_depth: 0,
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let intervals = vec![interval(1, 0, 10), interval(2, 5, 6)];
        assert_eq!(EventFilter::new().apply(&intervals).len(), 2);
    }

    #[test]
    fn test_start_time_is_half_open() {
        let filter = EventFilter::new().start_time(10, 20);
        assert!(filter.matches(&interval(1, 10, 30)));
        assert!(!filter.matches(&interval(1, 20, 30)));
        assert!(!filter.matches(&interval(1, 9, 30)));
    }

    #[test]
    fn test_conjunction_of_time_and_threads() {
        let intervals = vec![
            interval(1, 10, 11),
            interval(2, 10, 11),
            interval(3, 10, 11),
            interval(1, 50, 51),
        ];
        let filter = EventFilter::new().start_time(0, 20).threads([1, 3]);
        let selected = filter.apply(&intervals);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].thread_id, 1);
        assert_eq!(selected[1].thread_id, 3);
    }

    #[test]
    fn test_overlaps() {
        let filter = EventFilter::new().overlapping(100, 200);
        assert!(filter.matches(&interval(1, 50, 100)));
        assert!(filter.matches(&interval(1, 150, 400)));
        assert!(!filter.matches(&interval(1, 200, 400)));
        assert!(!filter.matches(&interval(1, 0, 99)));
    }

    #[test]
    fn test_filter_from_json() {
        let filter: EventFilter = serde_json::from_str(
            r#"{"constraints": [{"threads": [2]}, {"end_time": {"from": 0, "to": 100}}]}"#,
        )
        .unwrap();
        assert!(filter.matches(&interval(2, 0, 50)));
        assert!(!filter.matches(&interval(2, 0, 150)));
    }
}
