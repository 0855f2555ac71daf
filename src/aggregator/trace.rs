//! Corpus-wide trace aggregation.
//!
//! The aggregator routes raw events to per-thread stack reconstructors,
//! collects the name dictionaries and the gaps between consecutive events,
//! and finally flattens every thread into one interval list.

use super::filter::EventFilter;
use super::metadata::{CorpusMetadata, NameDictionary};
use super::stack_builder::{CallInterval, StackReconstructor};
use crate::parser::{parse_line, RawEvent};
use crate::utils::config::EVENT_KEY_SEPARATOR;
use crate::utils::error::{ParseError, TraceError};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufRead;

/// Gap between two consecutive raw timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeGap {
    pub start_time: u64,
    pub end_time: u64,
}

impl TimeGap {
    pub fn length(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }
}

/// Counters from one ingestion pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub lines: usize,
    pub events: usize,
    pub malformed: usize,
    pub mismatches: Vec<TraceError>,
}

/// Result of finalizing an aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedTrace {
    pub metadata: CorpusMetadata,
    /// All intervals, grouped by ascending thread id
    pub intervals: Vec<CallInterval>,
}

impl ProcessedTrace {
    /// Intervals matching `filter`, in stored order
    pub fn filter(&self, filter: &EventFilter) -> Vec<&CallInterval> {
        filter.apply(&self.intervals)
    }
}

/// Streaming aggregator over every thread of a trace
#[derive(Debug, Default)]
pub struct TraceAggregator {
    threads: BTreeMap<u32, StackReconstructor>,
    events: NameDictionary,
    functions: NameDictionary,
    lock_names: NameDictionary,
    time_gaps: Vec<TimeGap>,
    start_time: Option<u64>,
    last_timestamp: Option<u64>,
}

impl TraceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// First and most recent timestamps seen
    pub fn time_span(&self) -> Option<(u64, u64)> {
        Some((self.start_time?, self.last_timestamp?))
    }

    pub fn time_gaps(&self) -> &[TimeGap] {
        &self.time_gaps
    }

    /// Feed one event
    ///
    /// Stack mismatches are returned but the event is still recorded; the
    /// aggregator stays usable.
    pub fn process_event(
        &mut self,
        event: &RawEvent,
        line_number: Option<usize>,
    ) -> Result<(), TraceError> {
        let time = event.timestamp;
        if self.start_time.is_none() {
            self.start_time = Some(time);
        }

        let key = if event.has_lock() {
            format!("{}{}{}", event.function_name, EVENT_KEY_SEPARATOR, event.lock_name)
        } else {
            event.function_name.clone()
        };
        self.events.insert(&key);
        self.functions.insert(&event.function_name);
        self.lock_names.insert(&event.lock_name);

        if let Some(last) = self.last_timestamp {
            self.time_gaps.push(TimeGap {
                start_time: last,
                end_time: time,
            });
        }
        self.last_timestamp = Some(time);

        self.threads
            .entry(event.thread_id)
            .or_insert_with(|| {
                debug!("New thread: {}", event.thread_id);
                StackReconstructor::new(event.thread_id)
            })
            .process_event(event.direction, &event.function_name, &event.lock_name, time)
            .map_err(|err| with_line_number(err, line_number))
    }

    /// Parse and feed one log line
    pub fn ingest_line(&mut self, line: &str, line_number: usize) -> Result<(), IngestError> {
        let event = parse_line(line, line_number).map_err(IngestError::Malformed)?;
        self.process_event(&event, Some(line_number))
            .map_err(IngestError::Mismatch)
    }

    /// Ingest every line of a reader
    ///
    /// Blank lines are ignored. Malformed lines and stack mismatches are
    /// logged, counted and skipped.
    ///
    /// # Errors
    /// * `ParseError::IoError` - the reader failed
    pub fn ingest<R: BufRead>(&mut self, reader: R) -> Result<IngestReport, ParseError> {
        let mut report = IngestReport::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = index + 1;
            report.lines += 1;
            if line.trim().is_empty() {
                continue;
            }

            match self.ingest_line(&line, line_number) {
                Ok(()) => report.events += 1,
                Err(IngestError::Malformed(err)) => {
                    warn!("Skipping line: {}", err);
                    report.malformed += 1;
                }
                Err(IngestError::Mismatch(err)) => {
                    warn!("{}", err);
                    report.events += 1;
                    report.mismatches.push(err);
                }
            }
        }

        info!(
            "Ingested {} events from {} lines ({} malformed, {} mismatches)",
            report.events,
            report.lines,
            report.malformed,
            report.mismatches.len()
        );
        Ok(report)
    }

    /// Smallest positive gap between events of any single thread
    pub fn min_elapsed_time(&self) -> Option<u64> {
        self.threads
            .values()
            .filter_map(|stack| stack.metadata().min_elapsed_time)
            .min()
    }

    /// Gaps overlapping `(from, to)` that are longer than `threshold`
    pub fn compressed_regions(&self, from: u64, to: u64, threshold: u64) -> Vec<TimeGap> {
        self.time_gaps
            .iter()
            .filter(|gap| gap.start_time < to && gap.end_time > from && gap.length() > threshold)
            .copied()
            .collect()
    }

    /// Finalize every thread and assemble corpus metadata
    ///
    /// Threads are independent, so they are finalized in parallel. The
    /// intervals are flattened in ascending thread-id order.
    pub fn finalize(self) -> ProcessedTrace {
        let start_time = self.start_time.unwrap_or(0);
        let end_time = self.last_timestamp.unwrap_or(start_time).max(start_time);

        let min_elapsed_time = self.min_elapsed_time();
        let max_stack_depth = self
            .threads
            .values()
            .map(|stack| stack.metadata().stack_depth_range)
            .max()
            .unwrap_or(0);

        let threads: Vec<u32> = self.threads.keys().copied().collect();
        let stacks: Vec<StackReconstructor> = self.threads.into_values().collect();
        let per_thread: Vec<Vec<CallInterval>> = stacks
            .into_par_iter()
            .map(|stack| stack.finalize(start_time, end_time))
            .collect();
        let intervals: Vec<CallInterval> = per_thread.into_iter().flatten().collect();

        let metadata = CorpusMetadata {
            start_time,
            end_time,
            min_elapsed_time,
            max_stack_depth,
            threads,
            events: self.events,
            functions: self.functions,
            lock_names: self.lock_names,
        };
        info!("Finalized {} intervals. {}", intervals.len(), metadata.summary());

        ProcessedTrace {
            metadata,
            intervals,
        }
    }
}

/// Why a single line was not ingested cleanly
#[derive(Debug)]
pub enum IngestError {
    Malformed(ParseError),
    Mismatch(TraceError),
}

fn with_line_number(err: TraceError, line: Option<usize>) -> TraceError {
    match err {
        TraceError::StackMismatch {
            thread_id,
            line_number,
            expected_function,
            expected_lock,
            found_function,
            found_lock,
        } => TraceError::StackMismatch {
            thread_id,
            line_number: line.or(line_number),
            expected_function,
            expected_lock,
            found_function,
            found_lock,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Direction;

    fn event(direction: Direction, function: &str, thread: u32, time: u64) -> RawEvent {
        RawEvent::new(direction, function, thread, time, "")
    }

    #[test]
    fn test_dictionaries_and_keys() {
        let mut aggregator = TraceAggregator::new();
        aggregator
            .process_event(&RawEvent::new(Direction::Enter, "f", 1, 10, "0xab"), None)
            .unwrap();
        aggregator
            .process_event(&event(Direction::Enter, "g", 1, 20), None)
            .unwrap();

        let processed = aggregator.finalize();
        let metadata = &processed.metadata;
        assert_eq!(metadata.events.iter().collect::<Vec<_>>(), vec!["f:::0xab", "g"]);
        assert_eq!(metadata.functions.index_of("g"), Some(1));
        assert_eq!(metadata.lock_names.iter().collect::<Vec<_>>(), vec!["0xab", ""]);
        assert_eq!((metadata.start_time, metadata.end_time), (10, 20));
    }

    #[test]
    fn test_compressed_regions() {
        let mut aggregator = TraceAggregator::new();
        for (i, time) in [0u64, 5, 100, 104, 300].iter().enumerate() {
            let direction = if i % 2 == 0 { Direction::Enter } else { Direction::Exit };
            aggregator
                .process_event(&event(direction, "f", 1, *time), None)
                .unwrap();
        }

        assert_eq!(aggregator.time_gaps().len(), 4);
        let regions = aggregator.compressed_regions(0, 1000, 50);
        assert_eq!(
            regions,
            vec![
                TimeGap { start_time: 5, end_time: 100 },
                TimeGap { start_time: 104, end_time: 300 },
            ]
        );
        // Only gaps overlapping the window are reported
        assert_eq!(aggregator.compressed_regions(150, 200, 50).len(), 1);
        assert!(aggregator.compressed_regions(0, 5, 50).is_empty());
    }

    #[test]
    fn test_mismatch_carries_line_number() {
        let mut aggregator = TraceAggregator::new();
        aggregator.ingest_line("--> f 3 10", 1).unwrap();
        let err = aggregator.ingest_line("<-- g 3 20", 2).unwrap_err();
        match err {
            IngestError::Mismatch(TraceError::StackMismatch { line_number, .. }) => {
                assert_eq!(line_number, Some(2));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_aggregator() {
        let processed = TraceAggregator::new().finalize();
        assert!(processed.intervals.is_empty());
        assert!(processed.metadata.threads.is_empty());
        assert_eq!(processed.metadata.min_elapsed_time, None);
    }
}
