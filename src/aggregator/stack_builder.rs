//! Rebuild call intervals from one thread's enter/exit event stream.
//!
//! Stack depth is assigned while streaming, relative to the thread's running
//! minimum depth. An exit without a matching enter (the trace started in the
//! middle of a call) lowers that minimum, so absolute depths are only known
//! once the whole thread has been scanned and `finalize` runs.
//!
//! Example: `--> f`, `--> g`, `<-- g`, `<-- f` yields `f` at depth 0 and `g`
//! at depth 1.

use crate::parser::Direction;
use crate::utils::error::TraceError;
use log::trace;
use serde::{Deserialize, Serialize};

/// A finalized call interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInterval {
    pub thread_id: u32,
    pub function_name: String,
    pub lock_name: String,
    pub start_time: u64,
    pub end_time: u64,
    pub relative_stack_depth: i64,
    pub absolute_stack_depth: u32,
}

impl CallInterval {
    pub fn elapsed_time(&self) -> u64 {
        self.end_time - self.start_time
    }
}

/// Interval still being built
///
/// `start_time` is `None` when the enter preceded the trace; `end_time` is
/// `None` while the call is open.
#[derive(Debug, Clone)]
struct PendingInterval {
    function_name: String,
    lock_name: String,
    start_time: Option<u64>,
    end_time: Option<u64>,
    relative_stack_depth: i64,
}

/// Per-thread summary needed by corpus metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMetadata {
    /// `max - min + 1` over relative depths, 0 for a thread without intervals
    pub stack_depth_range: u32,
    /// Smallest positive gap between consecutive timestamps
    pub min_elapsed_time: Option<u64>,
}

/// Stack state machine for one thread
#[derive(Debug, Clone)]
pub struct StackReconstructor {
    thread_id: u32,
    open: Vec<PendingInterval>,
    closed: Vec<PendingInterval>,
    min_stack_depth: i64,
    max_stack_depth: Option<i64>,
    last_timestamp: Option<u64>,
    min_elapsed_time: Option<u64>,
}

impl StackReconstructor {
    pub fn new(thread_id: u32) -> Self {
        Self {
            thread_id,
            open: Vec::new(),
            closed: Vec::new(),
            min_stack_depth: 0,
            max_stack_depth: None,
            last_timestamp: None,
            min_elapsed_time: None,
        }
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    pub fn min_stack_depth(&self) -> i64 {
        self.min_stack_depth
    }

    pub fn max_stack_depth(&self) -> Option<i64> {
        self.max_stack_depth
    }

    /// Number of calls currently open
    pub fn open_depth(&self) -> usize {
        self.open.len()
    }

    /// Feed one event, in arrival order
    ///
    /// An exit whose function or lock does not match the innermost open call
    /// leaves that call open, is recorded as an exit without a matching enter,
    /// and is reported as `TraceError::StackMismatch`. The reconstructor stays
    /// usable after the error.
    pub fn process_event(
        &mut self,
        direction: Direction,
        function_name: &str,
        lock_name: &str,
        time: u64,
    ) -> Result<(), TraceError> {
        let result = match direction {
            Direction::Enter => {
                self.enter(function_name, lock_name, time);
                Ok(())
            }
            Direction::Exit => self.exit(function_name, lock_name, time),
        };

        if let Some(last) = self.last_timestamp {
            let elapsed = time.saturating_sub(last);
            if elapsed > 0 {
                self.min_elapsed_time =
                    Some(self.min_elapsed_time.map_or(elapsed, |min| min.min(elapsed)));
            }
        }
        self.last_timestamp = Some(time);

        result
    }

    fn enter(&mut self, function_name: &str, lock_name: &str, time: u64) {
        let relative_stack_depth = self.open.len() as i64 + self.min_stack_depth;
        self.observe_depth(relative_stack_depth);
        self.open.push(PendingInterval {
            function_name: function_name.to_string(),
            lock_name: lock_name.to_string(),
            start_time: Some(time),
            end_time: None,
            relative_stack_depth,
        });
    }

    fn exit(&mut self, function_name: &str, lock_name: &str, time: u64) -> Result<(), TraceError> {
        let Some(mut interval) = self.open.pop() else {
            self.unmatched_exit(function_name, lock_name, time);
            return Ok(());
        };

        if interval.function_name != function_name || interval.lock_name != lock_name {
            let error = TraceError::StackMismatch {
                thread_id: self.thread_id,
                line_number: None,
                expected_function: interval.function_name.clone(),
                expected_lock: interval.lock_name.clone(),
                found_function: function_name.to_string(),
                found_lock: lock_name.to_string(),
            };
            self.open.push(interval);
            self.unmatched_exit(function_name, lock_name, time);
            return Err(error);
        }

        interval.end_time = Some(time);
        self.closed.push(interval);
        Ok(())
    }

    fn unmatched_exit(&mut self, function_name: &str, lock_name: &str, time: u64) {
        self.min_stack_depth -= 1;
        trace!(
            "Thread {}: exit of {} without enter, min depth now {}",
            self.thread_id,
            function_name,
            self.min_stack_depth
        );
        self.observe_depth(self.min_stack_depth);
        self.closed.push(PendingInterval {
            function_name: function_name.to_string(),
            lock_name: lock_name.to_string(),
            start_time: None,
            end_time: Some(time),
            relative_stack_depth: self.min_stack_depth,
        });
    }

    fn observe_depth(&mut self, depth: i64) {
        self.max_stack_depth = Some(self.max_stack_depth.map_or(depth, |max| max.max(depth)));
    }

    pub fn metadata(&self) -> ThreadMetadata {
        let stack_depth_range = self
            .max_stack_depth
            .map(|max| (max - self.min_stack_depth + 1).max(0) as u32)
            .unwrap_or(0);
        ThreadMetadata {
            stack_depth_range,
            min_elapsed_time: self.min_elapsed_time,
        }
    }

    /// Close every open call at `corpus_end`, resolve unknown starts to
    /// `corpus_start`, and compute absolute depths.
    ///
    /// Closed calls come first in the order they closed, followed by the
    /// calls that were still open, innermost first.
    pub fn finalize(mut self, corpus_start: u64, corpus_end: u64) -> Vec<CallInterval> {
        while let Some(mut interval) = self.open.pop() {
            interval.end_time = Some(corpus_end);
            self.closed.push(interval);
        }

        let thread_id = self.thread_id;
        let min_stack_depth = self.min_stack_depth;
        self.closed
            .into_iter()
            .map(|pending| {
                let start_time = pending.start_time.unwrap_or(corpus_start);
                let end_time = pending.end_time.unwrap_or(corpus_end).max(start_time);
                CallInterval {
                    thread_id,
                    function_name: pending.function_name,
                    lock_name: pending.lock_name,
                    start_time,
                    end_time,
                    relative_stack_depth: pending.relative_stack_depth,
                    absolute_stack_depth: (pending.relative_stack_depth - min_stack_depth) as u32,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Direction::{Enter, Exit};

    fn run(events: &[(Direction, &str, u64)]) -> StackReconstructor {
        let mut stack = StackReconstructor::new(1);
        for &(direction, function, time) in events {
            stack.process_event(direction, function, "", time).unwrap();
        }
        stack
    }

    #[test]
    fn test_nested_calls() {
        let stack = run(&[(Enter, "f", 100), (Enter, "g", 110), (Exit, "g", 120), (Exit, "f", 130)]);
        let intervals = stack.finalize(100, 130);

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].function_name, "g");
        assert_eq!((intervals[0].start_time, intervals[0].end_time), (110, 120));
        assert_eq!(intervals[0].absolute_stack_depth, 1);
        assert_eq!(intervals[1].function_name, "f");
        assert_eq!((intervals[1].start_time, intervals[1].end_time), (100, 130));
        assert_eq!(intervals[1].absolute_stack_depth, 0);
    }

    #[test]
    fn test_unmatched_exit_shifts_depths() {
        let stack = run(&[(Exit, "outer", 50), (Enter, "f", 60), (Exit, "f", 70)]);
        assert_eq!(stack.min_stack_depth(), -1);
        let intervals = stack.finalize(40, 80);

        let outer = &intervals[0];
        assert_eq!(outer.start_time, 40);
        assert_eq!(outer.end_time, 50);
        assert_eq!(outer.relative_stack_depth, -1);
        assert_eq!(outer.absolute_stack_depth, 0);
        // f entered with an empty stack after the unmatched exit
        assert_eq!(intervals[1].relative_stack_depth, -1);
        assert_eq!(intervals[1].absolute_stack_depth, 0);
    }

    #[test]
    fn test_open_calls_close_at_corpus_end() {
        let stack = run(&[(Enter, "f", 10), (Enter, "g", 20)]);
        let intervals = stack.finalize(10, 99);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].function_name, "g");
        assert_eq!(intervals[0].end_time, 99);
        assert_eq!(intervals[1].end_time, 99);
    }

    #[test]
    fn test_mismatch_reports_and_continues() {
        let mut stack = StackReconstructor::new(4);
        stack.process_event(Enter, "f", "lock", 10).unwrap();
        let err = stack.process_event(Exit, "f", "other", 20).unwrap_err();
        match err {
            TraceError::StackMismatch {
                thread_id,
                expected_lock,
                found_lock,
                ..
            } => {
                assert_eq!(thread_id, 4);
                assert_eq!(expected_lock, "lock");
                assert_eq!(found_lock, "other");
            }
        }
        assert_eq!(stack.open_depth(), 1);
        assert_eq!(stack.min_stack_depth(), -1);

        // The original call can still be closed
        stack.process_event(Exit, "f", "lock", 30).unwrap();
        assert_eq!(stack.open_depth(), 0);
    }

    #[test]
    fn test_metadata_range_and_elapsed() {
        let stack = run(&[
            (Exit, "x", 5),
            (Enter, "f", 5),
            (Enter, "g", 9),
            (Exit, "g", 12),
            (Exit, "f", 20),
        ]);
        let metadata = stack.metadata();
        // relative depths: -1 (x), -1 (f), 0 (g)
        assert_eq!(metadata.stack_depth_range, 2);
        assert_eq!(metadata.min_elapsed_time, Some(3));
    }

    #[test]
    fn test_empty_thread_metadata() {
        let stack = StackReconstructor::new(9);
        assert_eq!(stack.metadata().stack_depth_range, 0);
        assert_eq!(stack.metadata().min_elapsed_time, None);
        assert!(stack.finalize(0, 0).is_empty());
    }
}
