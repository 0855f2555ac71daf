use pretty_assertions::assert_eq;
use std::io::Cursor;
use timesquared::aggregator::{CallInterval, EventFilter, StackReconstructor, TraceAggregator};
use timesquared::parser::{Direction, RawEvent};
use timesquared::utils::TraceError;

fn interval(function: &str, start: u64, end: u64, depth: u32) -> (String, u64, u64, u32) {
    (function.to_string(), start, end, depth)
}

fn summarize(intervals: &[CallInterval]) -> Vec<(String, u64, u64, u32)> {
    let mut summary: Vec<_> = intervals
        .iter()
        .map(|i| interval(&i.function_name, i.start_time, i.end_time, i.absolute_stack_depth))
        .collect();
    summary.sort_by_key(|entry| entry.1);
    summary
}

#[test]
fn test_nested_calls_end_to_end() {
    let mut aggregator = TraceAggregator::new();
    for event in [
        RawEvent::new(Direction::Enter, "f", 1, 100, ""),
        RawEvent::new(Direction::Enter, "g", 1, 110, ""),
        RawEvent::new(Direction::Exit, "g", 1, 120, ""),
        RawEvent::new(Direction::Exit, "f", 1, 130, ""),
    ] {
        aggregator.process_event(&event, None).unwrap();
    }

    let processed = aggregator.finalize();
    assert_eq!(
        summarize(&processed.intervals),
        vec![interval("f", 100, 130, 0), interval("g", 110, 120, 1)]
    );
    assert_eq!(processed.metadata.max_stack_depth, 2);
    assert_eq!(processed.metadata.min_elapsed_time, Some(10));
}

/// Enter/exit sequence of a complete binary call tree of the given height
fn balanced_events(height: u32, time: &mut u64, events: &mut Vec<(Direction, String, u64)>) {
    let name = format!("fn{}", height);
    *time += 1;
    events.push((Direction::Enter, name.clone(), *time));
    if height > 0 {
        balanced_events(height - 1, time, events);
        balanced_events(height - 1, time, events);
    }
    *time += 1;
    events.push((Direction::Exit, name, *time));
}

#[test]
fn test_balanced_nesting_yields_one_interval_per_enter() {
    let mut events = Vec::new();
    let mut time = 0;
    balanced_events(4, &mut time, &mut events);

    let mut stack = StackReconstructor::new(7);
    for (direction, name, time) in &events {
        stack.process_event(*direction, name, "", *time).unwrap();
    }
    assert_eq!(stack.open_depth(), 0);
    assert_eq!(stack.min_stack_depth(), 0);

    let intervals = stack.finalize(0, time);
    let enters = events
        .iter()
        .filter(|(direction, _, _)| *direction == Direction::Enter)
        .count();
    assert_eq!(intervals.len(), enters);

    for call in &intervals {
        assert!(call.start_time <= call.end_time);
        // fnN sits at depth (4 - N)
        let height: u32 = call.function_name[2..].parse().unwrap();
        assert_eq!(call.absolute_stack_depth, 4 - height);
    }

    // Children lie strictly inside a parent one level up
    for child in intervals.iter().filter(|c| c.absolute_stack_depth > 0) {
        assert!(intervals.iter().any(|parent| {
            parent.absolute_stack_depth + 1 == child.absolute_stack_depth
                && parent.start_time < child.start_time
                && child.end_time < parent.end_time
        }));
    }
}

#[test]
fn test_unmatched_exits_lower_min_depth() {
    let body = [
        (Direction::Enter, "a", 10),
        (Direction::Enter, "b", 11),
        (Direction::Exit, "b", 12),
        (Direction::Exit, "a", 13),
    ];

    let baseline = {
        let mut stack = StackReconstructor::new(1);
        for (direction, name, time) in body {
            stack.process_event(direction, name, "", time).unwrap();
        }
        stack.finalize(0, 20)
    };

    for k in 1..4u32 {
        let mut stack = StackReconstructor::new(1);
        for i in 0..k {
            stack
                .process_event(Direction::Exit, &format!("outer{}", i), "", i as u64 + 1)
                .unwrap();
        }
        for (direction, name, time) in body {
            stack.process_event(direction, name, "", time).unwrap();
        }
        assert_eq!(stack.min_stack_depth(), -(k as i64));

        let intervals = stack.finalize(0, 20);
        assert_eq!(intervals.iter().map(|i| i.absolute_stack_depth).min(), Some(0));

        // The first exit closes the innermost frame that was already open
        for i in 0..k {
            let outer = intervals
                .iter()
                .find(|call| call.function_name == format!("outer{}", i))
                .unwrap();
            assert_eq!(outer.absolute_stack_depth, k - 1 - i);
            assert_eq!(outer.start_time, 0);
        }

        // Calls made after the stack unwound sit on the outermost level
        for expected in &baseline {
            let call = intervals
                .iter()
                .find(|i| i.function_name == expected.function_name)
                .unwrap();
            assert_eq!(call.absolute_stack_depth, expected.absolute_stack_depth);
            assert_eq!(
                call.relative_stack_depth,
                expected.relative_stack_depth - k as i64
            );
        }
    }
}

#[test]
fn test_ingest_from_reader() {
    let log = "\
0 open 1 100 0x18e45b8
0 read 2 105 null
1 read 2 110
garbage
1 open 1 140 0x18e45b8

1 close 1 150
";
    let mut aggregator = TraceAggregator::new();
    let report = aggregator.ingest(Cursor::new(log)).unwrap();

    assert_eq!(report.lines, 7);
    assert_eq!(report.events, 5);
    assert_eq!(report.malformed, 1);
    assert!(report.mismatches.is_empty());
    assert_eq!(aggregator.thread_count(), 2);

    let processed = aggregator.finalize();
    let metadata = &processed.metadata;
    assert_eq!(metadata.threads, vec![1, 2]);
    assert_eq!(
        metadata.events.iter().collect::<Vec<_>>(),
        vec!["open:::0x18e45b8", "read", "close"]
    );
    assert_eq!(metadata.lock_names.index_of("0x18e45b8"), Some(0));
    assert_eq!(metadata.lock_names.index_of(""), Some(1));
    assert_eq!((metadata.start_time, metadata.end_time), (100, 150));

    // The unmatched close on thread 1 spans from the corpus start
    let close = processed
        .intervals
        .iter()
        .find(|i| i.function_name == "close")
        .unwrap();
    assert_eq!((close.start_time, close.end_time), (100, 150));
}

#[test]
fn test_mismatch_is_reported_and_ingestion_continues() {
    let log = "--> f 4 1\n<-- g 4 2\n<-- f 4 3\n";
    let mut aggregator = TraceAggregator::new();
    let report = aggregator.ingest(Cursor::new(log)).unwrap();

    assert_eq!(report.events, 3);
    assert_eq!(
        report.mismatches,
        vec![TraceError::StackMismatch {
            thread_id: 4,
            line_number: Some(2),
            expected_function: "f".to_string(),
            expected_lock: String::new(),
            found_function: "g".to_string(),
            found_lock: String::new(),
        }]
    );

    let processed = aggregator.finalize();
    assert_eq!(processed.intervals.len(), 2);
    let f = processed
        .intervals
        .iter()
        .find(|i| i.function_name == "f")
        .unwrap();
    assert_eq!((f.start_time, f.end_time), (1, 3));
}

#[test]
fn test_filter_over_processed_trace() {
    let log = "\
--> a 1 0
<-- a 1 10
--> b 2 5
<-- b 2 30
--> c 3 40
<-- c 3 50
";
    let mut aggregator = TraceAggregator::new();
    aggregator.ingest(Cursor::new(log)).unwrap();
    let processed = aggregator.finalize();

    let names = |filter: &EventFilter| -> Vec<String> {
        processed
            .filter(filter)
            .into_iter()
            .map(|i| i.function_name.clone())
            .collect()
    };

    assert_eq!(names(&EventFilter::new()), vec!["a", "b", "c"]);
    assert_eq!(names(&EventFilter::new().overlapping(20, 45)), vec!["b", "c"]);
    assert_eq!(names(&EventFilter::new().start_time(0, 6)), vec!["a", "b"]);
    assert_eq!(
        names(&EventFilter::new().start_time(0, 6).threads([2, 3])),
        vec!["b"]
    );
    assert_eq!(names(&EventFilter::new().end_time(31, 100)), vec!["c"]);
}
