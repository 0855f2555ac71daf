//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use crate::shapes::PatternId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while parsing trace log lines and mined pattern documents
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed log line {line_number}: {reason}")]
    MalformedLogLine { line_number: usize, reason: String },

    #[error("Invalid pattern document: {0}")]
    InvalidDocument(String),
}

/// Errors reported while reconstructing call stacks
///
/// None of these abort ingestion; they are collected and logged.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraceError {
    #[serde(rename_all = "camelCase")]
    #[error(
        "Corrupt trace on thread {thread_id}{}: exit of {found_function}[{found_lock}] \
         while {expected_function}[{expected_lock}] is open",
        line_suffix(.line_number)
    )]
    StackMismatch {
        thread_id: u32,
        line_number: Option<usize>,
        expected_function: String,
        expected_lock: String,
        found_function: String,
        found_lock: String,
    },
}

fn line_suffix(line_number: &Option<usize>) -> String {
    line_number
        .map(|line| format!(" (line {})", line))
        .unwrap_or_default()
}

/// Errors that can occur while building the shape forest and its metric
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("Duplicate shape id: {0}")]
    DuplicateShape(PatternId),

    #[error("Shape {parent} references unknown child pattern {child}")]
    UnknownChild { parent: PatternId, child: PatternId },

    #[error("Unknown shape id: {0}")]
    UnknownShape(PatternId),

    #[error("Shape {id} declares depth {declared} but its children imply depth {expected}")]
    InconsistentDepth {
        id: PatternId,
        declared: u32,
        expected: u32,
    },

    #[error("Distance computation cancelled")]
    Cancelled,

    #[error("Metric inconsistency: {0}")]
    MetricInconsistency(String),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    #[error("{kind} name not present in corpus dictionary: {name}")]
    UnknownName { kind: &'static str, name: String },

    #[error("Record buffer length {0} is not a multiple of the record width")]
    TruncatedRecords(usize),
}

/// Errors that can occur while loading analysis configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config TOML parse error: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors found while checking timeline programs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error(
        "Thread {thread} depth {depth}: pattern {second} starts at {start} inside pattern {first}"
    )]
    OverlappingIntervals {
        thread: String,
        depth: u32,
        first: PatternId,
        second: PatternId,
        start: u64,
    },

    #[error("Panel {index} has zero resolution")]
    ZeroResolution { index: usize },
}
