//! Aggregation of raw trace events into call intervals and corpus metadata.
//!
//! This module transforms parsed trace events into:
//! - Per-thread call intervals with stack depth
//! - Corpus metadata with name dictionaries
//! - Compressed regions (long gaps without activity)
//! - Filtered interval streams

pub mod filter;
pub mod metadata;
pub mod stack_builder;
pub mod trace;

// Re-export main types and functions
pub use filter::{Constraint, EventFilter, TimeRange};
pub use metadata::{CorpusMetadata, NameDictionary};
pub use stack_builder::{CallInterval, StackReconstructor, ThreadMetadata};
pub use trace::{IngestError, IngestReport, ProcessedTrace, TimeGap, TraceAggregator};
