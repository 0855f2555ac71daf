//! Output writers for reports and interval records.
//!
//! This module handles writing data to disk in various formats:
//! - JSON reports (trace metadata, clusters, reduced lanes)
//! - Fixed-width binary interval records

pub mod json;
pub mod records;
pub mod report;

// Re-export main functions
pub use json::{read_json, to_json_string, write_json};
pub use records::{
    decode_records, encode_records, read_records, write_records, IntervalRecord, RECORD_FIELDS,
};
pub use report::{ClusterReport, LaneReport, TraceReport};
