//! Input parsing.
//!
//! This module handles:
//! - Parsing raw trace log lines into events
//! - Reading mined pattern documents
//! - Stripping mined patterns into a shape forest

pub mod log_line;
pub mod patterns;

// Re-export main types
pub use log_line::{parse_line, Direction, RawEvent};
pub use patterns::{
    parse_document, read_document, strip_shapes, to_program, MinedDocument, MinedPattern,
    MinedShape, MinedThread,
};
