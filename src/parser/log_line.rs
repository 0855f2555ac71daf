//! Parser for instrumented trace log lines.
//!
//! Format: `"<dir> <func> <tid> <time> [<lock>...]"`
//!
//! Example: `"0 __wt_fs_unlock 33 1456966516531713211 0x18e45b8"`

use crate::utils::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lock token meaning "no lock held"
const NULL_LOCK: &str = "null";

/// Whether an event enters or exits a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Enter,
    Exit,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" | "-->" => Ok(Direction::Enter),
            "1" | "<--" => Ok(Direction::Exit),
            other => Err(format!("invalid direction '{}'", other)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Enter => write!(f, "-->"),
            Direction::Exit => write!(f, "<--"),
        }
    }
}

/// One raw trace event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub direction: Direction,
    pub function_name: String,
    pub thread_id: u32,
    /// Nanoseconds
    pub timestamp: u64,
    /// Empty when no lock is involved
    pub lock_name: String,
}

impl RawEvent {
    pub fn new(
        direction: Direction,
        function_name: impl Into<String>,
        thread_id: u32,
        timestamp: u64,
        lock_name: impl Into<String>,
    ) -> Self {
        Self {
            direction,
            function_name: function_name.into(),
            thread_id,
            timestamp,
            lock_name: lock_name.into(),
        }
    }

    pub fn has_lock(&self) -> bool {
        !self.lock_name.is_empty()
    }
}

/// Parse one log line into a `RawEvent`
///
/// # Errors
/// * `ParseError::MalformedLogLine` - missing fields or unparsable numbers
pub fn parse_line(line: &str, line_number: usize) -> Result<RawEvent, ParseError> {
    let malformed = |reason: String| ParseError::MalformedLogLine {
        line_number,
        reason,
    };

    let mut tokens = line.split_whitespace();
    let (Some(dir), Some(function_name), Some(tid), Some(time)) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(malformed(format!("expected at least 4 fields in '{}'", line)));
    };

    let direction = dir.parse::<Direction>().map_err(malformed)?;
    let thread_id = tid
        .parse::<u32>()
        .map_err(|e| malformed(format!("invalid thread id '{}': {}", tid, e)))?;
    let timestamp = time
        .parse::<u64>()
        .map_err(|e| malformed(format!("invalid timestamp '{}': {}", time, e)))?;

    // Lock names may contain spaces; fragments are rejoined with '_'
    let fragments: Vec<&str> = tokens.collect();
    let lock_name = match fragments.first() {
        None => String::new(),
        Some(&NULL_LOCK) => String::new(),
        Some(_) => fragments.join("_"),
    };

    Ok(RawEvent {
        direction,
        function_name: function_name.to_string(),
        thread_id,
        timestamp,
        lock_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enter_with_lock() {
        let event = parse_line("0 __wt_fs_unlock 33 1456966516531713211 0x18e45b8", 1).unwrap();
        assert_eq!(event.direction, Direction::Enter);
        assert_eq!(event.function_name, "__wt_fs_unlock");
        assert_eq!(event.thread_id, 33);
        assert_eq!(event.timestamp, 1456966516531713211);
        assert_eq!(event.lock_name, "0x18e45b8");
    }

    #[test]
    fn test_parse_arrow_directions() {
        assert_eq!(parse_line("--> f 1 10", 1).unwrap().direction, Direction::Enter);
        assert_eq!(parse_line("<-- f 1 10", 1).unwrap().direction, Direction::Exit);
    }

    #[test]
    fn test_null_lock_is_empty() {
        let event = parse_line("1 f 2 100 null", 1).unwrap();
        assert_eq!(event.lock_name, "");
        assert!(!event.has_lock());
    }

    #[test]
    fn test_lock_fragments_rejoined() {
        let event = parse_line("0 f 2 100 schema lock a", 1).unwrap();
        assert_eq!(event.lock_name, "schema_lock_a");
    }

    #[test]
    fn test_missing_fields() {
        let err = parse_line("0 f 2", 7).unwrap_err();
        match err {
            ParseError::MalformedLogLine { line_number, .. } => assert_eq!(line_number, 7),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(parse_line("0 f x 100", 1).is_err());
        assert!(parse_line("0 f 1 -5", 1).is_err());
        assert!(parse_line("2 f 1 5", 1).is_err());
    }
}
