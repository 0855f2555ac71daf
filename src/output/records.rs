//! Fixed-width binary interval records.
//!
//! Each record is eight `u32` words:
//!
//! | word | field                     |
//! |------|---------------------------|
//! | 0    | thread id                 |
//! | 1    | function dictionary index |
//! | 2    | lock dictionary index     |
//! | 3, 4 | start time, high and low  |
//! | 5, 6 | end time, high and low    |
//! | 7    | absolute stack depth      |
//!
//! Files store the words little-endian with no header.

use crate::aggregator::{CallInterval, CorpusMetadata};
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Words per record
pub const RECORD_FIELDS: usize = 8;

/// Bytes per record on disk
pub const RECORD_BYTES: usize = RECORD_FIELDS * 4;

/// One decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalRecord {
    pub thread_id: u32,
    pub function_index: u32,
    pub lock_index: u32,
    pub start_time: u64,
    pub end_time: u64,
    pub stack_depth: u32,
}

fn split(time: u64) -> (u32, u32) {
    ((time >> 32) as u32, time as u32)
}

fn join(high: u32, low: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}

impl IntervalRecord {
    /// Resolve an interval's names against the corpus dictionaries
    ///
    /// # Errors
    /// * `OutputError::UnknownName` - the function or lock was never seen
    pub fn from_interval(
        interval: &CallInterval,
        metadata: &CorpusMetadata,
    ) -> Result<Self, OutputError> {
        let function_index = metadata
            .functions
            .index_of(&interval.function_name)
            .ok_or_else(|| OutputError::UnknownName {
                kind: "function",
                name: interval.function_name.clone(),
            })?;
        let lock_index = metadata
            .lock_names
            .index_of(&interval.lock_name)
            .ok_or_else(|| OutputError::UnknownName {
                kind: "lock",
                name: interval.lock_name.clone(),
            })?;

        Ok(Self {
            thread_id: interval.thread_id,
            function_index,
            lock_index,
            start_time: interval.start_time,
            end_time: interval.end_time,
            stack_depth: interval.absolute_stack_depth,
        })
    }

    pub fn to_words(&self) -> [u32; RECORD_FIELDS] {
        let (start_high, start_low) = split(self.start_time);
        let (end_high, end_low) = split(self.end_time);
        [
            self.thread_id,
            self.function_index,
            self.lock_index,
            start_high,
            start_low,
            end_high,
            end_low,
            self.stack_depth,
        ]
    }

    pub fn from_words(words: &[u32; RECORD_FIELDS]) -> Self {
        Self {
            thread_id: words[0],
            function_index: words[1],
            lock_index: words[2],
            start_time: join(words[3], words[4]),
            end_time: join(words[5], words[6]),
            stack_depth: words[7],
        }
    }
}

/// Encode intervals into a flat word buffer
pub fn encode_records(
    intervals: &[CallInterval],
    metadata: &CorpusMetadata,
) -> Result<Vec<u32>, OutputError> {
    let mut words = Vec::with_capacity(intervals.len() * RECORD_FIELDS);
    for interval in intervals {
        words.extend(IntervalRecord::from_interval(interval, metadata)?.to_words());
    }
    Ok(words)
}

/// Decode a flat word buffer
///
/// # Errors
/// * `OutputError::TruncatedRecords` - length is not a multiple of the record width
pub fn decode_records(words: &[u32]) -> Result<Vec<IntervalRecord>, OutputError> {
    if words.len() % RECORD_FIELDS != 0 {
        return Err(OutputError::TruncatedRecords(words.len()));
    }
    Ok(words
        .chunks_exact(RECORD_FIELDS)
        .map(|chunk| {
            let mut record = [0u32; RECORD_FIELDS];
            record.copy_from_slice(chunk);
            IntervalRecord::from_words(&record)
        })
        .collect())
}

/// Write encoded intervals to a binary file
pub fn write_records(
    intervals: &[CallInterval],
    metadata: &CorpusMetadata,
    output_path: impl AsRef<Path>,
) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    info!("Writing {} interval records to: {}", intervals.len(), output_path.display());

    let words = encode_records(intervals, metadata)?;
    let mut writer = BufWriter::new(File::create(output_path)?);
    for word in words {
        writer.write_all(&word.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read records back from a binary file
pub fn read_records(input_path: impl AsRef<Path>) -> Result<Vec<IntervalRecord>, OutputError> {
    let input_path = input_path.as_ref();
    debug!("Reading interval records from: {}", input_path.display());

    let mut bytes = Vec::new();
    File::open(input_path)?.read_to_end(&mut bytes)?;
    if bytes.len() % RECORD_BYTES != 0 {
        return Err(OutputError::TruncatedRecords(bytes.len()));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    decode_records(&words)
}
