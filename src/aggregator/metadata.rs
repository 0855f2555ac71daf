//! Corpus-wide metadata and name dictionaries.
//!
//! Downstream binary records carry names as dense indices, so every name
//! dictionary keeps first-seen order and answers reverse lookups in O(1).

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// First-seen-order set of names with reverse lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameDictionary {
    names: IndexSet<String>,
}

impl NameDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a name, returning its dense index
    pub fn insert(&mut self, name: &str) -> u32 {
        if let Some(index) = self.names.get_index_of(name) {
            return index as u32;
        }
        self.names.insert_full(name.to_string()).0 as u32
    }

    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.names.get_index_of(name).map(|index| index as u32)
    }

    pub fn name(&self, index: u32) -> Option<&str> {
        self.names.get_index(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Metadata for the whole processed trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusMetadata {
    pub start_time: u64,
    pub end_time: u64,

    /// Minimum positive gap between events on any thread
    pub min_elapsed_time: Option<u64>,

    /// Largest stack-depth range of any thread
    pub max_stack_depth: u32,

    pub threads: Vec<u32>,

    /// `function` or `function:::lock` keys
    pub events: NameDictionary,
    pub functions: NameDictionary,
    pub lock_names: NameDictionary,
}

impl CorpusMetadata {
    pub fn duration(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }

    /// Human-readable summary for logging
    pub fn summary(&self) -> String {
        format!(
            "Threads: {} | Functions: {} | Locks: {} | Events: {} | Span: {} ns | Max depth: {}",
            self.threads.len(),
            self.functions.len(),
            self.lock_names.len(),
            self.events.len(),
            self.duration(),
            self.max_stack_depth
        )
    }
}
