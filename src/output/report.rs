//! JSON report schemas written by the CLI.
//!
//! Every report carries the schema version and a generation timestamp so
//! consumers can reject files they do not understand.

use crate::aggregator::{CorpusMetadata, IngestReport, TimeGap};
use crate::shapes::{Cluster, ClusterGroup, PatternId};
use crate::timeline::panels::TimeframePanel;
use crate::timeline::reducer::ReducedThread;
use crate::utils::config::SCHEMA_VERSION;
use chrono::Utc;
use serde::{Deserialize, Serialize};

fn generated_at() -> String {
    Utc::now().to_rfc3339()
}

/// Result of processing one trace log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Log file that was processed
    pub source: String,

    pub metadata: CorpusMetadata,

    /// Line, event and error counters from ingestion
    pub ingest: IngestReport,

    /// Idle gaps long enough to collapse when rendering
    pub compressed_regions: Vec<TimeGap>,

    /// Number of interval records written alongside this report
    pub interval_count: usize,

    /// Timestamp when the report was generated
    pub generated_at: String,
}

impl TraceReport {
    pub fn new(
        source: impl Into<String>,
        metadata: CorpusMetadata,
        ingest: IngestReport,
        compressed_regions: Vec<TimeGap>,
        interval_count: usize,
    ) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            source: source.into(),
            metadata,
            ingest,
            compressed_regions,
            interval_count,
            generated_at: generated_at(),
        }
    }
}

/// Shape ordering and clustering of one mined document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterReport {
    pub version: String,

    pub shape_count: usize,

    /// Every shape id in the total order
    pub ordered_shapes: Vec<PatternId>,

    pub clusters: Vec<Cluster>,

    pub groups: Vec<ClusterGroup>,

    /// Whether the metric axioms were checked
    pub verified: bool,

    pub generated_at: String,
}

impl ClusterReport {
    pub fn new(
        ordered_shapes: Vec<PatternId>,
        clusters: Vec<Cluster>,
        groups: Vec<ClusterGroup>,
        verified: bool,
    ) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            shape_count: ordered_shapes.len(),
            ordered_shapes,
            clusters,
            groups,
            verified,
            generated_at: generated_at(),
        }
    }
}

/// Reduced lanes for one viewport width
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneReport {
    pub version: String,

    /// Pixel width the lanes were reduced to
    pub width: u32,

    pub duration: u64,

    pub absolute_start_time: String,

    pub panels: Vec<TimeframePanel>,

    pub threads: Vec<ReducedThread>,

    pub generated_at: String,
}

impl LaneReport {
    pub fn new(
        width: u32,
        duration: u64,
        absolute_start_time: impl Into<String>,
        panels: Vec<TimeframePanel>,
        threads: Vec<ReducedThread>,
    ) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            width,
            duration,
            absolute_start_time: absolute_start_time.into(),
            panels,
            threads,
            generated_at: generated_at(),
        }
    }
}
