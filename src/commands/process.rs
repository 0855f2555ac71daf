//! Process command implementation.
//!
//! The process command:
//! 1. Ingests a trace log, rebuilding call stacks per thread
//! 2. Finds idle gaps worth compressing
//! 3. Finalizes intervals and applies an optional filter
//! 4. Writes interval records and the JSON report

use crate::aggregator::{EventFilter, TraceAggregator};
use crate::output::{read_json, write_json, write_records, TraceReport};
use crate::utils::config::AnalysisConfig;
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the process command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct ProcessArgs {
    /// Trace log to read
    pub input: PathBuf,

    /// Output path for the JSON report
    pub output_json: PathBuf,

    /// Output path for binary interval records (optional)
    pub output_records: Option<PathBuf>,

    /// JSON-encoded `EventFilter` applied before writing records (optional)
    pub filter: Option<PathBuf>,

    pub config: AnalysisConfig,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for ProcessArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::from("trace.log"),
            output_json: PathBuf::from("trace.json"),
            output_records: None,
            filter: None,
            config: AnalysisConfig::default(),
            print_summary: false,
        }
    }
}

/// Execute the process command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Unreadable input or filter file
/// * Dictionary or file write errors while writing outputs
///
/// # Example
/// ```ignore
/// let args = ProcessArgs {
///     input: PathBuf::from("run.log"),
///     output_records: Some(PathBuf::from("run.bin")),
///     ..Default::default()
/// };
/// execute_process(args)?;
/// ```
pub fn execute_process(args: ProcessArgs) -> Result<()> {
    let start_time = Instant::now();

    info!("Processing trace log: {}", args.input.display());

    // Step 1: Ingest log lines
    info!("Step 1/4: Ingesting trace events...");
    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open trace log {}", args.input.display()))?;
    let mut aggregator = TraceAggregator::new();
    let ingest = aggregator
        .ingest(BufReader::new(file))
        .context("Failed to read trace log")?;
    debug!("Saw {} threads", aggregator.thread_count());

    // Step 2: Compressed regions
    info!("Step 2/4: Detecting compressed regions...");
    let compressed_regions = match (aggregator.time_span(), aggregator.min_elapsed_time()) {
        (Some((from, to)), Some(min_elapsed)) => {
            let threshold =
                min_elapsed.saturating_mul(args.config.trace.compressed_region_factor);
            debug!("Compression threshold: {} ns", threshold);
            aggregator.compressed_regions(from, to, threshold)
        }
        _ => Vec::new(),
    };
    debug!("Found {} compressed regions", compressed_regions.len());

    // Step 3: Finalize and filter
    info!("Step 3/4: Finalizing intervals...");
    let processed = aggregator.finalize();
    let filter = match &args.filter {
        Some(path) => read_json::<EventFilter>(path)
            .with_context(|| format!("Failed to read event filter {}", path.display()))?,
        None => EventFilter::new(),
    };
    let selected: Vec<_> = processed.filter(&filter).into_iter().cloned().collect();
    if args.filter.is_some() {
        info!(
            "Filter kept {} of {} intervals",
            selected.len(),
            processed.intervals.len()
        );
    }

    // Step 4: Write outputs
    info!("Step 4/4: Writing output files...");
    if let Some(records_path) = &args.output_records {
        write_records(&selected, &processed.metadata, records_path)
            .context("Failed to write interval records")?;
        info!("✓ Records written to: {}", records_path.display());
    }

    let report = TraceReport::new(
        args.input.display().to_string(),
        processed.metadata,
        ingest,
        compressed_regions,
        selected.len(),
    );
    write_json(&report, &args.output_json).context("Failed to write trace report")?;
    info!("✓ Report written to: {}", args.output_json.display());

    if args.print_summary {
        print_summary(&report);
    }

    let elapsed = start_time.elapsed();
    info!("Processing completed in {:.2}s", elapsed.as_secs_f64());

    Ok(())
}

fn print_summary(report: &TraceReport) {
    let metadata = &report.metadata;
    println!("\n{}", "=".repeat(80));
    println!("TRACE SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Source:      {}", report.source);
    println!("Lines:       {}", report.ingest.lines);
    println!("Events:      {}", report.ingest.events);
    println!("Malformed:   {}", report.ingest.malformed);
    println!("Mismatches:  {}", report.ingest.mismatches.len());
    println!("Intervals:   {}", report.interval_count);
    println!("{}", metadata.summary());
    println!("Compressed regions: {}", report.compressed_regions.len());
    println!("{}", "=".repeat(80));
}

/// Validate process arguments
///
/// **Public** - can be called before execute_process for early validation
pub fn validate_args(args: &ProcessArgs) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Trace log not found: {}", args.input.display());
    }

    if args.output_records.as_ref() == Some(&args.output_json) {
        anyhow::bail!("Records and report cannot be written to the same file");
    }

    args.config.validate().context("Invalid analysis configuration")?;

    Ok(())
}
