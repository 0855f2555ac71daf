//! Reduce command implementation.
//!
//! The reduce command:
//! 1. Reads a mined pattern document and builds its timeline
//! 2. Keeps the most frequent patterns per thread
//! 3. Optionally relabels patterns by shape cluster
//! 4. Reduces every lane to one pattern per pixel column
//! 5. Writes the lanes and their timeframe panels

use crate::output::{write_json, LaneReport};
use crate::parser::{read_document, strip_shapes, to_program};
use crate::shapes::{ShapeClusterer, ShapeMetric};
use crate::timeline::panels::{panels_around, TimePixelConverter};
use crate::timeline::reducer::ResolutionReducer;
use crate::timeline::{select_top_patterns, verify_disjoint_lanes};
use crate::utils::config::AnalysisConfig;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the reduce command
#[derive(Debug, Clone)]
pub struct ReduceArgs {
    /// Mined pattern document
    pub input: PathBuf,

    /// Output path for the lane report
    pub output: PathBuf,

    /// Viewport width in pixels
    pub width: u32,

    /// Patterns kept per thread; the config value when `None`
    pub top: Option<usize>,

    /// Replace shapes by their clusters before reducing
    pub cluster: bool,

    pub config: AnalysisConfig,
}

/// Execute the reduce command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Unreadable or inconsistent pattern document
/// * File write errors
///
/// # Example
/// ```ignore
/// let args = ReduceArgs {
///     input: PathBuf::from("patterns.json"),
///     output: PathBuf::from("lanes.json"),
///     width: 1200,
///     top: Some(10),
///     cluster: true,
///     config: AnalysisConfig::default(),
/// };
/// execute_reduce(args)?;
/// ```
pub fn execute_reduce(args: ReduceArgs) -> Result<()> {
    let start_time = Instant::now();

    info!("Step 1/5: Reading mined patterns from {}...", args.input.display());
    let document = read_document(&args.input).context("Failed to read pattern document")?;
    let shapes = strip_shapes(&document).context("Failed to strip pattern shapes")?;
    let program = to_program(&document, &shapes).context("Failed to build timeline")?;

    let top = args.top.unwrap_or(args.config.timeline.top_patterns);
    info!("Step 2/5: Selecting top {} patterns per thread...", top);
    let mut program = select_top_patterns(&program, top);

    if args.cluster {
        info!("Step 3/5: Relabeling patterns by cluster...");
        let metric = ShapeMetric::from_shapes(shapes, &args.config.shapes)
            .context("Failed to build shape metric")?;
        let clusterer = ShapeClusterer::new(&metric, args.config.shapes.cluster_distance);
        program = clusterer.relabel(&program);
    } else {
        info!("Step 3/5: Skipping clustering (not requested)");
    }

    // Lanes are still reduced when this fails; overlapping spans only
    // skew the column weights
    if let Err(err) = verify_disjoint_lanes(&program) {
        warn!("{}", err);
    }

    info!("Step 4/5: Reducing lanes to {} columns...", args.width);
    let reducer = ResolutionReducer::new(args.width, &args.config.timeline);
    let threads = reducer.reduce_program(&program);

    let partition = reducer.partition_length(program.duration);
    let converter = TimePixelConverter::new(&panels_around(0, program.duration, partition, &[]))
        .context("Failed to lay out timeframe panels")?;
    debug!(
        "Panels span {} pixels at {} ns per pixel",
        converter.total_pixel_length(),
        partition
    );

    info!("Step 5/5: Writing lane report...");
    let report = LaneReport::new(
        args.width,
        program.duration,
        program.absolute_start_time.clone(),
        converter.panels().to_vec(),
        threads,
    );
    write_json(&report, &args.output).context("Failed to write lane report")?;
    info!("✓ Lane report written to: {}", args.output.display());

    info!(
        "Reduction completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Validate reduce arguments
///
/// **Public** - can be called before execute_reduce for early validation
pub fn validate_args(args: &ReduceArgs) -> Result<()> {
    if args.width == 0 {
        anyhow::bail!("width must be greater than 0");
    }

    if args.top == Some(0) {
        anyhow::bail!("top must be greater than 0");
    }

    args.config.validate().context("Invalid analysis configuration")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(width: u32, top: Option<usize>) -> ReduceArgs {
        ReduceArgs {
            input: PathBuf::from("patterns.json"),
            output: PathBuf::from("lanes.json"),
            width,
            top,
            cluster: false,
            config: AnalysisConfig::default(),
        }
    }

    #[test]
    fn test_validate_args_valid() {
        assert!(validate_args(&args(1200, Some(10))).is_ok());
        assert!(validate_args(&args(1, None)).is_ok());
    }

    #[test]
    fn test_validate_args_zero_width() {
        assert!(validate_args(&args(0, None)).is_err());
    }

    #[test]
    fn test_validate_args_zero_top() {
        assert!(validate_args(&args(100, Some(0))).is_err());
    }
}
