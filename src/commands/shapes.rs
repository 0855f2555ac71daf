//! Shapes command implementation.
//!
//! Strips a mined pattern document into a shape forest, builds the shape
//! metric, optionally verifies it, clusters the shapes and writes a cluster
//! report.

use crate::output::{write_json, ClusterReport};
use crate::parser::{read_document, strip_shapes, to_program};
use crate::shapes::{verify_metric, verify_order, ShapeClusterer, ShapeMetric};
use crate::timeline::verify_disjoint_lanes;
use crate::utils::config::AnalysisConfig;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the shapes command
#[derive(Debug, Clone)]
pub struct ShapesArgs {
    /// Mined pattern document
    pub input: PathBuf,

    /// Output path for the cluster report
    pub output: PathBuf,

    /// Check the metric axioms, the total order and lane disjointness
    pub verify: bool,

    pub config: AnalysisConfig,
}

/// Execute the shapes command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Unreadable or inconsistent pattern document
/// * Failed verification when `verify` is set
/// * File write errors
pub fn execute_shapes(args: ShapesArgs) -> Result<()> {
    let start_time = Instant::now();

    info!("Step 1/4: Reading mined patterns from {}...", args.input.display());
    let document = read_document(&args.input).context("Failed to read pattern document")?;
    let shapes = strip_shapes(&document).context("Failed to strip pattern shapes")?;
    debug!("Stripped {} shapes", shapes.len());

    info!("Step 2/4: Computing shape distances...");
    let metric = ShapeMetric::from_shapes(shapes.clone(), &args.config.shapes)
        .context("Failed to build shape metric")?;

    if args.verify {
        info!("Step 3/4: Verifying metric and order...");
        verify_metric(&metric).context("Shape distance is not a metric")?;
        verify_order(&metric).context("Shape order is not a strict total order")?;
        let program = to_program(&document, &shapes).context("Failed to build timeline")?;
        verify_disjoint_lanes(&program).context("Pattern lanes overlap")?;
        info!("✓ Metric, order and lanes verified");
    } else {
        info!("Step 3/4: Skipping verification (not requested)");
    }

    info!("Step 4/4: Clustering shapes...");
    let clusterer = ShapeClusterer::new(&metric, args.config.shapes.cluster_distance);
    let report = ClusterReport::new(
        metric.sorted_ids(),
        clusterer.clusters().to_vec(),
        clusterer.groups().to_vec(),
        args.verify,
    );
    write_json(&report, &args.output).context("Failed to write cluster report")?;
    info!("✓ Cluster report written to: {}", args.output.display());

    info!(
        "Shapes completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
