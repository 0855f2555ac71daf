use crate::utils::config::{AnalysisConfig, SCHEMA_VERSION};
use anyhow::{Context, Result};
use std::path::Path;

/// Display version information
pub fn display_version() {
    println!("TimeSquared v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Call-trace stack reconstruction, shape clustering and timeline reduction.");
}

/// Load the analysis configuration, or the built-in defaults without a path
pub fn resolve_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => crate::utils::config::load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}
