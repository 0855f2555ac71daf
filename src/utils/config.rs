//! Configuration and constants for trace processing and shape analysis.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current output schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

// Pattern ids below this value name single-function patterns (id = function id).
pub const PATTERN_BASE: u32 = 10_000;
pub const NULL_PATTERN_ID: u32 = PATTERN_BASE;
pub const NULL_FUNCTION_ID: i32 = -1;

pub const FUNCTION_DISTANCE: f64 = 1.0;
pub const NULL_FUNCTION_DISTANCE: f64 = 0.5;
pub const CLUSTER_DISTANCE: f64 = 1.5;

// Low-discrepancy cycle used by the resolution reducer: x -> (x + 31) mod 100.
pub const CYCLE_INCREMENT: u32 = 31;
pub const CYCLE_MODULUS: u32 = 100;
pub const DAMPENING_EXPONENT: f64 = 0.25;

/// Gaps longer than this many minimum elapsed times are compressed regions
pub const COMPRESSED_REGION_FACTOR: u64 = 2000;

/// Pixel width of a collapsed compressed-region panel
pub const COMPRESSED_PANEL_WIDTH: u64 = 50;

/// Number of patterns per thread kept for display
pub const DEFAULT_TOP_PATTERNS: usize = 20;

/// Separator between function and lock name in distinct event keys
pub const EVENT_KEY_SEPARATOR: &str = ":::";

/// Complete analysis configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub shapes: ShapeConfig,

    #[serde(default)]
    pub timeline: TimelineConfig,

    #[serde(default)]
    pub trace: TraceConfig,
}

/// Shape metric and clustering parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShapeConfig {
    /// Distance between two different, non-null base functions
    pub function_distance: f64,

    /// Distance between a base function and the null function
    pub null_function_distance: f64,

    /// Maximum pairwise distance inside a cluster
    pub cluster_distance: f64,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            function_distance: FUNCTION_DISTANCE,
            null_function_distance: NULL_FUNCTION_DISTANCE,
            cluster_distance: CLUSTER_DISTANCE,
        }
    }
}

/// Resolution reducer parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub cycle_increment: u32,
    pub cycle_modulus: u32,
    pub cycle_seed: u32,
    pub dampening_exponent: f64,
    pub top_patterns: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            cycle_increment: CYCLE_INCREMENT,
            cycle_modulus: CYCLE_MODULUS,
            cycle_seed: 0,
            dampening_exponent: DAMPENING_EXPONENT,
            top_patterns: DEFAULT_TOP_PATTERNS,
        }
    }
}

/// Trace ingestion parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceConfig {
    pub compressed_region_factor: u64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            compressed_region_factor: COMPRESSED_REGION_FACTOR,
        }
    }
}

impl AnalysisConfig {
    /// Check that the parameters keep the shape distance a metric and the
    /// reducer well defined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let shapes = &self.shapes;
        if shapes.null_function_distance <= 0.0 || shapes.function_distance <= 0.0 {
            return Err(ConfigError::Invalid(
                "function distances must be positive".to_string(),
            ));
        }
        // d(a, b) <= d(a, null) + d(null, b)
        if shapes.function_distance > 2.0 * shapes.null_function_distance {
            return Err(ConfigError::Invalid(format!(
                "function_distance {} exceeds twice null_function_distance {}",
                shapes.function_distance, shapes.null_function_distance
            )));
        }
        if shapes.cluster_distance < 0.0 {
            return Err(ConfigError::Invalid(
                "cluster_distance must not be negative".to_string(),
            ));
        }

        let timeline = &self.timeline;
        if timeline.cycle_modulus == 0 {
            return Err(ConfigError::Invalid("cycle_modulus must be > 0".to_string()));
        }
        if !(timeline.dampening_exponent > 0.0 && timeline.dampening_exponent <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "dampening_exponent {} must be in (0, 1]",
                timeline.dampening_exponent
            )));
        }
        Ok(())
    }
}

/// Load an analysis configuration from a TOML file
///
/// Missing tables and fields fall back to the built-in constants.
///
/// # Example
/// ```ignore
/// let config = load_config("timesquared.toml")?;
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<AnalysisConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: AnalysisConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [shapes]
            cluster_distance = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.shapes.cluster_distance, 2.0);
        assert_eq!(config.shapes.function_distance, FUNCTION_DISTANCE);
        assert_eq!(config.timeline.cycle_increment, CYCLE_INCREMENT);
        assert_eq!(config.trace.compressed_region_factor, COMPRESSED_REGION_FACTOR);
    }

    #[test]
    fn test_rejects_non_metric_function_distance() {
        let mut config = AnalysisConfig::default();
        config.shapes.function_distance = 1.5;
        config.shapes.null_function_distance = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_modulus() {
        let mut config = AnalysisConfig::default();
        config.timeline.cycle_modulus = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timesquared.toml");
        fs::write(&path, "[timeline]\ncycle_seed = 7\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.timeline.cycle_seed, 7);
    }
}
