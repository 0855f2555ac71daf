//! TimeSquared
//!
//! Turns function-call and lock traces of instrumented programs into data
//! for timeline visualization:
//!
//! - per-thread call intervals with stack depth, rebuilt from enter/exit
//!   events (`aggregator`)
//! - a metric space over recurring call-pattern shapes, with similarity
//!   search and clustering (`shapes`)
//! - resolution-reduced lanes holding one representative pattern per pixel
//!   column (`timeline`)
//!
//! ## Getting Started
//!
//! ```bash
//! timesquared process --input run.log --output trace.json --records trace.bin
//! timesquared shapes --input patterns.json --output clusters.json --verify
//! timesquared reduce --input patterns.json --output lanes.json --width 1200
//! ```

pub mod aggregator;
pub mod commands;
pub mod output;
pub mod parser;
pub mod shapes;
pub mod timeline;
pub mod utils;
