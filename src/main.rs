//! TimeSquared CLI
//!
//! Processes call traces into interval records and reduces mined call
//! patterns into pixel lanes.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use timesquared::commands::{
    display_version, execute_process, execute_reduce, execute_shapes, process, reduce,
    resolve_config, ProcessArgs, ReduceArgs, ShapesArgs,
};

/// TimeSquared - call-trace timelines
#[derive(Parser, Debug)]
#[command(name = "timesquared")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Analysis configuration (TOML)
    #[arg(long, global = true, env = "TIMESQUARED_CONFIG")]
    config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild call intervals from a trace log
    Process {
        /// Trace log to read
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the JSON report
        #[arg(short, long, default_value = "trace.json")]
        output: PathBuf,

        /// Output path for binary interval records
        #[arg(short, long)]
        records: Option<PathBuf>,

        /// JSON event filter applied before writing records
        #[arg(short, long)]
        filter: Option<PathBuf>,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Order and cluster the shapes of a mined pattern document
    Shapes {
        /// Mined pattern document
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the cluster report
        #[arg(short, long, default_value = "clusters.json")]
        output: PathBuf,

        /// Check metric axioms, total order and lane disjointness
        #[arg(long)]
        verify: bool,
    },

    /// Reduce pattern lanes to one pattern per pixel column
    Reduce {
        /// Mined pattern document
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the lane report
        #[arg(short, long, default_value = "lanes.json")]
        output: PathBuf,

        /// Viewport width in pixels
        #[arg(short, long, default_value = "1200", env = "TIMESQUARED_WIDTH")]
        width: u32,

        /// Patterns kept per thread
        #[arg(long)]
        top: Option<usize>,

        /// Relabel patterns by shape cluster first
        #[arg(long)]
        cluster: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Process {
            input,
            output,
            records,
            filter,
            summary,
        } => {
            let args = ProcessArgs {
                input,
                output_json: output,
                output_records: records,
                filter,
                config: resolve_config(cli.config.as_deref())?,
                print_summary: summary,
            };
            process::validate_args(&args)?;
            execute_process(args)?;
        }

        Commands::Shapes {
            input,
            output,
            verify,
        } => {
            execute_shapes(ShapesArgs {
                input,
                output,
                verify,
                config: resolve_config(cli.config.as_deref())?,
            })?;
        }

        Commands::Reduce {
            input,
            output,
            width,
            top,
            cluster,
        } => {
            let args = ReduceArgs {
                input,
                output,
                width,
                top,
                cluster,
                config: resolve_config(cli.config.as_deref())?,
            };
            reduce::validate_args(&args)?;
            execute_reduce(args)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
