//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod process;
pub mod reduce;
pub mod shapes;
pub mod utils;

// Re-export main command functions
pub use process::{execute_process, ProcessArgs};
pub use reduce::{execute_reduce, ReduceArgs};
pub use shapes::{execute_shapes, ShapesArgs};
pub use utils::{display_version, resolve_config};
