//! Drover - a declarative YAML task runner
//!
//! Tasks are declared in a `drover.yml` file with their options, arguments,
//! run conditions and `pre`/`post` dependencies. A requested task is resolved
//! into an ordered plan of task instances before any command runs.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod ui;

// Re-export commonly used types
pub use error::{DroverError, Result};

/// Current version of Drover
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
