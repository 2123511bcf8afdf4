//! CLI interface and argument parsing
//!
//! The command line is generated from the loaded configuration: one
//! subcommand per public task, one flag per public option.

pub mod app;

// Re-export main types
pub use app::*;
