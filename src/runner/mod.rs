//! Task planning and execution
//!
//! A requested task is turned into a [`Plan`] of resolved task instances,
//! which the [`Engine`] then runs through the shell.

pub mod command;
pub mod context;
pub mod engine;
pub mod env;
pub mod interpolate;
pub mod plan;
pub mod resolve;
pub mod when;

// Re-export main types
pub use command::*;
pub use context::*;
pub use engine::*;
pub use env::{get_shell, shell_from, Environment, ProcessEnv};
pub use interpolate::*;
pub use plan::*;
pub use resolve::*;
pub use when::*;
