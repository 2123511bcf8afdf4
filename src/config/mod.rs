//! Configuration parsing and validation
//!
//! This module handles parsing of drover.yml configuration files
//! and validation of configuration structure.

pub mod ordered;
pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use ordered::{parse_ordered_map, OrderedMap};
pub use parse::*;
pub use schema::{validate_config, validate_task, RESERVED_NAMES, RESERVED_SHORTS};
pub use types::*;
