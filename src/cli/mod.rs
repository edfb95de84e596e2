//! CLI interface and argument parsing
//!
//! This module builds the command-line interface from a configuration and
//! hands the parsed invocation to the engine.

pub mod app;

// Re-export main types
pub use app::*;
