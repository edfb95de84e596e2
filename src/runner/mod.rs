//! Task resolution and execution engine
//!
//! This module turns a parsed configuration into bound tasks and runs them:
//! option evaluation, interpolation, conditions, sub-task expansion, command
//! execution, and the checksum cache.

pub mod cache;
pub mod command;
pub mod context;
pub mod dependencies;
pub mod interpolate;
pub mod option;
pub mod registry;
pub mod resolve;
pub mod run;
pub mod task;
pub mod when;

// Re-export main types
pub use cache::*;
pub use command::*;
pub use context::*;
pub use dependencies::*;
pub use interpolate::*;
pub use option::*;
pub use registry::*;
pub use resolve::*;
pub use run::*;
pub use task::*;
pub use when::*;
