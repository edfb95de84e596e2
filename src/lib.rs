//! Errand - a YAML-based task runner
//!
//! A configuration file declares tasks with positional args, options,
//! conditional steps, and calls to other tasks. Errand resolves option values,
//! expands the task graph into bound tasks, and runs their shell steps,
//! skipping tasks whose source and target files are unchanged since the last
//! run.
//!
//! ```no_run
//! use errand::runner::{resolve, Context, Flags};
//!
//! let config = "tasks:\n  hello:\n    run: echo hello\n";
//! let resolved = resolve(config, "hello", &[], &Flags::new())?;
//! resolved.task.execute(&mut Context::new())?;
//! # Ok::<(), errand::ErrandError>(())
//! ```

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod ui;

// Re-export commonly used types
pub use error::{ErrandError, Result};

/// Current version of Errand
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
