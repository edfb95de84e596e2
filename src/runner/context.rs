//! Execution context for task running
//!
//! The context carries everything a run needs from the outside world: where to
//! run, which interpreter to use, where to log, and where checksums live.

use crate::runner::Cache;
use crate::ui::Logger;
use std::env;
use std::path::PathBuf;

/// Interpreter used when neither the config nor the caller picks one
pub const DEFAULT_INTERPRETER: &[&str] = &["sh", "-c"];

/// Execution context that tracks state during task execution
#[derive(Debug, Clone)]
pub struct Context {
    /// Current working directory
    pub working_dir: PathBuf,

    /// Configuration file path, used to namespace the cache
    pub config_path: Option<PathBuf>,

    /// Interpreter prefix for every shell snippet (e.g., ["bash", "-c"])
    pub interpreter: Vec<String>,

    /// Stack of non-private tasks being executed, for log labels
    pub task_stack: Vec<String>,

    /// Output sink
    pub logger: Logger,

    /// Checksum cache for tasks with source and target
    pub cache: Cache,
}

impl Context {
    /// Create a new context with default settings
    pub fn new() -> Self {
        Context {
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_path: None,
            interpreter: DEFAULT_INTERPRETER.iter().map(|s| s.to_string()).collect(),
            task_stack: Vec::new(),
            logger: Logger::default(),
            cache: Cache::disabled(),
        }
    }

    /// Create a context with a specific working directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    /// Set the configuration file path
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Set the interpreter
    pub fn with_interpreter(mut self, interpreter: Vec<String>) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Set the output sink
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Set the checksum cache
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = cache;
        self
    }

    /// Push a task onto the execution stack
    pub fn push_task(&mut self, task_name: String) {
        self.task_stack.push(task_name);
    }

    /// Pop a task from the execution stack
    pub fn pop_task(&mut self) -> Option<String> {
        self.task_stack.pop()
    }

    /// Get the current task name (top of stack)
    pub fn current_task(&self) -> Option<&String> {
        self.task_stack.last()
    }

    /// Label for log lines, e.g. `build > compile`
    pub fn label(&self) -> String {
        if self.task_stack.is_empty() {
            "errand".to_string()
        } else {
            self.task_stack.join(" > ")
        }
    }

    /// Path used to namespace cache entries
    pub fn cache_key_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| self.working_dir.clone())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
