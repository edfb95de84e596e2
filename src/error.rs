//! Error types for Errand

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Errand operations
pub type Result<T> = std::result::Result<T, ErrandError>;

/// Main error type for Errand
#[derive(Error, Debug)]
pub enum ErrandError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Argument/option binding and value errors
    #[error("{0}")]
    Resolve(#[from] ResolveError),

    /// Task execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Checksum cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Task '{0}': source cannot be defined without target")]
    SourceWithoutTarget(String),

    #[error("Task '{0}': target cannot be defined without source")]
    TargetWithoutSource(String),

    #[error("Argument and option '{0}' must have unique names within a task")]
    DuplicateNames(String),

    #[error("Option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },

    #[error("Unsupported type '{0}' (expected string, int, float or bool)")]
    UnsupportedType(String),

    #[error("Default value cannot set both 'value' and 'command'")]
    ValueAndCommand,

    #[error("Run item cannot combine {0}")]
    AmbiguousRun(String),

    #[error("Failed to include file '{path}': {error}")]
    IncludeFile { path: PathBuf, error: String },

    #[error("Failed to load env file '{path}': {error}")]
    EnvFile { path: PathBuf, error: String },
}

/// Binding and value errors raised while resolving a task invocation
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Task '{0}' is not defined")]
    TaskNotFound(String),

    #[error("Sub-task '{0}' does not exist")]
    SubTaskNotFound(String),

    #[error("Task '{task}' requires exactly {expected} args, got {got}")]
    ArgCount {
        task: String,
        expected: usize,
        got: usize,
    },

    #[error("Option '{option}' cannot be passed to task '{task}'")]
    UnknownOption { task: String, option: String },

    #[error("No value passed for required option '{0}'")]
    MissingOption(String),

    #[error("Value '{value}' for {kind} '{name}' must be one of: {allowed}")]
    NotAllowed {
        kind: &'static str,
        name: String,
        value: String,
        allowed: String,
    },

    #[error("Value '{value}' for {kind} '{name}' is not a valid {ty}")]
    InvalidType {
        kind: &'static str,
        name: String,
        value: String,
        ty: String,
    },

    #[error("Sub-task cycle detected: {0}")]
    Cycle(String),

    #[error("Failed to scan task for variables: {0}")]
    Dump(#[from] serde_yaml::Error),

    #[error("Failed to evaluate default for '{name}': {source}")]
    Default {
        name: String,
        #[source]
        source: ExecutionError,
    },
}

/// Task execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command failed with exit code {0:?}")]
    CommandFailed(Option<i32>),

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Interpreter must not be empty")]
    EmptyInterpreter,

    #[error("Failed to check path '{path}': {source}")]
    PathCheck {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Sub-task '{0}' was not expanded before execution")]
    UnresolvedSubTask(String),
}

/// Checksum cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("No user cache directory is available on this platform")]
    NoCacheDir,

    #[error("Invalid glob pattern '{pattern}': {error}")]
    Pattern { pattern: String, error: String },

    #[error("Glob '{0}' did not match any files")]
    NoMatch(String),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Checksum worker failed: {0}")]
    Worker(String),
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for resolution operations
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Specialized result type for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;
