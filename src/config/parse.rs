//! Configuration file parsing and discovery

use crate::config::types::{Config, EnvFile, Task};
use crate::error::{ConfigError, ConfigResult, ErrandError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file names to search for
pub const CONFIG_FILE_NAMES: &[&str] = &["errand.yml", "errand.yaml"];

/// Env file loaded when the configuration does not name any
const DEFAULT_ENV_FILE: &str = ".env";

/// Find the configuration file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the configuration file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a configuration file from a path
pub fn parse_config_file(path: &Path) -> Result<Config, ErrandError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    parse_config(&contents, Some(path))
}

/// Parse configuration from a string
///
/// Task includes are resolved relative to `config_path` when one is given.
pub fn parse_config(yaml: &str, config_path: Option<&Path>) -> Result<Config, ErrandError> {
    let mut config: Config = serde_yaml::from_str(yaml)?;

    if let Some(base_path) = config_path {
        process_includes(&mut config, base_path)?;
    }

    Ok(config)
}

/// Replace every `include: path` task with the task defined in that file
fn process_includes(config: &mut Config, config_path: &Path) -> ConfigResult<()> {
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    for (name, task) in config.tasks.iter_mut() {
        let Some(include_path) = task.include.clone() else {
            continue;
        };

        if has_body(task) {
            return Err(ConfigError::Invalid(format!(
                "task '{}' uses include and cannot define other keys",
                name
            )));
        }

        let full_path = base_dir.join(&include_path);
        debug!(task = %name, path = %full_path.display(), "including task");
        *task = load_included_task(&full_path)?;
    }

    Ok(())
}

fn has_body(task: &Task) -> bool {
    task.usage.is_some()
        || task.description.is_some()
        || task.private
        || task.quiet
        || !task.args.is_empty()
        || !task.options.is_empty()
        || !task.run.is_empty()
        || !task.finally.is_empty()
        || !task.source.is_empty()
        || !task.target.is_empty()
}

/// Load a task from an included file
fn load_included_task(path: &Path) -> ConfigResult<Task> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::IncludeFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let task: Task = serde_yaml::from_str(&contents).map_err(|e| ConfigError::IncludeFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    if task.include.is_some() {
        return Err(ConfigError::IncludeFile {
            path: path.to_path_buf(),
            error: "included tasks cannot include other files".to_string(),
        });
    }

    Ok(task)
}

/// Load the configured env files into the process environment
///
/// Variables that are already set are left untouched. Without an `env-file`
/// key, an optional `.env` next to the config file is loaded.
pub fn load_env_files(config: &Config, config_dir: &Path) -> ConfigResult<()> {
    let default_files = [EnvFile {
        path: DEFAULT_ENV_FILE.to_string(),
        required: false,
    }];
    let files = config.env_file.as_deref().unwrap_or(&default_files);

    for file in files {
        let path = config_dir.join(&file.path);
        if !path.is_file() {
            if file.required {
                return Err(ConfigError::EnvFile {
                    path,
                    error: "file not found".to_string(),
                });
            }
            debug!(path = %path.display(), "skipping missing optional env file");
            continue;
        }

        dotenvy::from_path(&path).map_err(|e| ConfigError::EnvFile {
            path: path.clone(),
            error: e.to_string(),
        })?;
        debug!(path = %path.display(), "loaded env file");
    }

    Ok(())
}
