//! Common test utilities

#![allow(dead_code)]

use errand::config::parse_config_file;
use errand::runner::{Cache, Context, Flags, Registry, Resolver};
use errand::ui::{Logger, Verbosity};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary directory with an errand.yml file
pub fn create_test_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("errand.yml");
    fs::write(&config_path, content).unwrap();
    (temp_dir, config_path)
}

/// Create a test config with an empty subdirectory next to it
pub fn create_test_config_in_subdir(content: &str) -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("errand.yml");
    let sub_dir = temp_dir.path().join("subdir");

    fs::write(&config_path, content).unwrap();
    fs::create_dir(&sub_dir).unwrap();

    (temp_dir, config_path, sub_dir)
}

/// Resolve and execute `task` from the config at `config_path`
///
/// Commands run in the config's directory. Returns the outcome and the log output.
pub fn run_task(
    config_path: &Path,
    task: &str,
    args: &[&str],
    flags: &[(&str, &str)],
    cache: Option<&Path>,
) -> (errand::Result<()>, String) {
    let registry = Registry::from_config(parse_config_file(config_path).unwrap()).unwrap();
    let (logger, buffer) = Logger::buffered(Verbosity::Verbose);

    let mut ctx = Context::new()
        .with_working_dir(config_path.parent().unwrap().to_path_buf())
        .with_config_path(config_path.to_path_buf())
        .with_logger(logger);
    if let Some(dir) = cache {
        ctx = ctx.with_cache(Cache::new(Some(dir.to_path_buf())).unwrap());
    }

    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let flags: Flags = flags
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let bound = Resolver::new(&registry, &ctx).resolve(task, &args, &flags);
    let result = match bound {
        Ok(bound) => bound.execute(&mut ctx),
        Err(e) => Err(e.into()),
    };

    (result, buffer.contents())
}

/// Contents of a file under `dir`, or an empty string if it does not exist
pub fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap_or_default()
}
