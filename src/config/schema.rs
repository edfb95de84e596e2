//! Configuration validation
//!
//! Structural rules that serde cannot express on its own: mutually exclusive keys,
//! name collisions, and type names.

use crate::config::types::{ArgDef, Config, OptionDef, Run, Task};
use crate::error::{ConfigError, ConfigResult};
use crate::runner::OptionType;

/// Validate a complete configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    for (name, option) in &config.options {
        validate_option(name, option)?;
    }

    for (name, task) in &config.tasks {
        validate_task(name, task)?;
    }

    Ok(())
}

/// Validate a single task
pub fn validate_task(name: &str, task: &Task) -> ConfigResult<()> {
    // Check source/target consistency
    if !task.source.is_empty() && task.target.is_empty() {
        return Err(ConfigError::SourceWithoutTarget(name.to_string()));
    }
    if !task.target.is_empty() && task.source.is_empty() {
        return Err(ConfigError::TargetWithoutSource(name.to_string()));
    }

    // Check for duplicate names between args and options
    for arg_name in task.args.keys() {
        if task.options.contains_key(arg_name) {
            return Err(ConfigError::DuplicateNames(arg_name.clone()));
        }
    }

    for (arg_name, arg) in &task.args {
        validate_arg(arg_name, arg)?;
    }

    for (opt_name, option) in &task.options {
        validate_option(opt_name, option)?;
    }

    for run in task.run.iter().chain(task.finally.iter()) {
        validate_run(run)?;
    }

    Ok(())
}

fn validate_arg(_name: &str, arg: &ArgDef) -> ConfigResult<()> {
    validate_type(arg.arg_type.as_deref())
}

/// Validate an option definition
pub fn validate_option(name: &str, option: &OptionDef) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigError::InvalidOption {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if let Some(short) = &option.short {
        if short.chars().count() != 1 {
            return Err(invalid("short must be a single character"));
        }
    }

    if option.private {
        if option.required {
            return Err(invalid("private options cannot be required"));
        }
        if option.environment.is_some() {
            return Err(invalid("private options cannot read the environment"));
        }
        if !option.values.is_empty() {
            return Err(invalid("private options cannot restrict values"));
        }
    }

    if option.required && !option.default.0.is_empty() {
        return Err(invalid("required options cannot have a default"));
    }

    validate_type(option.option_type.as_deref())?;
    let option_type = OptionType::parse(option.option_type.as_deref().unwrap_or(""));

    if option.rewrite.is_some() && option_type != Some(OptionType::Bool) {
        return Err(invalid("rewrite is only valid for boolean options"));
    }

    for candidate in &option.default.0 {
        if candidate.value.is_some() && candidate.command.is_some() {
            return Err(ConfigError::ValueAndCommand);
        }
    }

    Ok(())
}

/// Validate an option type string
fn validate_type(option_type: Option<&str>) -> ConfigResult<()> {
    let raw = option_type.unwrap_or("");
    match OptionType::parse(raw) {
        Some(_) => Ok(()),
        None => Err(ConfigError::UnsupportedType(raw.to_string())),
    }
}

/// A run item may carry at most one action kind
fn validate_run(run: &Run) -> ConfigResult<()> {
    let Run::Complex(item) = run else {
        return Ok(());
    };

    let mut actions = Vec::new();
    if !item.command.is_empty() {
        actions.push("command");
    }
    if !item.task.is_empty() {
        actions.push("task");
    }
    if !item.set_environment.is_empty() {
        actions.push("set-environment");
    }

    if actions.len() > 1 {
        return Err(ConfigError::AmbiguousRun(actions.join(" and ")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn validate(yaml: &str) -> ConfigResult<()> {
        validate_config(&parse_config(yaml, None).unwrap())
    }

    #[test]
    fn test_validate_source_without_target() {
        let result = validate("tasks:\n  t:\n    source: src.txt\n");
        assert!(matches!(result, Err(ConfigError::SourceWithoutTarget(_))));
    }

    #[test]
    fn test_validate_target_without_source() {
        let result = validate("tasks:\n  t:\n    target: out.txt\n");
        assert!(matches!(result, Err(ConfigError::TargetWithoutSource(_))));
    }

    #[test]
    fn test_validate_duplicate_names() {
        let yaml = r#"
tasks:
  test:
    args:
      name: {}
    options:
      name: {}
"#;
        assert!(matches!(validate(yaml), Err(ConfigError::DuplicateNames(_))));
    }

    #[test]
    fn test_validate_invalid_option_type() {
        let result = validate("options:\n  o:\n    type: invalid_type\n");
        assert!(matches!(result, Err(ConfigError::UnsupportedType(_))));
    }

    #[test]
    fn test_validate_valid_option_types() {
        for opt_type in &[
            "string", "bool", "boolean", "int", "integer", "float", "float64", "double", "BOOL",
        ] {
            let yaml = format!("options:\n  o:\n    type: {}\n", opt_type);
            assert!(validate(&yaml).is_ok(), "Failed for type: {}", opt_type);
        }
    }

    #[test]
    fn test_private_excludes_required_environment_values() {
        for extra in ["required: true", "environment: FOO", "values: [a]"] {
            let yaml = format!("options:\n  o:\n    private: true\n    {}\n", extra);
            assert!(
                matches!(validate(&yaml), Err(ConfigError::InvalidOption { .. })),
                "accepted private with {}",
                extra
            );
        }
    }

    #[test]
    fn test_required_excludes_default() {
        let result = validate("options:\n  o:\n    required: true\n    default: x\n");
        assert!(matches!(result, Err(ConfigError::InvalidOption { .. })));
    }

    #[test]
    fn test_short_must_be_one_char() {
        let result = validate("options:\n  o:\n    short: ab\n");
        assert!(matches!(result, Err(ConfigError::InvalidOption { .. })));
    }

    #[test]
    fn test_value_and_command_conflict() {
        let yaml = r#"
options:
  o:
    default:
      value: x
      command: echo y
"#;
        assert!(matches!(validate(yaml), Err(ConfigError::ValueAndCommand)));
    }

    #[test]
    fn test_rewrite_requires_bool() {
        let result = validate("options:\n  o:\n    rewrite: --flag\n");
        assert!(matches!(result, Err(ConfigError::InvalidOption { .. })));
        assert!(validate("options:\n  o:\n    type: bool\n    rewrite: --flag\n").is_ok());
    }

    #[test]
    fn test_run_item_with_two_actions() {
        let yaml = r#"
tasks:
  t:
    run:
      command: echo hi
      task: other
"#;
        assert!(matches!(validate(yaml), Err(ConfigError::AmbiguousRun(_))));
    }

    #[test]
    fn test_validate_valid_config() {
        let yaml = r#"
name: test-app
usage: Test application
options:
  env:
    default: dev
tasks:
  test:
    usage: Test task
    args:
      target: {}
    options:
      verbose:
        type: bool
    run: echo test
"#;
        assert!(validate(yaml).is_ok());
    }
}
