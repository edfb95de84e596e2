//! Options, args, and how their values are resolved
//!
//! An option's value comes from, in order: the value passed by the caller, its
//! environment variable, the first default whose `when` passes, and finally a
//! zero value for its type. Once computed, the value is memoized on that
//! option instance.

use crate::config;
use crate::error::{ConfigError, ConfigResult, ResolveError, ResolveResult};
use crate::runner::{capture_output, Context, Interpolate, Vars, Verdict, WhenList};
use serde::Serialize;
use std::env;
use std::fmt;

/// Option value types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    String,
    Bool,
    Integer,
    Float,
}

impl OptionType {
    /// Parse a type name; the empty string means string
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "" | "string" => Some(OptionType::String),
            "bool" | "boolean" => Some(OptionType::Bool),
            "int" | "integer" => Some(OptionType::Integer),
            "float" | "float64" | "double" => Some(OptionType::Float),
            _ => None,
        }
    }

    fn from_config(raw: Option<&str>) -> ConfigResult<Self> {
        let raw = raw.unwrap_or("");
        Self::parse(raw).ok_or_else(|| ConfigError::UnsupportedType(raw.to_string()))
    }

    /// Value used when nothing else supplies one
    pub fn zero_value(self) -> &'static str {
        match self {
            OptionType::Integer | OptionType::Float => "0",
            OptionType::Bool => "false",
            OptionType::String => "",
        }
    }

    /// Whether `value` parses as this type
    pub fn accepts(self, value: &str) -> bool {
        match self {
            OptionType::String => true,
            OptionType::Bool => parse_bool(value).is_some(),
            OptionType::Integer => value.parse::<i64>().is_ok(),
            OptionType::Float => value.parse::<f64>().is_ok(),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionType::String => "string",
            OptionType::Bool => "bool",
            OptionType::Integer => "integer",
            OptionType::Float => "float",
        };
        f.write_str(name)
    }
}

/// Boolean spellings accepted on the command line and in defaults
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Fields shared by options and args
#[derive(Debug, Clone, Default, Serialize)]
pub struct Passable {
    pub name: String,
    pub usage: String,
    #[serde(rename = "type")]
    pub value_type: OptionType,
    #[serde(rename = "values", skip_serializing_if = "Vec::is_empty")]
    pub values_allowed: Vec<String>,

    /// Value supplied by the caller; empty when none
    #[serde(skip)]
    pub passed: String,
}

impl Passable {
    /// Check a value against the allow-list and the declared type
    ///
    /// The empty string means "no value" and is always accepted.
    pub fn validate(&self, kind: &'static str, value: &str) -> ResolveResult<()> {
        if value.is_empty() {
            return Ok(());
        }

        if !self.values_allowed.is_empty() && !self.values_allowed.iter().any(|v| v == value) {
            return Err(ResolveError::NotAllowed {
                kind,
                name: self.name.clone(),
                value: value.to_string(),
                allowed: self.values_allowed.join(", "),
            });
        }

        if !self.value_type.accepts(value) {
            return Err(ResolveError::InvalidType {
                kind,
                name: self.name.clone(),
                value: value.to_string(),
                ty: self.value_type.to_string(),
            });
        }

        Ok(())
    }
}

impl Interpolate for Passable {
    fn interpolate(&mut self, vars: &Vars) {
        self.usage.interpolate(vars);
        self.values_allowed.interpolate(vars);
    }
}

/// Where a default value comes from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    /// A literal
    Value(String),
    /// A shell snippet whose trimmed stdout is the value
    Command(String),
}

/// A default value candidate, used when its `when` passes
#[derive(Debug, Clone, Serialize)]
pub struct Value {
    #[serde(skip_serializing_if = "WhenList::is_empty")]
    pub when: WhenList,
    #[serde(flatten)]
    pub source: ValueSource,
}

impl Value {
    pub fn from_config(config: config::DefaultValue) -> ConfigResult<Self> {
        let source = match (config.value, config.command) {
            (Some(_), Some(_)) => return Err(ConfigError::ValueAndCommand),
            (None, Some(command)) => ValueSource::Command(command),
            (value, None) => ValueSource::Value(value.unwrap_or_default()),
        };

        Ok(Value {
            when: WhenList::from_config(config.when),
            source,
        })
    }

    /// A literal with no condition
    pub fn literal(value: impl Into<String>) -> Self {
        Value {
            when: WhenList::default(),
            source: ValueSource::Value(value.into()),
        }
    }

    /// Produce the value, running the command if there is one
    pub fn resolve(&self, ctx: &Context) -> crate::error::ExecutionResult<String> {
        match &self.source {
            ValueSource::Value(value) => Ok(value.clone()),
            ValueSource::Command(command) => capture_output(command, ctx),
        }
    }
}

impl Interpolate for Value {
    fn interpolate(&mut self, vars: &Vars) {
        self.when.interpolate(vars);
        match &mut self.source {
            ValueSource::Value(value) | ValueSource::Command(value) => value.interpolate(vars),
        }
    }
}

/// Runtime representation of an option
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskOption {
    #[serde(flatten)]
    pub base: Passable,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    pub private: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(rename = "default", skip_serializing_if = "Vec::is_empty")]
    pub default_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<String>,

    #[serde(skip)]
    computed: Option<String>,
}

impl TaskOption {
    pub fn from_config(name: String, config: config::OptionDef) -> ConfigResult<Self> {
        Ok(TaskOption {
            base: Passable {
                name,
                usage: config.usage.unwrap_or_default(),
                value_type: OptionType::from_config(config.option_type.as_deref())?,
                values_allowed: config.values.into(),
                passed: String::new(),
            },
            short: config.short.and_then(|s| s.chars().next()),
            private: config.private,
            required: config.required,
            environment: config.environment,
            default_values: config
                .default
                .0
                .into_iter()
                .map(Value::from_config)
                .collect::<ConfigResult<_>>()?,
            rewrite: config.rewrite,
            computed: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    /// Whether the value has already been computed
    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    /// Resolve the option's value, computing it at most once
    pub fn evaluate(&mut self, ctx: &Context, vars: &Vars) -> ResolveResult<String> {
        if let Some(value) = &self.computed {
            return Ok(value.clone());
        }

        let value = self.compute(ctx, vars)?;
        self.base.validate("option", &value)?;
        let value = self.apply_rewrite(value);

        self.computed = Some(value.clone());
        Ok(value)
    }

    fn compute(&self, ctx: &Context, vars: &Vars) -> ResolveResult<String> {
        if !self.private {
            if !self.base.passed.is_empty() {
                return Ok(self.base.passed.clone());
            }

            if let Some(name) = &self.environment {
                if let Ok(value) = env::var(name) {
                    if !value.is_empty() {
                        return Ok(value);
                    }
                }
            }
        }

        if self.required {
            return Err(ResolveError::MissingOption(self.base.name.clone()));
        }

        for candidate in &self.default_values {
            let verdict = candidate
                .when
                .validate(ctx, vars)
                .map_err(|source| self.default_error(source))?;

            if let Verdict::Pass = verdict {
                return candidate
                    .resolve(ctx)
                    .map_err(|source| self.default_error(source));
            }
        }

        Ok(self.base.value_type.zero_value().to_string())
    }

    fn default_error(&self, source: crate::error::ExecutionError) -> ResolveError {
        ResolveError::Default {
            name: self.base.name.clone(),
            source,
        }
    }

    fn apply_rewrite(&self, value: String) -> String {
        match &self.rewrite {
            Some(rewrite) => match parse_bool(&value) {
                Some(true) => rewrite.clone(),
                _ => String::new(),
            },
            None => value,
        }
    }
}

impl Interpolate for TaskOption {
    fn interpolate(&mut self, vars: &Vars) {
        self.base.interpolate(vars);
        self.environment.interpolate(vars);
        self.default_values.interpolate(vars);
        self.rewrite.interpolate(vars);
    }
}

/// Runtime representation of an argument
#[derive(Debug, Clone, Default, Serialize)]
pub struct Arg {
    #[serde(flatten)]
    pub base: Passable,
}

impl Arg {
    pub fn from_config(name: String, config: config::ArgDef) -> ConfigResult<Self> {
        Ok(Arg {
            base: Passable {
                name,
                usage: config.usage.unwrap_or_default(),
                value_type: OptionType::from_config(config.arg_type.as_deref())?,
                values_allowed: config.values.into(),
                passed: String::new(),
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    /// Validate and return the passed value
    pub fn evaluate(&self) -> ResolveResult<String> {
        self.base.validate("arg", &self.base.passed)?;
        Ok(self.base.passed.clone())
    }
}

impl Interpolate for Arg {
    fn interpolate(&mut self, vars: &Vars) {
        self.base.interpolate(vars);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::When;

    fn option(name: &str) -> TaskOption {
        TaskOption {
            base: Passable {
                name: name.to_string(),
                ..Passable::default()
            },
            ..TaskOption::default()
        }
    }

    fn guarded(var: &str, value: &str) -> Value {
        let mut when = When::default();
        when.equal.insert(var.to_string(), vec!["true".to_string()]);
        Value {
            when: WhenList(vec![when]),
            source: ValueSource::Value(value.to_string()),
        }
    }

    #[test]
    fn test_passed_beats_environment_and_default() {
        env::set_var("ERRAND_OPT_PRIORITY", "from-env");
        let mut opt = option("o");
        opt.environment = Some("ERRAND_OPT_PRIORITY".to_string());
        opt.default_values = vec![Value::literal("from-default")];
        opt.base.passed = "from-flag".to_string();

        let value = opt.evaluate(&Context::new(), &Vars::new()).unwrap();
        assert_eq!(value, "from-flag");
    }

    #[test]
    fn test_environment_beats_default() {
        env::set_var("ERRAND_OPT_ENV_WINS", "from-env");
        let mut opt = option("o");
        opt.environment = Some("ERRAND_OPT_ENV_WINS".to_string());
        opt.default_values = vec![Value::literal("from-default")];

        let value = opt.evaluate(&Context::new(), &Vars::new()).unwrap();
        assert_eq!(value, "from-env");
    }

    #[test]
    fn test_empty_environment_is_ignored() {
        env::set_var("ERRAND_OPT_ENV_EMPTY", "");
        let mut opt = option("o");
        opt.environment = Some("ERRAND_OPT_ENV_EMPTY".to_string());
        opt.default_values = vec![Value::literal("fallback")];

        let value = opt.evaluate(&Context::new(), &Vars::new()).unwrap();
        assert_eq!(value, "fallback");
    }

    #[test]
    fn test_private_ignores_passed() {
        let mut opt = option("o");
        opt.private = true;
        opt.base.passed = "from-flag".to_string();
        opt.default_values = vec![Value::literal("internal")];

        let value = opt.evaluate(&Context::new(), &Vars::new()).unwrap();
        assert_eq!(value, "internal");
    }

    #[test]
    fn test_required_without_value() {
        let mut opt = option("o");
        opt.required = true;
        let result = opt.evaluate(&Context::new(), &Vars::new());
        assert!(matches!(result, Err(ResolveError::MissingOption(name)) if name == "o"));
    }

    #[test]
    fn test_first_passing_default_wins() {
        let mut opt = option("o");
        opt.default_values = vec![
            guarded("prod", "production"),
            guarded("stage", "staging"),
            Value::literal("development"),
        ];

        let mut vars = Vars::new();
        vars.insert("prod".to_string(), "false".to_string());
        vars.insert("stage".to_string(), "true".to_string());

        let value = opt.evaluate(&Context::new(), &vars).unwrap();
        assert_eq!(value, "staging");
    }

    #[test]
    fn test_command_default_is_trimmed() {
        let mut opt = option("o");
        opt.default_values = vec![Value {
            when: WhenList::default(),
            source: ValueSource::Command("echo '  computed  '".to_string()),
        }];

        let value = opt.evaluate(&Context::new(), &Vars::new()).unwrap();
        assert_eq!(value, "computed");
    }

    #[test]
    fn test_zero_values_by_type() {
        for (ty, expected) in [
            (OptionType::Integer, "0"),
            (OptionType::Float, "0"),
            (OptionType::Bool, "false"),
            (OptionType::String, ""),
        ] {
            let mut opt = option("o");
            opt.base.value_type = ty;
            let value = opt.evaluate(&Context::new(), &Vars::new()).unwrap();
            assert_eq!(value, expected, "zero value for {}", ty);
        }
    }

    #[test]
    fn test_value_is_memoized() {
        let mut opt = option("o");
        opt.base.passed = "first".to_string();
        assert_eq!(opt.evaluate(&Context::new(), &Vars::new()).unwrap(), "first");

        opt.base.passed = "second".to_string();
        assert_eq!(opt.evaluate(&Context::new(), &Vars::new()).unwrap(), "first");
        assert!(opt.is_computed());
    }

    #[test]
    fn test_values_allowed() {
        let mut opt = option("level");
        opt.base.values_allowed = vec!["low".to_string(), "high".to_string()];
        opt.base.passed = "medium".to_string();

        let result = opt.evaluate(&Context::new(), &Vars::new());
        assert!(matches!(result, Err(ResolveError::NotAllowed { .. })));
    }

    #[test]
    fn test_type_validation() {
        let mut opt = option("count");
        opt.base.value_type = OptionType::Integer;
        opt.base.passed = "three".to_string();

        let result = opt.evaluate(&Context::new(), &Vars::new());
        assert!(matches!(result, Err(ResolveError::InvalidType { .. })));
    }

    #[test]
    fn test_rewrite_bool() {
        let mut on = option("release");
        on.base.value_type = OptionType::Bool;
        on.rewrite = Some("--release".to_string());
        on.base.passed = "true".to_string();
        assert_eq!(on.evaluate(&Context::new(), &Vars::new()).unwrap(), "--release");

        let mut off = option("release");
        off.base.value_type = OptionType::Bool;
        off.rewrite = Some("--release".to_string());
        assert_eq!(off.evaluate(&Context::new(), &Vars::new()).unwrap(), "");
    }

    #[test]
    fn test_arg_validation() {
        let mut arg = Arg::default();
        arg.base.name = "n".to_string();
        arg.base.value_type = OptionType::Float;
        arg.base.passed = "1.5".to_string();
        assert_eq!(arg.evaluate().unwrap(), "1.5");

        arg.base.passed = "x".to_string();
        assert!(matches!(arg.evaluate(), Err(ResolveError::InvalidType { .. })));
    }

    #[test]
    fn test_option_type_parse() {
        assert_eq!(OptionType::parse("INT"), Some(OptionType::Integer));
        assert_eq!(OptionType::parse("double"), Some(OptionType::Float));
        assert_eq!(OptionType::parse(""), Some(OptionType::String));
        assert_eq!(OptionType::parse("list"), None);
    }

    #[test]
    fn test_value_from_config_rejects_both() {
        let result = Value::from_config(config::DefaultValue {
            value: Some("a".to_string()),
            command: Some("echo b".to_string()),
            when: config::WhenList::default(),
        });
        assert!(matches!(result, Err(ConfigError::ValueAndCommand)));
    }
}
