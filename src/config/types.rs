//! Core configuration types
//!
//! This module defines the data structures that represent an errand.yml configuration file.
//! Many fields accept several shapes (a bare scalar, a list, or an object); each such field
//! has a dedicated deserializer that tries the shapes in a fixed order.

use indexmap::IndexMap;
use serde::de::{DeserializeOwned, Error};
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Application name (optional)
    #[serde(default)]
    pub name: Option<String>,

    /// Application usage description (optional)
    #[serde(default)]
    pub usage: Option<String>,

    /// Global options shared by every task, in declaration order
    #[serde(default, deserialize_with = "deserialize_named")]
    pub options: IndexMap<String, OptionDef>,

    /// Tasks defined in the configuration
    #[serde(default, deserialize_with = "deserialize_named")]
    pub tasks: IndexMap<String, Task>,

    /// Global interpreter to use for commands (e.g., ["sh", "-c"])
    #[serde(default, deserialize_with = "deserialize_interpreter")]
    pub interpreter: Option<Vec<String>>,

    /// Env files to load before running, relative to the config file
    #[serde(rename = "env-file", default, deserialize_with = "deserialize_env_files")]
    pub env_file: Option<Vec<EnvFile>>,
}

/// A task definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Task {
    /// Usage description for help text
    #[serde(default)]
    pub usage: Option<String>,

    /// Longer description for help text
    #[serde(default)]
    pub description: Option<String>,

    /// Whether this task is private (hidden from help)
    #[serde(default)]
    pub private: bool,

    /// Whether this task should run quietly
    #[serde(default)]
    pub quiet: bool,

    /// Positional arguments for the task
    #[serde(default, deserialize_with = "deserialize_named")]
    pub args: IndexMap<String, ArgDef>,

    /// Named options (flags) for the task
    #[serde(default, deserialize_with = "deserialize_named")]
    pub options: IndexMap<String, OptionDef>,

    /// Run items to execute
    #[serde(default, deserialize_with = "deserialize_run_items")]
    pub run: Vec<Run>,

    /// Finally block - always executes, even on error
    #[serde(default, deserialize_with = "deserialize_run_items")]
    pub finally: Vec<Run>,

    /// Source files for caching
    #[serde(default)]
    pub source: StringList,

    /// Target files for caching
    #[serde(default)]
    pub target: StringList,

    /// Include another file as task definition
    #[serde(default)]
    pub include: Option<String>,
}

/// A run item - can be a command, subtask, or environment setter
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Run {
    /// Simple string command
    SimpleCommand(String),

    /// Complex run item with conditionals and multiple actions
    Complex(RunItem),
}

/// A complex run item with conditions and actions
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunItem {
    /// Conditions that must be met for this run item to execute
    #[serde(default)]
    pub when: WhenList,

    /// Commands to execute
    #[serde(default, deserialize_with = "deserialize_commands")]
    pub command: Vec<Command>,

    /// Subtasks to execute
    #[serde(default, deserialize_with = "deserialize_subtasks")]
    pub task: Vec<SubTask>,

    /// Environment variables to set; `null` unsets
    #[serde(
        rename = "set-environment",
        default,
        deserialize_with = "deserialize_environment"
    )]
    pub set_environment: IndexMap<String, Option<String>>,
}

/// A command to execute
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Simple string command
    Simple(String),

    /// Complex command with additional options
    Complex(CommandDetail),
}

/// Detailed command specification
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandDetail {
    /// The command to execute
    pub exec: String,

    /// What to print when running (defaults to exec)
    #[serde(default)]
    pub print: Option<String>,

    /// Whether to suppress printing the command
    #[serde(default)]
    pub quiet: bool,

    /// Working directory for the command
    #[serde(default)]
    pub dir: Option<String>,
}

/// A reference to a subtask to execute
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SubTask {
    /// Simple task name
    Simple(String),

    /// Complex subtask with args and options
    Complex(SubTaskDetail),
}

/// Detailed subtask specification
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubTaskDetail {
    /// Name of the task to run
    pub name: String,

    /// Positional arguments to pass to the subtask
    #[serde(default)]
    pub args: StringList,

    /// Options to pass to the subtask
    #[serde(default, deserialize_with = "deserialize_scalar_map")]
    pub options: IndexMap<String, String>,
}

/// A list of conditions, all of which must pass
///
/// Accepts a bare name, a single clause object, or a list whose items are names,
/// lists of names, or clause objects.
#[derive(Debug, Clone, Default)]
pub struct WhenList(pub Vec<WhenItem>);

/// One entry of a `when` list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WhenItem {
    /// `foo` is shorthand for `equal: {foo: true}`
    Name(String),

    /// `[foo, bar]` is shorthand for `equal: {foo: true, bar: true}`
    AnyOf(Vec<String>),

    /// A full clause object
    Clause(WhenClause),
}

/// A full condition object
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhenClause {
    /// Commands that must exit successfully
    #[serde(default)]
    pub command: StringList,

    /// Paths that must exist
    #[serde(default)]
    pub exists: StringList,

    /// Paths that must not exist
    #[serde(rename = "not-exists", default)]
    pub not_exists: StringList,

    /// Operating systems to match
    #[serde(default)]
    pub os: StringList,

    /// Environment variables to compare; `null` matches an unset variable
    #[serde(default, deserialize_with = "deserialize_env_condition")]
    pub environment: IndexMap<String, Vec<Option<String>>>,

    /// Variables that must equal one of the listed values
    #[serde(default)]
    pub equal: IndexMap<String, StringList>,

    /// Variables that must differ from the listed values
    #[serde(rename = "not-equal", default)]
    pub not_equal: IndexMap<String, StringList>,
}

/// An option (flag) definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionDef {
    /// Usage description for help text
    #[serde(default)]
    pub usage: Option<String>,

    /// Short flag (single character)
    #[serde(default)]
    pub short: Option<String>,

    /// Option type (string, bool, integer, float)
    #[serde(rename = "type", default)]
    pub option_type: Option<String>,

    /// Allowed values
    #[serde(default)]
    pub values: StringList,

    /// Private option (cannot be passed, hidden from help)
    #[serde(default)]
    pub private: bool,

    /// Required option
    #[serde(default)]
    pub required: bool,

    /// Environment variable to read from
    #[serde(default)]
    pub environment: Option<String>,

    /// Default value candidates
    #[serde(default)]
    pub default: DefaultList,

    /// Replacement for a `true` boolean value
    #[serde(default)]
    pub rewrite: Option<String>,
}

/// An argument (positional parameter) definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgDef {
    /// Usage description for help text
    #[serde(default)]
    pub usage: Option<String>,

    /// Argument type (string, bool, integer, float)
    #[serde(rename = "type", default)]
    pub arg_type: Option<String>,

    /// Allowed values
    #[serde(default)]
    pub values: StringList,
}

/// Ordered default value candidates for an option
#[derive(Debug, Clone, Default)]
pub struct DefaultList(pub Vec<DefaultValue>);

/// A single default value candidate
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultValue {
    /// Literal value
    #[serde(default, deserialize_with = "deserialize_optional_scalar")]
    pub value: Option<String>,

    /// Command whose trimmed output becomes the value
    #[serde(default)]
    pub command: Option<String>,

    /// Conditions for using this candidate
    #[serde(default)]
    pub when: WhenList,
}

/// An env file to load
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvFile {
    /// Path relative to the config file
    pub path: String,

    /// Whether a missing file is an error
    #[serde(default)]
    pub required: bool,
}

/// A string or a list of strings; scalars of any kind are read as text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringList(pub Vec<String>);

impl StringList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<StringList> for Vec<String> {
    fn from(list: StringList) -> Self {
        list.0
    }
}

/// Render a YAML scalar as text, or `None` for non-scalars
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn expect_scalar<E: Error>(value: &Value, what: &str) -> Result<String, E> {
    scalar_to_string(value).ok_or_else(|| E::custom(format!("{} must be a scalar value", what)))
}

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(StringList::default()),
            Value::Sequence(seq) => seq
                .iter()
                .map(|item| expect_scalar(item, "list item"))
                .collect::<Result<Vec<_>, _>>()
                .map(StringList),
            other => Ok(StringList(vec![expect_scalar(&other, "value")?])),
        }
    }
}

impl<'de> Deserialize<'de> for WhenList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(WhenList::default()),
            Value::String(name) => Ok(WhenList(vec![WhenItem::Name(name)])),
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|item| WhenItem::deserialize(item).map_err(D::Error::custom))
                .collect::<Result<Vec<_>, _>>()
                .map(WhenList),
            value @ Value::Mapping(_) => WhenClause::deserialize(value)
                .map(|clause| WhenList(vec![WhenItem::Clause(clause)]))
                .map_err(D::Error::custom),
            _ => Err(D::Error::custom(
                "when must be a name, a list, or a condition object",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for DefaultList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        fn candidate<E: Error>(value: Value) -> Result<DefaultValue, E> {
            match value {
                Value::Mapping(_) => DefaultValue::deserialize(value).map_err(E::custom),
                other => Ok(DefaultValue {
                    value: Some(expect_scalar(&other, "default")?),
                    ..DefaultValue::default()
                }),
            }
        }

        match Value::deserialize(deserializer)? {
            Value::Null => Ok(DefaultList::default()),
            Value::Sequence(seq) => seq
                .into_iter()
                .map(candidate)
                .collect::<Result<Vec<_>, _>>()
                .map(DefaultList),
            other => Ok(DefaultList(vec![candidate(other)?])),
        }
    }
}

/// Deserialize an ordered name→definition map where `name:` with no body means defaults
fn deserialize_named<'de, D, T>(deserializer: D) -> Result<IndexMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut out = IndexMap::new();
    for (name, body) in raw.unwrap_or_default() {
        let item = match body {
            Value::Null => T::default(),
            other => T::deserialize(other)
                .map_err(|e| D::Error::custom(format!("'{}': {}", name, e)))?,
        };
        out.insert(name, item);
    }
    Ok(out)
}

/// Custom deserializer for run items that handles both single values and arrays
fn deserialize_run_items<'de, D>(deserializer: D) -> Result<Vec<Run>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        // Single string command
        Value::String(s) => Ok(vec![Run::SimpleCommand(s)]),
        // Single run object
        value @ Value::Mapping(_) => Ok(vec![Run::deserialize(value).map_err(D::Error::custom)?]),
        // Array of run items
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| Run::deserialize(item).map_err(D::Error::custom))
            .collect(),
        // Null or not present
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("run must be a string, object, or array")),
    }
}

/// Custom deserializer for commands that handles both single values and arrays
fn deserialize_commands<'de, D>(deserializer: D) -> Result<Vec<Command>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(vec![Command::Simple(s)]),
        value @ Value::Mapping(_) => Ok(vec![Command::deserialize(value).map_err(D::Error::custom)?]),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| Command::deserialize(item).map_err(D::Error::custom))
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("command must be a string, object, or array")),
    }
}

/// Custom deserializer for subtasks that handles both single values and arrays
fn deserialize_subtasks<'de, D>(deserializer: D) -> Result<Vec<SubTask>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(vec![SubTask::Simple(s)]),
        value @ Value::Mapping(_) => Ok(vec![SubTask::deserialize(value).map_err(D::Error::custom)?]),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| SubTask::deserialize(item).map_err(D::Error::custom))
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("task must be a string, object, or array")),
    }
}

fn deserialize_environment<'de, D>(
    deserializer: D,
) -> Result<IndexMap<String, Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(name, value)| match value {
            Value::Null => Ok((name, None)),
            other => Ok((name, Some(expect_scalar(&other, "environment value")?))),
        })
        .collect()
}

fn deserialize_env_condition<'de, D>(
    deserializer: D,
) -> Result<IndexMap<String, Vec<Option<String>>>, D::Error>
where
    D: Deserializer<'de>,
{
    fn entry<E: Error>(value: &Value) -> Result<Option<String>, E> {
        match value {
            Value::Null => Ok(None),
            other => expect_scalar(other, "environment value").map(Some),
        }
    }

    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(name, value)| {
            let values = match &value {
                Value::Sequence(seq) => seq.iter().map(entry).collect::<Result<Vec<_>, _>>()?,
                other => vec![entry(other)?],
            };
            Ok((name, values))
        })
        .collect()
}

fn deserialize_scalar_map<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(name, value)| Ok((name, expect_scalar(&value, "option value")?)))
        .collect()
}

fn deserialize_optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        other => expect_scalar(&other, "value").map(Some),
    }
}

fn deserialize_interpreter<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => shlex::split(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid interpreter: {}", s))),
        value @ Value::Sequence(_) => StringList::deserialize(value)
            .map(|list| Some(list.0))
            .map_err(D::Error::custom),
        _ => Err(D::Error::custom("interpreter must be a string or a list")),
    }
}

fn deserialize_env_files<'de, D>(deserializer: D) -> Result<Option<Vec<EnvFile>>, D::Error>
where
    D: Deserializer<'de>,
{
    fn entry<E: Error>(value: Value) -> Result<EnvFile, E> {
        match value {
            Value::String(path) => Ok(EnvFile {
                path,
                required: false,
            }),
            other => EnvFile::deserialize(other).map_err(E::custom),
        }
    }

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Sequence(seq) => seq.into_iter().map(entry).collect::<Result<_, _>>().map(Some),
        other => Ok(Some(vec![entry(other)?])),
    }
}
