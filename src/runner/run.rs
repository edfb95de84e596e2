//! Run steps and their parts

use crate::config;
use crate::runner::{Interpolate, Task, Vars, WhenList};
use indexmap::IndexMap;
use serde::Serialize;

/// Runtime representation of a run item
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Run {
    /// Conditions that must be met
    #[serde(skip_serializing_if = "WhenList::is_empty")]
    pub when: WhenList,

    /// Commands to execute
    #[serde(rename = "command", skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,

    /// Sub-task call sites
    #[serde(rename = "task", skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<SubTask>,

    /// Environment variables to set; `None` unsets
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub set_environment: IndexMap<String, Option<String>>,

    /// Expanded sub-tasks, one per call site, filled in during resolution
    #[serde(skip)]
    pub tasks: Vec<Task>,
}

impl Run {
    /// Create from config
    pub fn from_config(config: config::Run) -> Self {
        match config {
            config::Run::SimpleCommand(cmd) => Run {
                commands: vec![Command::new(cmd)],
                ..Run::default()
            },
            config::Run::Complex(item) => Run {
                when: WhenList::from_config(item.when),
                commands: item.command.into_iter().map(Command::from_config).collect(),
                subtasks: item.task.into_iter().map(SubTask::from_config).collect(),
                set_environment: item.set_environment,
                tasks: Vec::new(),
            },
        }
    }
}

impl Interpolate for Run {
    fn interpolate(&mut self, vars: &Vars) {
        self.when.interpolate(vars);
        self.commands.interpolate(vars);
        self.subtasks.interpolate(vars);
        self.set_environment.interpolate(vars);
    }
}

/// A shell command to run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    /// The snippet passed to the interpreter
    pub exec: String,

    /// What to print instead of `exec`
    pub print: String,

    /// Suppress printing the command
    pub quiet: bool,

    /// Working directory, relative to the context's
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Command {
    pub fn new(exec: impl Into<String>) -> Self {
        let exec = exec.into();
        Command {
            print: exec.clone(),
            exec,
            quiet: false,
            dir: None,
        }
    }

    pub fn from_config(config: config::Command) -> Self {
        match config {
            config::Command::Simple(cmd) => Command::new(cmd),
            config::Command::Complex(detail) => Command {
                print: detail.print.unwrap_or_else(|| detail.exec.clone()),
                exec: detail.exec,
                quiet: detail.quiet,
                dir: detail.dir,
            },
        }
    }
}

impl Interpolate for Command {
    fn interpolate(&mut self, vars: &Vars) {
        self.exec.interpolate(vars);
        self.print.interpolate(vars);
        self.dir.interpolate(vars);
    }
}

/// A call site naming another task
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubTask {
    pub name: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, String>,
}

impl SubTask {
    pub fn from_config(config: config::SubTask) -> Self {
        match config {
            config::SubTask::Simple(name) => SubTask {
                name,
                ..SubTask::default()
            },
            config::SubTask::Complex(detail) => SubTask {
                name: detail.name,
                args: detail.args.into(),
                options: detail.options,
            },
        }
    }
}

impl Interpolate for SubTask {
    fn interpolate(&mut self, vars: &Vars) {
        self.name.interpolate(vars);
        self.args.interpolate(vars);
        self.options.interpolate(vars);
    }
}
