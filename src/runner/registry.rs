//! Task registry built from a parsed configuration

use crate::config::{self, validate_config};
use crate::error::ConfigResult;
use crate::runner::{Task, TaskOption};
use indexmap::IndexMap;

/// Every task and global option of one configuration, in declaration order
///
/// Tasks stored here are templates: resolution always works on a clone.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub name: Option<String>,
    pub usage: Option<String>,
    pub options: Vec<TaskOption>,
    pub tasks: IndexMap<String, Task>,
    pub interpreter: Option<Vec<String>>,
}

impl Registry {
    /// Validate a configuration and convert it to runtime types
    pub fn from_config(config: config::Config) -> ConfigResult<Self> {
        validate_config(&config)?;

        let options = config
            .options
            .into_iter()
            .map(|(name, def)| TaskOption::from_config(name, def))
            .collect::<ConfigResult<_>>()?;

        let tasks = config
            .tasks
            .into_iter()
            .map(|(name, def)| Ok((name.clone(), Task::from_config(name, def)?)))
            .collect::<ConfigResult<_>>()?;

        Ok(Registry {
            name: config.name,
            usage: config.usage,
            options,
            tasks,
            interpreter: config.interpreter,
        })
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn option(&self, name: &str) -> Option<&TaskOption> {
        self.options.iter().find(|option| option.name() == name)
    }

    /// Tasks that can be invoked directly
    pub fn public_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(|task| !task.private)
    }
}
