//! Finding the global options a task needs
//!
//! A task needs a global option when its text references `${name}`, when one
//! of its guards compares `name` with `equal`/`not-equal`, or when an option it
//! already needs does either. References only flow from a task to the globals,
//! never back from a global into the task's own names.

use crate::error::ResolveResult;
use crate::runner::{Task, TaskOption, WhenList};
use regex::Regex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{(.*?)\}").expect("variable pattern is valid"))
}

/// Names of the variables something refers to
pub trait Dependencies {
    fn dependencies(&self) -> ResolveResult<Vec<String>>;
}

/// Scan the YAML dump of `value` for `${name}` and add guard comparison keys
fn scan<'w, T, I>(value: &T, guards: I) -> ResolveResult<Vec<String>>
where
    T: Serialize,
    I: IntoIterator<Item = &'w WhenList>,
{
    let dump = serde_yaml::to_string(value)?;
    let mut names: Vec<String> = variable_pattern()
        .captures_iter(&dump)
        .map(|caps| caps[1].to_string())
        .collect();

    for list in guards {
        for when in list.iter() {
            names.extend(when.equal.keys().cloned());
            names.extend(when.not_equal.keys().cloned());
        }
    }

    Ok(names)
}

impl Dependencies for TaskOption {
    fn dependencies(&self) -> ResolveResult<Vec<String>> {
        scan(self, self.default_values.iter().map(|value| &value.when))
    }
}

impl Dependencies for Task {
    fn dependencies(&self) -> ResolveResult<Vec<String>> {
        let run_guards = self.run.iter().chain(self.finally.iter()).map(|run| &run.when);
        let option_guards = self
            .options
            .iter()
            .flat_map(|option| option.default_values.iter().map(|value| &value.when));

        let mut names = scan(self, run_guards.chain(option_guards))?;
        names.extend(self.options.iter().map(|option| option.name().to_string()));
        Ok(names)
    }
}

/// Global options `task` may need, in declaration order
///
/// Globals named like one of the task's own args or options are shadowed and
/// never returned.
pub fn find_all_options<'a>(task: &Task, globals: &'a [TaskOption]) -> ResolveResult<Vec<&'a TaskOption>> {
    let candidate = |name: &str| -> Option<&'a TaskOption> {
        if task.has_arg(name) || task.has_option(name) {
            return None;
        }
        globals.iter().find(|option| option.name() == name)
    };

    let mut found: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = task.dependencies()?.into();

    while let Some(name) = queue.pop_front() {
        if found.contains(&name) {
            continue;
        }
        let Some(option) = candidate(&name) else {
            continue;
        };
        found.insert(name);
        queue.extend(option.dependencies()?);
    }

    Ok(globals
        .iter()
        .filter(|option| found.contains(option.name()))
        .collect())
}
