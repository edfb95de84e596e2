//! When condition evaluation
//!
//! A [`When`] holds up to seven condition categories. Each populated category
//! passes if any of its entries passes. The whole `When` passes if any
//! populated category passes, or if none is populated. A [`WhenList`] requires
//! every item to pass.

use crate::config;
use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{check_command, Context, Interpolate, Vars};
use indexmap::IndexMap;
use serde::Serialize;
use std::env;
use std::path::Path;
use tracing::trace;

/// Outcome of a guard: run the step, or skip it with a reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Result of one category
enum Clause {
    Unspecified,
    Pass,
    Fail(String),
}

/// A single guard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct When {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exists: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_exists: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, Vec<Option<String>>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub equal: IndexMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub not_equal: IndexMap<String, Vec<String>>,
}

impl When {
    /// `equal: {name: [true]}` for each name
    pub fn flags<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        When {
            equal: names
                .into_iter()
                .map(|name| (name.into(), vec!["true".to_string()]))
                .collect(),
            ..When::default()
        }
    }

    fn from_item(item: config::WhenItem) -> Self {
        match item {
            config::WhenItem::Name(name) => When::flags([name]),
            config::WhenItem::AnyOf(names) => When::flags(names),
            config::WhenItem::Clause(clause) => When {
                command: clause.command.into(),
                exists: clause.exists.into(),
                not_exists: clause.not_exists.into(),
                os: clause.os.into(),
                environment: clause.environment,
                equal: clause
                    .equal
                    .into_iter()
                    .map(|(name, values)| (name, values.into()))
                    .collect(),
                not_equal: clause
                    .not_equal
                    .into_iter()
                    .map(|(name, values)| (name, values.into()))
                    .collect(),
            },
        }
    }

    /// Evaluate every populated category; any pass makes the whole guard pass
    pub fn validate(&self, ctx: &Context, vars: &Vars) -> ExecutionResult<Verdict> {
        let clauses = [
            self.validate_command(ctx)?,
            self.validate_exists(ctx)?,
            self.validate_not_exists(ctx)?,
            self.validate_os(),
            self.validate_environment(),
            self.validate_equal(vars),
            self.validate_not_equal(vars),
        ];

        let mut first_failure = None;
        for clause in clauses {
            match clause {
                Clause::Pass => return Ok(Verdict::Pass),
                Clause::Fail(reason) => {
                    if first_failure.is_none() {
                        first_failure = Some(reason);
                    }
                }
                Clause::Unspecified => {}
            }
        }

        Ok(first_failure.map_or(Verdict::Pass, Verdict::Fail))
    }

    fn validate_command(&self, ctx: &Context) -> ExecutionResult<Clause> {
        if self.command.is_empty() {
            return Ok(Clause::Unspecified);
        }

        for command in &self.command {
            if check_command(command, ctx)? {
                return Ok(Clause::Pass);
            }
        }

        Ok(Clause::Fail(format!(
            "no command succeeded: {}",
            self.command.join(", ")
        )))
    }

    fn validate_exists(&self, ctx: &Context) -> ExecutionResult<Clause> {
        if self.exists.is_empty() {
            return Ok(Clause::Unspecified);
        }

        for path in &self.exists {
            if path_exists(&ctx.working_dir, path)? {
                return Ok(Clause::Pass);
            }
        }

        Ok(Clause::Fail(format!(
            "no required file existed: {}",
            self.exists.join(", ")
        )))
    }

    fn validate_not_exists(&self, ctx: &Context) -> ExecutionResult<Clause> {
        if self.not_exists.is_empty() {
            return Ok(Clause::Unspecified);
        }

        for path in &self.not_exists {
            if !path_exists(&ctx.working_dir, path)? {
                return Ok(Clause::Pass);
            }
        }

        Ok(Clause::Fail(format!(
            "all files exist: {}",
            self.not_exists.join(", ")
        )))
    }

    fn validate_os(&self) -> Clause {
        if self.os.is_empty() {
            return Clause::Unspecified;
        }

        let current = normalize_os(env::consts::OS);
        if self.os.iter().any(|os| normalize_os(os) == current) {
            return Clause::Pass;
        }

        Clause::Fail(format!(
            "current OS \"{}\" not listed in {}",
            current,
            self.os.join(", ")
        ))
    }

    fn validate_environment(&self) -> Clause {
        if self.environment.is_empty() {
            return Clause::Unspecified;
        }

        for (name, values) in &self.environment {
            let current = env::var(name).ok();
            let matched = values.iter().any(|expected| match (expected, &current) {
                (None, None) => true,
                (Some(expected), Some(current)) => expected == current,
                _ => false,
            });
            if matched {
                return Clause::Pass;
            }
        }

        Clause::Fail("no environment variables matched".to_string())
    }

    fn validate_equal(&self, vars: &Vars) -> Clause {
        compare_vars(&self.equal, vars, "equal", |value, listed| {
            listed.iter().any(|expected| expected == value)
        })
    }

    fn validate_not_equal(&self, vars: &Vars) -> Clause {
        compare_vars(&self.not_equal, vars, "not-equal", |value, listed| {
            listed.iter().all(|expected| expected != value)
        })
    }
}

/// Compare named variables; names with no value are skipped
fn compare_vars<F>(
    conditions: &IndexMap<String, Vec<String>>,
    vars: &Vars,
    category: &str,
    matches: F,
) -> Clause
where
    F: Fn(&str, &[String]) -> bool,
{
    let mut checked = false;
    for (name, listed) in conditions {
        let Some(value) = vars.get(name) else {
            trace!(variable = %name, category, "no value, skipping");
            continue;
        };
        checked = true;
        if matches(value, listed) {
            return Clause::Pass;
        }
    }

    if checked {
        Clause::Fail(format!("no variables matched {} condition", category))
    } else {
        Clause::Unspecified
    }
}

fn path_exists(base: &Path, path: &str) -> ExecutionResult<bool> {
    let full = base.join(path);
    full.try_exists().map_err(|source| ExecutionError::PathCheck {
        path: full,
        source,
    })
}

/// Canonical OS name: `mac`, `macos` and `osx` become `darwin`, `win` becomes `windows`
pub fn normalize_os(name: &str) -> String {
    let lower = name.to_lowercase();
    match lower.as_str() {
        "mac" | "macos" | "osx" => "darwin".to_string(),
        "win" => "windows".to_string(),
        _ => lower,
    }
}

impl Interpolate for When {
    fn interpolate(&mut self, vars: &Vars) {
        self.command.interpolate(vars);
        self.exists.interpolate(vars);
        self.not_exists.interpolate(vars);
        self.os.interpolate(vars);
        self.environment.interpolate(vars);
        self.equal.interpolate(vars);
        self.not_equal.interpolate(vars);
    }
}

/// Guards that must all pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WhenList(pub Vec<When>);

impl WhenList {
    pub fn from_config(config: config::WhenList) -> Self {
        WhenList(config.0.into_iter().map(When::from_item).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, When> {
        self.0.iter()
    }

    /// Evaluate items in order, stopping at the first failure
    pub fn validate(&self, ctx: &Context, vars: &Vars) -> ExecutionResult<Verdict> {
        for when in &self.0 {
            let verdict = when.validate(ctx, vars)?;
            if !verdict.passed() {
                return Ok(verdict);
            }
        }
        Ok(Verdict::Pass)
    }
}

impl Interpolate for WhenList {
    fn interpolate(&mut self, vars: &Vars) {
        self.0.interpolate(vars);
    }
}
