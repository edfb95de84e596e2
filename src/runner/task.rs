//! Task execution types and logic
//!
//! This module contains the runtime representation of tasks and execution logic.

use crate::config;
use crate::error::{CacheError, ConfigResult, ExecutionError, Result};
use crate::runner::{checksum, execute_command, Arg, Command, Context, Run, TaskOption, Vars, Verdict};
use serde::Serialize;
use std::env;
use tracing::{debug, info_span};

/// Runtime task representation
///
/// This differs from config::Task by including computed fields needed during execution
#[derive(Debug, Clone, Default, Serialize)]
pub struct Task {
    /// Task name
    pub name: String,

    /// Usage description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Longer description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether this task is private
    pub private: bool,

    /// Whether this task should run quietly
    pub quiet: bool,

    /// Positional arguments, in declaration order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Arg>,

    /// Named options, in declaration order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<TaskOption>,

    /// Run items to execute
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub run: Vec<Run>,

    /// Finally block
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub finally: Vec<Run>,

    /// Source globs for caching
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,

    /// Target globs for caching
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<String>,

    /// Resolved variable values for this task execution
    #[serde(skip)]
    pub vars: Vars,
}

impl Task {
    /// Create a new task from configuration
    pub fn from_config(name: String, config: config::Task) -> ConfigResult<Self> {
        Ok(Task {
            name,
            usage: config.usage,
            description: config.description,
            private: config.private,
            quiet: config.quiet,
            args: config
                .args
                .into_iter()
                .map(|(name, def)| Arg::from_config(name, def))
                .collect::<ConfigResult<_>>()?,
            options: config
                .options
                .into_iter()
                .map(|(name, def)| TaskOption::from_config(name, def))
                .collect::<ConfigResult<_>>()?,
            run: config.run.into_iter().map(Run::from_config).collect(),
            finally: config.finally.into_iter().map(Run::from_config).collect(),
            source: config.source.into(),
            target: config.target.into(),
            vars: Vars::new(),
        })
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|option| option.name() == name)
    }

    pub fn has_arg(&self, name: &str) -> bool {
        self.args.iter().any(|arg| arg.name() == name)
    }

    /// Tasks with both source and target are skipped when nothing changed
    pub fn is_cacheable(&self) -> bool {
        !self.source.is_empty() && !self.target.is_empty()
    }

    fn cache_globs(&self) -> Vec<String> {
        self.source.iter().chain(self.target.iter()).cloned().collect()
    }

    /// Execute the task in the given context
    ///
    /// The finally block runs whether or not the run block failed. The first
    /// error from either block is returned.
    pub fn execute(&self, ctx: &mut Context) -> Result<()> {
        let _span = info_span!("task", name = %self.name).entered();

        if !self.private {
            ctx.push_task(self.name.clone());
            ctx.logger.task_start(&ctx.label());
        }

        let result = self.execute_run_items(ctx);

        let finally = if self.finally.is_empty() {
            Ok(())
        } else {
            ctx.logger.finally(&ctx.label());
            self.execute_finally_items(ctx)
        };

        if let (Err(_), Err(e)) = (&result, &finally) {
            ctx.logger.error(&format!("{}: finally failed: {}", ctx.label(), e));
        }

        if !self.private {
            if result.is_ok() && finally.is_ok() {
                ctx.logger.task_complete(&ctx.label());
            }
            ctx.pop_task();
        }

        result.and(finally)
    }

    /// Execute the main run items, skipping them when the cache is up to date
    fn execute_run_items(&self, ctx: &mut Context) -> Result<()> {
        let cacheable = self.is_cacheable() && ctx.cache.is_enabled();
        let globs = self.cache_globs();
        let key = ctx.cache_key_path();

        if cacheable {
            match checksum(&ctx.working_dir, &globs) {
                Ok(sum) => {
                    if ctx.cache.is_up_to_date(&key, &self.name, &sum)? {
                        ctx.logger.up_to_date(&ctx.label());
                        return Ok(());
                    }
                }
                Err(CacheError::NoMatch(pattern)) => {
                    debug!(task = %self.name, %pattern, "nothing matched, treating as stale");
                    ctx.logger.debug(&format!("{}: no files match '{}'", ctx.label(), pattern));
                }
                Err(e) => return Err(e.into()),
            }
        }

        for run in &self.run {
            self.execute_run_item(run, ctx)?;
        }

        if cacheable {
            let sum = checksum(&ctx.working_dir, &globs)?;
            ctx.cache.store(&key, &self.name, &sum)?;
        }

        Ok(())
    }

    /// Execute finally items, stopping at the first failure
    fn execute_finally_items(&self, ctx: &mut Context) -> Result<()> {
        for run in &self.finally {
            self.execute_run_item(run, ctx)?;
        }
        Ok(())
    }

    /// Execute a single run item
    fn execute_run_item(&self, run: &Run, ctx: &mut Context) -> Result<()> {
        if let Verdict::Fail(reason) = run.when.validate(ctx, &self.vars)? {
            ctx.logger.skipped(&ctx.label(), &reason);
            return Ok(());
        }

        for command in &run.commands {
            self.execute_command(command, ctx)?;
        }

        if run.tasks.len() != run.subtasks.len() {
            let missing = run
                .subtasks
                .get(run.tasks.len())
                .map(|subtask| subtask.name.clone())
                .unwrap_or_default();
            return Err(ExecutionError::UnresolvedSubTask(missing).into());
        }

        for task in &run.tasks {
            task.execute(ctx)?;
        }

        for (key, value) in &run.set_environment {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
            ctx.logger.set_environment(&ctx.label(), key, value.as_deref());
        }

        Ok(())
    }

    fn execute_command(&self, command: &Command, ctx: &Context) -> Result<()> {
        if !(self.quiet || command.quiet) {
            ctx.logger.command(&ctx.label(), &command.print);
        }

        let dir = match &command.dir {
            Some(dir) => ctx.working_dir.join(dir),
            None => ctx.working_dir.clone(),
        };

        execute_command(&command.exec, &dir, ctx)?;
        Ok(())
    }
}

/// Execute a resolved task
pub fn execute(task: &Task, ctx: &mut Context) -> Result<()> {
    task.execute(ctx)
}
