//! Command execution
//!
//! This module handles executing shell snippets through the context's interpreter.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::Context;
use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use tracing::trace;

/// Build a process that runs `script` through the interpreter in `dir`
fn shell(script: &str, dir: &Path, ctx: &Context) -> ExecutionResult<StdCommand> {
    let (program, interpreter_args) = ctx
        .interpreter
        .split_first()
        .ok_or(ExecutionError::EmptyInterpreter)?;

    let mut command = StdCommand::new(program);
    command.args(interpreter_args);
    command.arg(script);
    command.current_dir(dir);
    trace!(program = %program, script = %script, dir = %dir.display(), "spawning");
    Ok(command)
}

fn spawn_error(ctx: &Context, source: std::io::Error) -> ExecutionError {
    ExecutionError::Spawn {
        program: ctx.interpreter.first().cloned().unwrap_or_default(),
        source,
    }
}

/// Run a command with inherited stdio, failing on a non-zero exit
pub fn execute_command(script: &str, dir: &Path, ctx: &Context) -> ExecutionResult<()> {
    let mut command = shell(script, dir, ctx)?;
    command.stdin(Stdio::inherit());
    command.stdout(Stdio::inherit());
    command.stderr(Stdio::inherit());

    let status = command.status().map_err(|e| spawn_error(ctx, e))?;

    if !status.success() {
        return Err(ExecutionError::CommandFailed(status.code()));
    }

    Ok(())
}

/// Check if a command succeeds (for when conditions)
pub fn check_command(script: &str, ctx: &Context) -> ExecutionResult<bool> {
    let mut command = shell(script, &ctx.working_dir, ctx)?;

    // Suppress output
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    let status = command.status().map_err(|e| spawn_error(ctx, e))?;

    Ok(status.success())
}

/// Run a command and return its trimmed stdout (for computed defaults)
pub fn capture_output(script: &str, ctx: &Context) -> ExecutionResult<String> {
    let mut command = shell(script, &ctx.working_dir, ctx)?;
    command.stdin(Stdio::null());
    command.stderr(Stdio::inherit());

    let output = command.output().map_err(|e| spawn_error(ctx, e))?;

    if !output.status.success() {
        return Err(ExecutionError::CommandFailed(output.status.code()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
