use colored::Colorize;
use errand::error::{ErrandError, ExecutionError};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            exit_code(&e)
        }
    }
}

fn run() -> anyhow::Result<()> {
    errand::cli::run()?;
    Ok(())
}

/// A failed command's exit status becomes the process's
fn exit_code(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<ErrandError>() {
        Some(ErrandError::Execution(ExecutionError::CommandFailed(Some(code)))) => {
            u8::try_from(*code).map_or(ExitCode::FAILURE, ExitCode::from)
        }
        _ => ExitCode::FAILURE,
    }
}
