//! Main CLI application
//!
//! The command tree is generated from the configuration: one subcommand per
//! public task, with its args as positionals and its options, plus every
//! global option it needs, as flags.

use crate::config::{find_config_file, load_env_files, parse_config_file, Config};
use crate::error::{ErrandError, ResolveResult, Result};
use crate::runner::{find_all_options, Cache, Context, Flags, OptionType, Registry, Resolver, Task, TaskOption};
use crate::ui::{Logger, Verbosity};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::warn;

const CLEAN_CACHE: &str = "clean-cache";
const CLEAN_PROJECT_CACHE: &str = "clean-project-cache";
const CLEAN_TASK_CACHE: &str = "clean-task-cache";

/// CLI application
pub struct App {
    /// The clap command
    command: Command,
    /// Validated tasks and options
    registry: Registry,
    /// Config file path
    config_path: PathBuf,
}

impl App {
    /// Create a new app from the config file found in the current directory or a parent
    pub fn new() -> Result<Self> {
        let path = find_config_file()?;
        Self::with_config_file(path)
    }

    /// Create app with a specific config file
    pub fn with_config_file(path: PathBuf) -> Result<Self> {
        let config = parse_config_file(&path)?;
        Self::from_config(config, path)
    }

    /// Create app from an already parsed config
    pub fn from_config(config: Config, config_path: PathBuf) -> Result<Self> {
        load_env_files(&config, &config_dir(&config_path))?;
        let registry = Registry::from_config(config)?;
        let command = build_command(&registry)?;

        Ok(App {
            command,
            registry,
            config_path,
        })
    }

    /// Run the application with the process arguments
    pub fn run(self) -> Result<()> {
        self.run_from(std::env::args_os())
    }

    /// Run the application with explicit arguments
    pub fn run_from<I, T>(mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command.clone().get_matches_from(args);
        let verbosity = get_verbosity(&matches);

        if let Some(task_name) = matches.get_one::<String>(CLEAN_TASK_CACHE) {
            Cache::new(None)?.clean_task(&self.config_path, task_name)?;
            return Ok(());
        }
        if matches.get_flag(CLEAN_PROJECT_CACHE) {
            Cache::new(None)?.clean_project(&self.config_path)?;
            return Ok(());
        }

        let (task_name, task_matches) = match matches.subcommand() {
            Some((name, sub_matches)) => (name.to_string(), sub_matches),
            None => {
                self.command.print_help()?;
                println!();
                return Ok(());
            }
        };

        let template = self
            .registry
            .task(&task_name)
            .ok_or_else(|| crate::error::ResolveError::TaskNotFound(task_name.clone()))?;
        let args = collect_args(template, task_matches);
        let flags = collect_flags(template, &self.registry, task_matches)?;

        let mut ctx = self.context(verbosity);
        let task = Resolver::new(&self.registry, &ctx).resolve(&task_name, &args, &flags)?;
        task.execute(&mut ctx)
    }

    fn context(&self, verbosity: Verbosity) -> Context {
        let mut ctx = Context::new()
            .with_working_dir(config_dir(&self.config_path))
            .with_config_path(self.config_path.clone())
            .with_logger(Logger::stderr(verbosity));

        if let Some(interpreter) = &self.registry.interpreter {
            ctx = ctx.with_interpreter(interpreter.clone());
        }

        match Cache::new(None) {
            Ok(cache) => ctx.with_cache(cache),
            Err(e) => {
                warn!(error = %e, "checksum cache disabled");
                ctx
            }
        }
    }
}

fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Build the clap command from the registry
pub fn build_command(registry: &Registry) -> ResolveResult<Command> {
    let mut cmd = Command::new(registry.name.clone().unwrap_or_else(|| "errand".to_string()))
        .version(env!("CARGO_PKG_VERSION"))
        .about(
            registry
                .usage
                .clone()
                .unwrap_or_else(|| "A YAML-based task runner".to_string()),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to errand.yml config file")
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new(CLEAN_CACHE)
                .long(CLEAN_CACHE)
                .help("Delete every stored checksum")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(CLEAN_PROJECT_CACHE)
                .long(CLEAN_PROJECT_CACHE)
                .help("Delete the stored checksums for this config file")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(CLEAN_TASK_CACHE)
                .long(CLEAN_TASK_CACHE)
                .value_name("TASK")
                .help("Delete the stored checksum for one task"),
        );

    for task in registry.public_tasks() {
        cmd = cmd.subcommand(task_command(task, registry)?);
    }

    Ok(cmd)
}

fn task_command(task: &Task, registry: &Registry) -> ResolveResult<Command> {
    let mut task_cmd = Command::new(task.name.clone()).about(task.usage.clone().unwrap_or_default());

    if let Some(desc) = &task.description {
        task_cmd = task_cmd.long_about(desc.clone());
    }

    for arg in &task.args {
        let mut help = arg.base.usage.clone();
        if !arg.base.values_allowed.is_empty() {
            help = format!("{} [values: {}]", help, arg.base.values_allowed.join(", "));
        }
        task_cmd = task_cmd.arg(
            Arg::new(arg.name().to_string())
                .value_name(arg.name().to_uppercase())
                .help(help)
                .required(true),
        );
    }

    let globals = find_all_options(task, &registry.options)?;
    for option in task.options.iter().chain(globals) {
        if option.private {
            continue;
        }
        task_cmd = task_cmd.arg(option_arg(option));
    }

    Ok(task_cmd)
}

fn option_arg(option: &TaskOption) -> Arg {
    let name = option.name().to_string();
    let mut arg = Arg::new(name.clone()).long(name.clone());

    let mut help = option.base.usage.clone();
    if !option.base.values_allowed.is_empty() {
        help = format!("{} [values: {}]", help, option.base.values_allowed.join(", "));
    }
    if let Some(var) = &option.environment {
        help = format!("{} [env: {}]", help, var);
    }
    arg = arg.help(help);

    if let Some(short) = option.short {
        arg = arg.short(short);
    }

    match option.base.value_type {
        OptionType::Bool => arg.action(ArgAction::SetTrue),
        _ => arg.value_name(name.to_uppercase()).action(ArgAction::Set),
    }
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Positional values, in the task's declaration order
fn collect_args(task: &Task, matches: &ArgMatches) -> Vec<String> {
    task.args
        .iter()
        .filter_map(|arg| matches.get_one::<String>(arg.name()).cloned())
        .collect()
}

/// Option values given on the command line
///
/// Options that were not passed are left out so the engine can fall back to
/// the environment and defaults.
fn collect_flags(task: &Task, registry: &Registry, matches: &ArgMatches) -> ResolveResult<Flags> {
    let mut flags = Flags::new();
    let globals = find_all_options(task, &registry.options)?;

    for option in task.options.iter().chain(globals) {
        if option.private {
            continue;
        }
        let name = option.name();
        if matches.value_source(name) != Some(ValueSource::CommandLine) {
            continue;
        }

        let value = match option.base.value_type {
            OptionType::Bool => matches.get_flag(name).to_string(),
            _ => matches.get_one::<String>(name).cloned().unwrap_or_default(),
        };
        flags.insert(name.to_string(), value);
    }

    Ok(flags)
}

/// Run the CLI application with the process arguments
pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == &format!("--{}", CLEAN_CACHE)) {
        return Cache::new(None)?.clean_all().map_err(ErrandError::from);
    }

    let app = match extract_file_arg(&args) {
        Some(path) => App::with_config_file(path)?,
        None => App::new()?,
    };

    app.run()
}

/// Extract --file argument before clap parsing
fn extract_file_arg(args: &[String]) -> Option<PathBuf> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--file" || arg == "-f" {
            return iter.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--file=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}
