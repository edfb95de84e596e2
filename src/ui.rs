//! Terminal output for task runs
//!
//! Everything the runner tells the user goes through [`Logger`], gated by
//! [`Verbosity`]. Command output itself is inherited by the child process and
//! never passes through here.

use colored::Colorize;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Verbosity-gated writer for runner messages
#[derive(Clone)]
pub struct Logger {
    verbosity: Verbosity,
    sink: Sink,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Logger writing to stderr
    pub fn stderr(verbosity: Verbosity) -> Self {
        Self::with_sink(verbosity, io::stderr())
    }

    /// Logger writing to an arbitrary sink
    pub fn with_sink(verbosity: Verbosity, sink: impl Write + Send + 'static) -> Self {
        Logger {
            verbosity,
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    /// Logger writing to an in-memory buffer, returned alongside it
    pub fn buffered(verbosity: Verbosity) -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::with_sink(verbosity, buffer.clone()), buffer)
    }


    fn write_line(&self, level: Verbosity, line: fmt::Arguments<'_>) {
        if self.verbosity < level {
            return;
        }
        // A poisoned or broken sink only loses log lines.
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{}", line);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        self.write_line(
            Verbosity::Quiet,
            format_args!("{} {}", "error:".red().bold(), message),
        );
    }

    /// Print debug message (only in verbose mode)
    pub fn debug(&self, message: &str) {
        self.write_line(
            Verbosity::Verbose,
            format_args!("{} {}", "debug:".dimmed(), message),
        );
    }

    /// Print task start message
    pub fn task_start(&self, label: &str) {
        self.write_line(
            Verbosity::Normal,
            format_args!("{} {}", label.cyan().bold(), "started".dimmed()),
        );
    }

    /// Print task complete message
    pub fn task_complete(&self, label: &str) {
        self.write_line(
            Verbosity::Verbose,
            format_args!("{} {}", label.cyan().bold(), "finished".dimmed()),
        );
    }

    /// Print the command about to run
    pub fn command(&self, label: &str, command: &str) {
        self.write_line(
            Verbosity::Normal,
            format_args!("{} {} {}", label.cyan().bold(), "$".blue().bold(), command),
        );
    }

    /// Print a skipped step and why
    pub fn skipped(&self, label: &str, reason: &str) {
        self.write_line(
            Verbosity::Verbose,
            format_args!("{} {} {}", label.cyan().bold(), "skipping:".yellow(), reason),
        );
    }

    /// Print a cache hit
    pub fn up_to_date(&self, label: &str) {
        self.write_line(
            Verbosity::Normal,
            format_args!("{} {}", label.cyan().bold(), "up to date, skipping".green()),
        );
    }

    /// Print the start of the finally phase
    pub fn finally(&self, label: &str) {
        self.write_line(
            Verbosity::Verbose,
            format_args!("{} {}", label.cyan().bold(), "finally".magenta()),
        );
    }

    /// Print an environment change
    pub fn set_environment(&self, label: &str, key: &str, value: Option<&str>) {
        match value {
            Some(value) => self.write_line(
                Verbosity::Verbose,
                format_args!("{} {} {}={}", label.cyan().bold(), "export".blue(), key, value),
            ),
            None => self.write_line(
                Verbosity::Verbose,
                format_args!("{} {} {}", label.cyan().bold(), "unset".blue(), key),
            ),
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::stderr(Verbosity::Normal)
    }
}

/// Cloneable in-memory sink, used to inspect output
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Everything written so far
    pub fn contents(&self) -> String {
        self.0
            .lock()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "buffer poisoned"))?;
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
