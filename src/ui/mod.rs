//! User-facing output
//!
//! Everything the runner shows the user goes through [`Ui`], which writes
//! colored, tagged lines to stderr according to the selected [`Verbosity`].
//! Command output itself is never routed through here.

use colored::Colorize;
use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    #[default]
    Normal = 2,
    Verbose = 3,
}

#[derive(Debug, Clone)]
enum Sink {
    Stderr,
    Buffer(Arc<Mutex<Vec<u8>>>),
}

/// Captured output of a buffered [`Ui`]
#[derive(Debug, Clone)]
pub struct OutputBuffer(Arc<Mutex<Vec<u8>>>);

impl OutputBuffer {
    pub fn contents(&self) -> String {
        self.0
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }
}

/// Status and error reporting
#[derive(Debug, Clone)]
pub struct Ui {
    verbosity: Verbosity,
    sink: Sink,
}

impl Ui {
    /// Report to stderr
    pub fn new(verbosity: Verbosity) -> Self {
        Ui {
            verbosity,
            sink: Sink::Stderr,
        }
    }

    /// Report into an in-memory buffer
    pub fn buffered(verbosity: Verbosity) -> (Self, OutputBuffer) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let ui = Ui {
            verbosity,
            sink: Sink::Buffer(Arc::clone(&buf)),
        };
        (ui, OutputBuffer(buf))
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Same sink, different verbosity
    pub fn with_verbosity(&self, verbosity: Verbosity) -> Self {
        Ui {
            verbosity,
            sink: self.sink.clone(),
        }
    }

    fn emit(&self, level: Verbosity, line: String) {
        if self.verbosity < level {
            return;
        }

        match &self.sink {
            Sink::Stderr => {
                let _ = writeln!(io::stderr().lock(), "{}", line);
            }
            Sink::Buffer(buf) => {
                if let Ok(mut buf) = buf.lock() {
                    let _ = writeln!(buf, "{}", line);
                }
            }
        }
    }

    /// Announce a command about to run
    pub fn print_command(&self, text: &str) {
        self.emit(
            Verbosity::Normal,
            format!("{} {}", "[RUN]".cyan().bold(), text.bold()),
        );
    }

    /// Announce that a command failed
    pub fn print_command_error(&self, err: &dyn Display) {
        self.emit(
            Verbosity::Quiet,
            format!("{} {}", "[FAILED]".red().bold(), err),
        );
    }

    /// Print error message
    pub fn print_error(&self, err: &dyn Display) {
        self.emit(
            Verbosity::Quiet,
            format!("{} {}", "[ERROR]".red().bold(), err),
        );
    }

    /// Print task start message
    pub fn print_task_start(&self, task_name: &str) {
        self.emit(
            Verbosity::Verbose,
            format!("{} Running task: {}", "[INFO]".blue(), task_name),
        );
    }

    /// Print task complete message
    pub fn print_task_complete(&self, task_name: &str) {
        self.emit(
            Verbosity::Verbose,
            format!("{} Task completed: {}", "[INFO]".blue(), task_name),
        );
    }

    /// Print task skip message
    pub fn print_task_skip(&self, task_name: &str, reason: &str) {
        self.emit(
            Verbosity::Verbose,
            format!("{} Skipping task '{}': {}", "[SKIP]".yellow(), task_name, reason),
        );
    }

    /// Print debug message (only in verbose mode)
    pub fn print_debug(&self, message: &str) {
        self.emit(
            Verbosity::Verbose,
            format!("{} {}", "[DEBUG]".dimmed(), message),
        );
    }
}

impl Default for Ui {
    fn default() -> Self {
        Ui::new(Verbosity::Normal)
    }
}
