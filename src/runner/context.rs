//! Execution context for task running
//!
//! The context carries everything planning and execution read from the
//! outside world: directories, environment, output and interrupt state.

use crate::runner::env::{shell_from, Environment, ProcessEnv};
use crate::ui::{Ui, Verbosity};
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag raised when the user interrupts the run
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Raise this flag on Ctrl-C. Only one handler can exist per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || flag.trigger())
    }
}

/// Execution context shared by planning and running
#[derive(Clone)]
pub struct Context {
    /// Directory relative command directories are resolved against
    pub working_dir: PathBuf,

    /// Configuration file path
    pub config_path: Option<PathBuf>,

    /// Environment used for option bindings, conditions and shell selection
    pub env: Arc<dyn Environment>,

    /// Status and error output
    pub ui: Ui,

    /// Announce commands without running them
    pub dry_run: bool,

    /// Raised on Ctrl-C
    pub interrupt: Interrupt,
}

impl Context {
    /// Create a new context with default settings
    pub fn new() -> Self {
        Context {
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_path: None,
            env: Arc::new(ProcessEnv),
            ui: Ui::default(),
            dry_run: false,
            interrupt: Interrupt::new(),
        }
    }

    /// Create a context with a specific working directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    /// Set the configuration file path
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Read variables from `env` instead of the process environment
    pub fn with_env(mut self, env: impl Environment + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn with_ui(mut self, ui: Ui) -> Self {
        self.ui = ui;
        self
    }

    /// Set verbosity level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.ui = self.ui.with_verbosity(verbosity);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Get the directory for the config file (or the working dir)
    pub fn config_dir(&self) -> PathBuf {
        let dir = self
            .config_path
            .as_ref()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.working_dir.clone());

        if dir.is_absolute() {
            dir
        } else {
            self.working_dir.join(dir)
        }
    }

    /// Shell binary for commands
    pub fn shell(&self) -> String {
        shell_from(self.env.as_ref())
    }

    /// Look up an environment variable
    pub fn env_var(&self, name: &str) -> Option<String> {
        self.env.var(name)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
