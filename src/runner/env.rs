//! Environment access and shell selection
//!
//! Lookups go through [`Environment`] so resolution can run against a
//! fixed set of variables instead of the live process environment.

use std::collections::HashMap;
use std::env;

/// Environment variable selecting the shell used to run commands
pub const SHELL_ENV_VAR: &str = "SHELL";

/// Shell used when [`SHELL_ENV_VAR`] is unset or empty
pub const DEFAULT_SHELL: &str = "sh";

/// Read access to environment variables
pub trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The environment of the running process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// The shell to invoke, read from the process environment on every call
pub fn get_shell() -> String {
    shell_from(&ProcessEnv)
}

/// The shell to invoke according to `env`
pub fn shell_from(env: &dyn Environment) -> String {
    env.var(SHELL_ENV_VAR)
        .filter(|shell| !shell.is_empty())
        .unwrap_or_else(|| DEFAULT_SHELL.to_string())
}
