//! Error types for Drover

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Drover operations
pub type Result<T> = std::result::Result<T, DroverError>;

/// Main error type for Drover
#[derive(Error, Debug)]
pub enum DroverError {
    /// Configuration-related errors, detected before any command runs
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DroverError {
    /// Whether this error was raised while loading or planning
    pub fn is_config(&self) -> bool {
        matches!(self, DroverError::Config(_))
    }

    /// Process exit code to report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DroverError::Execution(ExecutionError::ExitStatus(code)) if *code != 0 => *code,
            DroverError::Execution(ExecutionError::Interrupted) => 130,
            _ => 1,
        }
    }
}

/// A mapping key that is not a plain string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0} is not a valid key name")]
pub struct InvalidKey(pub String);

/// Configuration parsing, validation and planning errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config file (searched: {0})")]
    NotFound(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Duplicate name '{name}' in {scope}")]
    DuplicateName { scope: String, name: String },

    #[error("Argument and option '{0}' must have unique names within a task")]
    DuplicateNames(String),

    #[error("Unknown task '{0}'")]
    TaskNotFound(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Option '{option}' in {scope} cannot reference {reference}")]
    OptionReference {
        scope: String,
        option: String,
        reference: String,
    },

    #[error("In task '{task}': {source}")]
    Interpolation {
        task: String,
        #[source]
        source: InterpolationError,
    },

    #[error("Task '{task}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        task: String,
        expected: usize,
        actual: usize,
    },

    #[error("Option '{option}' in {scope} is required but not provided")]
    RequiredOption { scope: String, option: String },

    #[error("Option '{option}' in {scope} is private and cannot be overridden")]
    PrivateOption { scope: String, option: String },

    #[error("{scope} has no option or argument named '{name}'")]
    UnknownOverride { scope: String, name: String },

    #[error("Invalid value '{value}' for '{name}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Failed to compute default for option '{option}': {source}")]
    DefaultCommand {
        option: String,
        #[source]
        source: ExecutionError,
    },

    #[error("Failed to include file '{path}': {error}")]
    IncludeFile { path: PathBuf, error: String },
}

/// Task execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("exit status {0}")]
    ExitStatus(i32),

    #[error("signal: {0}")]
    Signal(i32),

    #[error("process terminated abnormally")]
    Terminated,

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("interrupted")]
    Interrupted,
}

/// Variable interpolation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("placeholder '${{{0}}}' is not defined")]
    UndefinedVariable(String),
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_message() {
        assert_eq!(ExecutionError::ExitStatus(1).to_string(), "exit status 1");
    }

    #[test]
    fn test_invalid_key_message() {
        let err = ConfigError::from(InvalidKey(r#"["foo" "bar"]"#.to_string()));
        assert_eq!(err.to_string(), r#"["foo" "bar"] is not a valid key name"#);
    }

    #[test]
    fn test_undefined_placeholder_message() {
        let err = InterpolationError::UndefinedVariable("name".to_string());
        assert_eq!(err.to_string(), "placeholder '${name}' is not defined");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(DroverError::from(ExecutionError::ExitStatus(3)).exit_code(), 3);
        assert_eq!(DroverError::from(ExecutionError::Interrupted).exit_code(), 130);
        let config = DroverError::from(ConfigError::TaskNotFound("x".to_string()));
        assert!(config.is_config());
        assert_eq!(config.exit_code(), 1);
    }
}
