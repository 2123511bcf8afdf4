//! Configuration file parsing and discovery

use crate::config::types::{Config, EnvFile, Task};
use crate::error::{ConfigError, ConfigResult};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["drover.yml", "drover.yaml"];

/// Find the configuration file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the configuration file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a configuration file from a path
pub fn parse_config_file(path: &Path) -> ConfigResult<Config> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    parse_config(&contents, Some(path))
}

/// Parse configuration from a string
///
/// Includes are resolved relative to `config_path` when given, otherwise
/// relative to the current directory.
pub fn parse_config(yaml: &str, config_path: Option<&Path>) -> ConfigResult<Config> {
    let mut config: Config = serde_yaml::from_str(yaml)?;

    let base_dir = config_path
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    process_includes(&mut config, base_dir)?;

    debug!(
        tasks = config.tasks.len(),
        options = config.options.len(),
        "parsed configuration"
    );
    Ok(config)
}

/// Replace tasks that only point at another file with that file's contents
fn process_includes(config: &mut Config, base_dir: &Path) -> ConfigResult<()> {
    for (task_name, task) in config.tasks.iter_mut() {
        let Some(include_path) = task.include.clone() else {
            continue;
        };

        let full_include_path = base_dir.join(&include_path);
        if !is_include_only(task) {
            return Err(ConfigError::IncludeFile {
                path: full_include_path,
                error: format!(
                    "task '{}' cannot define other fields alongside include",
                    task_name
                ),
            });
        }

        debug!(task = task_name, path = %full_include_path.display(), "including task");
        let mut included = load_included_task(&full_include_path)?;
        included.source_dir = Path::new(&include_path)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf);
        *task = included;
    }

    Ok(())
}

fn is_include_only(task: &Task) -> bool {
    task.usage.is_none()
        && task.description.is_none()
        && !task.private
        && !task.quiet
        && task.args.is_empty()
        && task.options.is_empty()
        && task.when.is_empty()
        && task.dependencies().next().is_none()
        && task.run.is_empty()
}

/// Load a task from an included file
fn load_included_task(path: &Path) -> ConfigResult<Task> {
    let include_error = |error: String| ConfigError::IncludeFile {
        path: path.to_path_buf(),
        error,
    };

    let contents = fs::read_to_string(path).map_err(|e| include_error(e.to_string()))?;
    let task: Task = serde_yaml::from_str(&contents).map_err(|e| include_error(e.to_string()))?;

    if task.include.is_some() {
        return Err(include_error("included tasks cannot include other files".to_string()));
    }

    Ok(task)
}

/// Parse configuration with automatic file discovery
pub fn parse_config_auto() -> ConfigResult<(Config, PathBuf)> {
    let config_path = find_config_file()?;
    let config = parse_config_file(&config_path)?;
    Ok((config, config_path))
}

/// Load environment files into the process environment
///
/// Variables that are already set are left untouched.
pub fn load_env_files(files: &[EnvFile], base_dir: &Path) -> ConfigResult<()> {
    for file in files {
        let path = base_dir.join(&file.path);
        if !path.is_file() {
            if file.required {
                return Err(ConfigError::Invalid(format!(
                    "env file {} does not exist",
                    path.display()
                )));
            }
            continue;
        }

        dotenvy::from_path(&path).map_err(|e| {
            ConfigError::Invalid(format!("Failed to load env file {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "loaded env file");
    }

    Ok(())
}
