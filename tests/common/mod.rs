//! Common test utilities

#![allow(dead_code)]

use drover::config::{parse_config_file, Config};
use drover::runner::env::SHELL_ENV_VAR;
use drover::runner::Context;
use drover::ui::{OutputBuffer, Ui, Verbosity};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary directory with a drover.yml file
pub fn create_test_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("drover.yml");
    fs::write(&config_path, content).unwrap();
    (temp_dir, config_path)
}

/// Create a test config with an empty subdirectory next to it
pub fn create_test_config_in_subdir(content: &str) -> (TempDir, PathBuf, PathBuf) {
    let (temp_dir, config_path) = create_test_config(content);
    let sub_dir = temp_dir.path().join("subdir");
    fs::create_dir(&sub_dir).unwrap();
    (temp_dir, config_path, sub_dir)
}

/// Load a config file written by one of the helpers above
pub fn load(config_path: &Path) -> Config {
    parse_config_file(config_path).unwrap()
}

/// A context rooted at the config file, with a fixed environment and
/// captured status output
pub fn test_context(config_path: &Path, env: &[(&str, &str)]) -> (Context, OutputBuffer) {
    let mut vars: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    vars.entry(SHELL_ENV_VAR.to_string())
        .or_insert_with(|| "sh".to_string());

    let (ui, out) = Ui::buffered(Verbosity::Normal);
    let ctx = Context::new()
        .with_ui(ui)
        .with_env(vars)
        .with_working_dir(config_path.parent().unwrap().to_path_buf())
        .with_config_path(config_path.to_path_buf());
    (ctx, out)
}

/// Read a file in the temp dir, empty if missing
pub fn read(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join(name)).unwrap_or_default()
}
