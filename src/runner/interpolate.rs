//! Variable interpolation for strings
//!
//! `${name}` is replaced by a resolved value and `$$` by a literal `$`.
//! Substituted values are not interpolated again.

use crate::error::{InterpolationError, InterpolationResult};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Built-in name for the configuration directory
pub const DIR_BUILTIN: &str = "drover.dir";

/// Built-in name for the current task
pub const TASK_BUILTIN: &str = "drover.task";

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\$|\$\{([^}]*)\}").expect("placeholder pattern is valid"))
}

/// A source of named values
pub trait Lookup {
    fn lookup(&self, name: &str) -> Option<&str>;
}

impl Lookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl Lookup for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// Several lookups searched in order
pub struct Layers<'a>(pub Vec<&'a dyn Lookup>);

impl Lookup for Layers<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.0.iter().find_map(|layer| layer.lookup(name))
    }
}

/// Built-in values available to every template
#[derive(Debug, Clone)]
pub struct Builtins {
    dir: String,
    task: Option<String>,
}

impl Builtins {
    pub fn new(dir: impl Into<String>) -> Self {
        Builtins {
            dir: dir.into(),
            task: None,
        }
    }

    pub fn for_task(&self, task: &str) -> Self {
        Builtins {
            dir: self.dir.clone(),
            task: Some(task.to_string()),
        }
    }

    /// Whether `name` is a built-in in a task scope
    pub fn is_builtin(name: &str) -> bool {
        name == DIR_BUILTIN || name == TASK_BUILTIN
    }
}

impl Lookup for Builtins {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            DIR_BUILTIN => Some(self.dir.as_str()),
            TASK_BUILTIN => self.task.as_deref(),
            _ => None,
        }
    }
}

/// Interpolate variables in a string, failing on any undefined placeholder
pub fn interpolate(s: &str, vars: &dyn Lookup) -> InterpolationResult<String> {
    let mut result = String::with_capacity(s.len());
    let mut last = 0;

    for caps in pattern().captures_iter(s) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        result.push_str(&s[last..whole.start()]);

        match caps.get(1) {
            None => result.push('$'),
            Some(name) => {
                let name = name.as_str().trim();
                let value = vars
                    .lookup(name)
                    .ok_or_else(|| InterpolationError::UndefinedVariable(name.to_string()))?;
                result.push_str(value);
            }
        }

        last = whole.end();
    }

    result.push_str(&s[last..]);
    Ok(result)
}

/// Names referenced by placeholders in a string, in order of appearance
pub fn placeholders(s: &str) -> Vec<&str> {
    pattern()
        .captures_iter(s)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str().trim())
        .collect()
}

/// Interpolate all values in a map
pub fn interpolate_map(
    map: &BTreeMap<String, String>,
    vars: &dyn Lookup,
) -> InterpolationResult<BTreeMap<String, String>> {
    map.iter()
        .map(|(key, value)| Ok((key.clone(), interpolate(value, vars)?)))
        .collect()
}

/// Interpolate a list of strings
pub fn interpolate_list(list: &[String], vars: &dyn Lookup) -> InterpolationResult<Vec<String>> {
    list.iter().map(|s| interpolate(s, vars)).collect()
}
