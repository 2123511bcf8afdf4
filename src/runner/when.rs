//! When condition evaluation
//!
//! Conditions are interpolated when a task instance is planned and evaluated
//! when it is about to run. All conditions of a list must hold.

use crate::config::{When, WhenList};
use crate::error::{ExecutionResult, InterpolationResult};
use crate::runner::{check_command, interpolate, Bindings, Context, Lookup};
use std::env;
use std::fmt;
use std::path::Path;

/// A run condition with its templates interpolated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Equal { left: String, right: String },
    NotEqual { left: String, right: String },
    Command(String),
    Exists(String),
    NotExists(String),
    Os(Vec<String>),
    EnvSet(String),
    EnvNotSet(String),
    OptionSet(String),
    OptionNotSet(String),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Equal { left, right } => write!(f, "'{}' is not equal to '{}'", left, right),
            Condition::NotEqual { left, right } => write!(f, "'{}' is equal to '{}'", left, right),
            Condition::Command(cmd) => write!(f, "command '{}' failed", cmd),
            Condition::Exists(path) => write!(f, "'{}' does not exist", path),
            Condition::NotExists(path) => write!(f, "'{}' exists", path),
            Condition::Os(names) => write!(f, "os is not one of: {}", names.join(", ")),
            Condition::EnvSet(var) => write!(f, "environment variable '{}' is not set", var),
            Condition::EnvNotSet(var) => write!(f, "environment variable '{}' is set", var),
            Condition::OptionSet(name) => write!(f, "option '{}' is not set", name),
            Condition::OptionNotSet(name) => write!(f, "option '{}' is set", name),
        }
    }
}

impl Condition {
    /// Make relative paths absolute against the defining file's directory
    pub fn anchored(self, base: &Path) -> Condition {
        match self {
            Condition::Exists(path) => Condition::Exists(base.join(path).display().to_string()),
            Condition::NotExists(path) => {
                Condition::NotExists(base.join(path).display().to_string())
            }
            other => other,
        }
    }
}

/// Interpolate every field of a `when` mapping
pub fn resolve_when(when: &When, vars: &dyn Lookup) -> InterpolationResult<Vec<Condition>> {
    let mut out = Vec::new();

    if let Some(cmp) = &when.equal {
        out.push(Condition::Equal {
            left: interpolate(&cmp.left, vars)?,
            right: interpolate(&cmp.right, vars)?,
        });
    }
    if let Some(cmp) = &when.not_equal {
        out.push(Condition::NotEqual {
            left: interpolate(&cmp.left, vars)?,
            right: interpolate(&cmp.right, vars)?,
        });
    }
    if let Some(cmd) = &when.command {
        out.push(Condition::Command(interpolate(cmd, vars)?));
    }
    if let Some(path) = &when.exists {
        out.push(Condition::Exists(interpolate(path, vars)?));
    }
    if let Some(path) = &when.not_exists {
        out.push(Condition::NotExists(interpolate(path, vars)?));
    }
    if !when.os.is_empty() {
        let names = when
            .os
            .iter()
            .map(|name| interpolate(name, vars))
            .collect::<InterpolationResult<Vec<_>>>()?;
        out.push(Condition::Os(names));
    }
    if let Some(var) = &when.env_set {
        out.push(Condition::EnvSet(interpolate(var, vars)?));
    }
    if let Some(var) = &when.env_not_set {
        out.push(Condition::EnvNotSet(interpolate(var, vars)?));
    }
    if let Some(name) = &when.option_set {
        out.push(Condition::OptionSet(name.clone()));
    }
    if let Some(name) = &when.option_not_set {
        out.push(Condition::OptionNotSet(name.clone()));
    }

    Ok(out)
}

/// Interpolate a list of `when` mappings into one flat list
pub fn resolve_when_list(list: &WhenList, vars: &dyn Lookup) -> InterpolationResult<Vec<Condition>> {
    let mut out = Vec::new();
    for when in list.iter() {
        out.extend(resolve_when(when, vars)?);
    }
    Ok(out)
}

/// Evaluate a single condition
pub fn evaluate_condition(
    condition: &Condition,
    bindings: &Bindings,
    ctx: &Context,
) -> ExecutionResult<bool> {
    let holds = match condition {
        Condition::Equal { left, right } => left == right,
        Condition::NotEqual { left, right } => left != right,
        Condition::Command(cmd) => check_command(cmd, ctx)?,
        Condition::Exists(path) => ctx.config_dir().join(Path::new(path)).exists(),
        Condition::NotExists(path) => !ctx.config_dir().join(Path::new(path)).exists(),
        Condition::Os(names) => names.iter().any(|name| name == env::consts::OS),
        Condition::EnvSet(var) => ctx.env_var(var).is_some(),
        Condition::EnvNotSet(var) => ctx.env_var(var).is_none(),
        Condition::OptionSet(name) => bindings.is_set(name),
        Condition::OptionNotSet(name) => !bindings.is_set(name),
    };
    Ok(holds)
}

/// The first condition that does not hold
pub fn first_unmet<'a>(
    conditions: &'a [Condition],
    bindings: &Bindings,
    ctx: &Context,
) -> ExecutionResult<Option<&'a Condition>> {
    for condition in conditions {
        if !evaluate_condition(condition, bindings, ctx)? {
            return Ok(Some(condition));
        }
    }
    Ok(None)
}

/// Evaluate a list of conditions (all must be true - AND logic)
pub fn evaluate_conditions(
    conditions: &[Condition],
    bindings: &Bindings,
    ctx: &Context,
) -> ExecutionResult<bool> {
    Ok(first_unmet(conditions, bindings, ctx)?.is_none())
}
