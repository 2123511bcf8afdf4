//! Option and argument resolution
//!
//! Values are resolved in declaration order. Each option takes the first of:
//! an override, its environment binding, the first default candidate whose
//! conditions hold, or the zero value of its type. Defaults only see values
//! resolved before them.

use crate::config::schema::option_reference_error;
use crate::config::{Arg, DefaultSource, OptionType, OrderedMap, Task, TaskOption};
use crate::error::{ConfigError, ConfigResult, InterpolationError};
use crate::runner::{
    capture_command, evaluate_conditions, interpolate, resolve_when_list, Builtins, Context,
    Layers, Lookup,
};
use std::collections::BTreeMap;
use tracing::trace;

/// Scope label used in errors about global options
pub const GLOBAL_SCOPE: &str = "global options";

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// A CLI flag, positional argument or dependency override
    Override,
    /// The option's environment binding
    Environment,
    /// A default candidate or the type's zero value
    Default,
}

/// A resolved value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub value: String,
    pub source: ValueSource,
}

impl Binding {
    pub fn new(value: impl Into<String>, source: ValueSource) -> Self {
        Binding {
            value: value.into(),
            source,
        }
    }
}

/// Resolved values visible to one task instance, in resolution order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings(OrderedMap<Binding>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.0.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|b| b.value.as_str())
    }

    /// Whether `name` was given explicitly rather than defaulted
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name)
            .map(|b| b.source != ValueSource::Default)
            .unwrap_or(false)
    }

    pub fn insert(&mut self, name: impl Into<String>, binding: Binding) {
        self.0.insert(name.into(), binding);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Lookup for Bindings {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.value(name)
    }
}

/// Human-readable scope label for a task
pub fn task_scope(name: &str) -> String {
    format!("task '{}'", name)
}

/// Resolve the global options
pub fn resolve_globals(
    options: &OrderedMap<TaskOption>,
    overrides: &BTreeMap<String, String>,
    builtins: &Builtins,
    ctx: &Context,
) -> ConfigResult<Bindings> {
    let scope = OptionScope {
        label: GLOBAL_SCOPE.to_string(),
        options,
        builtins,
        ctx,
    };
    scope.resolve(overrides, Bindings::new())
}

/// Resolve a task's args and options on top of the global values
///
/// `builtins` should already carry the task name.
pub fn resolve_task(
    name: &str,
    task: &Task,
    args: &[String],
    overrides: &BTreeMap<String, String>,
    globals: &Bindings,
    builtins: &Builtins,
    ctx: &Context,
) -> ConfigResult<Bindings> {
    let mut bindings = globals.clone();
    resolve_args(name, &task.args, args, &mut bindings)?;

    let scope = OptionScope {
        label: task_scope(name),
        options: &task.options,
        builtins,
        ctx,
    };
    scope.resolve(overrides, bindings)
}

fn resolve_args(
    task: &str,
    declared: &OrderedMap<Arg>,
    values: &[String],
    bindings: &mut Bindings,
) -> ConfigResult<()> {
    if declared.len() != values.len() {
        return Err(ConfigError::ArgumentCount {
            task: task.to_string(),
            expected: declared.len(),
            actual: values.len(),
        });
    }

    for ((name, arg), raw) in declared.iter().zip(values) {
        let value = normalize_value(name, arg.arg_type, &arg.values, raw)?;
        bindings.insert(name, Binding::new(value, ValueSource::Override));
    }

    Ok(())
}

/// The options of one scope and what their defaults can see
struct OptionScope<'a> {
    label: String,
    options: &'a OrderedMap<TaskOption>,
    builtins: &'a Builtins,
    ctx: &'a Context,
}

impl OptionScope<'_> {
    fn resolve(
        &self,
        overrides: &BTreeMap<String, String>,
        mut bindings: Bindings,
    ) -> ConfigResult<Bindings> {
        if let Some(name) = overrides.keys().find(|k| !self.options.contains_key(k)) {
            return Err(ConfigError::UnknownOverride {
                scope: self.label.clone(),
                name: name.clone(),
            });
        }

        for (index, (name, option)) in self.options.iter().enumerate() {
            let binding = self.resolve_one(index, name, option, overrides, &bindings)?;
            trace!(scope = %self.label, option = name, value = %binding.value, source = ?binding.source, "resolved option");
            bindings.insert(name, binding);
        }

        Ok(bindings)
    }

    fn resolve_one(
        &self,
        index: usize,
        name: &str,
        option: &TaskOption,
        overrides: &BTreeMap<String, String>,
        bindings: &Bindings,
    ) -> ConfigResult<Binding> {
        let (raw, source) = if let Some(value) = overrides.get(name) {
            if option.private {
                return Err(ConfigError::PrivateOption {
                    scope: self.label.clone(),
                    option: name.to_string(),
                });
            }
            (Some(value.clone()), ValueSource::Override)
        } else if let Some(value) = option
            .environment
            .as_deref()
            .and_then(|var| self.ctx.env_var(var))
        {
            (Some(value), ValueSource::Environment)
        } else if option.required {
            return Err(ConfigError::RequiredOption {
                scope: self.label.clone(),
                option: name.to_string(),
            });
        } else {
            (self.compute_default(index, name, option, bindings)?, ValueSource::Default)
        };

        let value = match raw {
            Some(raw) => normalize_value(name, option.option_type, &option.values, &raw)?,
            None => zero_value(option.option_type).to_string(),
        };
        let value = match (&option.rewrite, option.option_type) {
            (Some(rewrite), OptionType::Bool) if value == "true" => rewrite.clone(),
            (Some(_), OptionType::Bool) => String::new(),
            _ => value,
        };

        Ok(Binding::new(value, source))
    }

    /// The value of the first default candidate whose conditions hold, if any
    fn compute_default(
        &self,
        index: usize,
        name: &str,
        option: &TaskOption,
        bindings: &Bindings,
    ) -> ConfigResult<Option<String>> {
        let vars = Layers(vec![self.builtins as &dyn Lookup, bindings]);
        let reference_error = |e: InterpolationError| self.reference_error(index, name, e);
        let command_error = |source| ConfigError::DefaultCommand {
            option: name.to_string(),
            source,
        };

        for candidate in option.default.iter() {
            let conditions = resolve_when_list(&candidate.when, &vars).map_err(reference_error)?;
            if !evaluate_conditions(&conditions, bindings, self.ctx).map_err(command_error)? {
                continue;
            }

            let text = interpolate(candidate.source.template(), &vars).map_err(reference_error)?;
            let value = match candidate.source {
                DefaultSource::Value(_) => text,
                DefaultSource::Command(_) => capture_command(&text, self.ctx).map_err(command_error)?,
            };
            return Ok(Some(value));
        }

        Ok(None)
    }

    fn reference_error(&self, index: usize, name: &str, err: InterpolationError) -> ConfigError {
        let InterpolationError::UndefinedVariable(var) = err;
        option_reference_error(&self.label, self.options, index, name, &var)
    }
}

/// Value used when nothing else applies
pub fn zero_value(option_type: OptionType) -> &'static str {
    match option_type {
        OptionType::Bool => "false",
        OptionType::Int | OptionType::Float => "0",
        OptionType::String => "",
    }
}

/// Check a value against its type and allowed values
///
/// Bool values are normalized to `true` or `false`.
pub fn normalize_value(
    name: &str,
    option_type: OptionType,
    allowed: &[String],
    raw: &str,
) -> ConfigResult<String> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        name: name.to_string(),
        value: raw.to_string(),
        reason,
    };

    let value = match option_type {
        OptionType::String => raw.to_string(),
        OptionType::Bool => parse_bool(raw)
            .ok_or_else(|| invalid("expected a boolean".to_string()))?
            .to_string(),
        OptionType::Int => {
            let trimmed = raw.trim();
            trimmed
                .parse::<i64>()
                .map_err(|_| invalid("expected an integer".to_string()))?;
            trimmed.to_string()
        }
        OptionType::Float => {
            let trimmed = raw.trim();
            trimmed
                .parse::<f64>()
                .map_err(|_| invalid("expected a number".to_string()))?;
            trimmed.to_string()
        }
    };

    if !allowed.is_empty() && !allowed.iter().any(|v| v == &value) {
        return Err(invalid(format!("must be one of: {}", allowed.join(", "))));
    }

    Ok(value)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Some(true),
        "false" | "f" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}
