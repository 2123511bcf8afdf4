//! Configuration validation
//!
//! Everything that can be checked without resolving values is checked here,
//! so a broken file fails before any command runs.

use crate::config::types::{Config, Dependency, OptionType, Task, TaskOption};
use crate::config::OrderedMap;
use crate::error::{ConfigError, ConfigResult, InterpolationError};
use crate::runner::interpolate::{placeholders, Builtins, DIR_BUILTIN};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Long flags owned by the command line itself
pub const RESERVED_NAMES: &[&str] = &["file", "quiet", "silent", "verbose", "dry-run", "help", "version"];

/// Short flags owned by the command line itself
pub const RESERVED_SHORTS: &[&str] = &["f", "q", "s", "v", "n", "h", "V"];

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("name pattern is valid"))
}

/// Validate a complete configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    validate_scope_options("global options", &config.options, &[])?;
    validate_global_references(config)?;

    for (name, task) in config.tasks.iter() {
        validate_task(config, name, task)?;
    }

    detect_circular_dependencies(config)?;

    Ok(())
}

/// Validate a single task
pub fn validate_task(config: &Config, name: &str, task: &Task) -> ConfigResult<()> {
    validate_name("task", name)?;
    if name == "help" {
        return Err(ConfigError::Invalid(
            "task name 'help' is reserved by the command line".to_string(),
        ));
    }
    let scope = format!("task '{}'", name);

    for arg_name in task.args.names() {
        validate_name("argument", arg_name)?;
        if task.options.contains_key(arg_name) {
            return Err(ConfigError::DuplicateNames(arg_name.to_string()));
        }
    }

    for local in task.args.names().chain(task.options.names()) {
        if config.options.contains_key(local) {
            return Err(ConfigError::DuplicateName {
                scope: scope.clone(),
                name: format!("{} (already a global option)", local),
            });
        }
    }

    let global_shorts: Vec<&str> = config
        .options
        .values()
        .filter_map(|o| o.short.as_deref())
        .collect();
    validate_scope_options(&scope, &task.options, &global_shorts)?;

    for dep in task.dependencies() {
        validate_dependency(config, dep)?;
    }

    validate_task_references(config, name, task)
}

fn validate_name(kind: &str, name: &str) -> ConfigResult<()> {
    if !name_pattern().is_match(name) {
        return Err(ConfigError::Invalid(format!(
            "{} name '{}' must start with a letter or underscore and contain only letters, digits, '_' and '-'",
            kind, name
        )));
    }
    Ok(())
}

/// Check the options of one scope against each other and the command line
fn validate_scope_options(
    scope: &str,
    options: &OrderedMap<TaskOption>,
    taken_shorts: &[&str],
) -> ConfigResult<()> {
    let mut shorts: HashSet<&str> = taken_shorts.iter().copied().collect();
    let invalid = |name: &str, problem: &str| {
        ConfigError::Invalid(format!("option '{}' in {} {}", name, scope, problem))
    };

    for (name, option) in options.iter() {
        validate_name("option", name)?;
        if RESERVED_NAMES.contains(&name) {
            return Err(invalid(name, "uses a name reserved by the command line"));
        }

        if let Some(short) = option.short.as_deref() {
            if short.chars().count() != 1 {
                return Err(invalid(name, "must use a single character for `short`"));
            }
            if RESERVED_SHORTS.contains(&short) || !shorts.insert(short) {
                return Err(invalid(name, &format!("cannot use short flag '-{}'", short)));
            }
        }

        if option.required && !option.default.is_empty() {
            return Err(invalid(name, "cannot be required and have a default"));
        }
        if option.private && option.required {
            return Err(invalid(name, "cannot be both private and required"));
        }
        if option.rewrite.is_some() && option.option_type != OptionType::Bool {
            return Err(invalid(name, "can only use `rewrite` with type bool"));
        }
    }

    Ok(())
}

/// Check that a dependency matches the task it names
fn validate_dependency(config: &Config, dep: &Dependency) -> ConfigResult<()> {
    let target = config
        .tasks
        .get(&dep.name)
        .ok_or_else(|| ConfigError::TaskNotFound(dep.name.clone()))?;

    if dep.args.len() != target.args.len() {
        return Err(ConfigError::ArgumentCount {
            task: dep.name.clone(),
            expected: target.args.len(),
            actual: dep.args.len(),
        });
    }

    let scope = format!("task '{}'", dep.name);
    for option_name in dep.options.keys() {
        match target.options.get(option_name) {
            None => {
                return Err(ConfigError::UnknownOverride {
                    scope,
                    name: option_name.clone(),
                })
            }
            Some(option) if option.private => {
                return Err(ConfigError::PrivateOption {
                    scope,
                    option: option_name.clone(),
                })
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Error for a default that references something it cannot see
pub(crate) fn option_reference_error(
    scope: &str,
    options: &OrderedMap<TaskOption>,
    index: usize,
    name: &str,
    reference: &str,
) -> ConfigError {
    let reference = if reference == name {
        "itself".to_string()
    } else if options.position(reference).map_or(false, |pos| pos > index) {
        format!("'{}', which is declared after it", reference)
    } else {
        format!("'{}', which is not defined", reference)
    };

    ConfigError::OptionReference {
        scope: scope.to_string(),
        option: name.to_string(),
        reference,
    }
}

/// Every template an option default can evaluate, including its conditions
fn default_templates(option: &TaskOption) -> Vec<&str> {
    let mut out = Vec::new();
    for candidate in option.default.iter() {
        for when in candidate.when.iter() {
            out.extend(when.templates());
        }
        out.push(candidate.source.template());
    }
    out
}

fn default_option_names(option: &TaskOption) -> Vec<&str> {
    option
        .default
        .iter()
        .flat_map(|candidate| candidate.when.iter())
        .flat_map(|when| when.option_names())
        .collect()
}

fn validate_global_references(config: &Config) -> ConfigResult<()> {
    let scope = "global options";

    for (index, (name, option)) in config.options.iter().enumerate() {
        let visible = |var: &str| {
            var == DIR_BUILTIN || config.options.position(var).map_or(false, |pos| pos < index)
        };

        for template in default_templates(option) {
            if let Some(var) = placeholders(template).into_iter().find(|var| !visible(*var)) {
                return Err(option_reference_error(scope, &config.options, index, name, var));
            }
        }
        for var in default_option_names(option) {
            if !visible(var) {
                return Err(option_reference_error(scope, &config.options, index, name, var));
            }
        }
    }

    Ok(())
}

fn validate_task_references(config: &Config, task_name: &str, task: &Task) -> ConfigResult<()> {
    let scope = format!("task '{}'", task_name);
    let shared = |var: &str| {
        Builtins::is_builtin(var) || config.options.contains_key(var) || task.args.contains_key(var)
    };

    for (index, (name, option)) in task.options.iter().enumerate() {
        let visible =
            |var: &str| shared(var) || task.options.position(var).map_or(false, |pos| pos < index);

        for template in default_templates(option) {
            if let Some(var) = placeholders(template).into_iter().find(|var| !visible(*var)) {
                return Err(option_reference_error(&scope, &task.options, index, name, var));
            }
        }
        for var in default_option_names(option) {
            if !visible(var) {
                return Err(option_reference_error(&scope, &task.options, index, name, var));
            }
        }
    }

    let visible = |var: &str| shared(var) || task.options.contains_key(var);
    let undefined = |var: &str| ConfigError::Interpolation {
        task: task_name.to_string(),
        source: InterpolationError::UndefinedVariable(var.to_string()),
    };

    let mut templates: Vec<&str> = Vec::new();
    for cmd in task.run.iter() {
        templates.extend([cmd.exec.as_str(), cmd.print.as_str(), cmd.dir.as_str()]);
    }
    for when in task.when.iter() {
        templates.extend(when.templates());
        for var in when.option_names() {
            if !visible(var) {
                return Err(ConfigError::Invalid(format!(
                    "condition in {} refers to unknown option '{}'",
                    scope, var
                )));
            }
        }
    }
    for dep in task.dependencies() {
        templates.extend(dep.args.iter().map(String::as_str));
        templates.extend(dep.options.values().map(String::as_str));
    }

    for template in templates {
        if let Some(var) = placeholders(template).into_iter().find(|var| !visible(*var)) {
            return Err(undefined(var));
        }
    }

    Ok(())
}

/// Detect cycles in the `pre`/`post` relation
fn detect_circular_dependencies(config: &Config) -> ConfigResult<()> {
    let mut visited = HashSet::new();
    for task_name in config.tasks.names() {
        let mut stack = Vec::new();
        check_task_cycle(config, task_name, &mut visited, &mut stack)?;
    }
    Ok(())
}

/// Recursively check for cycles in task dependencies
fn check_task_cycle<'a>(
    config: &'a Config,
    task_name: &'a str,
    visited: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
) -> ConfigResult<()> {
    if let Some(start) = stack.iter().position(|name| *name == task_name) {
        let mut cycle = stack[start..].to_vec();
        cycle.push(task_name);
        return Err(ConfigError::CircularDependency(cycle.join(" -> ")));
    }

    if visited.contains(task_name) {
        return Ok(());
    }

    let task = config
        .tasks
        .get(task_name)
        .ok_or_else(|| ConfigError::TaskNotFound(task_name.to_string()))?;

    stack.push(task_name);
    for dep in task.dependencies() {
        check_task_cycle(config, &dep.name, visited, stack)?;
    }
    stack.pop();
    visited.insert(task_name);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn validate(yaml: &str) -> ConfigResult<()> {
        validate_config(&parse_config(yaml, None)?)
    }

    fn message(yaml: &str) -> String {
        validate(yaml).unwrap_err().to_string()
    }

    #[test]
    fn test_valid_config() {
        let yaml = r#"
options:
  profile: {default: dev}
tasks:
  clean:
    run: rm -rf dist
  build:
    args:
      target: {}
    options:
      out: {default: "dist/${profile}/${target}"}
      log: {default: "${out}/build.log"}
    pre: clean
    run: cargo build --out ${out} > ${log}
"#;
        validate(yaml).unwrap();
    }

    #[test]
    fn test_duplicate_arg_and_option() {
        let yaml = "tasks:\n  t:\n    args:\n      x: {}\n    options:\n      x: {}\n";
        assert!(matches!(validate(yaml), Err(ConfigError::DuplicateNames(_))));
    }

    #[test]
    fn test_option_shadowing_global() {
        let yaml = "options:\n  x: {}\ntasks:\n  t:\n    options:\n      x: {}\n";
        assert!(matches!(validate(yaml), Err(ConfigError::DuplicateName { .. })));
    }

    #[test]
    fn test_invalid_names() {
        assert!(message("tasks:\n  bad name:\n    run: x\n").contains("bad name"));
        assert!(message("tasks:\n  t:\n    options:\n      verbose: {}\n").contains("reserved"));
        assert!(message("tasks:\n  t:\n    options:\n      a: {short: q}\n").contains("-q"));
    }

    #[test]
    fn test_option_rules() {
        assert!(message("tasks:\n  t:\n    options:\n      a: {required: true, default: x}\n")
            .contains("required and have a default"));
        assert!(message("tasks:\n  t:\n    options:\n      a: {required: true, private: true}\n")
            .contains("private and required"));
        assert!(message("tasks:\n  t:\n    options:\n      a: {rewrite: x}\n")
            .contains("rewrite"));
    }

    #[test]
    fn test_dependency_checks() {
        assert_eq!(
            message("tasks:\n  t:\n    pre: missing\n"),
            "Unknown task 'missing'"
        );

        let yaml = "tasks:\n  a:\n    args:\n      x: {}\n  t:\n    pre: a\n";
        assert!(matches!(validate(yaml), Err(ConfigError::ArgumentCount { .. })));

        let yaml = "tasks:\n  a: {}\n  t:\n    pre: {name: a, options: {nope: 1}}\n";
        assert!(matches!(validate(yaml), Err(ConfigError::UnknownOverride { .. })));

        let yaml = "tasks:\n  a:\n    options:\n      p: {private: true}\n  t:\n    pre: {name: a, options: {p: 1}}\n";
        assert!(matches!(validate(yaml), Err(ConfigError::PrivateOption { .. })));
    }

    #[test]
    fn test_self_reference() {
        let err = message("tasks:\n  t:\n    options:\n      a: {default: \"${a}\"}\n");
        assert_eq!(err, "Option 'a' in task 't' cannot reference itself");
    }

    #[test]
    fn test_forward_reference() {
        let err = message(
            "tasks:\n  t:\n    options:\n      a: {default: \"${b}\"}\n      b: {default: x}\n",
        );
        assert_eq!(
            err,
            "Option 'a' in task 't' cannot reference 'b', which is declared after it"
        );
    }

    #[test]
    fn test_global_default_cannot_see_task_builtin() {
        let err = message("options:\n  a: {default: \"${drover.task}\"}\n");
        assert!(err.contains("global options"), "{}", err);
    }

    #[test]
    fn test_reference_in_default_condition() {
        let yaml = r#"
tasks:
  t:
    options:
      a:
        default:
          - when: {equal: {left: "${b}", right: x}}
            value: y
      b: {}
"#;
        assert!(message(yaml).contains("declared after it"));
    }

    #[test]
    fn test_undefined_placeholder_in_command() {
        let err = message("tasks:\n  t:\n    run: echo ${nope}\n");
        assert_eq!(err, "In task 't': placeholder '${nope}' is not defined");
    }

    #[test]
    fn test_escaped_placeholder_is_allowed() {
        validate("tasks:\n  t:\n    run: echo $${HOME}\n").unwrap();
    }

    #[test]
    fn test_unknown_option_in_condition() {
        let err = message("tasks:\n  t:\n    when: {option-set: nope}\n");
        assert!(err.contains("nope"), "{}", err);
    }

    #[test]
    fn test_circular_dependency() {
        let yaml = r#"
tasks:
  root:
    pre: a
  a:
    pre: b
  b:
    post: a
"#;
        let err = validate(yaml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Circular dependency detected: a -> b -> a"
        );
    }

    #[test]
    fn test_self_dependency() {
        let err = message("tasks:\n  a:\n    pre: a\n");
        assert_eq!(err, "Circular dependency detected: a -> a");
    }
}
