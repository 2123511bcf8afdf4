//! Plan construction
//!
//! A requested task is expanded depth-first: its `pre` dependencies, then the
//! task itself, then its `post` dependencies. Instances are keyed by
//! [`Invocation`], so a task reached twice with identical inputs is placed
//! once while differing inputs produce separate instances.

use crate::config::{validate_config, Command, Config, Dependency};
use crate::error::{ConfigError, ConfigResult, InterpolationError};
use crate::runner::{
    interpolate, interpolate_list, interpolate_map, resolve_dir, resolve_globals, resolve_task,
    resolve_when_list, Bindings, Builtins, Condition, Context, Layers, Lookup,
};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

/// One request to run a task with specific inputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Invocation {
    pub task: String,
    pub args: Vec<String>,
    pub options: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(task: impl Into<String>) -> Self {
        Invocation {
            task: task.into(),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

/// A scheduled task with everything resolved
#[derive(Debug, Clone)]
pub struct TaskInstance {
    pub invocation: Invocation,

    /// Global options, args and options, in resolution order
    pub bindings: Bindings,

    pub conditions: Vec<Condition>,

    /// Commands with all placeholders substituted
    pub commands: Vec<Command>,

    /// Suppress command announcements
    pub quiet: bool,
}

impl TaskInstance {
    pub fn name(&self) -> &str {
        &self.invocation.task
    }
}

/// Task instances in execution order
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub instances: Vec<TaskInstance>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaskInstance> {
        self.instances.iter()
    }

    /// Task names in execution order
    pub fn names(&self) -> Vec<&str> {
        self.instances.iter().map(TaskInstance::name).collect()
    }
}

/// Build the execution plan for `target`
///
/// Every configuration problem is reported here, before anything runs.
pub fn build_plan(
    config: &Config,
    target: &Invocation,
    global_overrides: &BTreeMap<String, String>,
    ctx: &Context,
) -> ConfigResult<Plan> {
    validate_config(config)?;

    if !config.tasks.contains_key(&target.task) {
        return Err(ConfigError::TaskNotFound(target.task.clone()));
    }

    let builtins = Builtins::new(ctx.config_dir().display().to_string());
    let globals = resolve_globals(&config.options, global_overrides, &builtins, ctx)?;

    let mut planner = Planner {
        config,
        ctx,
        builtins,
        globals,
        placed: HashSet::new(),
        stack: Vec::new(),
        plan: Plan::default(),
    };
    planner.visit(target)?;

    debug!(target = %target.task, plan = ?planner.plan.names(), "built plan");
    Ok(planner.plan)
}

struct Planner<'a> {
    config: &'a Config,
    ctx: &'a Context,
    builtins: Builtins,
    globals: Bindings,
    placed: HashSet<Invocation>,
    stack: Vec<String>,
    plan: Plan,
}

impl Planner<'_> {
    fn visit(&mut self, invocation: &Invocation) -> ConfigResult<()> {
        if self.placed.contains(invocation) {
            return Ok(());
        }

        if let Some(start) = self.stack.iter().position(|name| name == &invocation.task) {
            let mut cycle = self.stack[start..].to_vec();
            cycle.push(invocation.task.clone());
            return Err(ConfigError::CircularDependency(cycle.join(" -> ")));
        }

        let config = self.config;
        let name = invocation.task.as_str();
        let task = config
            .tasks
            .get(name)
            .ok_or_else(|| ConfigError::TaskNotFound(name.to_string()))?;

        let builtins = self.builtins.for_task(name);
        let bindings = resolve_task(
            name,
            task,
            &invocation.args,
            &invocation.options,
            &self.globals,
            &builtins,
            self.ctx,
        )?;
        let vars = Layers(vec![&builtins as &dyn Lookup, &bindings]);
        let in_task = |source: InterpolationError| ConfigError::Interpolation {
            task: name.to_string(),
            source,
        };

        let pre = task
            .pre
            .iter()
            .map(|dep| dependency_invocation(dep, &vars))
            .collect::<Result<Vec<_>, _>>()
            .map_err(in_task)?;
        let post = task
            .post
            .iter()
            .map(|dep| dependency_invocation(dep, &vars))
            .collect::<Result<Vec<_>, _>>()
            .map_err(in_task)?;
        let base_dir = task.base_dir(&self.ctx.config_dir());
        let conditions = resolve_when_list(&task.when, &vars)
            .map_err(in_task)?
            .into_iter()
            .map(|cond| cond.anchored(&base_dir))
            .collect();
        let commands = task
            .run
            .iter()
            .map(|cmd| resolve_command(cmd, &vars, &base_dir))
            .collect::<Result<Vec<_>, _>>()
            .map_err(in_task)?;

        self.stack.push(name.to_string());

        for dep in &pre {
            self.visit(dep)?;
        }

        debug!(task = name, args = ?invocation.args, options = ?invocation.options, "placing task");
        self.placed.insert(invocation.clone());
        self.plan.instances.push(TaskInstance {
            invocation: invocation.clone(),
            bindings,
            conditions,
            commands,
            quiet: task.quiet,
        });

        for dep in &post {
            self.visit(dep)?;
        }

        self.stack.pop();
        Ok(())
    }

}

/// Interpolate a command, anchoring its `dir` at the task's directory
fn resolve_command(
    cmd: &Command,
    vars: &dyn Lookup,
    base_dir: &Path,
) -> Result<Command, InterpolationError> {
    let dir = interpolate(&cmd.dir, vars)?;
    let dir = if dir.is_empty() {
        dir
    } else {
        resolve_dir(&dir, base_dir).display().to_string()
    };

    let exec = interpolate(&cmd.exec, vars)?;
    let mut print = interpolate(&cmd.print, vars)?;
    if print.is_empty() {
        print = exec.clone();
    }

    Ok(Command { exec, print, dir })
}

/// Interpolate a dependency's overrides against the depending task's values
fn dependency_invocation(
    dep: &Dependency,
    vars: &dyn Lookup,
) -> Result<Invocation, InterpolationError> {
    Ok(Invocation {
        task: dep.name.clone(),
        args: interpolate_list(&dep.args, vars)?,
        options: interpolate_map(&dep.options, vars)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::runner::env::SHELL_ENV_VAR;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn plan(yaml: &str, target: Invocation) -> ConfigResult<Plan> {
        let config = parse_config(yaml, None)?;
        let mut env = HashMap::new();
        env.insert(SHELL_ENV_VAR.to_string(), "sh".to_string());
        let ctx = Context::new()
            .with_env(env)
            .with_config_path(PathBuf::from("/project/drover.yml"));
        build_plan(&config, &target, &BTreeMap::new(), &ctx)
    }

    #[test]
    fn test_pre_dependencies_come_first() {
        let yaml = r#"
tasks:
  clean:
    run: rm -rf dist
  build:
    pre: [clean]
    run: go build ./...
"#;
        let plan = plan(yaml, Invocation::new("build")).unwrap();
        assert_eq!(plan.names(), vec!["clean", "build"]);
        assert_eq!(plan.instances[1].commands, vec![Command::new("go build ./...")]);
    }

    #[test]
    fn test_post_dependencies_come_after() {
        let yaml = r#"
tasks:
  a: {run: echo a}
  b: {run: echo b}
  c: {run: echo c}
  main:
    pre: a
    post: [b, c]
    run: echo main
"#;
        let plan = plan(yaml, Invocation::new("main")).unwrap();
        assert_eq!(plan.names(), vec!["a", "main", "b", "c"]);
    }

    #[test]
    fn test_shared_dependency_is_placed_once() {
        let yaml = r#"
tasks:
  setup: {run: echo setup}
  lint: {pre: setup, run: echo lint}
  test: {pre: setup, run: echo test}
  ci: {pre: [lint, test]}
"#;
        let plan = plan(yaml, Invocation::new("ci")).unwrap();
        assert_eq!(plan.names(), vec!["setup", "lint", "test", "ci"]);
    }

    #[test]
    fn test_differing_overrides_create_separate_instances() {
        let yaml = r#"
tasks:
  greet:
    options:
      who: {default: world}
    run: echo hello ${who}
  all:
    pre:
      - greet
      - {name: greet, options: {who: moon}}
      - {name: greet, options: {who: moon}}
"#;
        let plan = plan(yaml, Invocation::new("all")).unwrap();
        assert_eq!(plan.names(), vec!["greet", "greet", "all"]);
        assert_eq!(plan.instances[0].commands[0].exec, "echo hello world");
        assert_eq!(plan.instances[1].commands[0].exec, "echo hello moon");
    }

    #[test]
    fn test_dependency_overrides_use_parent_values() {
        let yaml = r#"
tasks:
  deploy:
    args:
      target: {}
    run: echo deploying ${target}
  release:
    options:
      env: {default: staging}
    pre:
      - {name: deploy, args: ["${env}-cluster"]}
"#;
        let plan = plan(yaml, Invocation::new("release")).unwrap();
        assert_eq!(plan.instances[0].invocation.args, vec!["staging-cluster"]);
        assert_eq!(plan.instances[0].commands[0].exec, "echo deploying staging-cluster");
    }

    #[test]
    fn test_commands_are_interpolated() {
        let yaml = r#"
tasks:
  build:
    options:
      out: {default: dist}
    run:
      - do: mkdir -p ${out} && echo $$HOME
        print: making ${out}
        dir: ${out}
      - echo ${drover.task} in ${drover.dir}
"#;
        let plan = plan(yaml, Invocation::new("build")).unwrap();
        let commands = &plan.instances[0].commands;
        assert_eq!(commands[0].exec, "mkdir -p dist && echo $HOME");
        assert_eq!(commands[0].print, "making dist");
        assert_eq!(commands[0].dir, "/project/dist");
        assert_eq!(commands[1].exec, "echo build in /project");
        assert_eq!(commands[1].print, commands[1].exec);
    }

    #[test]
    fn test_empty_print_falls_back_to_command() {
        let yaml = r#"
tasks:
  t:
    options:
      msg: {}
    run: {do: echo hi, print: "${msg}"}
"#;
        let plan = plan(yaml, Invocation::new("t")).unwrap();
        assert_eq!(plan.instances[0].commands[0].print, "echo hi");
    }

    #[test]
    fn test_exists_conditions_are_anchored() {
        let yaml = r#"
tasks:
  t:
    when:
      not-exists: dist/.lock
    run: echo t
"#;
        let plan = plan(yaml, Invocation::new("t")).unwrap();
        assert_eq!(
            plan.instances[0].conditions,
            vec![Condition::NotExists("/project/dist/.lock".to_string())]
        );
    }

    #[test]
    fn test_unknown_target() {
        let err = plan("tasks: {a: {run: x}}", Invocation::new("missing")).unwrap_err();
        assert_eq!(err.to_string(), "Unknown task 'missing'");
    }

    #[test]
    fn test_cycle_is_rejected() {
        let yaml = r#"
tasks:
  a: {pre: b, run: echo a}
  b: {pre: a, run: echo b}
"#;
        let err = plan(yaml, Invocation::new("a")).unwrap_err();
        assert!(matches!(err, ConfigError::CircularDependency(_)));
        let message = err.to_string();
        assert!(message.contains("a -> b -> a"), "{}", message);
    }

    #[test]
    fn test_self_referencing_default_is_rejected() {
        let yaml = "tasks:\n  t:\n    options:\n      a: {default: \"${a}\"}\n    run: echo ${a}\n";
        let err = plan(yaml, Invocation::new("t").with_option("a", "given")).unwrap_err();
        assert!(matches!(err, ConfigError::OptionReference { .. }));
    }

    #[test]
    fn test_undefined_placeholder_names_task() {
        let yaml = "tasks:\n  t:\n    run: echo ${nope}\n";
        let err = plan(yaml, Invocation::new("t")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'t'"), "{}", message);
        assert!(message.contains("${nope}"), "{}", message);
    }

    #[test]
    fn test_conditions_are_carried() {
        let yaml = r#"
tasks:
  t:
    options:
      mode: {default: fast}
    when:
      equal: {left: "${mode}", right: slow}
    run: echo slow
"#;
        let plan = plan(yaml, Invocation::new("t")).unwrap();
        assert_eq!(
            plan.instances[0].conditions,
            vec![Condition::Equal {
                left: "fast".to_string(),
                right: "slow".to_string(),
            }]
        );
    }
}
