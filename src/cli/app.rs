//! Main CLI application

use crate::config::{
    load_env_files, parse_config_auto, parse_config_file, validate_config, Config, OptionType,
    OrderedMap, TaskOption,
};
use crate::error::{ConfigError, DroverError};
use crate::runner::{build_plan, Context, Engine, Interrupt, Invocation};
use crate::ui::Verbosity;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// CLI application
pub struct App {
    /// The clap command
    command: Command,
    /// Parsed configuration
    config: Config,
    /// Config file path
    config_path: PathBuf,
}

impl App {
    /// Create a new app from the discovered configuration file
    pub fn new() -> Result<Self, DroverError> {
        let (config, config_path) = parse_config_auto()?;
        Self::from_config(config, config_path)
    }

    /// Create app with a specific config file
    pub fn with_config_file(path: PathBuf) -> Result<Self, DroverError> {
        let config = parse_config_file(&path)?;
        Self::from_config(config, path)
    }

    fn from_config(config: Config, config_path: PathBuf) -> Result<Self, DroverError> {
        validate_config(&config)?;
        let command = build_command(&config);

        Ok(App {
            command,
            config,
            config_path,
        })
    }

    /// The generated command line definition
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Run the application with the process arguments
    pub fn run(self) -> Result<(), DroverError> {
        self.run_from(env::args_os())
    }

    /// Run the application with the given arguments
    pub fn run_from<I, T>(mut self, args: I) -> Result<(), DroverError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command.clone().get_matches_from(args);

        let (task_name, task_matches) = match matches.subcommand() {
            Some((name, sub_matches)) => (name.to_string(), sub_matches),
            None => {
                // No task specified, show help
                self.command.print_help()?;
                println!();
                return Ok(());
            }
        };

        let task = self
            .config
            .tasks
            .get(&task_name)
            .ok_or_else(|| ConfigError::TaskNotFound(task_name.clone()))?;

        let invocation = Invocation {
            task: task_name.clone(),
            args: task_args(task.args.names(), task_matches),
            options: option_overrides(&task.options, task_matches),
        };
        let global_overrides = option_overrides(&self.config.options, task_matches);

        let config_path = absolute(&self.config_path)?;
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        env::set_current_dir(&config_dir)?;
        load_env_files(&self.config.env_files(), &config_dir)?;

        let interrupt = Interrupt::new();
        if let Err(e) = interrupt.install() {
            warn!("could not install interrupt handler: {}", e);
        }

        let ctx = Context::new()
            .with_working_dir(config_dir)
            .with_config_path(config_path)
            .with_verbosity(get_verbosity(task_matches))
            .with_dry_run(task_matches.get_flag("dry-run"))
            .with_interrupt(interrupt);

        let plan = build_plan(&self.config, &invocation, &global_overrides, &ctx)?;
        debug!(instances = plan.len(), "running plan");

        let mut engine = Engine::new(plan);
        engine.run(&ctx)?;

        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf, DroverError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Build the clap command from configuration
pub fn build_command(config: &Config) -> Command {
    let mut cmd = Command::new(config.name.clone().unwrap_or_else(|| "drover".to_string()))
        .version(env!("CARGO_PKG_VERSION"))
        .about(
            config
                .usage
                .clone()
                .unwrap_or_else(|| "A declarative YAML task runner".to_string()),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to drover.yml config file")
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .help("Print commands without running them")
                .action(ArgAction::SetTrue)
                .global(true),
        );

    for (name, option) in config.options.iter() {
        if !option.private {
            cmd = cmd.arg(option_arg(name, option).global(true));
        }
    }

    // Add subcommands for each task
    for (task_name, task) in config.tasks.iter() {
        if task.private {
            continue;
        }

        let mut task_cmd =
            Command::new(task_name.to_string()).about(task.usage.clone().unwrap_or_default());

        if let Some(desc) = &task.description {
            task_cmd = task_cmd.long_about(desc.clone());
        }

        for (arg_name, arg) in task.args.iter() {
            task_cmd = task_cmd.arg(
                Arg::new(arg_name.to_string())
                    .value_name(arg_name.to_uppercase())
                    .help(arg.usage.clone().unwrap_or_default())
                    .required(true),
            );
        }

        for (opt_name, opt) in task.options.iter() {
            if !opt.private {
                task_cmd = task_cmd.arg(option_arg(opt_name, opt));
            }
        }

        cmd = cmd.subcommand(task_cmd);
    }

    cmd
}

/// Flag definition for an option
///
/// Defaults and requirements are left to resolution so that environment
/// bindings and computed defaults keep working.
fn option_arg(name: &str, option: &TaskOption) -> Arg {
    let mut arg = Arg::new(name.to_string())
        .long(name.to_string())
        .help(option.usage.clone().unwrap_or_default());

    if let Some(c) = option.short.as_deref().and_then(|s| s.chars().next()) {
        arg = arg.short(c);
    }

    match option.option_type {
        OptionType::Bool => arg.action(ArgAction::SetTrue),
        _ => arg.value_name(name.to_uppercase()).action(ArgAction::Set),
    }
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Positional values in declaration order
fn task_args<'a>(names: impl Iterator<Item = &'a str>, matches: &ArgMatches) -> Vec<String> {
    names
        .filter_map(|name| matches.get_one::<String>(name).cloned())
        .collect()
}

/// Options given explicitly on the command line
fn option_overrides(
    options: &OrderedMap<TaskOption>,
    matches: &ArgMatches,
) -> BTreeMap<String, String> {
    options
        .iter()
        .filter(|(name, option)| {
            !option.private && matches.value_source(name) == Some(ValueSource::CommandLine)
        })
        .filter_map(|(name, option)| {
            let value = match option.option_type {
                OptionType::Bool => "true".to_string(),
                _ => matches.get_one::<String>(name)?.clone(),
            };
            Some((name.to_string(), value))
        })
        .collect()
}

/// Run the CLI application with the process arguments
pub fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let app = match extract_file_arg(&args) {
        Some(path) => App::with_config_file(path)?,
        None => App::new()?,
    };

    app.run()?;
    Ok(())
}

/// Extract --file argument before clap parsing
fn extract_file_arg(args: &[String]) -> Option<PathBuf> {
    for (i, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--file=") {
            return Some(PathBuf::from(path));
        }
        if (arg == "--file" || arg == "-f") && i + 1 < args.len() {
            return Some(PathBuf::from(&args[i + 1]));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const CONFIG: &str = r#"
name: demo
usage: Demo tasks
options:
  profile: {default: dev, short: p}
  secret: {private: true}
tasks:
  build:
    usage: Build things
    args:
      target: {}
    options:
      jobs: {type: int, short: j}
      release: {type: bool}
      internal: {private: true}
  hidden:
    private: true
"#;

    fn command() -> Command {
        build_command(&parse_config(CONFIG, None).unwrap())
    }

    fn options<'a>(config: &'a Config, task: &str) -> &'a OrderedMap<TaskOption> {
        &config.tasks.get(task).unwrap().options
    }

    #[test]
    fn test_subcommands_skip_private_tasks() {
        let cmd = command();
        let names: Vec<&str> = cmd.get_subcommands().map(|c| c.get_name()).collect();
        assert_eq!(names, vec!["build"]);
        assert_eq!(cmd.get_name(), "demo");
    }

    #[test]
    fn test_task_overrides_from_flags() {
        let config = parse_config(CONFIG, None).unwrap();
        let matches = build_command(&config)
            .get_matches_from(vec!["demo", "build", "x86", "-j", "4", "--release"]);
        let (_, sub) = matches.subcommand().unwrap();

        assert_eq!(task_args(["target"].into_iter(), sub), vec!["x86"]);

        let overrides = option_overrides(options(&config, "build"), sub);
        let expected: BTreeMap<String, String> = [
            ("jobs".to_string(), "4".to_string()),
            ("release".to_string(), "true".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(overrides, expected);
    }

    #[test]
    fn test_unset_flags_are_not_overrides() {
        let config = parse_config(CONFIG, None).unwrap();
        let matches = build_command(&config).get_matches_from(vec!["demo", "build", "x86"]);
        let (_, sub) = matches.subcommand().unwrap();

        assert!(option_overrides(options(&config, "build"), sub).is_empty());
        assert!(option_overrides(&config.options, sub).is_empty());
        assert_eq!(get_verbosity(sub), Verbosity::Normal);
    }

    #[test]
    fn test_global_option_after_subcommand() {
        let config = parse_config(CONFIG, None).unwrap();
        let matches = build_command(&config)
            .get_matches_from(vec!["demo", "build", "x86", "--profile", "prod", "-q", "-n"]);
        let (_, sub) = matches.subcommand().unwrap();

        let overrides = option_overrides(&config.options, sub);
        assert_eq!(overrides.get("profile").map(String::as_str), Some("prod"));
        assert_eq!(get_verbosity(sub), Verbosity::Quiet);
        assert!(sub.get_flag("dry-run"));
    }

    #[test]
    fn test_private_options_are_not_flags() {
        let config = parse_config(CONFIG, None).unwrap();
        let result = build_command(&config).try_get_matches_from(vec![
            "demo",
            "build",
            "x86",
            "--internal",
            "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_positional_is_rejected() {
        let result = command().try_get_matches_from(vec!["demo", "build"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_file_arg() {
        let args = vec![
            "drover".to_string(),
            "--file".to_string(),
            "test.yml".to_string(),
        ];
        assert_eq!(extract_file_arg(&args), Some(PathBuf::from("test.yml")));

        let args = vec!["drover".to_string(), "-f".to_string(), "test.yml".to_string()];
        assert_eq!(extract_file_arg(&args), Some(PathBuf::from("test.yml")));

        let args = vec!["drover".to_string(), "--file=other.yml".to_string()];
        assert_eq!(extract_file_arg(&args), Some(PathBuf::from("other.yml")));

        assert_eq!(extract_file_arg(&["drover".to_string()]), None);
    }
}
