//! Core configuration types
//!
//! This module defines the data structures that represent a drover.yml configuration file.

use crate::config::ordered::OrderedMap;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Application name (optional)
    #[serde(default)]
    pub name: Option<String>,

    /// Application usage description (optional)
    #[serde(default)]
    pub usage: Option<String>,

    /// Environment files to load before running; `None` means the optional `.env`
    #[serde(rename = "env-file", default, deserialize_with = "deserialize_env_files")]
    pub env_file: Option<Vec<EnvFile>>,

    /// Global options, visible to every task
    #[serde(default)]
    pub options: OrderedMap<TaskOption>,

    /// Tasks defined in the configuration
    #[serde(default)]
    pub tasks: OrderedMap<Task>,
}

impl Config {
    /// Environment files to load, applying the implicit `.env` default
    pub fn env_files(&self) -> Vec<EnvFile> {
        match &self.env_file {
            Some(files) => files.clone(),
            None => vec![EnvFile {
                path: ".env".to_string(),
                required: false,
            }],
        }
    }
}

/// An environment file reference
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvFile {
    pub path: String,

    #[serde(default = "default_true")]
    pub required: bool,
}

/// A task definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Task {
    /// Usage description for help text
    #[serde(default)]
    pub usage: Option<String>,

    /// Longer description for help text
    #[serde(default)]
    pub description: Option<String>,

    /// Whether this task is private (hidden from the command line)
    #[serde(default)]
    pub private: bool,

    /// Whether this task should run quietly
    #[serde(default)]
    pub quiet: bool,

    /// Include another file as task definition
    #[serde(default)]
    pub include: Option<String>,

    /// Positional arguments for the task
    #[serde(default)]
    pub args: OrderedMap<Arg>,

    /// Named options (flags) for the task
    #[serde(default)]
    pub options: OrderedMap<TaskOption>,

    /// Conditions that must hold for the commands to run
    #[serde(default)]
    pub when: WhenList,

    /// Tasks to run before this one
    #[serde(default)]
    pub pre: DependencyList,

    /// Commands to execute
    #[serde(default)]
    pub run: CommandList,

    /// Tasks to run after this one
    #[serde(default)]
    pub post: DependencyList,

    /// Directory of the included file that defined this task, relative to
    /// the main configuration file
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

impl Task {
    /// All dependency edges, `pre` first
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.pre.iter().chain(self.post.iter())
    }

    /// Directory that relative `dir` and path conditions are resolved against
    pub fn base_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.source_dir {
            Some(dir) => config_dir.join(dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// A single shell step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// The shell text to execute
    pub exec: String,

    /// What to print when running; equal to `exec` unless given
    pub print: String,

    /// Working directory; empty inherits the current one
    pub dir: String,
}

impl Command {
    /// A command whose printed form is the command itself
    pub fn new(exec: impl Into<String>) -> Self {
        let exec = exec.into();
        Command {
            print: exec.clone(),
            exec,
            dir: String::new(),
        }
    }

    pub fn with_print(mut self, print: impl Into<String>) -> Self {
        let print = print.into();
        if !print.is_empty() {
            self.print = print;
        }
        self
    }

    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = dir.into();
        self
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Detail {
            #[serde(rename = "do", alias = "exec", deserialize_with = "deserialize_scalar")]
            exec: String,
            #[serde(default)]
            print: Option<String>,
            #[serde(default)]
            dir: Option<String>,
        }

        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Mapping(_) => {
                let detail = Detail::deserialize(value).map_err(D::Error::custom)?;
                Ok(Command::new(detail.exec)
                    .with_print(detail.print.unwrap_or_default())
                    .with_dir(detail.dir.unwrap_or_default()))
            }
            other => scalar_to_string(&other)
                .map(Command::new)
                .ok_or_else(|| D::Error::custom("command must be a string or a mapping with `do`")),
        }
    }
}

/// An ordered list of commands; a single command is shorthand for a list of one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandList(pub Vec<Command>);

impl CommandList {
    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for CommandList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        one_or_many(value).map(CommandList).map_err(D::Error::custom)
    }
}

/// A reference to another task, with optional overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependency {
    /// Name of the task to run
    pub name: String,

    /// Positional arguments to pass to the task
    pub args: Vec<String>,

    /// Options to pass to the task
    pub options: BTreeMap<String, String>,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Dependency {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl<'de> Deserialize<'de> for Dependency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Detail {
            name: String,
            #[serde(default, deserialize_with = "deserialize_scalar_list")]
            args: Vec<String>,
            #[serde(default, deserialize_with = "deserialize_scalar_map")]
            options: BTreeMap<String, String>,
        }

        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(name) => Ok(Dependency::new(name)),
            Value::Mapping(_) => {
                let detail = Detail::deserialize(value).map_err(D::Error::custom)?;
                Ok(Dependency {
                    name: detail.name,
                    args: detail.args,
                    options: detail.options,
                })
            }
            _ => Err(D::Error::custom(
                "dependency must be a task name or a mapping with `name`",
            )),
        }
    }
}

/// Dependencies of one kind (`pre` or `post`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyList(pub Vec<Dependency>);

impl DependencyList {
    pub fn iter(&self) -> std::slice::Iter<'_, Dependency> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for DependencyList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        one_or_many(value).map(DependencyList).map_err(D::Error::custom)
    }
}

/// A conditional expression; every field that is set must hold
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct When {
    /// Check if values are equal
    #[serde(default)]
    pub equal: Option<WhenComparison>,

    /// Check if values are not equal
    #[serde(default)]
    pub not_equal: Option<WhenComparison>,

    /// Check if a command succeeds
    #[serde(default)]
    pub command: Option<String>,

    /// Check if a path exists
    #[serde(default)]
    pub exists: Option<String>,

    /// Check if a path does not exist
    #[serde(default)]
    pub not_exists: Option<String>,

    /// Check the operating system
    #[serde(default, deserialize_with = "deserialize_scalar_list")]
    pub os: Vec<String>,

    /// Check if environment variable is set
    #[serde(default)]
    pub env_set: Option<String>,

    /// Check if environment variable is not set
    #[serde(default)]
    pub env_not_set: Option<String>,

    /// Check if option was explicitly set
    #[serde(default)]
    pub option_set: Option<String>,

    /// Check if option was left at its default
    #[serde(default)]
    pub option_not_set: Option<String>,
}

impl When {
    /// Every template string in this condition
    pub fn templates(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for cmp in self.equal.iter().chain(self.not_equal.iter()) {
            out.push(cmp.left.as_str());
            out.push(cmp.right.as_str());
        }
        for field in [
            &self.command,
            &self.exists,
            &self.not_exists,
            &self.env_set,
            &self.env_not_set,
        ]
        .into_iter()
        .flatten()
        {
            out.push(field.as_str());
        }
        out.extend(self.os.iter().map(String::as_str));
        out
    }

    /// Option names referenced by `option-set`/`option-not-set`
    pub fn option_names(&self) -> Vec<&str> {
        self.option_set
            .iter()
            .chain(self.option_not_set.iter())
            .map(String::as_str)
            .collect()
    }
}

/// A comparison for when conditions
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhenComparison {
    /// Left-hand side of comparison
    #[serde(deserialize_with = "deserialize_scalar")]
    pub left: String,

    /// Right-hand side of comparison
    #[serde(deserialize_with = "deserialize_scalar")]
    pub right: String,
}

/// A list of conditions; all must hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhenList(pub Vec<When>);

impl WhenList {
    pub fn iter(&self) -> std::slice::Iter<'_, When> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for WhenList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        one_or_many(value).map(WhenList).map_err(D::Error::custom)
    }
}

/// Option value types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    String,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "integer")]
    Int,
    Float,
}

/// An option (flag) definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskOption {
    /// Usage description for help text
    #[serde(default)]
    pub usage: Option<String>,

    /// Short flag (single character)
    #[serde(default)]
    pub short: Option<String>,

    /// Option type (string, bool, int, float)
    #[serde(rename = "type", default)]
    pub option_type: OptionType,

    /// Default value candidates, tried in order
    #[serde(default)]
    pub default: DefaultSpec,

    /// Required option
    #[serde(default)]
    pub required: bool,

    /// Value to pass instead of `true` for bool options
    #[serde(default)]
    pub rewrite: Option<String>,

    /// Environment variable to read from
    #[serde(default)]
    pub environment: Option<String>,

    /// Private option (cannot be overridden)
    #[serde(default)]
    pub private: bool,

    /// Allowed values
    #[serde(default, deserialize_with = "deserialize_scalar_list")]
    pub values: Vec<String>,
}

/// An argument (positional parameter) definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Arg {
    /// Usage description for help text
    #[serde(default)]
    pub usage: Option<String>,

    /// Argument type
    #[serde(rename = "type", default)]
    pub arg_type: OptionType,

    /// Allowed values
    #[serde(default, deserialize_with = "deserialize_scalar_list")]
    pub values: Vec<String>,
}

/// Where a default value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultSource {
    /// A template interpolated with earlier values
    Value(String),

    /// A shell command whose output becomes the value
    Command(String),
}

impl DefaultSource {
    pub fn template(&self) -> &str {
        match self {
            DefaultSource::Value(text) | DefaultSource::Command(text) => text,
        }
    }
}

/// One default candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultCandidate {
    pub when: WhenList,
    pub source: DefaultSource,
}

/// Ordered default candidates; empty means no explicit default
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultSpec(pub Vec<DefaultCandidate>);

impl DefaultSpec {
    pub fn iter(&self) -> std::slice::Iter<'_, DefaultCandidate> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for DefaultCandidate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Detail {
            #[serde(default)]
            when: WhenList,
            #[serde(default, deserialize_with = "deserialize_optional_scalar")]
            value: Option<String>,
            #[serde(default)]
            command: Option<String>,
        }

        let value = Value::deserialize(deserializer)?;
        if !matches!(value, Value::Mapping(_)) {
            return scalar_to_string(&value)
                .map(|text| DefaultCandidate {
                    when: WhenList::default(),
                    source: DefaultSource::Value(text),
                })
                .ok_or_else(|| D::Error::custom("default must be a scalar or a mapping"));
        }

        let detail = Detail::deserialize(value).map_err(D::Error::custom)?;
        let source = match (detail.value, detail.command) {
            (Some(text), None) => DefaultSource::Value(text),
            (None, Some(command)) => DefaultSource::Command(command),
            _ => {
                return Err(D::Error::custom(
                    "default must set exactly one of `value` or `command`",
                ))
            }
        };

        Ok(DefaultCandidate {
            when: detail.when,
            source,
        })
    }
}

impl<'de> Deserialize<'de> for DefaultSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        one_or_many(value).map(DefaultSpec).map_err(D::Error::custom)
    }
}

fn default_true() -> bool {
    true
}

/// Render a YAML scalar as the string a user would expect
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a single item or a sequence of items; null is empty
fn one_or_many<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, serde_yaml::Error> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(seq) => seq.into_iter().map(serde_yaml::from_value).collect(),
        other => Ok(vec![serde_yaml::from_value(other)?]),
    }
}

fn deserialize_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(&value).ok_or_else(|| D::Error::custom("expected a scalar value"))
}

fn deserialize_optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        other => scalar_to_string(&other)
            .map(Some)
            .ok_or_else(|| D::Error::custom("expected a scalar value")),
    }
}

fn deserialize_scalar_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(seq) => seq,
        other => vec![other],
    };
    items
        .iter()
        .map(|item| scalar_to_string(item).ok_or_else(|| D::Error::custom("expected a list of scalar values")))
        .collect()
}

fn deserialize_scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            scalar_to_string(&value)
                .map(|text| (key.clone(), text))
                .ok_or_else(|| D::Error::custom(format!("value for '{}' must be a scalar", key)))
        })
        .collect()
}

fn deserialize_env_files<'de, D>(deserializer: D) -> Result<Option<Vec<EnvFile>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Null => return Ok(Some(Vec::new())),
        Value::Sequence(seq) => seq,
        other => vec![other],
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(path) => Ok(EnvFile {
                path,
                required: true,
            }),
            other => serde_yaml::from_value(other).map_err(D::Error::custom),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
