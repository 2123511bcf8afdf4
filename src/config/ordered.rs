//! Order-preserving mapping decode
//!
//! Declaration order of tasks and options matters: option defaults may only
//! look at options declared before them. Every ordered section of the config
//! file is decoded through [`parse_ordered_map`] into an [`OrderedMap`].

use crate::error::{ConfigError, ConfigResult, InvalidKey};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};

/// Walk the pairs of `mapping` in source order, handing each key and its
/// re-serialized value to `assign`.
///
/// Returns the processed key names in order. Stops at the first key that is
/// not a plain string, or at the first error returned by `assign`, which is
/// propagated unchanged. Duplicate keys are neither removed nor reported.
pub fn parse_ordered_map<E, F>(mapping: &Mapping, mut assign: F) -> Result<Vec<String>, E>
where
    E: From<ConfigError>,
    F: FnMut(&str, &str) -> Result<(), E>,
{
    let mut names = Vec::with_capacity(mapping.len());

    for (key, value) in mapping {
        let name = match key {
            Value::String(name) => name,
            other => return Err(ConfigError::from(InvalidKey(render_key(other))).into()),
        };

        let text = serde_yaml::to_string(value).map_err(ConfigError::from)?;
        assign(name, &text)?;
        names.push(name.clone());
    }

    Ok(names)
}

/// Render a YAML key for error messages
fn render_key(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("{:?}", s),
        Value::Sequence(seq) => {
            let items: Vec<String> = seq.iter().map(render_key).collect();
            format!("[{}]", items.join(" "))
        }
        Value::Mapping(map) => {
            let items: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}:{}", render_key(k), render_key(v)))
                .collect();
            format!("map[{}]", items.join(" "))
        }
        Value::Tagged(tagged) => format!("{} {}", tagged.tag, render_key(&tagged.value)),
    }
}

/// A name-keyed collection that keeps declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> OrderedMap<T> {
    pub fn new() -> Self {
        OrderedMap {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Declaration index of `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == name)
    }

    /// Insert a value, replacing an existing entry in place
    pub fn insert(&mut self, name: String, value: T) {
        match self.position(&name) {
            Some(index) => self.entries[index].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.entries
            .iter_mut()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, value)| value)
    }
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'de, T> Deserialize<'de> for OrderedMap<T>
where
    T: DeserializeOwned + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mapping = match Value::deserialize(deserializer)? {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Ok(OrderedMap::new()),
            _ => return Err(D::Error::custom("expected a mapping of names")),
        };

        // serde_yaml rejects duplicate keys while building the mapping
        let mut entries = Vec::with_capacity(mapping.len());
        parse_ordered_map(&mapping, |name, text| -> ConfigResult<()> {
            // An empty body (`name:`) decodes to the default entity
            let item = serde_yaml::from_str::<Option<T>>(text)
                .map_err(|e| ConfigError::Invalid(format!("'{}': {}", name, e)))?
                .unwrap_or_default();
            entries.push((name.to_string(), item));
            Ok(())
        })
        .map_err(D::Error::custom)?;

        Ok(OrderedMap { entries })
    }
}
