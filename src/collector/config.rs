use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AgentError, Result};

/// A single raw option value as it arrives from a config source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<ConfigValue>),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Float(x) => write!(f, "{}", x),
            ConfigValue::Text(s) => f.write_str(s),
            ConfigValue::List(items) => {
                let joined: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

impl ConfigValue {
    /// Render the value as a TOML literal
    pub fn to_toml(&self) -> String {
        match self {
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::Integer(i) => i.to_string(),
            ConfigValue::Float(x) if x.is_nan() => "nan".to_string(),
            ConfigValue::Float(x) if x.is_infinite() => {
                (if *x > 0.0 { "inf" } else { "-inf" }).to_string()
            }
            ConfigValue::Float(x) => format!("{:?}", x),
            ConfigValue::Text(s) => toml_string(s),
            ConfigValue::List(items) => {
                let items: Vec<String> = items.iter().map(ConfigValue::to_toml).collect();
                format!("[{}]", items.join(", "))
            }
        }
    }
}

fn toml_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Integer(value.into())
    }
}

impl From<u16> for ConfigValue {
    fn from(value: u16) -> Self {
        ConfigValue::Integer(value.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(values: Vec<T>) -> Self {
        ConfigValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Effective option mapping for one collector instance.
///
/// Values are kept raw; each collector coerces the options it reads through the
/// typed accessors below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectorConfig {
    options: BTreeMap<String, ConfigValue>,
}

impl CollectorConfig {
    /// Create an empty option mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay `overrides` on top of `defaults`.
    ///
    /// The result holds the union of both key sets; an override value replaces the
    /// default for the same key.
    pub fn merge(defaults: &CollectorConfig, overrides: &CollectorConfig) -> CollectorConfig {
        let mut options = defaults.options.clone();
        for (key, value) in &overrides.options {
            options.insert(key.clone(), value.clone());
        }
        CollectorConfig { options }
    }

    /// Insert or replace an option, consuming and returning the mapping
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Insert every pair from `entries`, replacing existing keys
    pub fn extend<K, V, I>(&mut self, entries: I)
    where
        K: Into<String>,
        V: Into<ConfigValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.options.insert(key.into(), value.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.options.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.options.iter()
    }

    /// Read an option as a string
    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        match self.options.get(key) {
            None => Ok(None),
            Some(list @ ConfigValue::List(_)) => {
                Err(AgentError::invalid_option(key, "a string", list))
            }
            Some(value) => Ok(Some(value.to_string())),
        }
    }

    /// Read an option as an integer, parsing strings such as `"6379"`
    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        let Some(value) = self.options.get(key) else {
            return Ok(None);
        };

        match value {
            ConfigValue::Integer(i) => Ok(Some(*i)),
            ConfigValue::Float(x) if x.fract() == 0.0 => Ok(Some(*x as i64)),
            ConfigValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| AgentError::invalid_option(key, "an integer", s)),
            other => Err(AgentError::invalid_option(key, "an integer", other)),
        }
    }

    /// Read an option as a flag.
    ///
    /// Accepts booleans, integers (non-zero is true) and the usual textual spellings.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(value) = self.options.get(key) else {
            return Ok(None);
        };

        match value {
            ConfigValue::Bool(b) => Ok(Some(*b)),
            ConfigValue::Integer(i) => Ok(Some(*i != 0)),
            ConfigValue::Float(x) => Ok(Some(*x != 0.0)),
            ConfigValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Some(true)),
                "false" | "no" | "off" | "0" | "" => Ok(Some(false)),
                _ => Err(AgentError::invalid_option(key, "a boolean", s)),
            },
            other => Err(AgentError::invalid_option(key, "a boolean", other)),
        }
    }

    /// Read an option as a list of names.
    ///
    /// A string is split on commas; items are trimmed and empty items dropped.
    pub fn get_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        let Some(value) = self.options.get(key) else {
            return Ok(None);
        };

        let items: Vec<String> = match value {
            ConfigValue::List(items) => items.iter().map(|v| v.to_string()).collect(),
            ConfigValue::Text(s) => s.split(',').map(str::to_string).collect(),
            other => vec![other.to_string()],
        };

        Ok(Some(
            items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        ))
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for CollectorConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = CollectorConfig::new();
        config.extend(iter);
        config
    }
}

/// Builder for collector option mappings
pub struct CollectorConfigBuilder {
    config: CollectorConfig,
}

impl CollectorConfigBuilder {
    /// Create a new, empty builder
    pub fn new() -> Self {
        Self {
            config: CollectorConfig::new(),
        }
    }

    /// Set an option
    pub fn option(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.config = self.config.with(key, value);
        self
    }

    /// Enable or disable the collector
    pub fn enabled(self, enabled: bool) -> Self {
        self.option("enabled", enabled)
    }

    /// Set the polling interval in seconds
    pub fn interval(self, seconds: i64) -> Self {
        self.option("interval", seconds)
    }

    /// Build the mapping
    pub fn build(self) -> CollectorConfig {
        self.config
    }
}

impl Default for CollectorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
