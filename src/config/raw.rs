//! The untyped configuration document and checked lookups into it.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use super::ConfigError;

/// The parsed YAML document every stage view is projected from.
#[derive(Debug, Clone)]
pub struct RawConfig {
    source: Option<PathBuf>,
    root: Value,
}

impl RawConfig {
    /// Reads and parses a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut raw = Self::from_yaml_str(&content)?;
        raw.source = Some(path.to_path_buf());
        Ok(raw)
    }

    /// Parses a configuration document held in memory.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_yaml::from_str(content)?;
        if !root.is_mapping() {
            return Err(ConfigError::InvalidValue {
                key: "<document>".to_string(),
                message: "top level must be a mapping".to_string(),
            });
        }
        Ok(Self { source: None, root })
    }

    /// Path of the file the document was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Human readable origin, used in diagnostics.
    pub fn source_name(&self) -> String {
        self.source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<config>".to_string())
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Checked lookups attributed to `stage` when a key is missing.
    pub fn lookup(&self, stage: &'static str) -> Lookup<'_> {
        Lookup {
            root: &self.root,
            stage,
        }
    }
}

/// Read-only key access over the raw document.
///
/// Every missing key becomes [`ConfigError::Missing`] naming the dotted path;
/// a present key of the wrong shape becomes [`ConfigError::InvalidValue`].
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    root: &'a Value,
    stage: &'static str,
}

impl<'a> Lookup<'a> {
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Returns the value at `path`, treating an explicit YAML null as absent.
    pub fn get(&self, path: &[&str]) -> Option<&'a Value> {
        let mut current = self.root;
        for key in path {
            current = current.as_mapping()?.get(*key)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    pub fn require(&self, path: &[&str]) -> Result<&'a Value, ConfigError> {
        self.get(path).ok_or_else(|| self.missing(path))
    }

    pub fn string(&self, path: &[&str]) -> Result<String, ConfigError> {
        let value = self.require(path)?;
        scalar_to_string(value).ok_or_else(|| invalid(path, "expected a string"))
    }

    pub fn string_or(&self, path: &[&str], default: &str) -> Result<String, ConfigError> {
        match self.get(path) {
            Some(value) => {
                scalar_to_string(value).ok_or_else(|| invalid(path, "expected a string"))
            }
            None => Ok(default.to_string()),
        }
    }

    pub fn string_list(&self, path: &[&str]) -> Result<Vec<String>, ConfigError> {
        let value = self.require(path)?;
        sequence_of_strings(value).ok_or_else(|| invalid(path, "expected a list of strings"))
    }

    /// Optional list; absent means empty.
    pub fn string_list_or_empty(&self, path: &[&str]) -> Result<Vec<String>, ConfigError> {
        match self.get(path) {
            Some(value) => sequence_of_strings(value)
                .ok_or_else(|| invalid(path, "expected a list of strings")),
            None => Ok(Vec::new()),
        }
    }

    /// Integer given either as a YAML integer or a numeric string.
    pub fn integer(&self, path: &[&str]) -> Result<u64, ConfigError> {
        let value = self.require(path)?;
        value_to_u64(value).ok_or_else(|| invalid(path, "expected a non-negative integer"))
    }

    pub fn bool_or(&self, path: &[&str], default: bool) -> Result<bool, ConfigError> {
        match self.get(path) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(invalid(path, "expected a boolean")),
            None => Ok(default),
        }
    }

    pub fn mapping(&self, path: &[&str]) -> Result<&'a Mapping, ConfigError> {
        let value = self.require(path)?;
        value
            .as_mapping()
            .ok_or_else(|| invalid(path, "expected a mapping"))
    }

    /// Iterates a mapping as `(string key, value)` pairs in document order.
    pub fn entries(&self, path: &[&str]) -> Result<Vec<(String, &'a Value)>, ConfigError> {
        let mapping = self.mapping(path)?;
        mapping
            .iter()
            .map(|(k, v)| {
                scalar_to_string(k)
                    .map(|k| (k, v))
                    .ok_or_else(|| invalid(path, "mapping keys must be strings"))
            })
            .collect()
    }

    /// Command line given as a whitespace-separated string or a list.
    pub fn command_or(&self, path: &[&str], default: &[&str]) -> Result<Vec<String>, ConfigError> {
        let command = match self.get(path) {
            None => default.iter().map(|s| s.to_string()).collect(),
            Some(Value::String(s)) => s.split_whitespace().map(String::from).collect(),
            Some(value) => sequence_of_strings(value)
                .ok_or_else(|| invalid(path, "expected a command string or list"))?,
        };
        if command.is_empty() {
            return Err(invalid(path, "command cannot be empty"));
        }
        Ok(command)
    }

    fn missing(&self, path: &[&str]) -> ConfigError {
        ConfigError::Missing {
            stage: self.stage.to_string(),
            key: dotted(path),
        }
    }
}

/// Renders scalar YAML values (strings, numbers, booleans) as text.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn sequence_of_strings(value: &Value) -> Option<Vec<String>> {
    value
        .as_sequence()?
        .iter()
        .map(scalar_to_string)
        .collect()
}

fn dotted(path: &[&str]) -> String {
    path.join(".")
}

fn invalid(path: &[&str], message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: dotted(path),
        message: message.to_string(),
    }
}
