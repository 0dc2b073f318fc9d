// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Grouped, read-only parameter store.
//!
//! Parameters are organised in named groups (`[group] key = value`). Files may be written
//! in YAML or TOML; the format is picked from the file extension. Lookups are typed and fail
//! with a distinguishable `ConfigError` when a group or entry is missing or mistyped. A
//! `null` value is treated the same as an absent entry.

use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;
use crate::model::DataField;

pub type ParameterGroup = BTreeMap<String, Value>;

/// Conversion from a raw parameter value into a typed one.
pub trait ParamType: Sized {
    const TYPE_NAME: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

impl ParamType for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl ParamType for i64 {
    const TYPE_NAME: &'static str = "int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl ParamType for u64 {
    const TYPE_NAME: &'static str = "unsigned int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64()
    }
}

impl ParamType for u32 {
    const TYPE_NAME: &'static str = "unsigned int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64().and_then(|v| u32::try_from(v).ok())
    }
}

impl ParamType for u16 {
    const TYPE_NAME: &'static str = "unsigned int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64().and_then(|v| u16::try_from(v).ok())
    }
}

impl ParamType for u8 {
    const TYPE_NAME: &'static str = "unsigned int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64().and_then(|v| u8::try_from(v).ok())
    }
}

impl ParamType for usize {
    const TYPE_NAME: &'static str = "unsigned int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64().and_then(|v| usize::try_from(v).ok())
    }
}

// Integers are accepted wherever a float is expected.
impl ParamType for f64 {
    const TYPE_NAME: &'static str = "float";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl ParamType for f32 {
    const TYPE_NAME: &'static str = "float";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl ParamType for String {
    const TYPE_NAME: &'static str = "str";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl ParamType for PathBuf {
    const TYPE_NAME: &'static str = "path";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(PathBuf::from)
    }
}

impl ParamType for DataField {
    const TYPE_NAME: &'static str = "data field name";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(|s| s.parse().ok())
    }
}

impl<T: ParamType> ParamType for Vec<T> {
    const TYPE_NAME: &'static str = "list";

    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_sequence()?
            .iter()
            .map(T::from_value)
            .collect::<Option<Vec<T>>>()
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(n) if n.is_f64() => "float".to_string(),
        Value::Number(n) if n.as_i64().map_or(false, |v| v < 0) => "negative int".to_string(),
        Value::Number(_) => "int".to_string(),
        Value::String(_) => "str".to_string(),
        Value::Sequence(_) => "list".to_string(),
        Value::Mapping(_) => "dict".to_string(),
        Value::Tagged(_) => "tagged value".to_string(),
    }
}

/// The full set of monitor parameters, organised in groups.
#[derive(Debug, Clone, Default)]
pub struct MonitorParams {
    groups: BTreeMap<String, ParameterGroup>,
}

impl MonitorParams {
    /// Reads a parameter file. `.toml` files are parsed as TOML, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| ConfigError::Syntax {
            message: e.to_string(),
        })?;
        Self::from_value(value)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(text).map_err(|e| ConfigError::Syntax {
            message: e.to_string(),
        })?;
        let value = serde_yaml::to_value(table).map_err(|e| ConfigError::Syntax {
            message: e.to_string(),
        })?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self, ConfigError> {
        let mapping = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Ok(Self::default()),
            other => {
                return Err(ConfigError::Syntax {
                    message: format!("top level must be a mapping of groups, found {}", describe(&other)),
                })
            }
        };

        let mut groups = BTreeMap::new();
        for (name, body) in mapping {
            let name = name.as_str().map(str::to_string).ok_or_else(|| ConfigError::Syntax {
                message: format!("group names must be strings, found {}", describe(&name)),
            })?;
            let entries = match body {
                Value::Mapping(entries) => entries,
                Value::Null => Default::default(),
                other => {
                    return Err(ConfigError::Syntax {
                        message: format!("group [{}] must be a mapping, found {}", name, describe(&other)),
                    })
                }
            };
            let mut group = ParameterGroup::new();
            for (key, value) in entries {
                let key = key.as_str().map(str::to_string).ok_or_else(|| ConfigError::Syntax {
                    message: format!("keys in group [{}] must be strings", name),
                })?;
                group.insert(key, value);
            }
            groups.insert(name, group);
        }

        Ok(Self { groups })
    }

    /// Adds or replaces a single entry. Used by tests and by programmatic setups.
    pub fn set(&mut self, group: &str, parameter: &str, value: impl Into<Value>) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(parameter.to_string(), value.into());
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    pub fn group(&self, group: &str) -> Result<&ParameterGroup, ConfigError> {
        self.groups.get(group).ok_or_else(|| ConfigError::MissingGroup {
            group: group.to_string(),
        })
    }

    /// Required, typed lookup.
    pub fn get<T: ParamType>(&self, group: &str, parameter: &str) -> Result<T, ConfigError> {
        self.get_optional(group, parameter)?
            .ok_or_else(|| ConfigError::MissingParameter {
                group: group.to_string(),
                parameter: parameter.to_string(),
            })
    }

    /// Optional, typed lookup. The group itself must exist.
    pub fn get_optional<T: ParamType>(&self, group: &str, parameter: &str) -> Result<Option<T>, ConfigError> {
        let entries = self.group(group)?;
        match entries.get(parameter) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(value)
                .map(Some)
                .ok_or_else(|| ConfigError::WrongParameterType {
                    group: group.to_string(),
                    parameter: parameter.to_string(),
                    expected: T::TYPE_NAME,
                    found: describe(value),
                }),
        }
    }

    pub fn get_or<T: ParamType>(&self, group: &str, parameter: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.get_optional(group, parameter)?.unwrap_or(default))
    }
}
