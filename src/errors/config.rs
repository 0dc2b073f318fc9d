// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

use super::ShapeError;

/// Startup-time configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open or read the configuration file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in the configuration: {message}")]
    Syntax { message: String },

    #[error("parameter group [{group}] is not in the configuration")]
    MissingGroup { group: String },

    #[error("parameter {parameter} in group [{group}] was not found, but is required")]
    MissingParameter { group: String, parameter: String },

    #[error("wrong type for parameter {parameter} in group [{group}]: should be {expected}, is {found}")]
    WrongParameterType {
        group: String,
        parameter: String,
        expected: &'static str,
        found: String,
    },

    #[error("invalid value for parameter {parameter} in group [{group}]: {reason}")]
    InvalidValue {
        group: String,
        parameter: String,
        reason: String,
    },

    #[error("unknown backend profile '{profile}' (available: {})", .available.join(", "))]
    UnknownBackend {
        profile: String,
        available: Vec<&'static str>,
    },

    #[error("backend profile '{profile}' is inconsistent: {reason}")]
    IncompatibleBackend { profile: String, reason: String },

    #[error("cannot load reference array {path}: {reason}")]
    ReferenceArray { path: PathBuf, reason: String },

    #[error("{what}: {source}")]
    Shape {
        what: &'static str,
        #[source]
        source: ShapeError,
    },
}

impl ConfigError {
    pub fn invalid(group: &str, parameter: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            group: group.to_string(),
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}
