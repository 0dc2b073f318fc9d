// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::model::DataField;

/// Failures reported by a facility backend while producing or opening events.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("source unavailable for '{profile}': {reason}")]
    Unavailable { profile: String, reason: String },

    #[error("backend API failure: {0}")]
    Api(String),

    #[error("backend I/O failure on {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("backend call still pending after {after:?}")]
    TimedOut { after: std::time::Duration },

    #[error("event representation mismatch: expected '{expected}', got '{found}'")]
    Representation {
        expected: &'static str,
        found: &'static str,
    },
}

/// Failures of the polymorphic `extract(field)` capability.
///
/// `UnsupportedField` is kept separate from `Failed` so that the caller decides whether the
/// missing field is mandatory or optional.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("backend '{profile}' does not support field '{field}'")]
    UnsupportedField { profile: &'static str, field: DataField },

    #[error("cannot extract '{field}': {reason}")]
    Failed { field: DataField, reason: String },

    #[error("event was not opened before extracting '{field}'")]
    NotOpened { field: DataField },
}

impl ExtractError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ExtractError::UnsupportedField { .. })
    }
}
