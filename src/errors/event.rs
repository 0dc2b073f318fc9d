// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::ExtractError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("shape mismatch: expected {expected_width}x{expected_height}, found {found_width}x{found_height}")]
pub struct ShapeError {
    pub expected_width: usize,
    pub expected_height: usize,
    pub found_width: usize,
    pub found_height: usize,
}

/// Per-event failures. None of these stop a worker.
#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("calibration failed: {0}")]
    Calibration(String),

    #[error("correction failed: {0}")]
    Correction(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("event processing panicked: {0}")]
    Panicked(String),
}

impl EventError {
    /// Short stage label used in degraded results and counters.
    pub fn stage(&self) -> &'static str {
        match self {
            EventError::Extraction(_) => "extraction",
            EventError::Calibration(_) => "calibration",
            EventError::Correction(_) => "correction",
            EventError::MalformedFrame(_) => "peak_detection",
            EventError::Panicked(_) => "processing",
        }
    }
}

impl From<ShapeError> for EventError {
    fn from(err: ShapeError) -> Self {
        EventError::MalformedFrame(err.to_string())
    }
}
