// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the per-event processing pipeline.
//!
//! Per-event problems are logged at `debug!` or `warn!` only; they are counted by the
//! worker and surface to users through the periodic statistics.

use crate::errors::ExtractError;
use crate::model::{DataField, EventId};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Pipeline stages resolved at startup.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use xtal_monitor::observability::messages::pipeline::PipelineConfigured;
///
/// let msg = PipelineConfigured {
///     profile: "synthetic",
///     calibration: false,
///     correction: true,
///     peakfinder: true,
///     hit: true,
/// };
///
/// assert_eq!(
///     msg.to_string(),
///     "Pipeline configured for backend 'synthetic': calibration=off, correction=on, peakfinder8=on, hit classification=on"
/// );
/// ```
pub struct PipelineConfigured<'a> {
    pub profile: &'a str,
    pub calibration: bool,
    pub correction: bool,
    pub peakfinder: bool,
    pub hit: bool,
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

impl Display for PipelineConfigured<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline configured for backend '{}': calibration={}, correction={}, peakfinder8={}, hit classification={}",
            self.profile,
            on_off(self.calibration),
            on_off(self.correction),
            on_off(self.peakfinder),
            on_off(self.hit)
        )
    }
}

impl StructuredLog for PipelineConfigured<'_> {
    fn log(&self) {
        tracing::info!(
            profile = self.profile,
            calibration = self.calibration,
            correction = self.correction,
            peakfinder = self.peakfinder,
            hit = self.hit,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("pipeline", span_name = name, profile = self.profile)
    }
}

/// An event produced a degraded result.
///
/// # Log Level
/// `debug!` - Counted and reported in the periodic statistics
pub struct EventDegraded<'a> {
    pub rank: usize,
    pub event_id: &'a EventId,
    pub errors: &'a [String],
}

impl Display for EventDegraded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rank {}: event {} degraded: {}",
            self.rank,
            self.event_id,
            self.errors.join("; ")
        )
    }
}

impl StructuredLog for EventDegraded<'_> {
    fn log(&self) {
        tracing::debug!(
            rank = self.rank,
            event_id = %self.event_id,
            error_count = self.errors.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("event", span_name = name, rank = self.rank, event_id = %self.event_id)
    }
}

/// An optional field could not be extracted and was left out of the result.
///
/// # Log Level
/// `debug!` - Expected for backends that lack the field
pub struct FieldUnavailable<'a> {
    pub rank: usize,
    pub event_id: &'a EventId,
    pub field: DataField,
    pub error: &'a ExtractError,
}

impl Display for FieldUnavailable<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rank {}: optional field '{}' unavailable for event {}: {}",
            self.rank, self.field, self.event_id, self.error
        )
    }
}

impl StructuredLog for FieldUnavailable<'_> {
    fn log(&self) {
        tracing::debug!(
            rank = self.rank,
            event_id = %self.event_id,
            field = self.field.as_str(),
            unsupported = self.error.is_unsupported(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "extract",
            span_name = name,
            rank = self.rank,
            field = self.field.as_str(),
        )
    }
}

/// Processing of an event panicked; the panic was contained.
///
/// # Log Level
/// `warn!` - Points at a bug, but the worker keeps going
///
/// # Example
/// ```
/// use xtal_monitor::model::EventId;
/// use xtal_monitor::observability::messages::pipeline::ProcessingPanicked;
///
/// let id = EventId::from("run7-000123");
/// let msg = ProcessingPanicked {
///     rank: 2,
///     event_id: &id,
///     message: "index out of bounds",
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct ProcessingPanicked<'a> {
    pub rank: usize,
    pub event_id: &'a EventId,
    pub message: &'a str,
}

impl Display for ProcessingPanicked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rank {}: processing of event {} panicked: {}",
            self.rank, self.event_id, self.message
        )
    }
}

impl StructuredLog for ProcessingPanicked<'_> {
    fn log(&self) {
        tracing::warn!(
            rank = self.rank,
            event_id = %self.event_id,
            panic = self.message,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("event", span_name = name, rank = self.rank, event_id = %self.event_id)
    }
}
