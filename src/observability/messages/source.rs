// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for event sources and backend failures.
//!
//! This module contains message types for logging events related to:
//! * Source initialization and exhaustion on each worker
//! * Fetch failures, retries and stalled fetches
//! * Events discarded by the stale-data policy

use crate::errors::BackendError;
use crate::model::EventId;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A worker initialized its shard of the event source.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use xtal_monitor::observability::messages::source::SourceInitialized;
///
/// let msg = SourceInitialized {
///     rank: 1,
///     profile: "files",
///     source: Some("run42.lst"),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct SourceInitialized<'a> {
    pub rank: usize,
    pub profile: &'a str,
    pub source: Option<&'a str>,
}

impl Display for SourceInitialized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rank {}: initialized '{}' event source ({})",
            self.rank,
            self.profile,
            self.source.unwrap_or("no source string")
        )
    }
}

impl StructuredLog for SourceInitialized<'_> {
    fn log(&self) {
        tracing::info!(
            rank = self.rank,
            profile = self.profile,
            source = ?self.source,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("source", span_name = name, rank = self.rank, profile = self.profile)
    }
}

/// A bounded source has no more events for this worker.
///
/// # Log Level
/// `info!` - Normal termination signal
pub struct SourceExhausted {
    pub rank: usize,
    pub fetched: u64,
}

impl Display for SourceExhausted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Rank {}: event source exhausted after {} events", self.rank, self.fetched)
    }
}

impl StructuredLog for SourceExhausted {
    fn log(&self) {
        tracing::info!(rank = self.rank, fetched = self.fetched, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("source", span_name = name, rank = self.rank)
    }
}

/// The backend failed to deliver the next event; the worker will retry.
///
/// # Log Level
/// `warn!` - Recoverable until the retry budget is spent
pub struct BackendFetchFailed<'a> {
    pub rank: usize,
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: &'a BackendError,
}

impl Display for BackendFetchFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rank {}: backend failure (attempt {}/{}): {}",
            self.rank, self.attempt, self.max_attempts, self.error
        )
    }
}

impl StructuredLog for BackendFetchFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            rank = self.rank,
            attempt = self.attempt,
            max_attempts = self.max_attempts,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("source", span_name = name, rank = self.rank, attempt = self.attempt)
    }
}

/// A fetch did not complete within the configured timeout.
///
/// # Log Level
/// `warn!` - The backend is stalled; counted as a skipped event
pub struct FetchTimedOut {
    pub rank: usize,
    pub timeout: Duration,
}

impl Display for FetchTimedOut {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rank {}: no event within {:.2} seconds, skipping",
            self.rank,
            self.timeout.as_secs_f64()
        )
    }
}

impl StructuredLog for FetchTimedOut {
    fn log(&self) {
        tracing::warn!(
            rank = self.rank,
            timeout_ms = self.timeout.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("source", span_name = name, rank = self.rank)
    }
}

/// An event older than the frame-age threshold was discarded before opening it.
///
/// # Log Level
/// `debug!` - Counted as skipped
///
/// # Example
/// ```
/// use xtal_monitor::model::EventId;
/// use xtal_monitor::observability::messages::source::StaleEventSkipped;
///
/// let id = EventId::from("synthetic-17");
/// let msg = StaleEventSkipped {
///     rank: 3,
///     event_id: &id,
///     age_secs: 12.5,
///     threshold_secs: 10.0,
/// };
///
/// assert_eq!(
///     msg.to_string(),
///     "Rank 3: event synthetic-17 is 12.50 seconds old (threshold 10.00), skipping"
/// );
/// ```
pub struct StaleEventSkipped<'a> {
    pub rank: usize,
    pub event_id: &'a EventId,
    pub age_secs: f64,
    pub threshold_secs: f64,
}

impl Display for StaleEventSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rank {}: event {} is {:.2} seconds old (threshold {:.2}), skipping",
            self.rank, self.event_id, self.age_secs, self.threshold_secs
        )
    }
}

impl StructuredLog for StaleEventSkipped<'_> {
    fn log(&self) {
        tracing::debug!(
            rank = self.rank,
            event_id = %self.event_id,
            age_secs = self.age_secs,
            threshold_secs = self.threshold_secs,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("event", span_name = name, rank = self.rank, event_id = %self.event_id)
    }
}

/// `open_event` failed; the event is skipped and still closed.
///
/// # Log Level
/// `warn!` - Counted as a backend error
pub struct OpenEventFailed<'a> {
    pub rank: usize,
    pub event_id: &'a EventId,
    pub error: &'a BackendError,
}

impl Display for OpenEventFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Rank {}: cannot open event {}: {}", self.rank, self.event_id, self.error)
    }
}

impl StructuredLog for OpenEventFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            rank = self.rank,
            event_id = %self.event_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("event", span_name = name, rank = self.rank, event_id = %self.event_id)
    }
}
