// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the parallel engine.
//!
//! This module contains message types for logging events related to:
//! * Monitor start and stop
//! * Node lifecycle and state transitions
//! * Worker to coordinator transport (retries, lost results)
//! * Speed reports and draining

use crate::engine::{EngineState, WorkerRole, WorkerStats};
use crate::errors::{EngineError, TransportError};
use crate::model::EventId;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// The monitor is about to spawn its nodes.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use xtal_monitor::observability::messages::engine::MonitorStarted;
///
/// let msg = MonitorStarted {
///     profile: "synthetic",
///     node_pool_size: 4,
///     topic: "view:omdata",
/// };
///
/// assert_eq!(
///     msg.to_string(),
///     "Starting monitor with backend 'synthetic': 1 coordinator + 3 workers, publishing on 'view:omdata'"
/// );
/// ```
pub struct MonitorStarted<'a> {
    pub profile: &'a str,
    pub node_pool_size: usize,
    pub topic: &'a str,
}

impl Display for MonitorStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting monitor with backend '{}': 1 coordinator + {} workers, publishing on '{}'",
            self.profile,
            self.node_pool_size.saturating_sub(1),
            self.topic
        )
    }
}

impl StructuredLog for MonitorStarted<'_> {
    fn log(&self) {
        tracing::info!(
            profile = self.profile,
            node_pool_size = self.node_pool_size,
            topic = self.topic,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "monitor",
            span_name = name,
            profile = self.profile,
            node_pool_size = self.node_pool_size,
        )
    }
}

/// The monitor finished; all nodes reached `Shutdown`.
///
/// # Log Level
/// `info!` - Important operational event
pub struct MonitorStopped {
    pub received: u64,
    pub hits: u64,
    pub lost: u64,
    pub dropped_broadcasts: u64,
    pub elapsed: Duration,
}

impl Display for MonitorStopped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Monitor stopped after {:.2} seconds: {} results ({} hits), {} lost, {} broadcasts dropped",
            self.elapsed.as_secs_f64(),
            self.received,
            self.hits,
            self.lost,
            self.dropped_broadcasts
        )
    }
}

impl StructuredLog for MonitorStopped {
    fn log(&self) {
        tracing::info!(
            received = self.received,
            hits = self.hits,
            lost = self.lost,
            dropped_broadcasts = self.dropped_broadcasts,
            duration_ms = self.elapsed.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("monitor", span_name = name)
    }
}

/// A node task started. Its span wraps everything the node logs.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct NodeStarted {
    pub rank: usize,
    pub role: WorkerRole,
}

impl Display for NodeStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Rank {} started as {}", self.rank, self.role)
    }
}

impl StructuredLog for NodeStarted {
    fn log(&self) {
        tracing::debug!(rank = self.rank, role = %self.role, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("node", span_name = name, rank = self.rank, role = %self.role)
    }
}

/// A node moved to another engine state.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct NodeStateChanged {
    pub rank: usize,
    pub from: EngineState,
    pub to: EngineState,
}

impl Display for NodeStateChanged {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Rank {}: {} -> {}", self.rank, self.from, self.to)
    }
}

impl StructuredLog for NodeStateChanged {
    fn log(&self) {
        tracing::debug!(rank = self.rank, from = %self.from, to = %self.to, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("node", span_name = name, rank = self.rank)
    }
}

/// A worker sent its completion marker.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkerFinished<'a> {
    pub rank: usize,
    pub stats: &'a WorkerStats,
}

impl Display for WorkerFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rank {} finished: {} processed, {} degraded, {} stale, {} timed out, {} backend errors, {} lost",
            self.rank,
            self.stats.processed,
            self.stats.degraded,
            self.stats.skipped_stale,
            self.stats.skipped_timeout,
            self.stats.backend_errors,
            self.stats.lost_results
        )
    }
}

impl StructuredLog for WorkerFinished<'_> {
    fn log(&self) {
        tracing::info!(
            rank = self.rank,
            processed = self.stats.processed,
            hits = self.stats.hits,
            degraded = self.stats.degraded,
            extraction_failures = self.stats.extraction_failures,
            skipped_stale = self.stats.skipped_stale,
            skipped_timeout = self.stats.skipped_timeout,
            backend_errors = self.stats.backend_errors,
            send_retries = self.stats.send_retries,
            lost_results = self.stats.lost_results,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("node", span_name = name, rank = self.rank)
    }
}

/// A worker stopped with a fatal error.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct WorkerFailed<'a> {
    pub rank: usize,
    pub error: &'a EngineError,
}

impl Display for WorkerFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Rank {} failed: {}", self.rank, self.error)
    }
}

impl StructuredLog for WorkerFailed<'_> {
    fn log(&self) {
        tracing::error!(rank = self.rank, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("node", span_name = name, rank = self.rank)
    }
}

/// Periodic processing speed, reported by the coordinator.
///
/// # Log Level
/// `info!` - Periodic statistics
///
/// # Example
/// ```
/// use xtal_monitor::observability::messages::engine::SpeedReport;
/// use std::time::Duration;
///
/// let msg = SpeedReport {
///     processed: 500,
///     elapsed: Duration::from_millis(2500),
/// };
///
/// assert_eq!(msg.to_string(), "Processed: 500 in 2.50 seconds (200.00 Hz)");
/// ```
pub struct SpeedReport {
    pub processed: u64,
    pub elapsed: Duration,
}

impl SpeedReport {
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }
}

impl Display for SpeedReport {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processed: {} in {:.2} seconds ({:.2} Hz)",
            self.processed,
            self.elapsed.as_secs_f64(),
            self.rate()
        )
    }
}

impl StructuredLog for SpeedReport {
    fn log(&self) {
        tracing::info!(
            processed = self.processed,
            elapsed_ms = self.elapsed.as_millis() as u64,
            rate_hz = self.rate(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("speed", span_name = name, processed = self.processed)
    }
}

/// The send buffer was full; the worker retries the send.
///
/// # Log Level
/// `debug!` - Backpressure detail
pub struct SendRetry<'a> {
    pub rank: usize,
    pub event_id: &'a EventId,
    pub attempt: u32,
    pub max_attempts: u32,
}

impl Display for SendRetry<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rank {}: send buffer full for event {}, retrying ({}/{})",
            self.rank, self.event_id, self.attempt, self.max_attempts
        )
    }
}

impl StructuredLog for SendRetry<'_> {
    fn log(&self) {
        tracing::debug!(
            rank = self.rank,
            event_id = %self.event_id,
            attempt = self.attempt,
            max_attempts = self.max_attempts,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("transport", span_name = name, rank = self.rank)
    }
}

/// A result could not be delivered and was dropped.
///
/// # Log Level
/// `warn!` - Counted as lost
pub struct ResultLost<'a> {
    pub rank: usize,
    pub event_id: &'a EventId,
    pub error: &'a TransportError,
}

impl Display for ResultLost<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Result for event {} lost: {}", self.event_id, self.error)
    }
}

impl StructuredLog for ResultLost<'_> {
    fn log(&self) {
        tracing::warn!(
            rank = self.rank,
            event_id = %self.event_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("transport", span_name = name, rank = self.rank)
    }
}

/// An external shutdown request was received.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ShutdownRequested<'a> {
    pub reason: &'a str,
}

impl Display for ShutdownRequested<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Shutdown requested ({}), draining", self.reason)
    }
}

impl StructuredLog for ShutdownRequested<'_> {
    fn log(&self) {
        tracing::info!(reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("shutdown", span_name = name, reason = self.reason)
    }
}

/// The coordinator gave up waiting for workers during draining.
///
/// # Log Level
/// `warn!` - In-flight results of these workers are lost
pub struct DrainTimedOut {
    pub pending_workers: usize,
    pub timeout: Duration,
}

impl Display for DrainTimedOut {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Drain timeout of {:.2} seconds expired with {} workers still running",
            self.timeout.as_secs_f64(),
            self.pending_workers
        )
    }
}

impl StructuredLog for DrainTimedOut {
    fn log(&self) {
        tracing::warn!(
            pending_workers = self.pending_workers,
            timeout_ms = self.timeout.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("drain", span_name = name, pending_workers = self.pending_workers)
    }
}
