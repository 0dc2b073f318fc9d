// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::event_counter::FrameSendPolicy;
use super::role::{EngineState, ProcessConfig, WorkerRole};
use super::transport::{ResultSender, WorkerStats};
use crate::backends::BackendDescriptor;
use crate::config::consts::{DEFAULT_BACKEND_RETRY_DELAY_MS, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_BACKEND_RETRIES};
use crate::config::MonitorConfig;
use crate::errors::{BackendError, EngineError, TransportError};
use crate::model::{fields, Event};
use crate::observability::messages::engine::{NodeStateChanged, ResultLost, WorkerFailed, WorkerFinished};
use crate::observability::messages::source::{
    BackendFetchFailed, FetchTimedOut, OpenEventFailed, SourceExhausted, SourceInitialized, StaleEventSkipped,
};
use crate::observability::messages::StructuredLog;
use crate::pipeline::Pipeline;
use crate::traits::EventFramework;
use crate::utils::unix_time_now;

/// How often a failing backend call is retried before the node gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
    /// Upper bound on a single attempt; a call still pending after it counts as failed.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_BACKEND_RETRIES,
            delay: Duration::from_millis(DEFAULT_BACKEND_RETRY_DELAY_MS),
            attempt_timeout: Duration::from_secs_f64(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            max_retries: config.engine.max_backend_retries,
            delay: config.engine.backend_retry_delay,
            attempt_timeout: config.engine.fetch_timeout,
        }
    }
}

/// Per-worker knobs taken from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub source: Option<String>,
    pub fetch_timeout: Duration,
    pub retry: RetryPolicy,
    pub frame_age_threshold: Option<Duration>,
    pub hit_frame_sending_interval: Option<u64>,
    pub non_hit_frame_sending_interval: Option<u64>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            source: None,
            fetch_timeout: Duration::from_secs_f64(DEFAULT_FETCH_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            frame_age_threshold: None,
            hit_frame_sending_interval: None,
            non_hit_frame_sending_interval: None,
        }
    }
}

impl WorkerSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            source: config.source.source.clone(),
            fetch_timeout: config.engine.fetch_timeout,
            retry: RetryPolicy::from_config(config),
            frame_age_threshold: config.source.frame_age_threshold,
            hit_frame_sending_interval: config.intervals.hit_frame_sending_interval,
            non_hit_frame_sending_interval: config.intervals.non_hit_frame_sending_interval,
        }
    }
}

/// Final state and counters of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReport {
    pub rank: usize,
    pub role: WorkerRole,
    pub final_state: EngineState,
    pub stats: WorkerStats,
}

/// Sleeps for `delay` unless cancelled first. Returns `true` when cancelled.
pub(crate) async fn pause(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

/// Runs a backend call until it succeeds, retrying `policy.max_retries` times.
///
/// Each attempt is raced against `cancel` and bounded by `policy.attempt_timeout`; an
/// attempt that times out is a failure like any other. Every failure is counted in
/// `failures`. Returns `Ok(None)` when cancelled, and `EngineError::BackendFatal` once
/// the retries are spent.
pub(crate) async fn retry_backend<T, F, Fut>(
    rank: usize,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    failures: &mut u64,
    mut call: F,
) -> Result<Option<T>, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let max_attempts = policy.max_retries + 1;
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            outcome = tokio::time::timeout(policy.attempt_timeout, call()) => outcome,
        };
        let outcome = outcome.unwrap_or_else(|_| {
            Err(BackendError::TimedOut {
                after: policy.attempt_timeout,
            })
        });
        match outcome {
            Ok(value) => return Ok(Some(value)),
            Err(source) => {
                *failures += 1;
                if attempt >= max_attempts {
                    return Err(EngineError::BackendFatal {
                        rank,
                        attempts: attempt,
                        source,
                    });
                }
                BackendFetchFailed {
                    rank,
                    attempt,
                    max_attempts,
                    error: &source,
                }
                .log();
                if pause(cancel, policy.delay).await {
                    return Ok(None);
                }
            }
        }
    }
}

/// An event between `open_event` and `close_event`.
///
/// `close_event` runs exactly once: explicitly through [`OpenEvent::close`], or on drop
/// when processing bails out early.
struct OpenEvent<'a> {
    framework: &'a dyn EventFramework,
    event: Event,
    closed: bool,
}

impl<'a> OpenEvent<'a> {
    fn new(framework: &'a dyn EventFramework, event: Event) -> Self {
        Self {
            framework,
            event,
            closed: false,
        }
    }

    fn open(&mut self) -> Result<(), BackendError> {
        self.framework.open_event(&mut self.event)
    }

    fn event(&self) -> &Event {
        &self.event
    }

    fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.framework.close_event(&mut self.event);
        }
    }
}

impl Drop for OpenEvent<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// A processing node: fetch, process and send until the source ends or shutdown is
/// requested.
///
/// Shutdown is observed between events only. An event that was fetched is always processed,
/// closed and sent before the worker looks at the cancellation token again.
pub struct Worker {
    process: ProcessConfig,
    backend: BackendDescriptor,
    pipeline: Pipeline,
    sender: ResultSender,
    settings: WorkerSettings,
    frames: FrameSendPolicy,
    cancel: CancellationToken,
    state: EngineState,
    stats: WorkerStats,
}

impl Worker {
    pub fn new(
        process: ProcessConfig,
        backend: BackendDescriptor,
        pipeline: &Pipeline,
        sender: ResultSender,
        settings: WorkerSettings,
        cancel: CancellationToken,
    ) -> Self {
        let rank = process.rank();
        let frames = FrameSendPolicy::new(settings.hit_frame_sending_interval, settings.non_hit_frame_sending_interval);
        Self {
            process,
            backend,
            pipeline: pipeline.for_rank(rank),
            sender: sender.for_rank(rank),
            settings,
            frames,
            cancel,
            state: EngineState::Initializing,
            stats: WorkerStats::default(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    fn transition(&mut self, to: EngineState) {
        NodeStateChanged {
            rank: self.process.rank(),
            from: self.state,
            to,
        }
        .log();
        self.state = to;
    }

    /// Runs the worker to completion. The completion marker is sent on every exit path,
    /// including fatal backend errors, so the coordinator never waits for a dead worker.
    pub async fn run(mut self) -> Result<NodeReport, EngineError> {
        let rank = self.process.rank();
        let outcome = self.run_loop().await;
        if let Err(error) = &outcome {
            WorkerFailed { rank, error }.log();
        }

        WorkerFinished {
            rank,
            stats: &self.stats,
        }
        .log();
        if let Err(error) = self.sender.send_done(self.stats.clone()).await {
            // The coordinator already finished draining.
            tracing::debug!(rank, error = %error, "completion marker not delivered");
        }
        self.transition(EngineState::Shutdown);

        outcome.map(|()| NodeReport {
            rank,
            role: self.process.role(),
            final_state: self.state,
            stats: self.stats,
        })
    }

    async fn run_loop(&mut self) -> Result<(), EngineError> {
        let rank = self.process.rank();

        // === INITIALIZING ===
        let shard = self.process.shard(self.settings.source.clone());
        let source = self.backend.source().clone();
        let (source_ref, shard_ref) = (&source, &shard);
        let stream = retry_backend(rank, self.settings.retry, &self.cancel, &mut self.stats.backend_errors, move || async move {
            source_ref.initialize_source(shard_ref).await?;
            source_ref.event_generator(shard_ref).await
        })
        .await?;
        let Some(mut stream) = stream else {
            return Ok(());
        };
        SourceInitialized {
            rank,
            profile: self.backend.profile(),
            source: shard.source.as_deref(),
        }
        .log();

        // === RUNNING ===
        self.transition(EngineState::Running);
        let mut consecutive_failures = 0u32;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = tokio::time::timeout(self.settings.fetch_timeout, stream.next_event()) => next,
            };

            match next {
                Err(_elapsed) => {
                    self.stats.skipped_timeout += 1;
                    FetchTimedOut {
                        rank,
                        timeout: self.settings.fetch_timeout,
                    }
                    .log();
                }
                Ok(None) => {
                    SourceExhausted {
                        rank,
                        fetched: self.stats.fetched,
                    }
                    .log();
                    break;
                }
                Ok(Some(Err(error))) => {
                    consecutive_failures += 1;
                    self.stats.backend_errors += 1;
                    let max_attempts = self.settings.retry.max_retries + 1;
                    if consecutive_failures >= max_attempts {
                        return Err(EngineError::BackendFatal {
                            rank,
                            attempts: consecutive_failures,
                            source: error,
                        });
                    }
                    BackendFetchFailed {
                        rank,
                        attempt: consecutive_failures,
                        max_attempts,
                        error: &error,
                    }
                    .log();
                    if pause(&self.cancel, self.settings.retry.delay).await {
                        break;
                    }
                }
                Ok(Some(Ok(event))) => {
                    consecutive_failures = 0;
                    self.stats.fetched += 1;
                    self.handle_event(event).await?;
                }
            }
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: Event) -> Result<(), EngineError> {
        let rank = self.process.rank();

        if let Some(threshold) = self.settings.frame_age_threshold {
            let age = unix_time_now() - event.timestamp();
            if age > threshold.as_secs_f64() {
                self.stats.skipped_stale += 1;
                StaleEventSkipped {
                    rank,
                    event_id: event.id(),
                    age_secs: age,
                    threshold_secs: threshold.as_secs_f64(),
                }
                .log();
                return Ok(());
            }
        }

        let framework = self.backend.framework().clone();
        let data = self.backend.data().clone();
        let mut opened = OpenEvent::new(framework.as_ref(), event);
        if let Err(error) = opened.open() {
            self.stats.backend_errors += 1;
            OpenEventFailed {
                rank,
                event_id: opened.event().id(),
                error: &error,
            }
            .log();
            return Ok(());
        }
        let mut result = self.pipeline.process_event(opened.event(), data.as_ref());
        opened.close();

        self.stats.processed += 1;
        let is_hit = result.is_hit();
        if is_hit {
            self.stats.hits += 1;
        }
        if result.is_degraded() {
            self.stats.degraded += 1;
        }
        self.stats.extraction_failures +=
            result.errors().iter().filter(|e| e.starts_with("extraction")).count() as u64;
        if self.frames.should_send_frame(is_hit) {
            if result.contains(fields::FRAME_CORRECTED) {
                self.stats.frames_sent += 1;
            }
        } else {
            result.remove(fields::FRAME_CORRECTED);
        }

        let event_id = result.event_id.clone();
        match self.sender.send_result(result, &mut self.stats).await {
            Ok(()) => Ok(()),
            Err(error @ TransportError::Timeout { .. }) => {
                self.stats.lost_results += 1;
                ResultLost {
                    rank,
                    event_id: &event_id,
                    error: &error,
                }
                .log();
                Ok(())
            }
            Err(error) => Err(EngineError::Transport(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{StubBackend, StubScript};
    use crate::engine::transport::{channel, ResultReceiver, WorkerMessage};
    use crate::model::{DataField, ProcessedResult};

    fn pipeline() -> Pipeline {
        Pipeline::new(vec![(DataField::DetectorData, true), (DataField::Timestamp, true)])
    }

    fn settings() -> WorkerSettings {
        WorkerSettings {
            fetch_timeout: Duration::from_millis(50),
            retry: RetryPolicy {
                max_retries: 2,
                delay: Duration::from_millis(1),
                attempt_timeout: Duration::from_millis(50),
            },
            ..Default::default()
        }
    }

    fn worker(stub: &StubBackend, settings: WorkerSettings, cancel: CancellationToken) -> (Worker, ResultReceiver) {
        let (tx, rx) = channel(64, Duration::from_millis(50), 2);
        let process = ProcessConfig::new(1, 2).unwrap();
        (Worker::new(process, stub.descriptor(), &pipeline(), tx, settings, cancel), rx)
    }

    async fn drain(rx: &mut ResultReceiver) -> (Vec<ProcessedResult>, Option<WorkerStats>) {
        let mut results = Vec::new();
        while let Some(message) = rx.recv().await {
            match message {
                WorkerMessage::Data(result) => results.push(*result),
                WorkerMessage::Done { stats, .. } => return (results, Some(stats)),
            }
        }
        (results, None)
    }

    #[tokio::test]
    async fn test_bounded_source_runs_to_completion() {
        let stub = StubBackend::new(StubScript {
            num_events: Some(5),
            ..Default::default()
        });
        let (worker, mut rx) = worker(&stub, settings(), CancellationToken::new());
        let report = worker.run().await.unwrap();
        let (results, done) = drain(&mut rx).await;

        assert_eq!(report.final_state, EngineState::Shutdown);
        assert_eq!(report.role, WorkerRole::Worker);
        assert_eq!(report.stats.processed, 5);
        assert_eq!(done, Some(report.stats.clone()));
        let ids: Vec<_> = results.iter().map(|r| r.event_id.to_string()).collect();
        assert_eq!(ids, vec!["stub-0", "stub-1", "stub-2", "stub-3", "stub-4"]);
        assert!(results.iter().all(|r| r.frame().is_none()));
        assert!(stub.ledger().balanced());
    }

    #[tokio::test]
    async fn test_every_event_is_closed_once_even_on_failures() {
        let stub = StubBackend::new(StubScript {
            num_events: Some(6),
            panic_on: vec![1],
            fail_extract_on: vec![2],
            fail_open_on: vec![3],
            ..Default::default()
        });
        let (worker, mut rx) = worker(&stub, settings(), CancellationToken::new());
        let report = worker.run().await.unwrap();
        let (results, _) = drain(&mut rx).await;

        let ledger = stub.ledger();
        assert_eq!(ledger.total_opened(), 6);
        assert_eq!(ledger.total_closed(), 6);
        assert!(ledger.balanced());
        assert_eq!(results.len(), 5);
        assert_eq!(report.stats.degraded, 2);
        assert_eq!(report.stats.backend_errors, 1);
        assert_eq!(report.stats.extraction_failures, 1);
    }

    #[tokio::test]
    async fn test_stale_events_are_skipped_before_opening() {
        let stub = StubBackend::new(StubScript {
            num_events: Some(4),
            timestamp: Some(1000.0),
            ..Default::default()
        });
        let settings = WorkerSettings {
            frame_age_threshold: Some(Duration::from_secs(10)),
            ..settings()
        };
        let (worker, mut rx) = worker(&stub, settings, CancellationToken::new());
        let report = worker.run().await.unwrap();
        let (results, _) = drain(&mut rx).await;

        assert!(results.is_empty());
        assert_eq!(report.stats.skipped_stale, 4);
        assert_eq!(stub.ledger().total_opened(), 0);
    }

    #[tokio::test]
    async fn test_stalled_fetch_is_bounded_by_timeout() {
        let stub = StubBackend::new(StubScript {
            stall_after: Some(2),
            ..Default::default()
        });
        let cancel = CancellationToken::new();
        let (worker, mut rx) = worker(&stub, settings(), cancel.clone());
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        let report = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();
        let (results, _) = drain(&mut rx).await;

        assert_eq!(results.len(), 2);
        assert!(report.stats.skipped_timeout >= 1);
        assert_eq!(report.final_state, EngineState::Shutdown);
    }

    #[tokio::test]
    async fn test_persistent_backend_failure_is_fatal_but_still_signals_done() {
        let stub = StubBackend::new(StubScript {
            always_fail_fetch: true,
            ..Default::default()
        });
        let (worker, mut rx) = worker(&stub, settings(), CancellationToken::new());
        let err = worker.run().await.unwrap_err();
        let (_, done) = drain(&mut rx).await;

        assert!(matches!(err, EngineError::BackendFatal { rank: 1, attempts: 3, .. }));
        assert_eq!(done.map(|s| s.backend_errors), Some(3));
        assert_eq!(stub.ledger().fetch_failures(), 3);
    }

    #[tokio::test]
    async fn test_stalled_initialization_is_bounded_and_fatal() {
        let stub = StubBackend::new(StubScript {
            stall_init: true,
            ..Default::default()
        });
        let (worker, mut rx) = worker(&stub, settings(), CancellationToken::new());
        let err = tokio::time::timeout(Duration::from_secs(5), worker.run())
            .await
            .expect("initialization was not bounded")
            .unwrap_err();
        let (_, done) = drain(&mut rx).await;

        assert!(matches!(
            err,
            EngineError::BackendFatal {
                attempts: 3,
                source: BackendError::TimedOut { .. },
                ..
            }
        ));
        assert_eq!(done.map(|s| s.backend_errors), Some(3));
        assert_eq!(stub.ledger().init_attempts(), 3);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_stalled_initialization() {
        let stub = StubBackend::new(StubScript {
            stall_init: true,
            ..Default::default()
        });
        let cancel = CancellationToken::new();
        let settings = WorkerSettings {
            retry: RetryPolicy {
                attempt_timeout: Duration::from_secs(60),
                ..settings().retry
            },
            ..settings()
        };
        let (worker, mut rx) = worker(&stub, settings, cancel.clone());
        let run = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let report = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("cancel did not reach the initializing worker")
            .unwrap()
            .unwrap();
        let (results, done) = drain(&mut rx).await;

        assert_eq!(report.final_state, EngineState::Shutdown);
        assert!(results.is_empty());
        assert!(done.is_some());
        assert_eq!(stub.ledger().init_attempts(), 1);
    }

    #[tokio::test]
    async fn test_transient_backend_failures_recover() {
        let stub = StubBackend::new(StubScript {
            num_events: Some(3),
            fetch_errors: 2,
            ..Default::default()
        });
        let (worker, mut rx) = worker(&stub, settings(), CancellationToken::new());
        let report = worker.run().await.unwrap();
        let (results, _) = drain(&mut rx).await;

        assert_eq!(results.len(), 3);
        assert_eq!(report.stats.backend_errors, 2);
    }

    #[tokio::test]
    async fn test_frame_sending_interval() {
        let stub = StubBackend::new(StubScript {
            num_events: Some(4),
            ..Default::default()
        });
        let settings = WorkerSettings {
            non_hit_frame_sending_interval: Some(2),
            ..settings()
        };
        let (worker, mut rx) = worker(&stub, settings, CancellationToken::new());
        let report = worker.run().await.unwrap();
        let (results, _) = drain(&mut rx).await;

        let with_frame: Vec<bool> = results.iter().map(|r| r.frame().is_some()).collect();
        assert_eq!(with_frame, vec![false, true, false, true]);
        assert_eq!(report.stats.frames_sent, 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_sends_only_done() {
        let stub = StubBackend::new(StubScript::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (worker, mut rx) = worker(&stub, settings(), cancel);
        let report = worker.run().await.unwrap();
        let (results, done) = drain(&mut rx).await;

        assert!(results.is_empty());
        assert!(done.is_some());
        assert_eq!(report.stats.fetched, 0);
        assert_eq!(stub.ledger().total_opened(), 0);
    }
}
