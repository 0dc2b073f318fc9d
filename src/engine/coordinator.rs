// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::event_counter::EventCounter;
use super::role::{EngineState, ProcessConfig, WorkerRole};
use super::transport::{ResultReceiver, WorkerMessage, WorkerStats};
use super::worker::{retry_backend, RetryPolicy};
use crate::accumulator::Accumulator;
use crate::backends::BackendDescriptor;
use crate::broadcast::wire::{self, WireRates};
use crate::broadcast::Broadcaster;
use crate::config::consts::{DEFAULT_ACCUMULATION_WINDOW, DEFAULT_DRAIN_TIMEOUT_SECS};
use crate::config::groups::IntervalParams;
use crate::config::MonitorConfig;
use crate::errors::EngineError;
use crate::model::ProcessedResult;
use crate::observability::messages::engine::{DrainTimedOut, NodeStateChanged};
use crate::observability::messages::source::SourceInitialized;
use crate::observability::messages::StructuredLog;
use crate::utils::unix_time_now;

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    pub source: Option<String>,
    pub retry: RetryPolicy,
    pub drain_timeout: Duration,
    pub window_size: usize,
    pub intervals: IntervalParams,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            source: None,
            retry: RetryPolicy::default(),
            drain_timeout: Duration::from_secs_f64(DEFAULT_DRAIN_TIMEOUT_SECS),
            window_size: DEFAULT_ACCUMULATION_WINDOW,
            intervals: IntervalParams::default(),
        }
    }
}

impl CoordinatorSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            source: config.source.source.clone(),
            retry: RetryPolicy::from_config(config),
            drain_timeout: config.engine.drain_timeout,
            window_size: config.accumulator.window_size,
            intervals: config.intervals.clone(),
        }
    }
}

/// What the coordinator saw over the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorReport {
    pub final_state: EngineState,
    /// Results received from workers.
    pub total: u64,
    pub hits: u64,
    /// Worker counters merged from their completion markers.
    pub stats: WorkerStats,
    pub workers_reported: usize,
    pub drain_timed_out: bool,
    pub published: u64,
    pub dropped_broadcasts: u64,
}

/// Rank 0: receives results, keeps the rolling window and publishes snapshots.
pub struct Coordinator {
    process: ProcessConfig,
    backend: BackendDescriptor,
    receiver: ResultReceiver,
    broadcaster: Broadcaster,
    settings: CoordinatorSettings,
    cancel: CancellationToken,
    accumulator: Accumulator,
    counter: EventCounter,
    state: EngineState,
    stats: WorkerStats,
    done: BTreeSet<usize>,
    last_published_version: u64,
    published: u64,
}

enum Step {
    Cancelled,
    Message(Option<WorkerMessage>),
    Tick,
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl Coordinator {
    pub fn new(
        process: ProcessConfig,
        backend: BackendDescriptor,
        receiver: ResultReceiver,
        broadcaster: Broadcaster,
        settings: CoordinatorSettings,
        cancel: CancellationToken,
    ) -> Self {
        let accumulator = Accumulator::new(settings.window_size);
        let counter = EventCounter::new(&settings.intervals, Instant::now());
        Self {
            process,
            backend,
            receiver,
            broadcaster,
            settings,
            cancel,
            accumulator,
            counter,
            state: EngineState::Initializing,
            stats: WorkerStats::default(),
            done: BTreeSet::new(),
            last_published_version: 0,
            published: 0,
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

    fn all_workers_done(&self) -> bool {
        self.done.len() >= self.process.num_workers()
    }

    pub async fn run(mut self) -> Result<CoordinatorReport, EngineError> {
        let rank = self.process.rank();

        // === INITIALIZING ===
        let shard = self.process.shard(self.settings.source.clone());
        let source = self.backend.source().clone();
        let (source_ref, shard_ref) = (&source, &shard);
        let mut init_failures = 0;
        let initialized = retry_backend(rank, self.settings.retry, &self.cancel, &mut init_failures, move || async move {
            source_ref.initialize_source(shard_ref).await
        })
        .await?;
        if initialized.is_some() {
            SourceInitialized {
                rank,
                profile: self.backend.profile(),
                source: shard.source.as_deref(),
            }
            .log();
        }

        // === RUNNING ===
        self.transition(EngineState::Running);
        let mut ticker = self.counter.broadcast_interval().map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        while !self.all_workers_done() {
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Step::Cancelled,
                message = self.receiver.recv() => Step::Message(message),
                _ = tick(&mut ticker) => Step::Tick,
            };
            match step {
                Step::Cancelled => break,
                Step::Message(Some(message)) => self.on_message(message),
                Step::Message(None) => break,
                Step::Tick => {
                    if self.counter.pending() > 0 {
                        self.publish(Instant::now());
                    }
                }
            }
        }

        // === DRAINING ===
        self.transition(EngineState::Draining);
        let mut drain_timed_out = false;
        let deadline = tokio::time::Instant::now() + self.settings.drain_timeout;
        while !self.all_workers_done() {
            match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                Ok(Some(message)) => self.on_message(message),
                Ok(None) => break,
                Err(_) => {
                    DrainTimedOut {
                        pending_workers: self.process.num_workers().saturating_sub(self.done.len()),
                        timeout: self.settings.drain_timeout,
                    }
                    .log();
                    drain_timed_out = true;
                    break;
                }
            }
        }

        // === SHUTDOWN ===
        if self.counter.pending() > 0 {
            self.publish(Instant::now());
        }
        self.broadcaster.close();
        self.transition(EngineState::Shutdown);

        Ok(CoordinatorReport {
            final_state: self.state,
            total: self.accumulator.total(),
            hits: self.accumulator.hits(),
            stats: self.stats,
            workers_reported: self.done.len(),
            drain_timed_out,
            published: self.published,
            dropped_broadcasts: self.broadcaster.dropped(),
        })
    }

    fn on_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Data(result) => self.on_result(*result),
            WorkerMessage::Done { rank, stats } => {
                if self.done.insert(rank) {
                    self.stats.merge(&stats);
                }
            }
        }
    }

    fn on_result(&mut self, result: ProcessedResult) {
        let now = Instant::now();
        let is_hit = result.is_hit();
        self.accumulator.add_data(result);
        self.counter.add_event(is_hit);
        if let Some(report) = self.counter.speed_report(now) {
            report.log();
        }
        if self.counter.should_broadcast(now) {
            self.publish(now);
        }
    }

    fn publish(&mut self, now: Instant) {
        let snapshot = self.accumulator.snapshot();
        let fresh = snapshot.version.saturating_sub(self.last_published_version);
        if fresh > snapshot.window.len() as u64 {
            tracing::warn!(
                rank = self.process.rank(),
                fresh,
                window_size = snapshot.window.len(),
                "more results arrived than the window holds; the oldest are left out of this snapshot"
            );
        }
        let rates = WireRates {
            hit_rate: snapshot.hit_rate(),
            window_hit_rate: snapshot.window_hit_rate(),
            events_per_second: self.counter.events_per_second(now),
            dropped_broadcasts: self.broadcaster.dropped(),
        };
        let message = wire::encode(
            self.broadcaster.topic(),
            &snapshot,
            self.last_published_version,
            rates,
            unix_time_now(),
        );
        if let Err(error) = self.broadcaster.send_data(&message) {
            tracing::warn!(rank = self.process.rank(), error = %error, "snapshot could not be serialized");
        }
        self.last_published_version = snapshot.version;
        self.counter.mark_broadcast(now);
        self.published += 1;
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("role", &WorkerRole::Coordinator)
            .field("state", &self.state)
            .field("received", &self.accumulator.total())
            .field("workers_done", &self.done.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{StubBackend, StubScript};
    use crate::engine::transport::{channel, ResultSender};
    use crate::model::{fields, EventId, ResultValue};

    fn result(rank: usize, id: usize, hit: bool) -> ProcessedResult {
        let mut result = ProcessedResult::new(rank, EventId(format!("e{}", id)));
        result.insert(fields::HIT_FLAG, ResultValue::Bool(hit));
        result
    }

    fn coordinator(
        group_size: usize,
        settings: CoordinatorSettings,
        cancel: CancellationToken,
    ) -> (Coordinator, ResultSender, Broadcaster) {
        let (tx, rx) = channel(64, Duration::from_millis(50), 1);
        let broadcaster = Broadcaster::new("test:omdata", 64);
        let stub = StubBackend::new(StubScript::default());
        let process = ProcessConfig::new(0, group_size).unwrap();
        let coordinator = Coordinator::new(process, stub.descriptor(), rx, broadcaster.clone(), settings, cancel);
        (coordinator, tx, broadcaster)
    }

    #[tokio::test]
    async fn test_publishes_every_k_results_and_flushes_the_rest() {
        let settings = CoordinatorSettings {
            intervals: IntervalParams {
                data_broadcast_interval: Some(4),
                ..Default::default()
            },
            ..Default::default()
        };
        let (coordinator, tx, broadcaster) = coordinator(2, settings, CancellationToken::new());
        let mut subscription = broadcaster.subscribe();

        let mut stats = WorkerStats::default();
        let tx = tx.for_rank(1);
        for i in 0..10 {
            tx.send_result(result(1, i, i % 2 == 0), &mut stats).await.unwrap();
        }
        tx.send_done(WorkerStats {
            processed: 10,
            ..Default::default()
        })
        .await
        .unwrap();

        let report = coordinator.run().await.unwrap();
        assert_eq!(report.final_state, EngineState::Shutdown);
        assert_eq!(report.total, 10);
        assert_eq!(report.hits, 5);
        assert_eq!(report.stats.processed, 10);
        assert_eq!(report.published, 3);
        assert!(!report.drain_timed_out);

        let mut batches = Vec::new();
        while let Some(message) = subscription.recv_message().await {
            batches.push(message.unwrap());
        }
        let sizes: Vec<usize> = batches.iter().map(|m| m.events.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(batches[2].total, 10);
        assert_eq!(batches[2].events[1].event_id, "e9");
        assert!(broadcaster.is_closed());
    }

    #[tokio::test]
    async fn test_waits_for_every_worker_and_counts_each_once() {
        let (coordinator, tx, _broadcaster) = coordinator(3, CoordinatorSettings::default(), CancellationToken::new());
        let handle = tokio::spawn(coordinator.run());

        let one = tx.for_rank(1);
        one.send_done(WorkerStats {
            hits: 2,
            ..Default::default()
        })
        .await
        .unwrap();
        one.send_done(WorkerStats {
            hits: 2,
            ..Default::default()
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        tx.for_rank(2).send_done(WorkerStats::default()).await.unwrap();
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.workers_reported, 2);
        assert_eq!(report.stats.hits, 2);
    }

    #[tokio::test]
    async fn test_drain_is_bounded_when_a_worker_never_reports() {
        let settings = CoordinatorSettings {
            drain_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let (coordinator, tx, _broadcaster) = coordinator(3, settings, cancel.clone());
        tx.for_rank(1).send_done(WorkerStats::default()).await.unwrap();
        cancel.cancel();

        let report = tokio::time::timeout(Duration::from_secs(2), coordinator.run())
            .await
            .unwrap()
            .unwrap();
        assert!(report.drain_timed_out);
        assert_eq!(report.workers_reported, 1);
        assert_eq!(report.final_state, EngineState::Shutdown);
    }

    #[tokio::test]
    async fn test_time_interval_publishes_below_k() {
        let settings = CoordinatorSettings {
            intervals: IntervalParams {
                data_broadcast_interval: Some(1000),
                broadcast_interval: Some(Duration::from_millis(20)),
                ..Default::default()
            },
            ..Default::default()
        };
        let (coordinator, tx, broadcaster) = coordinator(2, settings, CancellationToken::new());
        let mut subscription = broadcaster.subscribe();
        let handle = tokio::spawn(coordinator.run());

        let mut stats = WorkerStats::default();
        tx.for_rank(1).send_result(result(1, 0, true), &mut stats).await.unwrap();
        let message = tokio::time::timeout(Duration::from_secs(2), subscription.recv_message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(message.total, 1);
        assert_eq!(message.hits, 1);

        tx.for_rank(1).send_done(stats).await.unwrap();
        handle.await.unwrap().unwrap();
    }
}
