// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::coordinator::{Coordinator, CoordinatorReport, CoordinatorSettings};
use super::role::{ProcessConfig, WorkerRole};
use super::transport::{channel, WorkerStats};
use super::worker::{NodeReport, Worker, WorkerSettings};
use crate::backends::BackendDescriptor;
use crate::broadcast::{Broadcaster, TcpPublisher};
use crate::config::{MonitorConfig, MonitorParams, RuntimeBuilder};
use crate::errors::{ConfigError, EngineError};
use crate::observability::messages::engine::{
    MonitorStarted, MonitorStopped, NodeStarted, ShutdownRequested, WorkerFailed,
};
use crate::observability::messages::StructuredLog;
use crate::pipeline::Pipeline;

/// Requests a graceful stop of a running [`Monitor`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    cancel: CancellationToken,
}

impl ShutdownHandle {
    /// Tells every node to stop at its next safe point. Calling it again has no effect.
    pub fn shutdown(&self, reason: &str) {
        if !self.cancel.is_cancelled() {
            ShutdownRequested { reason }.log();
            self.cancel.cancel();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Outcome of a complete run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub coordinator: CoordinatorReport,
    pub workers: Vec<NodeReport>,
    /// Workers that stopped on a fatal error, with the error message.
    pub failed_workers: Vec<(usize, String)>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn total(&self) -> u64 {
        self.coordinator.total
    }

    pub fn hits(&self) -> u64 {
        self.coordinator.hits
    }

    pub fn lost(&self) -> u64 {
        self.coordinator.stats.lost_results
    }
}

/// Launches one coordinator and `node_pool_size - 1` workers as tasks and runs them to
/// completion.
///
/// # Example
///
/// ```no_run
/// use xtal_monitor::config::MonitorParams;
/// use xtal_monitor::engine::Monitor;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let params = MonitorParams::load("monitor.yaml")?;
/// let monitor = Monitor::from_params(&params)?;
/// let shutdown = monitor.shutdown_handle();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.shutdown("interrupted");
/// });
/// let report = monitor.run().await?;
/// println!("{} hits out of {}", report.hits(), report.total());
/// # Ok(())
/// # }
/// ```
pub struct Monitor {
    config: MonitorConfig,
    backend: BackendDescriptor,
    pipeline: Pipeline,
    broadcaster: Broadcaster,
    cancel: CancellationToken,
}

impl Monitor {
    pub fn new(config: MonitorConfig, backend: BackendDescriptor, pipeline: Pipeline) -> Self {
        let broadcaster = Broadcaster::new(config.broadcast.topic.clone(), config.broadcast.subscriber_queue);
        Self {
            config,
            backend,
            pipeline,
            broadcaster,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_params(params: &MonitorParams) -> Result<Self, ConfigError> {
        let (config, backend, pipeline) = RuntimeBuilder::from_params(params)?;
        Ok(Self::new(config, backend, pipeline))
    }

    /// The in-process channel snapshots are published on. Subscribe before [`Monitor::run`]
    /// to see every message.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            cancel: self.cancel.clone(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Runs until every worker is done: the source is exhausted, shutdown was requested, or
    /// the worker failed fatally.
    ///
    /// A fatal error of one worker does not stop the others. The run fails only when every
    /// worker failed, the coordinator failed, or the TCP endpoint could not be bound.
    pub async fn run(self) -> Result<RunReport, EngineError> {
        let started = Instant::now();
        let engine = &self.config.engine;
        let group_size = engine.node_pool_size;
        let coordinator_process = ProcessConfig::new(0, group_size)?;

        MonitorStarted {
            profile: self.backend.profile(),
            node_pool_size: group_size,
            topic: self.broadcaster.topic(),
        }
        .log();

        let publisher = match &self.config.broadcast.address {
            Some(address) => {
                Some(TcpPublisher::bind(address, self.config.broadcast.port, self.broadcaster.clone()).await?)
            }
            None => None,
        };

        let (sender, receiver) = channel(engine.send_buffer_size, engine.send_timeout, engine.send_retries);

        let coordinator = Coordinator::new(
            coordinator_process,
            self.backend.clone(),
            receiver,
            self.broadcaster.clone(),
            CoordinatorSettings::from_config(&self.config),
            self.cancel.clone(),
        );
        let coordinator_task = spawn_node(0, coordinator.run());

        let settings = WorkerSettings::from_config(&self.config);
        let mut worker_tasks = Vec::with_capacity(coordinator_process.num_workers());
        for rank in 1..group_size {
            let worker = Worker::new(
                ProcessConfig::new(rank, group_size)?,
                self.backend.clone(),
                &self.pipeline,
                sender.clone(),
                settings.clone(),
                self.cancel.clone(),
            );
            worker_tasks.push((rank, spawn_node(rank, worker.run())));
        }

        let mut workers = Vec::with_capacity(worker_tasks.len());
        let mut failures = Vec::new();
        for (rank, task) in worker_tasks {
            match task.await {
                Ok(Ok(report)) => workers.push(report),
                Ok(Err(error)) => failures.push((rank, error)),
                Err(join_error) => {
                    let error = EngineError::NodeCrashed {
                        rank,
                        reason: join_error.to_string(),
                    };
                    WorkerFailed { rank, error: &error }.log();
                    // The task died before it could report; the coordinator still waits for it.
                    if sender.for_rank(rank).send_done(WorkerStats::default()).await.is_err() {
                        tracing::debug!(rank, "coordinator gone before the completion marker");
                    }
                    failures.push((rank, error));
                }
            }
        }
        drop(sender);

        let coordinator = match coordinator_task.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(EngineError::NodeCrashed {
                rank: 0,
                reason: join_error.to_string(),
            }),
        };
        if let Some(publisher) = publisher {
            publisher.shutdown().await;
        }
        let coordinator = coordinator?;

        MonitorStopped {
            received: coordinator.total,
            hits: coordinator.hits,
            lost: coordinator.stats.lost_results,
            dropped_broadcasts: coordinator.dropped_broadcasts,
            elapsed: started.elapsed(),
        }
        .log();

        if workers.is_empty() && !failures.is_empty() {
            let (_, error) = failures.swap_remove(0);
            return Err(error);
        }

        Ok(RunReport {
            coordinator,
            workers,
            failed_workers: failures.into_iter().map(|(rank, error)| (rank, error.to_string())).collect(),
            elapsed: started.elapsed(),
        })
    }
}

fn spawn_node<F, T>(rank: usize, node: F) -> JoinHandle<Result<T, EngineError>>
where
    F: std::future::Future<Output = Result<T, EngineError>> + Send + 'static,
    T: Send + 'static,
{
    let started = NodeStarted {
        rank,
        role: WorkerRole::from_rank(rank),
    };
    started.log();
    tokio::spawn(node.instrument(started.span("node")))
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("backend", &self.backend.profile())
            .field("node_pool_size", &self.config.engine.node_pool_size)
            .field("broadcaster", &self.broadcaster)
            .finish()
    }
}
