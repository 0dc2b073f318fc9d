// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Worker to coordinator message passing.
//!
//! All workers share one bounded queue into the coordinator. Sending hands ownership of
//! the result to the coordinator; nothing is shared between the two sides. Results from
//! one worker arrive in the order that worker sent them, while results of different
//! workers interleave freely.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};

use crate::errors::TransportError;
use crate::model::ProcessedResult;
use crate::observability::messages::engine::SendRetry;
use crate::observability::messages::StructuredLog;

/// Counters a worker keeps and ships with its completion marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub fetched: u64,
    pub processed: u64,
    pub hits: u64,
    pub degraded: u64,
    /// Required fields the backend failed to extract.
    pub extraction_failures: u64,
    pub skipped_stale: u64,
    pub skipped_timeout: u64,
    pub backend_errors: u64,
    pub send_retries: u64,
    pub lost_results: u64,
    pub frames_sent: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &WorkerStats) {
        self.fetched += other.fetched;
        self.processed += other.processed;
        self.hits += other.hits;
        self.degraded += other.degraded;
        self.extraction_failures += other.extraction_failures;
        self.skipped_stale += other.skipped_stale;
        self.skipped_timeout += other.skipped_timeout;
        self.backend_errors += other.backend_errors;
        self.send_retries += other.send_retries;
        self.lost_results += other.lost_results;
        self.frames_sent += other.frames_sent;
    }

    pub fn skipped(&self) -> u64 {
        self.skipped_stale + self.skipped_timeout
    }
}

#[derive(Debug)]
pub enum WorkerMessage {
    Data(Box<ProcessedResult>),
    /// Completion marker; the last message a worker sends.
    Done { rank: usize, stats: WorkerStats },
}

/// Sending side held by one worker.
#[derive(Debug, Clone)]
pub struct ResultSender {
    rank: usize,
    tx: mpsc::Sender<WorkerMessage>,
    send_timeout: Duration,
    retries: u32,
}

/// Receiving side held by the coordinator.
#[derive(Debug)]
pub struct ResultReceiver {
    rx: mpsc::Receiver<WorkerMessage>,
}

/// Creates the shared queue. `buffer` bounds the number of in-flight messages.
pub fn channel(buffer: usize, send_timeout: Duration, retries: u32) -> (ResultSender, ResultReceiver) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (
        ResultSender {
            rank: 0,
            tx,
            send_timeout,
            retries,
        },
        ResultReceiver { rx },
    )
}

impl ResultSender {
    /// Copy of this sender that reports as `rank`.
    pub fn for_rank(&self, rank: usize) -> Self {
        Self {
            rank,
            ..self.clone()
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Sends a result, waiting at most `send_timeout` per attempt while the queue is full.
    ///
    /// After `retries` further attempts the result is given up and
    /// `TransportError::Timeout` is returned; the caller counts it as lost.
    pub async fn send_result(&self, result: ProcessedResult, stats: &mut WorkerStats) -> Result<(), TransportError> {
        let event_id = result.event_id.clone();
        let mut message = match self.tx.try_send(WorkerMessage::Data(Box::new(result))) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(_)) => return Err(TransportError::Closed { rank: self.rank }),
            Err(TrySendError::Full(message)) => message,
        };

        let attempts = self.retries + 1;
        for attempt in 1..=attempts {
            stats.send_retries += 1;
            SendRetry {
                rank: self.rank,
                event_id: &event_id,
                attempt,
                max_attempts: attempts,
            }
            .log();
            match self.tx.send_timeout(message, self.send_timeout).await {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Closed(_)) => return Err(TransportError::Closed { rank: self.rank }),
                Err(SendTimeoutError::Timeout(returned)) => message = returned,
            }
        }
        Err(TransportError::Timeout {
            rank: self.rank,
            attempts,
        })
    }

    /// Sends the completion marker. Waits for queue space: the coordinator keeps receiving
    /// until it has every marker or its drain timeout expires.
    pub async fn send_done(&self, stats: WorkerStats) -> Result<(), TransportError> {
        self.tx
            .send(WorkerMessage::Done { rank: self.rank, stats })
            .await
            .map_err(|_| TransportError::Closed { rank: self.rank })
    }
}

impl ResultReceiver {
    pub async fn recv(&mut self) -> Option<WorkerMessage> {
        self.rx.recv().await
    }
}
