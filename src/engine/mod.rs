// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The parallel engine.
//!
//! A run is one coordinator (rank 0) and `node_pool_size - 1` workers, each a tokio task
//! with its own [`EngineState`] machine:
//!
//! ```text
//! Initializing -> Running -> Draining -> Shutdown
//! ```
//!
//! Workers fetch, process and send; the coordinator receives, accumulates and publishes.
//! They share nothing but the bounded result queue in [`transport`]. Shutdown is a
//! cancellation token observed by every node between events.

pub mod coordinator;
pub mod event_counter;
pub mod monitor;
pub mod role;
pub mod transport;
pub mod worker;

#[cfg(test)]
mod integration_tests;

pub use coordinator::{Coordinator, CoordinatorReport, CoordinatorSettings};
pub use event_counter::{EventCounter, FrameSendPolicy};
pub use monitor::{Monitor, RunReport, ShutdownHandle};
pub use role::{EngineState, ProcessConfig, WorkerRole};
pub use transport::{WorkerMessage, WorkerStats};
pub use worker::{NodeReport, RetryPolicy, Worker, WorkerSettings};
