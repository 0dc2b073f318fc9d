// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error taxonomy for the monitor.
//!
//! * `ConfigError` - missing or malformed parameters, unknown backend profiles. Fatal at
//!   startup: no node enters `Running` after one of these.
//! * `EventError` - per-event failures. Recovered locally, the result is degraded.
//! * `TransportError` - worker to coordinator delivery failures. Retried, then the result
//!   is counted as lost.
//! * `BackendError` - the facility source failed. Retried, escalated to `EngineError` when
//!   persistent.

mod backend;
mod config;
mod engine;
mod event;
mod transport;

pub use backend::{BackendError, ExtractError};
pub use config::ConfigError;
pub use engine::EngineError;
pub use event::{EventError, ShapeError};
pub use transport::TransportError;
