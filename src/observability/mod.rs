// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Every recurring diagnostic of the monitor is a message struct with a `Display`
//! implementation and a [`StructuredLog`](messages::StructuredLog) implementation, so call
//! sites never carry format strings and the structured fields stay consistent between the
//! human-readable line and the machine-readable record.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::source` - backend initialization, fetch failures, skipped events
//! * `messages::pipeline` - pipeline setup and per-event degradation
//! * `messages::engine` - node lifecycle, transport, speed reports, shutdown
//! * `messages::broadcast` - publisher and subscriber events
//!
//! # Usage
//!
//! ```rust
//! use xtal_monitor::observability::messages::engine::SpeedReport;
//! use xtal_monitor::observability::messages::StructuredLog;
//! use std::time::Duration;
//!
//! let msg = SpeedReport {
//!     processed: 1000,
//!     elapsed: Duration::from_secs(8),
//! };
//!
//! assert_eq!(msg.to_string(), "Processed: 1000 in 8.00 seconds (125.00 Hz)");
//! msg.log();
//! ```
//!
//! The subscriber is installed by the binary only; library code just emits events.

pub mod messages;
