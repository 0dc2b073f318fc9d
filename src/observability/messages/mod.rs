// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! # Organization
//!
//! * `source` - event source and backend events
//! * `pipeline` - processing pipeline events
//! * `engine` - coordinator and worker lifecycle events
//! * `broadcast` - broadcast channel events
//!
//! # Usage Pattern
//!
//! ```rust
//! use xtal_monitor::observability::messages::source::SourceExhausted;
//! use xtal_monitor::observability::messages::StructuredLog;
//!
//! let msg = SourceExhausted { rank: 2, fetched: 40 };
//!
//! let span = msg.span("worker");
//! let _guard = span.enter();
//! msg.log();
//! ```

use tracing::Span;

pub mod broadcast;
pub mod engine;
pub mod pipeline;
pub mod source;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emits the message at its level, with structured fields.
    fn log(&self);

    /// Builds a span carrying the same fields.
    fn span(&self, name: &str) -> Span;
}
