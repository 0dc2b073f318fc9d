// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Publishing of accumulated results.
//!
//! * [`Broadcaster`] - in-process, fire-and-forget fan-out on a named topic
//! * [`wire`] - the JSON message format
//! * [`TcpPublisher`] - optional TCP endpoint that turns connections into subscribers
//!
//! # Examples
//!
//! ```
//! use xtal_monitor::broadcast::Broadcaster;
//!
//! let broadcaster = Broadcaster::new("view:omdata", 16);
//! let mut subscription = broadcaster.subscribe();
//!
//! broadcaster.send_raw("{\"hits\":3}".into());
//! assert_eq!(subscription.try_recv().as_deref(), Some("{\"hits\":3}"));
//! ```

mod broadcaster;
mod tcp;
pub mod wire;

pub use broadcaster::{Broadcaster, Subscription};
pub use tcp::TcpPublisher;
