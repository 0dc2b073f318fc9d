// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Capacity of each worker's bounded send buffer (results in flight to the coordinator)
pub const DEFAULT_SEND_BUFFER_SIZE: usize = 64;
/// How long one send attempt may wait for buffer space
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 200;
/// Send attempts before a result is declared lost
pub const DEFAULT_SEND_RETRIES: u32 = 3;
/// Staleness timeout for a single fetch from the backend
pub const DEFAULT_FETCH_TIMEOUT_SECS: f64 = 5.0;
/// Consecutive backend failures tolerated before a worker gives up
pub const DEFAULT_MAX_BACKEND_RETRIES: u32 = 5;
pub const DEFAULT_BACKEND_RETRY_DELAY_MS: u64 = 100;
/// Bound on the coordinator's draining phase
pub const DEFAULT_DRAIN_TIMEOUT_SECS: f64 = 5.0;

pub const DEFAULT_ACCUMULATION_WINDOW: usize = 100;

pub const DEFAULT_BROADCAST_TOPIC: &str = "view:omdata";
pub const DEFAULT_BROADCAST_PORT: u16 = 12321;
/// Messages queued per subscriber before new ones are dropped
pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 16;

pub const DEFAULT_CONNECTIVITY: u8 = 8;
/// Sigma-clipping passes used for the radial background estimate
pub const RADIAL_STATS_ITERATIONS: usize = 5;
/// Pixels further than this many sigmas above a bin's mean are clipped from the next pass
pub const RADIAL_CLIP_SIGMAS: f32 = 3.0;
