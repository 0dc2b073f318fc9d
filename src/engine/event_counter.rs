// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::{Duration, Instant};

use crate::config::groups::IntervalParams;
use crate::observability::messages::engine::SpeedReport;

/// Decides, on a worker, which corrected frames travel to the coordinator.
///
/// Hits and non-hits are counted separately; with interval `n` every `n`-th event of a
/// class keeps its frame. An unset interval never sends frames of that class.
#[derive(Debug, Clone)]
pub struct FrameSendPolicy {
    hit_interval: Option<u64>,
    non_hit_interval: Option<u64>,
    hits: u64,
    non_hits: u64,
}

impl FrameSendPolicy {
    pub fn new(hit_interval: Option<u64>, non_hit_interval: Option<u64>) -> Self {
        Self {
            hit_interval,
            non_hit_interval,
            hits: 0,
            non_hits: 0,
        }
    }

    pub fn from_intervals(intervals: &IntervalParams) -> Self {
        Self::new(intervals.hit_frame_sending_interval, intervals.non_hit_frame_sending_interval)
    }

    /// Counts one event and tells whether its frame should be sent.
    pub fn should_send_frame(&mut self, is_hit: bool) -> bool {
        let (count, interval) = if is_hit {
            self.hits += 1;
            (self.hits, self.hit_interval)
        } else {
            self.non_hits += 1;
            (self.non_hits, self.non_hit_interval)
        };
        interval.map_or(false, |n| count % n == 0)
    }
}

/// Coordinator-side cadence: speed reports and snapshot publishing.
///
/// A snapshot is due after `data_broadcast_interval` results (K) or once
/// `broadcast_interval` (T) has passed since the last publish, whichever comes first.
/// With neither configured every result is published.
#[derive(Debug, Clone)]
pub struct EventCounter {
    speed_report_interval: Option<u64>,
    data_broadcast_interval: Option<u64>,
    broadcast_interval: Option<Duration>,
    started: Instant,
    last_report: Instant,
    last_report_count: u64,
    last_broadcast: Instant,
    num_events: u64,
    num_hits: u64,
    since_broadcast: u64,
}

impl EventCounter {
    pub fn new(intervals: &IntervalParams, now: Instant) -> Self {
        Self {
            speed_report_interval: intervals.speed_report_interval,
            data_broadcast_interval: intervals.data_broadcast_interval,
            broadcast_interval: intervals.broadcast_interval,
            started: now,
            last_report: now,
            last_report_count: 0,
            last_broadcast: now,
            num_events: 0,
            num_hits: 0,
            since_broadcast: 0,
        }
    }

    pub fn broadcast_interval(&self) -> Option<Duration> {
        self.broadcast_interval
    }

    pub fn add_event(&mut self, is_hit: bool) {
        self.num_events += 1;
        self.since_broadcast += 1;
        if is_hit {
            self.num_hits += 1;
        }
    }

    pub fn num_events(&self) -> u64 {
        self.num_events
    }

    pub fn num_hits(&self) -> u64 {
        self.num_hits
    }

    /// Results received since the last publish.
    pub fn pending(&self) -> u64 {
        self.since_broadcast
    }

    /// A speed report when the event count just reached a multiple of the report interval.
    pub fn speed_report(&mut self, now: Instant) -> Option<SpeedReport> {
        let interval = self.speed_report_interval?;
        if self.num_events == 0 || self.num_events % interval != 0 {
            return None;
        }
        let report = SpeedReport {
            processed: self.num_events - self.last_report_count,
            elapsed: now.duration_since(self.last_report),
        };
        self.last_report = now;
        self.last_report_count = self.num_events;
        Some(report)
    }

    pub fn should_broadcast(&self, now: Instant) -> bool {
        if self.since_broadcast == 0 {
            return false;
        }
        match (self.data_broadcast_interval, self.broadcast_interval) {
            (None, None) => true,
            (k, t) => {
                k.map_or(false, |k| self.since_broadcast >= k)
                    || t.map_or(false, |t| now.duration_since(self.last_broadcast) >= t)
            }
        }
    }

    pub fn mark_broadcast(&mut self, now: Instant) {
        self.since_broadcast = 0;
        self.last_broadcast = now;
    }

    /// Average event rate since the counter started.
    pub fn events_per_second(&self, now: Instant) -> f64 {
        let secs = now.duration_since(self.started).as_secs_f64();
        if secs > 0.0 {
            self.num_events as f64 / secs
        } else {
            0.0
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.started)
    }
}
