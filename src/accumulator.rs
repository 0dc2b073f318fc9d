// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Coordinator-side rolling statistics.
//!
//! The [`Accumulator`] keeps the last `window_size` results in strict arrival order plus
//! running counters and a running mean of every corrected frame it has seen. It is owned
//! by the coordinator loop and never shared; the broadcaster only ever sees
//! [`AccumulatorSnapshot`]s.
//!
//! Snapshots are versioned hand-offs: the window entries and the mean frame are shared
//! through `Arc`, and the next update of the mean frame copies it if a snapshot still
//! holds the previous version. A snapshot therefore never changes after it was taken.
//!
//! # Examples
//!
//! ```
//! use xtal_monitor::accumulator::Accumulator;
//! use xtal_monitor::model::{EventId, ProcessedResult};
//!
//! let mut acc = Accumulator::new(2);
//! for id in ["a", "b", "c"] {
//!     acc.add_data(ProcessedResult::new(1, EventId::from(id)));
//! }
//!
//! let snapshot = acc.snapshot();
//! let ids: Vec<_> = snapshot.window.iter().map(|r| r.event_id.to_string()).collect();
//! assert_eq!(ids, vec!["b", "c"]);
//! assert_eq!(snapshot.total, 3);
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::model::{Frame, ProcessedResult};

/// Fixed-capacity FIFO of recent results plus running aggregates.
#[derive(Debug)]
pub struct Accumulator {
    capacity: usize,
    window: VecDeque<Arc<ProcessedResult>>,
    version: u64,
    total: u64,
    hits: u64,
    degraded: u64,
    per_rank: BTreeMap<usize, u64>,
    mean_frame: Option<Arc<Frame>>,
    frames_averaged: u64,
}

/// Immutable view of the accumulator at one point in time.
#[derive(Debug, Clone)]
pub struct AccumulatorSnapshot {
    /// Number of `add_data` calls when the snapshot was taken.
    pub version: u64,
    pub capacity: usize,
    /// Oldest first.
    pub window: Vec<Arc<ProcessedResult>>,
    pub total: u64,
    pub hits: u64,
    pub degraded: u64,
    pub per_rank: BTreeMap<usize, u64>,
    pub mean_frame: Option<Arc<Frame>>,
    pub frames_averaged: u64,
}

impl Accumulator {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window: VecDeque::with_capacity(capacity),
            version: 0,
            total: 0,
            hits: 0,
            degraded: 0,
            per_rank: BTreeMap::new(),
            mean_frame: None,
            frames_averaged: 0,
        }
    }

    /// Admits one worker result, evicting the oldest entry first when the window is full.
    pub fn add_data(&mut self, result: ProcessedResult) {
        self.version += 1;
        self.total += 1;
        if result.is_hit() {
            self.hits += 1;
        }
        if result.is_degraded() {
            self.degraded += 1;
        }
        *self.per_rank.entry(result.rank).or_insert(0) += 1;
        if let Some(frame) = result.frame() {
            self.update_mean(frame);
        }

        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(Arc::new(result));
    }

    // Welford incremental mean. A frame of a different shape restarts the average.
    fn update_mean(&mut self, frame: &Frame) {
        match &mut self.mean_frame {
            Some(mean) if mean.shape() == frame.shape() => {
                self.frames_averaged += 1;
                let n = self.frames_averaged as f32;
                let mean = Arc::make_mut(mean);
                for (m, &x) in mean.data_mut().iter_mut().zip(frame.data()) {
                    *m += (x - *m) / n;
                }
            }
            _ => {
                self.mean_frame = Some(Arc::new(frame.clone()));
                self.frames_averaged = 1;
            }
        }
    }

    pub fn snapshot(&self) -> AccumulatorSnapshot {
        AccumulatorSnapshot {
            version: self.version,
            capacity: self.capacity,
            window: self.window.iter().cloned().collect(),
            total: self.total,
            hits: self.hits,
            degraded: self.degraded,
            per_rank: self.per_rank.clone(),
            mean_frame: self.mean_frame.clone(),
            frames_averaged: self.frames_averaged,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

impl AccumulatorSnapshot {
    /// Hit rate over every result received so far.
    pub fn hit_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.hits as f64 / self.total as f64
        }
    }

    pub fn window_hits(&self) -> usize {
        self.window.iter().filter(|r| r.is_hit()).count()
    }

    /// Hit rate over the results currently in the window.
    pub fn window_hit_rate(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.window_hits() as f64 / self.window.len() as f64
        }
    }

    pub fn latest(&self) -> Option<&ProcessedResult> {
        self.window.last().map(Arc::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{fields, EventId, ResultValue};

    fn result(id: &str, rank: usize, hit: bool) -> ProcessedResult {
        let mut result = ProcessedResult::new(rank, EventId::from(id));
        result.insert(fields::HIT_FLAG, ResultValue::Bool(hit));
        result
    }

    fn with_frame(id: &str, value: f32) -> ProcessedResult {
        let mut result = result(id, 1, false);
        result.insert(fields::FRAME_CORRECTED, ResultValue::Frame(Frame::filled(2, 2, value)));
        result
    }

    fn ids(snapshot: &AccumulatorSnapshot) -> Vec<String> {
        snapshot.window.iter().map(|r| r.event_id.to_string()).collect()
    }

    #[test]
    fn test_fifo_evicts_oldest_first() {
        let capacity = 5;
        let mut acc = Accumulator::new(capacity);
        for i in 0..=capacity {
            acc.add_data(result(&format!("ev-{}", i), 1, false));
        }

        let snapshot = acc.snapshot();
        assert_eq!(acc.len(), capacity);
        assert!(!ids(&snapshot).contains(&"ev-0".to_string()));
        assert_eq!(ids(&snapshot), vec!["ev-1", "ev-2", "ev-3", "ev-4", "ev-5"]);
        assert_eq!(snapshot.latest().map(|r| r.event_id.to_string()), Some("ev-5".to_string()));
    }

    #[test]
    fn test_counters_cover_all_results_not_just_window() {
        let mut acc = Accumulator::new(2);
        acc.add_data(result("a", 1, true));
        acc.add_data(result("b", 2, true));
        acc.add_data(result("c", 1, false));
        acc.add_data(result("d", 3, false));

        let snapshot = acc.snapshot();
        assert_eq!(snapshot.total, 4);
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.window_hits(), 0);
        assert!((snapshot.hit_rate() - 0.5).abs() < 1e-12);
        assert_eq!(snapshot.window_hit_rate(), 0.0);
        assert_eq!(snapshot.per_rank.get(&1), Some(&2));
        assert_eq!(snapshot.per_rank.get(&3), Some(&1));
    }

    #[test]
    fn test_running_mean_frame() {
        let mut acc = Accumulator::new(10);
        for value in [1.0, 2.0, 3.0, 6.0] {
            acc.add_data(with_frame("f", value));
        }
        let snapshot = acc.snapshot();
        assert_eq!(snapshot.frames_averaged, 4);
        let mean = snapshot.mean_frame.as_ref().unwrap();
        assert!(mean.data().iter().all(|&m| (m - 3.0).abs() < 1e-6));
    }

    #[test]
    fn test_shape_change_restarts_mean() {
        let mut acc = Accumulator::new(10);
        acc.add_data(with_frame("a", 4.0));
        let mut other = result("b", 1, false);
        other.insert(fields::FRAME_CORRECTED, ResultValue::Frame(Frame::filled(3, 1, 9.0)));
        acc.add_data(other);

        let snapshot = acc.snapshot();
        assert_eq!(snapshot.frames_averaged, 1);
        assert_eq!(snapshot.mean_frame.as_ref().unwrap().shape(), (3, 1));
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_updates() {
        let mut acc = Accumulator::new(3);
        acc.add_data(with_frame("a", 2.0));
        let before = acc.snapshot();

        acc.add_data(with_frame("b", 4.0));
        acc.add_data(with_frame("c", 6.0));
        acc.add_data(with_frame("d", 8.0));

        assert_eq!(before.version, 1);
        assert_eq!(before.total, 1);
        assert_eq!(ids(&before), vec!["a"]);
        assert!(before.mean_frame.as_ref().unwrap().data().iter().all(|&m| m == 2.0));

        let after = acc.snapshot();
        assert_eq!(after.version, 4);
        assert_eq!(ids(&after), vec!["b", "c", "d"]);
        assert!(after.mean_frame.as_ref().unwrap().data().iter().all(|&m| (m - 5.0).abs() < 1e-6));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut acc = Accumulator::new(0);
        acc.add_data(result("a", 1, false));
        acc.add_data(result("b", 1, false));
        assert_eq!(acc.capacity(), 1);
        assert_eq!(ids(&acc.snapshot()), vec!["b"]);
    }
}
