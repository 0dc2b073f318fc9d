// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use super::{EventId, Frame, PeakList};
use crate::errors::EventError;

/// Well-known result field names.
pub mod fields {
    pub const EVENT_ID: &str = "event_id";
    pub const TIMESTAMP: &str = "timestamp";
    pub const BEAM_ENERGY: &str = "beam_energy";
    pub const DETECTOR_DISTANCE: &str = "detector_distance";
    pub const OPTICAL_LASER_ACTIVE: &str = "optical_laser_active";
    pub const FRAME_CORRECTED: &str = "frame_corrected";
    pub const PEAK_LIST: &str = "peak_list";
    pub const NUM_PEAKS: &str = "num_peaks";
    pub const HIT_FLAG: &str = "hit_flag";
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Peaks(PeakList),
    Frame(Frame),
}

/// Output of the processing pipeline for one event.
///
/// A field is absent when the stage producing it was disabled or failed; failures are
/// recorded in `errors` and make the result degraded.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedResult {
    pub rank: usize,
    pub event_id: EventId,
    fields: BTreeMap<String, ResultValue>,
    errors: Vec<String>,
}

impl ProcessedResult {
    pub fn new(rank: usize, event_id: EventId) -> Self {
        Self {
            rank,
            event_id,
            fields: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn insert(&mut self, name: &str, value: ResultValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ResultValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ResultValue> {
        self.fields.remove(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &ResultValue)> {
        self.fields.iter()
    }

    pub fn degrade(&mut self, error: &EventError) {
        self.errors.push(format!("{}: {}", error.stage(), error));
    }

    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn hit_flag(&self) -> Option<bool> {
        match self.get(fields::HIT_FLAG) {
            Some(ResultValue::Bool(flag)) => Some(*flag),
            _ => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.hit_flag().unwrap_or(false)
    }

    pub fn peak_list(&self) -> Option<&PeakList> {
        match self.get(fields::PEAK_LIST) {
            Some(ResultValue::Peaks(peaks)) => Some(peaks),
            _ => None,
        }
    }

    pub fn frame(&self) -> Option<&Frame> {
        match self.get(fields::FRAME_CORRECTED) {
            Some(ResultValue::Frame(frame)) => Some(frame),
            _ => None,
        }
    }

    pub fn timestamp(&self) -> Option<f64> {
        match self.get(fields::TIMESTAMP) {
            Some(ResultValue::Float(ts)) => Some(*ts),
            _ => None,
        }
    }
}
