// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! JSON wire format of published snapshots.
//!
//! A message is a self-describing mapping of named fields. Per-event entries carry the
//! scalar result fields and peak lists; frames are shipped once per message (latest
//! corrected frame and running mean) as base64-encoded little-endian `f32` pixels.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::accumulator::AccumulatorSnapshot;
use crate::model::{fields, Frame, PeakList, ProcessedResult, ResultValue};

pub const FRAME_ENCODING: &str = "f32le-base64";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    pub width: usize,
    pub height: usize,
    pub encoding: String,
    pub data: String,
}

impl WireFrame {
    pub fn encode(frame: &Frame) -> Self {
        let mut bytes = Vec::with_capacity(frame.len() * 4);
        for value in frame.data() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Self {
            width: frame.width(),
            height: frame.height(),
            encoding: FRAME_ENCODING.to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Frame, String> {
        if self.encoding != FRAME_ENCODING {
            return Err(format!("unsupported frame encoding '{}'", self.encoding));
        }
        let bytes = STANDARD.decode(&self.data).map_err(|e| e.to_string())?;
        if bytes.len() % 4 != 0 {
            return Err(format!("frame payload of {} bytes is not a whole number of f32", bytes.len()));
        }
        let data = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Frame::new(self.width, self.height, data).map_err(|e| e.to_string())
    }
}

/// Scalar fields of one processed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub event_id: String,
    pub rank: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hit_flag: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub num_peaks: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub peak_list: Option<PeakList>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub beam_energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detector_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub optical_laser_active: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<String>,
}

fn float(result: &ProcessedResult, name: &str) -> Option<f64> {
    match result.get(name) {
        Some(ResultValue::Float(v)) => Some(*v),
        _ => None,
    }
}

impl From<&ProcessedResult> for WireEvent {
    fn from(result: &ProcessedResult) -> Self {
        Self {
            event_id: result.event_id.to_string(),
            rank: result.rank,
            timestamp: result.timestamp(),
            hit_flag: result.hit_flag(),
            num_peaks: match result.get(fields::NUM_PEAKS) {
                Some(ResultValue::Int(n)) => Some(*n),
                _ => None,
            },
            peak_list: result.peak_list().cloned(),
            beam_energy: float(result, fields::BEAM_ENERGY),
            detector_distance: float(result, fields::DETECTOR_DISTANCE),
            optical_laser_active: match result.get(fields::OPTICAL_LASER_ACTIVE) {
                Some(ResultValue::Bool(b)) => Some(*b),
                _ => None,
            },
            errors: result.errors().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireRates {
    pub hit_rate: f64,
    pub window_hit_rate: f64,
    pub events_per_second: f64,
    pub dropped_broadcasts: u64,
}

/// One published snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub topic: String,
    pub version: u64,
    pub published_at: f64,
    pub total: u64,
    pub hits: u64,
    pub degraded: u64,
    pub window_size: usize,
    pub rates: WireRates,
    pub per_rank: BTreeMap<usize, u64>,
    /// Results admitted since the previous publish, oldest first.
    pub events: Vec<WireEvent>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub latest_frame: Option<WireFrame>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mean_frame: Option<WireFrame>,
    #[serde(default)]
    pub frames_averaged: u64,
}

/// Builds the message for `snapshot`, listing only results newer than `since_version`.
pub fn encode(
    topic: &str,
    snapshot: &AccumulatorSnapshot,
    since_version: u64,
    rates: WireRates,
    published_at: f64,
) -> WireMessage {
    let fresh = snapshot.version.saturating_sub(since_version).min(snapshot.window.len() as u64) as usize;
    let fresh_results = &snapshot.window[snapshot.window.len() - fresh..];

    WireMessage {
        topic: topic.to_string(),
        version: snapshot.version,
        published_at,
        total: snapshot.total,
        hits: snapshot.hits,
        degraded: snapshot.degraded,
        window_size: snapshot.window.len(),
        rates,
        per_rank: snapshot.per_rank.clone(),
        events: fresh_results.iter().map(|r| WireEvent::from(r.as_ref())).collect(),
        latest_frame: snapshot.window.iter().rev().find_map(|r| r.frame()).map(WireFrame::encode),
        mean_frame: snapshot.mean_frame.as_deref().map(WireFrame::encode),
        frames_averaged: snapshot.frames_averaged,
    }
}
