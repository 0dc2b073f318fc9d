// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Simulated facility.
//!
//! Produces frames with a flat background, optional pseudo-noise and Gaussian spots. Which
//! events are hits is fixed by the global event index, so a run with `num_events` events and
//! `hit_fraction` f contains exactly `floor(num_events * f)` hits, however the events are
//! spread over workers. Events are dealt round-robin: worker `i` of `W` gets indices
//! `i, i + W, i + 2W, ...`. Without `num_events` the stream never ends.
//!
//! Parameters live in the optional `synthetic` group.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::registry::BackendDescriptor;
use crate::config::MonitorParams;
use crate::errors::{BackendError, ConfigError, ExtractError};
use crate::model::{DataField, Event, EventId, EventKind, FieldValue, Frame, GeometryInfo};
use crate::traits::{DataSourcePlugin, EventFramework, EventSourcePlugin, EventStream, ShardInfo};
use crate::utils::{splitmix64, unit_interval, unix_time_now};

pub const PROFILE: &str = "synthetic";
pub const GROUP: &str = "synthetic";
const KIND: EventKind = EventKind("synthetic-frame");

const SUPPORTED_FIELDS: &[DataField] = &[
    DataField::DetectorData,
    DataField::Timestamp,
    DataField::BeamEnergy,
    DataField::DetectorDistance,
    DataField::OpticalLaserActive,
    DataField::EventId,
];

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticParams {
    pub asic_nx: usize,
    pub asic_ny: usize,
    pub nasics_x: usize,
    pub nasics_y: usize,
    pub background: f32,
    /// Peak-to-peak amplitude of uniform pseudo-noise added to every pixel.
    pub noise: f32,
    pub num_events: Option<u64>,
    pub hit_fraction: f64,
    pub peaks_per_hit: usize,
    pub peak_amplitude: f32,
    pub peak_sigma: f32,
    pub event_interval: Duration,
    pub beam_energy: f64,
    pub detector_distance: f64,
    pub seed: u64,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            asic_nx: 64,
            asic_ny: 64,
            nasics_x: 1,
            nasics_y: 1,
            background: 10.0,
            noise: 0.0,
            num_events: None,
            hit_fraction: 0.0,
            peaks_per_hit: 5,
            peak_amplitude: 500.0,
            peak_sigma: 1.0,
            event_interval: Duration::ZERO,
            beam_energy: 9300.0,
            detector_distance: 100.0,
            seed: 0,
        }
    }
}

impl SyntheticParams {
    pub fn from_params(params: &MonitorParams) -> Result<Self, ConfigError> {
        let d = Self::default();
        if !params.has_group(GROUP) {
            return Ok(d);
        }
        let g = GROUP;
        let hit_fraction = params.get_or(g, "hit_fraction", d.hit_fraction)?;
        if !(0.0..=1.0).contains(&hit_fraction) {
            return Err(ConfigError::invalid(g, "hit_fraction", "must lie in [0, 1]"));
        }
        let peak_sigma = params.get_or(g, "peak_sigma", d.peak_sigma)?;
        if peak_sigma <= 0.0 {
            return Err(ConfigError::invalid(g, "peak_sigma", "must be positive"));
        }
        let out = Self {
            asic_nx: params.get_or(g, "asic_nx", d.asic_nx)?,
            asic_ny: params.get_or(g, "asic_ny", d.asic_ny)?,
            nasics_x: params.get_or(g, "nasics_x", d.nasics_x)?,
            nasics_y: params.get_or(g, "nasics_y", d.nasics_y)?,
            background: params.get_or(g, "background", d.background)?,
            noise: params.get_or(g, "noise", d.noise)?,
            num_events: params.get_optional(g, "num_events")?,
            hit_fraction,
            peaks_per_hit: params.get_or(g, "peaks_per_hit", d.peaks_per_hit)?,
            peak_amplitude: params.get_or(g, "peak_amplitude", d.peak_amplitude)?,
            peak_sigma,
            event_interval: Duration::from_millis(params.get_or(g, "event_interval_ms", 0u64)?),
            beam_energy: params.get_or(g, "beam_energy", d.beam_energy)?,
            detector_distance: params.get_or(g, "detector_distance", d.detector_distance)?,
            seed: params.get_or(g, "seed", d.seed)?,
        };
        if out.asic_nx == 0 || out.asic_ny == 0 || out.nasics_x == 0 || out.nasics_y == 0 {
            return Err(ConfigError::invalid(g, "asic_nx", "detector layout dimensions must be non-zero"));
        }
        Ok(out)
    }

    pub fn width(&self) -> usize {
        self.asic_nx * self.nasics_x
    }

    pub fn height(&self) -> usize {
        self.asic_ny * self.nasics_y
    }

    /// Whether global event `index` carries peaks.
    pub fn is_hit(&self, index: u64) -> bool {
        let f = self.hit_fraction;
        ((index + 1) as f64 * f).floor() > (index as f64 * f).floor()
    }

    /// Spot centres for event `index`, spread over the tiles round-robin and placed on a
    /// per-tile grid so they stay well apart and away from tile edges.
    pub fn peak_positions(&self, index: u64) -> Vec<(f32, f32)> {
        if !self.is_hit(index) || self.peaks_per_hit == 0 {
            return Vec::new();
        }
        let tiles = self.nasics_x * self.nasics_y;
        let per_tile = (self.peaks_per_hit + tiles - 1) / tiles;
        let cols = (per_tile as f64).sqrt().ceil() as usize;
        let rows = (per_tile + cols - 1) / cols;
        let cell_w = self.asic_nx as f32 / cols as f32;
        let cell_h = self.asic_ny as f32 / rows as f32;
        let jitter = (index % 5) as f32 * 0.1;

        (0..self.peaks_per_hit)
            .map(|k| {
                let tile = k % tiles;
                let slot = k / tiles;
                let tile_fs = (tile % self.nasics_x * self.asic_nx) as f32;
                let tile_ss = (tile / self.nasics_x * self.asic_ny) as f32;
                let fs = tile_fs + ((slot % cols) as f32 + 0.5) * cell_w + jitter;
                let ss = tile_ss + ((slot / cols) as f32 + 0.5) * cell_h + jitter;
                (fs, ss)
            })
            .collect()
    }

    pub fn render(&self, index: u64) -> Frame {
        let (width, height) = (self.width(), self.height());
        let mut frame = Frame::filled(width, height, self.background);

        if self.noise > 0.0 {
            let base = splitmix64(self.seed ^ index.wrapping_mul(0x1000_0000_01B3));
            for (i, pixel) in frame.data_mut().iter_mut().enumerate() {
                let u = unit_interval(splitmix64(base ^ i as u64)) as f32;
                *pixel += (u - 0.5) * self.noise;
            }
        }

        let reach = (4.0 * self.peak_sigma).ceil() as isize;
        let two_sigma_sq = 2.0 * self.peak_sigma * self.peak_sigma;
        for (cfs, css) in self.peak_positions(index) {
            let (pfs, pss) = (cfs.round() as isize, css.round() as isize);
            for ss in (pss - reach).max(0)..=(pss + reach).min(height as isize - 1) {
                for fs in (pfs - reach).max(0)..=(pfs + reach).min(width as isize - 1) {
                    let dx = fs as f32 - cfs;
                    let dy = ss as f32 - css;
                    let value = self.peak_amplitude * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
                    let idx = frame.index(fs as usize, ss as usize);
                    frame.data_mut()[idx] += value;
                }
            }
        }
        frame
    }

    pub fn geometry(&self) -> GeometryInfo {
        GeometryInfo::with_beam_center(
            self.asic_nx,
            self.asic_ny,
            self.nasics_x,
            self.nasics_y,
            self.width() as f32 / 2.0,
            self.height() as f32 / 2.0,
        )
    }
}

/// Handle carried by a synthetic event until it is opened.
#[derive(Debug, Clone, Copy)]
struct SyntheticPayload {
    index: u64,
}

/// Resource held between `open_event` and `close_event`.
struct RenderedFrame(Frame);

pub struct SyntheticSource {
    params: Arc<SyntheticParams>,
}

pub struct SyntheticStream {
    params: Arc<SyntheticParams>,
    next_index: u64,
    stride: u64,
    emitted: u64,
}

#[async_trait]
impl EventStream for SyntheticStream {
    async fn next_event(&mut self) -> Option<Result<Event, BackendError>> {
        let index = self.next_index;
        if let Some(limit) = self.params.num_events {
            if index >= limit {
                return None;
            }
        }
        if self.emitted > 0 && !self.params.event_interval.is_zero() {
            tokio::time::sleep(self.params.event_interval).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.next_index += self.stride;
        self.emitted += 1;

        Some(Ok(Event::new(
            EventId(format!("synthetic-{}", index)),
            unix_time_now(),
            KIND,
            SyntheticPayload { index },
        )))
    }
}

#[async_trait]
impl EventSourcePlugin for SyntheticSource {
    fn event_kind(&self) -> EventKind {
        KIND
    }

    async fn initialize_source(&self, _shard: &ShardInfo) -> Result<(), BackendError> {
        Ok(())
    }

    async fn event_generator(&self, shard: &ShardInfo) -> Result<Box<dyn EventStream>, BackendError> {
        let worker = shard.worker_index().ok_or_else(|| BackendError::Unavailable {
            profile: PROFILE.to_string(),
            reason: "the coordinator has no event shard".to_string(),
        })?;
        Ok(Box::new(SyntheticStream {
            params: self.params.clone(),
            next_index: worker as u64,
            stride: shard.num_workers().max(1) as u64,
            emitted: 0,
        }))
    }
}

pub struct SyntheticFramework {
    params: Arc<SyntheticParams>,
}

impl EventFramework for SyntheticFramework {
    fn event_kind(&self) -> EventKind {
        KIND
    }

    fn open_event(&self, event: &mut Event) -> Result<(), BackendError> {
        let payload = *event.payload::<SyntheticPayload>().ok_or(BackendError::Representation {
            expected: KIND.0,
            found: event.kind().0,
        })?;
        event.set_opened(RenderedFrame(self.params.render(payload.index)));
        Ok(())
    }

    fn close_event(&self, event: &mut Event) {
        event.take_opened();
    }
}

pub struct SyntheticData {
    params: Arc<SyntheticParams>,
    geometry: GeometryInfo,
}

impl DataSourcePlugin for SyntheticData {
    fn event_kind(&self) -> EventKind {
        KIND
    }

    fn supported_fields(&self) -> &'static [DataField] {
        SUPPORTED_FIELDS
    }

    fn extract(&self, event: &Event, field: DataField) -> Result<FieldValue, ExtractError> {
        let index = event
            .payload::<SyntheticPayload>()
            .map(|p| p.index)
            .ok_or_else(|| ExtractError::Failed {
                field,
                reason: format!("not a {} event", KIND),
            })?;

        match field {
            DataField::DetectorData => event
                .opened::<RenderedFrame>()
                .map(|rendered| FieldValue::Frame(rendered.0.clone()))
                .ok_or(ExtractError::NotOpened { field }),
            DataField::Timestamp => Ok(FieldValue::Float(event.timestamp())),
            DataField::BeamEnergy => Ok(FieldValue::Float(self.params.beam_energy)),
            DataField::DetectorDistance => Ok(FieldValue::Float(self.params.detector_distance)),
            DataField::OpticalLaserActive => Ok(FieldValue::Bool(index % 2 == 0)),
            DataField::EventId => Ok(FieldValue::Text(event.id().to_string())),
            DataField::CellId => Err(ExtractError::UnsupportedField { profile: PROFILE, field }),
        }
    }

    fn peakfinder_geometry_info(&self) -> Option<GeometryInfo> {
        Some(self.geometry.clone())
    }
}

pub fn build(params: &MonitorParams) -> Result<BackendDescriptor, ConfigError> {
    let synthetic = Arc::new(SyntheticParams::from_params(params)?);
    let geometry = synthetic.geometry();
    BackendDescriptor::new(
        PROFILE,
        Arc::new(SyntheticSource {
            params: synthetic.clone(),
        }),
        Arc::new(SyntheticFramework {
            params: synthetic.clone(),
        }),
        Arc::new(SyntheticData {
            params: synthetic,
            geometry,
        }),
    )
}
