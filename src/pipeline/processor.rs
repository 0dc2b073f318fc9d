// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::{Calibration, Correction, HitClassifier, Peakfinder8};
use crate::backends::BackendDescriptor;
use crate::config::groups::MonitorConfig;
use crate::config::reference;
use crate::errors::{ConfigError, EventError};
use crate::model::{
    fields, DataField, Event, EventData, FieldValue, GeometryInfo, Mask, ProcessedResult, ResultValue,
};
use crate::observability::messages::pipeline::{EventDegraded, FieldUnavailable, ProcessingPanicked};
use crate::observability::messages::StructuredLog;
use crate::traits::DataSourcePlugin;

/// Per-event processing: extract → calibrate → correct → find peaks → classify.
///
/// Every stage is optional. Reference data is shared between all copies of a pipeline; the
/// peak finder's work buffers are not, so each worker owns its own copy.
#[derive(Clone)]
pub struct Pipeline {
    rank: usize,
    requested: Vec<(DataField, bool)>,
    calibration: Option<Arc<Calibration>>,
    correction: Option<Arc<Correction>>,
    peakfinder: Option<Peakfinder8>,
    hit: Option<HitClassifier>,
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

fn merge_masks(base: Option<Mask>, extra: Option<Mask>) -> Result<Option<Mask>, ConfigError> {
    match (base, extra) {
        (Some(mut base), Some(extra)) => {
            let (width, height) = base.shape();
            extra
                .check_shape(width, height)
                .map_err(|source| ConfigError::Shape {
                    what: "peakfinder8 bad-pixel map",
                    source,
                })?;
            for idx in 0..width * height {
                if extra.is_bad(idx) {
                    base.mark_bad(idx);
                }
            }
            Ok(Some(base))
        }
        (base, extra) => Ok(base.or(extra)),
    }
}

impl Pipeline {
    pub fn new(requested: Vec<(DataField, bool)>) -> Self {
        Self {
            rank: 0,
            requested,
            calibration: None,
            correction: None,
            peakfinder: None,
            hit: None,
        }
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = Some(Arc::new(calibration));
        self
    }

    pub fn with_correction(mut self, correction: Correction) -> Self {
        self.correction = Some(Arc::new(correction));
        self
    }

    pub fn with_peakfinder(mut self, peakfinder: Peakfinder8) -> Self {
        self.peakfinder = Some(peakfinder);
        self
    }

    pub fn with_hit_classifier(mut self, hit: HitClassifier) -> Self {
        self.hit = Some(hit);
        self
    }

    /// Builds the pipeline from validated configuration, loading every reference array.
    ///
    /// Runs once at startup; any failure here is a configuration error.
    pub fn from_config(config: &MonitorConfig, backend: &BackendDescriptor) -> Result<Self, ConfigError> {
        let mut pipeline = Self::new(config.source.requested_fields().collect());

        if let Some(calibration) = &config.calibration {
            let constants = reference::load_calibration(&calibration.constants_filename)?;
            pipeline = pipeline.with_calibration(Calibration::new(constants));
        }

        let mut correction_mask = None;
        if let Some(params) = &config.correction {
            let mask = params.mask_filename.as_ref().map(reference::load_mask).transpose()?;
            let dark = params.dark_filename.as_ref().map(reference::load_frame).transpose()?;
            let gain = params.gain_filename.as_ref().map(reference::load_frame).transpose()?;
            let correction = Correction::new(mask, dark, gain)?;
            correction_mask = Some(correction.effective_mask());
            pipeline = pipeline.with_correction(correction);
        }

        if let Some(params) = &config.peakfinder {
            let layout = backend.data().peakfinder_geometry_info().ok_or_else(|| {
                ConfigError::IncompatibleBackend {
                    profile: backend.profile().to_string(),
                    reason: "the backend provides no detector geometry for peakfinder8".to_string(),
                }
            })?;
            let geometry = if let Some(path) = &params.radius_map_filename {
                let radius_map = reference::load_frame(path)?;
                GeometryInfo::new(layout.asic_nx, layout.asic_ny, layout.nasics_x, layout.nasics_y, radius_map)
                    .map_err(|source| ConfigError::Shape {
                        what: "radius map",
                        source,
                    })?
            } else if let Some((fs, ss)) = params.beam_center {
                GeometryInfo::with_beam_center(layout.asic_nx, layout.asic_ny, layout.nasics_x, layout.nasics_y, fs, ss)
            } else {
                layout
            };
            let bad_pixels = params.bad_pixel_map_filename.as_ref().map(reference::load_mask).transpose()?;
            let mask = merge_masks(correction_mask, bad_pixels)?;
            pipeline = pipeline.with_peakfinder(Peakfinder8::new(params.clone(), geometry, mask)?);

            if let Some(hit) = &config.hit {
                pipeline = pipeline.with_hit_classifier(HitClassifier::new(hit));
            }
        }

        Ok(pipeline)
    }

    /// Copy of this pipeline for one worker.
    pub fn for_rank(&self, rank: usize) -> Self {
        Self {
            rank,
            ..self.clone()
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn stages(&self) -> (bool, bool, bool, bool) {
        (
            self.calibration.is_some(),
            self.correction.is_some(),
            self.peakfinder.is_some(),
            self.hit.is_some(),
        )
    }

    /// Processes one opened event. Always returns a result; failures, including panics,
    /// end up as a degraded result.
    pub fn process_event(&mut self, event: &Event, source: &dyn DataSourcePlugin) -> ProcessedResult {
        let event_id = event.id().clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let (data, failures) = self.extract(event, source);
            let mut result = self.process(&data);
            for failure in &failures {
                result.degrade(failure);
            }
            result
        }));

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload);
                ProcessingPanicked {
                    rank: self.rank,
                    event_id: &event_id,
                    message: &message,
                }
                .log();
                let mut result = ProcessedResult::new(self.rank, event_id);
                result.degrade(&EventError::Panicked(message));
                result
            }
        };

        if result.is_degraded() {
            EventDegraded {
                rank: self.rank,
                event_id: &result.event_id,
                errors: result.errors(),
            }
            .log();
        }
        result
    }

    /// Pulls the requested fields. Missing mandatory fields are returned as failures;
    /// optional ones are left out.
    pub fn extract(&self, event: &Event, source: &dyn DataSourcePlugin) -> (EventData, Vec<EventError>) {
        let mut data = EventData::new(event.id().clone(), event.timestamp());
        let mut failures = Vec::new();
        for &(field, required) in &self.requested {
            match source.extract(event, field) {
                Ok(value) => data.insert(field, value),
                Err(error) if !required => FieldUnavailable {
                    rank: self.rank,
                    event_id: event.id(),
                    field,
                    error: &error,
                }
                .log(),
                Err(error) => failures.push(EventError::Extraction(error)),
            }
        }
        if self.calibration.is_some() && !data.contains(DataField::CellId) {
            if let Ok(value) = source.extract(event, DataField::CellId) {
                data.insert(DataField::CellId, value);
            }
        }
        (data, failures)
    }

    /// Runs the processing stages over already extracted data.
    pub fn process(&mut self, data: &EventData) -> ProcessedResult {
        let mut result = ProcessedResult::new(self.rank, data.event_id.clone());
        result.insert(fields::EVENT_ID, ResultValue::Text(data.event_id.to_string()));
        result.insert(
            fields::TIMESTAMP,
            ResultValue::Float(data.get(DataField::Timestamp).and_then(FieldValue::as_f64).unwrap_or(data.timestamp)),
        );
        for (field, name) in [
            (DataField::BeamEnergy, fields::BEAM_ENERGY),
            (DataField::DetectorDistance, fields::DETECTOR_DISTANCE),
        ] {
            if let Some(value) = data.get(field).and_then(FieldValue::as_f64) {
                result.insert(name, ResultValue::Float(value));
            }
        }
        if let Some(active) = data.get(DataField::OpticalLaserActive).and_then(FieldValue::as_bool) {
            result.insert(fields::OPTICAL_LASER_ACTIVE, ResultValue::Bool(active));
        }

        let Some(mut frame) = data.detector_data().cloned() else {
            return result;
        };

        if let Some(calibration) = &self.calibration {
            let cell = data.get(DataField::CellId).and_then(FieldValue::as_i64);
            match calibration.apply(frame, cell) {
                Ok(calibrated) => frame = calibrated,
                Err(error) => {
                    result.degrade(&error);
                    return result;
                }
            }
        }

        if let Some(correction) = &self.correction {
            match correction.apply(frame) {
                Ok(corrected) => frame = corrected,
                Err(error) => {
                    result.degrade(&error);
                    return result;
                }
            }
        }

        if let Some(peakfinder) = &mut self.peakfinder {
            match peakfinder.find_peaks(&frame) {
                Ok(peaks) => {
                    let count = peaks.len();
                    result.insert(fields::NUM_PEAKS, ResultValue::Int(count as i64));
                    result.insert(fields::PEAK_LIST, ResultValue::Peaks(peaks));
                    if let Some(hit) = &self.hit {
                        result.insert(fields::HIT_FLAG, ResultValue::Bool(hit.is_hit(count)));
                    }
                }
                Err(error) => result.degrade(&error),
            }
        }

        result.insert(fields::FRAME_CORRECTED, ResultValue::Frame(frame));
        result
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("rank", &self.rank)
            .field("requested", &self.requested)
            .field("calibration", &self.calibration.is_some())
            .field("correction", &self.correction.is_some())
            .field("peakfinder", &self.peakfinder.is_some())
            .field("hit", &self.hit)
            .finish()
    }
}
