// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed views over the parameter groups the monitor consumes.
//!
//! Each struct reads one group from `MonitorParams`, applies defaults from
//! [`consts`](crate::config::consts) and validates ranges. Stages that may be switched off
//! are represented by `Option`: the stage is disabled when its group is absent.
//!
//! # Example
//! ```yaml
//! om:
//!   node_pool_size: 4
//! data_retrieval_layer:
//!   backend_profile: synthetic
//!   required_data: [detector_data, timestamp]
//!   optional_data: [beam_energy, optical_laser_active]
//!   frame_age_threshold_secs: 30.0
//! peakfinder8_peak_detection:
//!   max_num_peaks: 2048
//!   adc_threshold: 100.0
//!   minimum_snr: 5.0
//!   min_pixel_count: 2
//!   max_pixel_count: 40
//!   local_bg_radius: 3
//!   min_r: 0
//!   max_r: 1000
//! crystallography:
//!   min_num_peaks_for_hit: 10
//!   max_num_peaks_for_hit: 2000
//!   speed_report_interval: 1000
//!   data_broadcast_interval: 10
//! accumulator:
//!   window_size: 100
//! broadcast:
//!   address: 127.0.0.1
//!   port: 12321
//! ```

use std::path::PathBuf;
use std::time::Duration;

use super::consts::*;
use super::params::MonitorParams;
use crate::errors::ConfigError;
use crate::model::DataField;

pub const ENGINE_GROUP: &str = "om";
pub const SOURCE_GROUP: &str = "data_retrieval_layer";
pub const CALIBRATION_GROUP: &str = "calibration";
pub const CORRECTION_GROUP: &str = "correction";
pub const PEAKFINDER_GROUP: &str = "peakfinder8_peak_detection";
pub const CRYSTALLOGRAPHY_GROUP: &str = "crystallography";
pub const ACCUMULATOR_GROUP: &str = "accumulator";
pub const BROADCAST_GROUP: &str = "broadcast";

fn seconds(group: &str, parameter: &str, value: f64) -> Result<Duration, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(Duration::from_secs_f64(value))
    } else {
        Err(ConfigError::invalid(group, parameter, "must be a non-negative number of seconds"))
    }
}

fn positive_interval(group: &str, parameter: &str, value: Option<u64>) -> Result<Option<u64>, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::invalid(group, parameter, "must be at least 1")),
        other => Ok(other),
    }
}

/// Parallel engine settings (`om`).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParams {
    /// Total number of nodes: one coordinator plus `node_pool_size - 1` workers.
    pub node_pool_size: usize,
    pub send_buffer_size: usize,
    pub send_timeout: Duration,
    pub send_retries: u32,
    pub fetch_timeout: Duration,
    pub max_backend_retries: u32,
    pub backend_retry_delay: Duration,
    pub drain_timeout: Duration,
}

impl EngineParams {
    pub fn from_params(params: &MonitorParams) -> Result<Self, ConfigError> {
        let g = ENGINE_GROUP;
        let node_pool_size: usize = params.get(g, "node_pool_size")?;
        if node_pool_size < 2 {
            return Err(ConfigError::invalid(g, "node_pool_size", "needs one coordinator and at least one worker"));
        }
        let send_buffer_size = params.get_or(g, "send_buffer_size", DEFAULT_SEND_BUFFER_SIZE)?;
        if send_buffer_size == 0 {
            return Err(ConfigError::invalid(g, "send_buffer_size", "must be at least 1"));
        }

        Ok(Self {
            node_pool_size,
            send_buffer_size,
            send_timeout: Duration::from_millis(params.get_or(g, "send_timeout_ms", DEFAULT_SEND_TIMEOUT_MS)?),
            send_retries: params.get_or(g, "send_retries", DEFAULT_SEND_RETRIES)?,
            fetch_timeout: seconds(
                g,
                "fetch_timeout_secs",
                params.get_or(g, "fetch_timeout_secs", DEFAULT_FETCH_TIMEOUT_SECS)?,
            )?,
            max_backend_retries: params.get_or(g, "max_backend_retries", DEFAULT_MAX_BACKEND_RETRIES)?,
            backend_retry_delay: Duration::from_millis(params.get_or(
                g,
                "backend_retry_delay_ms",
                DEFAULT_BACKEND_RETRY_DELAY_MS,
            )?),
            drain_timeout: seconds(
                g,
                "drain_timeout_secs",
                params.get_or(g, "drain_timeout_secs", DEFAULT_DRAIN_TIMEOUT_SECS)?,
            )?,
        })
    }
}

/// Backend selection and data requirements (`data_retrieval_layer`).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceParams {
    pub backend_profile: String,
    /// Backend-specific source string (a file list, a shared-memory name, ...).
    pub source: Option<String>,
    /// Fields whose absence degrades the result.
    pub required_data: Vec<DataField>,
    /// Fields that are simply left out when the backend cannot provide them.
    pub optional_data: Vec<DataField>,
    /// Events older than this (relative to wall-clock time) are skipped.
    pub frame_age_threshold: Option<Duration>,
}

impl SourceParams {
    pub fn from_params(params: &MonitorParams) -> Result<Self, ConfigError> {
        let g = SOURCE_GROUP;
        let required_data = params.get_or(g, "required_data", vec![DataField::DetectorData, DataField::Timestamp])?;
        let optional_data: Vec<DataField> = params.get_or(g, "optional_data", Vec::new())?;
        if let Some(both) = optional_data.iter().find(|f| required_data.contains(f)) {
            return Err(ConfigError::invalid(
                g,
                "optional_data",
                format!("'{}' is also listed as required", both),
            ));
        }
        let frame_age_threshold = params
            .get_optional::<f64>(g, "frame_age_threshold_secs")?
            .map(|secs| seconds(g, "frame_age_threshold_secs", secs))
            .transpose()?;

        Ok(Self {
            backend_profile: params.get(g, "backend_profile")?,
            source: params.get_optional(g, "source")?,
            required_data,
            optional_data,
            frame_age_threshold,
        })
    }

    pub fn requested_fields(&self) -> impl Iterator<Item = (DataField, bool)> + '_ {
        self.required_data
            .iter()
            .map(|f| (*f, true))
            .chain(self.optional_data.iter().map(|f| (*f, false)))
    }
}

/// Calibration constants location (`calibration`).
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationParams {
    pub constants_filename: PathBuf,
}

impl CalibrationParams {
    pub fn from_params(params: &MonitorParams) -> Result<Option<Self>, ConfigError> {
        if !params.has_group(CALIBRATION_GROUP) {
            return Ok(None);
        }
        Ok(Some(Self {
            constants_filename: params.get(CALIBRATION_GROUP, "constants_filename")?,
        }))
    }
}

/// Reference frames for dark subtraction, gain division and bad-pixel masking (`correction`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CorrectionParams {
    pub mask_filename: Option<PathBuf>,
    pub dark_filename: Option<PathBuf>,
    pub gain_filename: Option<PathBuf>,
}

impl CorrectionParams {
    pub fn from_params(params: &MonitorParams) -> Result<Option<Self>, ConfigError> {
        let g = CORRECTION_GROUP;
        if !params.has_group(g) {
            return Ok(None);
        }
        Ok(Some(Self {
            mask_filename: params.get_optional(g, "mask_filename")?,
            dark_filename: params.get_optional(g, "dark_filename")?,
            gain_filename: params.get_optional(g, "gain_filename")?,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Four,
    Eight,
}

/// Peakfinder8 settings (`peakfinder8_peak_detection`).
#[derive(Debug, Clone, PartialEq)]
pub struct PeakFinderParams {
    pub max_num_peaks: usize,
    pub adc_threshold: f32,
    pub minimum_snr: f32,
    pub min_pixel_count: u32,
    pub max_pixel_count: u32,
    pub local_bg_radius: usize,
    pub min_r: f32,
    pub max_r: f32,
    pub connectivity: Connectivity,
    /// Extra bad pixels for peak finding only, merged with the correction mask.
    pub bad_pixel_map_filename: Option<PathBuf>,
    /// Precomputed pixel radius map. Takes precedence over the backend's geometry.
    pub radius_map_filename: Option<PathBuf>,
    /// Beam centre used when neither the backend nor a file provides a radius map.
    pub beam_center: Option<(f32, f32)>,
}

impl PeakFinderParams {
    pub fn from_params(params: &MonitorParams) -> Result<Option<Self>, ConfigError> {
        let g = PEAKFINDER_GROUP;
        if !params.has_group(g) {
            return Ok(None);
        }

        let min_pixel_count: u32 = params.get(g, "min_pixel_count")?;
        let max_pixel_count: u32 = params.get(g, "max_pixel_count")?;
        if min_pixel_count == 0 || min_pixel_count > max_pixel_count {
            return Err(ConfigError::invalid(g, "min_pixel_count", "must be in 1..=max_pixel_count"));
        }
        let min_r: f32 = params.get(g, "min_r")?;
        let max_r: f32 = params.get(g, "max_r")?;
        if min_r > max_r {
            return Err(ConfigError::invalid(g, "min_r", "must not exceed max_r"));
        }
        let connectivity = match params.get_or::<u8>(g, "connectivity", DEFAULT_CONNECTIVITY)? {
            4 => Connectivity::Four,
            8 => Connectivity::Eight,
            _ => return Err(ConfigError::invalid(g, "connectivity", "must be 4 or 8")),
        };
        let beam_center = match (
            params.get_optional::<f32>(g, "beam_center_fs")?,
            params.get_optional::<f32>(g, "beam_center_ss")?,
        ) {
            (Some(fs), Some(ss)) => Some((fs, ss)),
            (None, None) => None,
            _ => {
                return Err(ConfigError::invalid(
                    g,
                    "beam_center_fs",
                    "beam_center_fs and beam_center_ss must be given together",
                ))
            }
        };

        Ok(Some(Self {
            max_num_peaks: params.get(g, "max_num_peaks")?,
            adc_threshold: params.get(g, "adc_threshold")?,
            minimum_snr: params.get(g, "minimum_snr")?,
            min_pixel_count,
            max_pixel_count,
            local_bg_radius: params.get(g, "local_bg_radius")?,
            min_r,
            max_r,
            connectivity,
            bad_pixel_map_filename: params.get_optional(g, "bad_pixel_map_filename")?,
            radius_map_filename: params.get_optional(g, "radius_map_filename")?,
            beam_center,
        }))
    }
}

/// Hit bounds (`crystallography`). Hit classification is disabled without this group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitParams {
    pub min_num_peaks_for_hit: usize,
    pub max_num_peaks_for_hit: usize,
}

impl HitParams {
    pub fn from_params(params: &MonitorParams) -> Result<Option<Self>, ConfigError> {
        let g = CRYSTALLOGRAPHY_GROUP;
        if !params.has_group(g) {
            return Ok(None);
        }
        let min_num_peaks_for_hit: usize = params.get(g, "min_num_peaks_for_hit")?;
        let max_num_peaks_for_hit: usize = params.get(g, "max_num_peaks_for_hit")?;
        if min_num_peaks_for_hit > max_num_peaks_for_hit {
            return Err(ConfigError::invalid(
                g,
                "min_num_peaks_for_hit",
                "must not exceed max_num_peaks_for_hit",
            ));
        }
        Ok(Some(Self {
            min_num_peaks_for_hit,
            max_num_peaks_for_hit,
        }))
    }
}

/// Reporting and sending cadence, also read from `crystallography`.
///
/// Every interval is optional. An unset frame sending interval means frames are never
/// attached to results of that class.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntervalParams {
    pub speed_report_interval: Option<u64>,
    /// Publish a snapshot after this many received results (K).
    pub data_broadcast_interval: Option<u64>,
    /// Publish a snapshot at least this often (T).
    pub broadcast_interval: Option<Duration>,
    pub hit_frame_sending_interval: Option<u64>,
    pub non_hit_frame_sending_interval: Option<u64>,
}

impl IntervalParams {
    pub fn from_params(params: &MonitorParams) -> Result<Self, ConfigError> {
        let g = CRYSTALLOGRAPHY_GROUP;
        if !params.has_group(g) {
            return Ok(Self::default());
        }
        let broadcast_interval = params
            .get_optional::<f64>(g, "broadcast_interval_secs")?
            .map(|secs| seconds(g, "broadcast_interval_secs", secs))
            .transpose()?;
        if broadcast_interval == Some(Duration::ZERO) {
            return Err(ConfigError::invalid(g, "broadcast_interval_secs", "must be greater than zero"));
        }

        Ok(Self {
            speed_report_interval: positive_interval(g, "speed_report_interval", params.get_optional(g, "speed_report_interval")?)?,
            data_broadcast_interval: positive_interval(g, "data_broadcast_interval", params.get_optional(g, "data_broadcast_interval")?)?,
            broadcast_interval,
            hit_frame_sending_interval: positive_interval(g, "hit_frame_sending_interval", params.get_optional(g, "hit_frame_sending_interval")?)?,
            non_hit_frame_sending_interval: positive_interval(
                g,
                "non_hit_frame_sending_interval",
                params.get_optional(g, "non_hit_frame_sending_interval")?,
            )?,
        })
    }
}

/// Accumulation window (`accumulator`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorParams {
    pub window_size: usize,
}

impl AccumulatorParams {
    pub fn from_params(params: &MonitorParams) -> Result<Self, ConfigError> {
        let g = ACCUMULATOR_GROUP;
        let window_size = if params.has_group(g) {
            params.get_or(g, "window_size", DEFAULT_ACCUMULATION_WINDOW)?
        } else {
            DEFAULT_ACCUMULATION_WINDOW
        };
        if window_size == 0 {
            return Err(ConfigError::invalid(g, "window_size", "must be at least 1"));
        }
        Ok(Self { window_size })
    }
}

/// Broadcast channel settings (`broadcast`). The TCP publisher only runs when `address` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastParams {
    pub topic: String,
    pub address: Option<String>,
    pub port: u16,
    pub subscriber_queue: usize,
}

impl Default for BroadcastParams {
    fn default() -> Self {
        Self {
            topic: DEFAULT_BROADCAST_TOPIC.to_string(),
            address: None,
            port: DEFAULT_BROADCAST_PORT,
            subscriber_queue: DEFAULT_SUBSCRIBER_QUEUE,
        }
    }
}

impl BroadcastParams {
    pub fn from_params(params: &MonitorParams) -> Result<Self, ConfigError> {
        let g = BROADCAST_GROUP;
        if !params.has_group(g) {
            return Ok(Self::default());
        }
        let subscriber_queue = params.get_or(g, "subscriber_queue", DEFAULT_SUBSCRIBER_QUEUE)?;
        if subscriber_queue == 0 {
            return Err(ConfigError::invalid(g, "subscriber_queue", "must be at least 1"));
        }
        Ok(Self {
            topic: params.get_or(g, "topic", DEFAULT_BROADCAST_TOPIC.to_string())?,
            address: params.get_optional(g, "address")?,
            port: params.get_or(g, "port", DEFAULT_BROADCAST_PORT)?,
            subscriber_queue,
        })
    }
}

/// All typed groups, read and validated together before anything starts.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub engine: EngineParams,
    pub source: SourceParams,
    pub calibration: Option<CalibrationParams>,
    pub correction: Option<CorrectionParams>,
    pub peakfinder: Option<PeakFinderParams>,
    pub hit: Option<HitParams>,
    pub intervals: IntervalParams,
    pub accumulator: AccumulatorParams,
    pub broadcast: BroadcastParams,
}

impl MonitorConfig {
    pub fn from_params(params: &MonitorParams) -> Result<Self, ConfigError> {
        let config = Self {
            engine: EngineParams::from_params(params)?,
            source: SourceParams::from_params(params)?,
            calibration: CalibrationParams::from_params(params)?,
            correction: CorrectionParams::from_params(params)?,
            peakfinder: PeakFinderParams::from_params(params)?,
            hit: HitParams::from_params(params)?,
            intervals: IntervalParams::from_params(params)?,
            accumulator: AccumulatorParams::from_params(params)?,
            broadcast: BroadcastParams::from_params(params)?,
        };

        // a snapshot lists every result since the previous one, so K must fit the window
        if let Some(k) = config.intervals.data_broadcast_interval {
            if k > config.accumulator.window_size as u64 {
                return Err(ConfigError::invalid(
                    CRYSTALLOGRAPHY_GROUP,
                    "data_broadcast_interval",
                    format!("{} exceeds accumulator window_size {}", k, config.accumulator.window_size),
                ));
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
om:
  node_pool_size: 3
data_retrieval_layer:
  backend_profile: synthetic
"#;

    #[test]
    fn test_minimal_config_uses_defaults_and_disables_stages() {
        let params = MonitorParams::from_yaml_str(MINIMAL).unwrap();
        let config = MonitorConfig::from_params(&params).unwrap();

        assert_eq!(config.engine.node_pool_size, 3);
        assert_eq!(config.engine.send_buffer_size, DEFAULT_SEND_BUFFER_SIZE);
        assert_eq!(config.source.backend_profile, "synthetic");
        assert_eq!(config.source.required_data, vec![DataField::DetectorData, DataField::Timestamp]);
        assert!(config.source.frame_age_threshold.is_none());
        assert!(config.calibration.is_none());
        assert!(config.correction.is_none());
        assert!(config.peakfinder.is_none());
        assert!(config.hit.is_none());
        assert_eq!(config.intervals, IntervalParams::default());
        assert_eq!(config.accumulator.window_size, DEFAULT_ACCUMULATION_WINDOW);
        assert_eq!(config.broadcast, BroadcastParams::default());
    }

    #[test]
    fn test_missing_required_groups_fail() {
        let params = MonitorParams::from_yaml_str("om:\n  node_pool_size: 2\n").unwrap();
        assert!(matches!(
            MonitorConfig::from_params(&params),
            Err(ConfigError::MissingGroup { ref group }) if group == SOURCE_GROUP
        ));
    }

    #[test]
    fn test_invalid_values_table_driven() {
        let cases = vec![
            ("node pool too small", "om", "node_pool_size", serde_yaml::Value::from(1u64)),
            ("zero window", "accumulator", "window_size", serde_yaml::Value::from(0u64)),
            ("bad connectivity", "peakfinder8_peak_detection", "connectivity", serde_yaml::Value::from(6u64)),
            ("zero interval", "crystallography", "hit_frame_sending_interval", serde_yaml::Value::from(0u64)),
            ("broadcast interval beyond window", "crystallography", "data_broadcast_interval", serde_yaml::Value::from(101u64)),
            ("negative frame age", "data_retrieval_layer", "frame_age_threshold_secs", serde_yaml::Value::from(-1.0)),
        ];

        for (name, group, parameter, value) in cases {
            let mut params = MonitorParams::from_yaml_str(MINIMAL).unwrap();
            params.set("peakfinder8_peak_detection", "max_num_peaks", 10u64);
            params.set("peakfinder8_peak_detection", "adc_threshold", 10.0);
            params.set("peakfinder8_peak_detection", "minimum_snr", 5.0);
            params.set("peakfinder8_peak_detection", "min_pixel_count", 1u64);
            params.set("peakfinder8_peak_detection", "max_pixel_count", 10u64);
            params.set("peakfinder8_peak_detection", "local_bg_radius", 3u64);
            params.set("peakfinder8_peak_detection", "min_r", 0u64);
            params.set("peakfinder8_peak_detection", "max_r", 100u64);
            params.set("crystallography", "min_num_peaks_for_hit", 1u64);
            params.set("crystallography", "max_num_peaks_for_hit", 5u64);
            assert!(MonitorConfig::from_params(&params).is_ok(), "baseline failed for {}", name);

            params.set(group, parameter, value);
            assert!(
                matches!(MonitorConfig::from_params(&params), Err(ConfigError::InvalidValue { .. })),
                "case should be rejected: {}",
                name
            );
        }
    }

    #[test]
    fn test_peakfinder_group_parses_integers_as_floats() {
        let yaml = format!(
            "{}peakfinder8_peak_detection:\n  max_num_peaks: 5\n  adc_threshold: 20\n  minimum_snr: 4\n  min_pixel_count: 1\n  max_pixel_count: 9\n  local_bg_radius: 2\n  min_r: 0\n  max_r: 50\n  connectivity: 4\n  beam_center_fs: 10\n  beam_center_ss: 12.5\n",
            MINIMAL
        );
        let params = MonitorParams::from_yaml_str(&yaml).unwrap();
        let pf = PeakFinderParams::from_params(&params).unwrap().unwrap();
        assert_eq!(pf.adc_threshold, 20.0);
        assert_eq!(pf.connectivity, Connectivity::Four);
        assert_eq!(pf.beam_center, Some((10.0, 12.5)));
    }

    #[test]
    fn test_field_listed_twice_is_rejected() {
        let mut params = MonitorParams::from_yaml_str(MINIMAL).unwrap();
        params.set(
            SOURCE_GROUP,
            "optional_data",
            serde_yaml::Value::Sequence(vec!["timestamp".into()]),
        );
        assert!(matches!(
            SourceParams::from_params(&params),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
