// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::backends::{BackendDescriptor, BackendRegistry};
use crate::config::{MonitorConfig, MonitorParams};
use crate::errors::ConfigError;
use crate::observability::messages::pipeline::PipelineConfigured;
use crate::observability::messages::StructuredLog;
use crate::pipeline::Pipeline;

/// Monitor runtime builder - validates parameters, resolves the backend and builds the
/// processing pipeline.
///
/// Everything that can fail at startup fails here, before any node is spawned: missing or
/// mistyped parameters, unknown backend profiles, unreadable reference arrays.
///
/// # Examples
///
/// ```
/// use xtal_monitor::config::{MonitorParams, RuntimeBuilder};
///
/// let params = MonitorParams::from_yaml_str(
///     "om:\n  node_pool_size: 3\ndata_retrieval_layer:\n  backend_profile: synthetic\n",
/// )
/// .unwrap();
///
/// let (config, backend, pipeline) = RuntimeBuilder::from_params(&params).unwrap();
///
/// assert_eq!(config.engine.node_pool_size, 3);
/// assert_eq!(backend.profile(), "synthetic");
/// assert_eq!(pipeline.stages(), (false, false, false, false));
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build the complete monitor runtime from the parameter store.
    ///
    /// Returns the validated `MonitorConfig`, the bound `BackendDescriptor` and the
    /// template `Pipeline` every worker clones.
    pub fn from_params(params: &MonitorParams) -> Result<(MonitorConfig, BackendDescriptor, Pipeline), ConfigError> {
        let config = MonitorConfig::from_params(params)?;
        let backend = BackendRegistry::resolve(&config.source.backend_profile, params)?;
        let pipeline = Pipeline::from_config(&config, &backend)?;

        let (calibration, correction, peakfinder, hit) = pipeline.stages();
        PipelineConfigured {
            profile: backend.profile(),
            calibration,
            correction,
            peakfinder,
            hit,
        }
        .log();

        Ok((config, backend, pipeline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_profile_fails_before_pipeline() {
        let params = MonitorParams::from_yaml_str(
            "om:\n  node_pool_size: 2\ndata_retrieval_layer:\n  backend_profile: lcls\n",
        )
        .unwrap();
        assert!(matches!(
            RuntimeBuilder::from_params(&params),
            Err(ConfigError::UnknownBackend { .. })
        ));
    }

    #[test]
    fn test_peakfinder_and_hit_stages_enabled() {
        let params = MonitorParams::from_yaml_str(
            r#"
om:
  node_pool_size: 2
data_retrieval_layer:
  backend_profile: synthetic
peakfinder8_peak_detection:
  max_num_peaks: 100
  adc_threshold: 50
  minimum_snr: 5
  min_pixel_count: 1
  max_pixel_count: 30
  local_bg_radius: 3
  min_r: 0
  max_r: 100
crystallography:
  min_num_peaks_for_hit: 3
  max_num_peaks_for_hit: 10
"#,
        )
        .unwrap();
        let (config, _, pipeline) = RuntimeBuilder::from_params(&params).unwrap();
        assert!(config.peakfinder.is_some());
        assert_eq!(pipeline.stages(), (false, false, true, true));
    }

    #[test]
    fn test_missing_reference_file_is_config_error() {
        let params = MonitorParams::from_yaml_str(
            r#"
om:
  node_pool_size: 2
data_retrieval_layer:
  backend_profile: synthetic
correction:
  dark_filename: /nonexistent/dark.json
"#,
        )
        .unwrap();
        assert!(matches!(
            RuntimeBuilder::from_params(&params),
            Err(ConfigError::ReadFailed { .. })
        ));
    }
}
