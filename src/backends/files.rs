// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Filesystem replay.
//!
//! The `data_retrieval_layer.source` entry names a list file with one frame file per line
//! (blank lines and `#` comments ignored, relative paths resolved against the list's
//! directory). Frame files use the reference-array JSON format. The list is split into
//! contiguous blocks of `ceil(n / workers)` files, one block per worker, and each worker's
//! stream ends when its block is exhausted. The timestamp of an event is the modification
//! time of its file. A listed file that cannot be read still becomes an event, stamped with
//! the current time, and fails when it is opened.
//!
//! Optional `files` group: `fallback_beam_energy`, `fallback_detector_distance` and a
//! detector layout (`asic_nx`, `asic_ny`, `nasics_x`, `nasics_y`, beam centre defaulting
//! to the middle of the detector).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use super::registry::BackendDescriptor;
use crate::config::{groups::SOURCE_GROUP, reference, MonitorParams};
use crate::errors::{BackendError, ConfigError, ExtractError};
use crate::model::{DataField, Event, EventId, EventKind, FieldValue, Frame, GeometryInfo};
use crate::traits::{DataSourcePlugin, EventFramework, EventSourcePlugin, EventStream, ShardInfo};
use crate::utils::unix_time_now;

pub const PROFILE: &str = "files";
pub const GROUP: &str = "files";
const KIND: EventKind = EventKind("frame-file");

const SUPPORTED_FIELDS: &[DataField] = &[
    DataField::DetectorData,
    DataField::Timestamp,
    DataField::BeamEnergy,
    DataField::DetectorDistance,
    DataField::EventId,
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilesParams {
    pub fallback_beam_energy: Option<f64>,
    pub fallback_detector_distance: Option<f64>,
    pub geometry: Option<GeometryInfo>,
}

impl FilesParams {
    pub fn from_params(params: &MonitorParams) -> Result<Self, ConfigError> {
        let g = GROUP;
        if !params.has_group(g) {
            return Ok(Self::default());
        }
        let layout = (
            params.get_optional::<usize>(g, "asic_nx")?,
            params.get_optional::<usize>(g, "asic_ny")?,
            params.get_optional::<usize>(g, "nasics_x")?,
            params.get_optional::<usize>(g, "nasics_y")?,
        );
        let geometry = match layout {
            (Some(asic_nx), Some(asic_ny), nasics_x, nasics_y) => {
                let (nasics_x, nasics_y) = (nasics_x.unwrap_or(1), nasics_y.unwrap_or(1));
                let width = (asic_nx * nasics_x) as f32;
                let height = (asic_ny * nasics_y) as f32;
                Some(GeometryInfo::with_beam_center(
                    asic_nx,
                    asic_ny,
                    nasics_x,
                    nasics_y,
                    params.get_or(g, "beam_center_fs", width / 2.0)?,
                    params.get_or(g, "beam_center_ss", height / 2.0)?,
                ))
            }
            (None, None, None, None) => None,
            _ => return Err(ConfigError::invalid(g, "asic_nx", "asic_nx and asic_ny must be given together")),
        };

        Ok(Self {
            fallback_beam_energy: params.get_optional(g, "fallback_beam_energy")?,
            fallback_detector_distance: params.get_optional(g, "fallback_detector_distance")?,
            geometry,
        })
    }
}

/// Reads a list file and resolves every entry to a path.
pub fn read_file_list(list: &Path) -> Result<Vec<PathBuf>, BackendError> {
    let text = std::fs::read_to_string(list).map_err(|source| BackendError::Io {
        context: list.display().to_string(),
        source,
    })?;
    let base = list.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let path = PathBuf::from(line);
            if path.is_absolute() {
                path
            } else {
                base.join(path)
            }
        })
        .collect())
}

/// Contiguous block of `0..total` handled by worker `worker` of `workers`.
pub fn shard_range(total: usize, workers: usize, worker: usize) -> std::ops::Range<usize> {
    let workers = workers.max(1);
    let block = (total + workers - 1) / workers;
    let start = (worker * block).min(total);
    let end = ((worker + 1) * block).min(total);
    start..end
}

struct FilePayload {
    path: PathBuf,
}

struct LoadedFrame(Frame);

pub struct FilesSource;

pub struct FilesStream {
    paths: std::vec::IntoIter<PathBuf>,
}

#[async_trait]
impl EventStream for FilesStream {
    async fn next_event(&mut self) -> Option<Result<Event, BackendError>> {
        let path = self.paths.next()?;
        let timestamp = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0.0, |d| d.as_secs_f64()),
            Err(error) => {
                tracing::debug!(path = %path.display(), error = %error, "frame file not readable");
                unix_time_now()
            }
        };
        Some(Ok(Event::new(
            EventId(path.display().to_string()),
            timestamp,
            KIND,
            FilePayload { path },
        )))
    }
}

impl FilesSource {
    fn list_path(shard: &ShardInfo) -> Result<PathBuf, BackendError> {
        shard
            .source
            .as_ref()
            .map(PathBuf::from)
            .ok_or_else(|| BackendError::Unavailable {
                profile: PROFILE.to_string(),
                reason: format!("no file list given in [{}] source", SOURCE_GROUP),
            })
    }
}

#[async_trait]
impl EventSourcePlugin for FilesSource {
    fn event_kind(&self) -> EventKind {
        KIND
    }

    async fn initialize_source(&self, shard: &ShardInfo) -> Result<(), BackendError> {
        let list = Self::list_path(shard)?;
        tokio::fs::metadata(&list)
            .await
            .map(|_| ())
            .map_err(|source| BackendError::Io {
                context: list.display().to_string(),
                source,
            })
    }

    async fn event_generator(&self, shard: &ShardInfo) -> Result<Box<dyn EventStream>, BackendError> {
        let worker = shard.worker_index().ok_or_else(|| BackendError::Unavailable {
            profile: PROFILE.to_string(),
            reason: "the coordinator has no event shard".to_string(),
        })?;
        let list = Self::list_path(shard)?;
        let all = tokio::task::spawn_blocking(move || read_file_list(&list))
            .await
            .map_err(|e| BackendError::Api(e.to_string()))??;
        let range = shard_range(all.len(), shard.num_workers(), worker);
        let mine: Vec<PathBuf> = all.into_iter().skip(range.start).take(range.len()).collect();
        Ok(Box::new(FilesStream {
            paths: mine.into_iter(),
        }))
    }
}

pub struct FilesFramework;

impl EventFramework for FilesFramework {
    fn event_kind(&self) -> EventKind {
        KIND
    }

    fn open_event(&self, event: &mut Event) -> Result<(), BackendError> {
        let path = event
            .payload::<FilePayload>()
            .map(|p| p.path.clone())
            .ok_or(BackendError::Representation {
                expected: KIND.0,
                found: event.kind().0,
            })?;
        let frame = reference::load_frame(&path).map_err(|e| BackendError::Api(e.to_string()))?;
        event.set_opened(LoadedFrame(frame));
        Ok(())
    }

    fn close_event(&self, event: &mut Event) {
        event.take_opened();
    }
}

pub struct FilesData {
    params: FilesParams,
}

impl DataSourcePlugin for FilesData {
    fn event_kind(&self) -> EventKind {
        KIND
    }

    fn supported_fields(&self) -> &'static [DataField] {
        SUPPORTED_FIELDS
    }

    fn extract(&self, event: &Event, field: DataField) -> Result<FieldValue, ExtractError> {
        let fallback = |value: Option<f64>, name: &str| {
            value.map(FieldValue::Float).ok_or_else(|| ExtractError::Failed {
                field,
                reason: format!("frame files carry no {}; set [{}] {}", field, GROUP, name),
            })
        };

        match field {
            DataField::DetectorData => event
                .opened::<LoadedFrame>()
                .map(|loaded| FieldValue::Frame(loaded.0.clone()))
                .ok_or(ExtractError::NotOpened { field }),
            DataField::Timestamp => Ok(FieldValue::Float(event.timestamp())),
            DataField::BeamEnergy => fallback(self.params.fallback_beam_energy, "fallback_beam_energy"),
            DataField::DetectorDistance => {
                fallback(self.params.fallback_detector_distance, "fallback_detector_distance")
            }
            DataField::EventId => Ok(FieldValue::Text(event.id().to_string())),
            DataField::OpticalLaserActive | DataField::CellId => {
                Err(ExtractError::UnsupportedField { profile: PROFILE, field })
            }
        }
    }

    fn peakfinder_geometry_info(&self) -> Option<GeometryInfo> {
        self.params.geometry.clone()
    }
}

pub fn build(params: &MonitorParams) -> Result<BackendDescriptor, ConfigError> {
    BackendDescriptor::new(
        PROFILE,
        Arc::new(FilesSource),
        Arc::new(FilesFramework),
        Arc::new(FilesData {
            params: FilesParams::from_params(params)?,
        }),
    )
}
