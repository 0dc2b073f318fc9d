// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Capability interface every facility backend implements.
//!
//! A backend is three cooperating plugins:
//!
//! - [`EventSourcePlugin`] prepares the facility connection and hands each worker a lazy
//!   stream of events for its shard.
//! - [`EventFramework`] brackets each event with `open_event` / `close_event`, acquiring and
//!   releasing whatever per-event resource the facility needs.
//! - [`DataSourcePlugin`] pulls named fields out of an opened event and describes the
//!   detector layout.
//!
//! All three declare the [`EventKind`] they exchange; the registry only binds plugins that
//! agree on it.

use async_trait::async_trait;

use crate::errors::{BackendError, ExtractError};
use crate::model::{DataField, Event, EventKind, FieldValue, GeometryInfo};

/// The part of the global event stream one node is responsible for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    pub rank: usize,
    pub node_pool_size: usize,
    /// Backend-specific source string from the parameter store.
    pub source: Option<String>,
}

impl ShardInfo {
    pub fn num_workers(&self) -> usize {
        self.node_pool_size.saturating_sub(1)
    }

    /// Zero-based index among the workers. Rank 0 is the coordinator and has no shard.
    pub fn worker_index(&self) -> Option<usize> {
        self.rank.checked_sub(1)
    }
}

/// Lazy sequence of events for one shard.
///
/// `None` means the source is exhausted, which is a normal end of run for bounded
/// replay sources. Infinite sources never return `None`; they wait for the next event.
#[async_trait]
pub trait EventStream: Send {
    async fn next_event(&mut self) -> Option<Result<Event, BackendError>>;
}

#[async_trait]
pub trait EventSourcePlugin: Send + Sync {
    fn event_kind(&self) -> EventKind;

    /// Called once per node while it is initializing, before any event is requested.
    async fn initialize_source(&self, shard: &ShardInfo) -> Result<(), BackendError>;

    /// Starts iterating this shard's events. Each call starts a fresh run.
    async fn event_generator(&self, shard: &ShardInfo) -> Result<Box<dyn EventStream>, BackendError>;
}

pub trait EventFramework: Send + Sync {
    fn event_kind(&self) -> EventKind;

    fn open_event(&self, event: &mut Event) -> Result<(), BackendError>;

    /// Releases whatever `open_event` acquired. Must not fail.
    fn close_event(&self, event: &mut Event);
}

pub trait DataSourcePlugin: Send + Sync {
    fn event_kind(&self) -> EventKind;

    fn supported_fields(&self) -> &'static [DataField];

    /// Extracts one field from an opened event.
    ///
    /// Fields the backend does not implement fail with [`ExtractError::UnsupportedField`],
    /// never with a default value.
    fn extract(&self, event: &Event, field: DataField) -> Result<FieldValue, ExtractError>;

    /// Detector layout for peakfinder8, if the backend knows it.
    fn peakfinder_geometry_info(&self) -> Option<GeometryInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_info_indices() {
        let coordinator = ShardInfo {
            rank: 0,
            node_pool_size: 4,
            source: None,
        };
        let worker = ShardInfo {
            rank: 3,
            ..coordinator.clone()
        };

        assert_eq!(coordinator.num_workers(), 3);
        assert_eq!(coordinator.worker_index(), None);
        assert_eq!(worker.worker_index(), Some(2));
    }
}
