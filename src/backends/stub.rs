// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Scriptable backend for tests.
//!
//! Events are dealt round-robin over workers like the synthetic backend. A [`StubScript`]
//! decides per global event index whether opening fails, extraction fails or panics, and
//! whether the stream stalls or fails. Every fetch, open and close is recorded in a shared
//! [`StubLedger`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::registry::BackendDescriptor;
use crate::errors::{BackendError, ExtractError};
use crate::model::{DataField, Event, EventId, EventKind, FieldValue, Frame, GeometryInfo};
use crate::traits::{DataSourcePlugin, EventFramework, EventSourcePlugin, EventStream, ShardInfo};
use crate::utils::unix_time_now;

pub const PROFILE: &str = "stub";
const KIND: EventKind = EventKind("stub-event");

const SUPPORTED_FIELDS: &[DataField] = &[DataField::DetectorData, DataField::Timestamp, DataField::EventId];

#[derive(Debug, Clone, Default)]
pub struct StubScript {
    /// Frames cycled through by global event index. An empty list yields 16x16 zero frames.
    pub frames: Vec<Frame>,
    /// Total number of events over all workers. `None` streams forever.
    pub num_events: Option<usize>,
    pub panic_on: Vec<usize>,
    pub fail_extract_on: Vec<usize>,
    pub fail_open_on: Vec<usize>,
    /// Fetch failures each worker hits before its stream recovers.
    pub fetch_errors: usize,
    pub always_fail_fetch: bool,
    /// After this many events per worker the stream hangs.
    pub stall_after: Option<usize>,
    /// Workers hang in `initialize_source`; the coordinator does not.
    pub stall_init: bool,
    /// Fixed event timestamp instead of the current time.
    pub timestamp: Option<f64>,
    pub event_interval: Duration,
    pub geometry: Option<GeometryInfo>,
}

impl StubScript {
    fn frame(&self, index: usize) -> Frame {
        if self.frames.is_empty() {
            Frame::zeros(16, 16)
        } else {
            self.frames[index % self.frames.len()].clone()
        }
    }
}

#[derive(Debug, Default)]
pub struct StubLedger {
    fetched: Mutex<Vec<String>>,
    opened: Mutex<HashMap<String, usize>>,
    closed: Mutex<HashMap<String, usize>>,
    fetch_failures: AtomicUsize,
    init_attempts: AtomicUsize,
}

impl StubLedger {
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn open_count(&self, id: &str) -> usize {
        self.opened.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn close_count(&self, id: &str) -> usize {
        self.closed.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total_opened(&self) -> usize {
        self.opened.lock().unwrap().values().sum()
    }

    pub fn total_closed(&self) -> usize {
        self.closed.lock().unwrap().values().sum()
    }

    pub fn fetch_failures(&self) -> usize {
        self.fetch_failures.load(Ordering::SeqCst)
    }

    pub fn init_attempts(&self) -> usize {
        self.init_attempts.load(Ordering::SeqCst)
    }

    /// Every event that was opened was opened once and closed exactly once.
    pub fn balanced(&self) -> bool {
        let opened = self.opened.lock().unwrap();
        let closed = self.closed.lock().unwrap();
        opened.len() == closed.len()
            && opened
                .iter()
                .all(|(id, count)| *count == 1 && closed.get(id).copied() == Some(1))
    }
}

#[derive(Debug, Clone, Copy)]
struct StubPayload {
    index: usize,
}

struct StubResource(Frame);

pub struct StubBackend {
    script: Arc<StubScript>,
    ledger: Arc<StubLedger>,
}

impl StubBackend {
    pub fn new(script: StubScript) -> Self {
        Self {
            script: Arc::new(script),
            ledger: Arc::new(StubLedger::default()),
        }
    }

    pub fn ledger(&self) -> Arc<StubLedger> {
        self.ledger.clone()
    }

    pub fn source(&self) -> Arc<dyn EventSourcePlugin> {
        Arc::new(StubSource {
            script: self.script.clone(),
            ledger: self.ledger.clone(),
        })
    }

    pub fn framework(&self) -> Arc<dyn EventFramework> {
        Arc::new(StubFramework {
            script: self.script.clone(),
            ledger: self.ledger.clone(),
        })
    }

    pub fn data(&self) -> Arc<dyn DataSourcePlugin> {
        Arc::new(StubData {
            script: self.script.clone(),
        })
    }

    pub fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor::new(PROFILE, self.source(), self.framework(), self.data())
            .expect("stub plugins share one event kind")
    }
}

struct StubSource {
    script: Arc<StubScript>,
    ledger: Arc<StubLedger>,
}

struct StubStream {
    script: Arc<StubScript>,
    ledger: Arc<StubLedger>,
    next_index: usize,
    stride: usize,
    emitted: usize,
    failures_left: usize,
}

#[async_trait]
impl EventStream for StubStream {
    async fn next_event(&mut self) -> Option<Result<Event, BackendError>> {
        if self.script.always_fail_fetch || self.failures_left > 0 {
            self.failures_left = self.failures_left.saturating_sub(1);
            self.ledger.fetch_failures.fetch_add(1, Ordering::SeqCst);
            return Some(Err(BackendError::Api("stub fetch failure".to_string())));
        }
        if let Some(limit) = self.script.num_events {
            if self.next_index >= limit {
                return None;
            }
        }
        if self.script.stall_after.map_or(false, |n| self.emitted >= n) {
            std::future::pending::<()>().await;
        }
        if self.script.event_interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.script.event_interval).await;
        }

        let index = self.next_index;
        self.next_index += self.stride;
        self.emitted += 1;
        let id = format!("stub-{}", index);
        self.ledger.fetched.lock().unwrap().push(id.clone());
        let timestamp = self.script.timestamp.unwrap_or_else(unix_time_now);
        Some(Ok(Event::new(EventId(id), timestamp, KIND, StubPayload { index })))
    }
}

#[async_trait]
impl EventSourcePlugin for StubSource {
    fn event_kind(&self) -> EventKind {
        KIND
    }

    async fn initialize_source(&self, shard: &ShardInfo) -> Result<(), BackendError> {
        self.ledger.init_attempts.fetch_add(1, Ordering::SeqCst);
        if self.script.stall_init && shard.worker_index().is_some() {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn event_generator(&self, shard: &ShardInfo) -> Result<Box<dyn EventStream>, BackendError> {
        let worker = shard.worker_index().ok_or_else(|| BackendError::Unavailable {
            profile: PROFILE.to_string(),
            reason: "coordinator".to_string(),
        })?;
        Ok(Box::new(StubStream {
            script: self.script.clone(),
            ledger: self.ledger.clone(),
            next_index: worker,
            stride: shard.num_workers().max(1),
            emitted: 0,
            failures_left: self.script.fetch_errors,
        }))
    }
}

struct StubFramework {
    script: Arc<StubScript>,
    ledger: Arc<StubLedger>,
}

impl EventFramework for StubFramework {
    fn event_kind(&self) -> EventKind {
        KIND
    }

    fn open_event(&self, event: &mut Event) -> Result<(), BackendError> {
        let index = event
            .payload::<StubPayload>()
            .map(|p| p.index)
            .ok_or(BackendError::Representation {
                expected: KIND.0,
                found: event.kind().0,
            })?;
        *self.ledger.opened.lock().unwrap().entry(event.id().to_string()).or_default() += 1;
        if self.script.fail_open_on.contains(&index) {
            return Err(BackendError::Api(format!("stub cannot open event {}", index)));
        }
        event.set_opened(StubResource(self.script.frame(index)));
        Ok(())
    }

    fn close_event(&self, event: &mut Event) {
        event.take_opened();
        *self.ledger.closed.lock().unwrap().entry(event.id().to_string()).or_default() += 1;
    }
}

struct StubData {
    script: Arc<StubScript>,
}

impl DataSourcePlugin for StubData {
    fn event_kind(&self) -> EventKind {
        KIND
    }

    fn supported_fields(&self) -> &'static [DataField] {
        SUPPORTED_FIELDS
    }

    fn extract(&self, event: &Event, field: DataField) -> Result<FieldValue, ExtractError> {
        let index = event.payload::<StubPayload>().map(|p| p.index).unwrap_or(usize::MAX);
        match field {
            DataField::DetectorData => {
                if self.script.panic_on.contains(&index) {
                    panic!("stub panic while extracting event {}", index);
                }
                if self.script.fail_extract_on.contains(&index) {
                    return Err(ExtractError::Failed {
                        field,
                        reason: format!("stub failure on event {}", index),
                    });
                }
                event
                    .opened::<StubResource>()
                    .map(|r| FieldValue::Frame(r.0.clone()))
                    .ok_or(ExtractError::NotOpened { field })
            }
            DataField::Timestamp => Ok(FieldValue::Float(event.timestamp())),
            DataField::EventId => Ok(FieldValue::Text(event.id().to_string())),
            _ => Err(ExtractError::UnsupportedField { profile: PROFILE, field }),
        }
    }

    fn peakfinder_geometry_info(&self) -> Option<GeometryInfo> {
        self.script.geometry.clone().or_else(|| {
            let frame = self.script.frame(0);
            Some(GeometryInfo::monolithic(frame.width(), frame.height()))
        })
    }
}
