// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::Frame;

/// Identifier of an event, unique within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub String);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        EventId(value.to_string())
    }
}

/// Tag naming the payload representation a backend's plugins exchange.
///
/// The source, framework and data-source plugins of one backend must all declare the same
/// kind; the registry refuses to bind them otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKind(pub &'static str);

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// One detector event as handed out by an event stream.
///
/// The payload is an opaque handle only the owning backend understands. Whatever
/// `open_event` acquires lives in the `opened` slot and is dropped by `close_event`.
pub struct Event {
    id: EventId,
    timestamp: f64,
    kind: EventKind,
    payload: Box<dyn Any + Send>,
    opened: Option<Box<dyn Any + Send>>,
}

impl Event {
    pub fn new<P: Any + Send>(id: EventId, timestamp: f64, kind: EventKind, payload: P) -> Self {
        Self {
            id,
            timestamp,
            kind,
            payload: Box::new(payload),
            opened: None,
        }
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// Seconds since the Unix epoch.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload<P: Any>(&self) -> Option<&P> {
        self.payload.downcast_ref::<P>()
    }

    pub fn is_open(&self) -> bool {
        self.opened.is_some()
    }

    pub fn set_opened<R: Any + Send>(&mut self, resource: R) {
        self.opened = Some(Box::new(resource));
    }

    pub fn opened<R: Any>(&self) -> Option<&R> {
        self.opened.as_ref().and_then(|r| r.downcast_ref::<R>())
    }

    pub fn take_opened(&mut self) -> Option<Box<dyn Any + Send>> {
        self.opened.take()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("timestamp", &self.timestamp)
            .field("kind", &self.kind)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Fields a backend may be asked to extract from an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataField {
    DetectorData,
    Timestamp,
    BeamEnergy,
    DetectorDistance,
    OpticalLaserActive,
    EventId,
    CellId,
}

impl DataField {
    pub const ALL: [DataField; 7] = [
        DataField::DetectorData,
        DataField::Timestamp,
        DataField::BeamEnergy,
        DataField::DetectorDistance,
        DataField::OpticalLaserActive,
        DataField::EventId,
        DataField::CellId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataField::DetectorData => "detector_data",
            DataField::Timestamp => "timestamp",
            DataField::BeamEnergy => "beam_energy",
            DataField::DetectorDistance => "detector_distance",
            DataField::OpticalLaserActive => "optical_laser_active",
            DataField::EventId => "event_id",
            DataField::CellId => "cell_id",
        }
    }
}

impl fmt::Display for DataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown data field '{}'", s))
    }
}

/// A value returned by `extract`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Frame(Frame),
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            FieldValue::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Everything extracted from one opened event; the input of the processing pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub event_id: EventId,
    pub timestamp: f64,
    fields: BTreeMap<DataField, FieldValue>,
}

impl EventData {
    pub fn new(event_id: EventId, timestamp: f64) -> Self {
        Self {
            event_id,
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: DataField, value: FieldValue) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: DataField, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn get(&self, field: DataField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn contains(&self, field: DataField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn detector_data(&self) -> Option<&Frame> {
        self.get(DataField::DetectorData).and_then(FieldValue::as_frame)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&DataField, &FieldValue)> {
        self.fields.iter()
    }
}
