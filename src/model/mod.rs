// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shared data model: events and their extracted fields, detector frames and masks,
//! detector geometry, peak lists, and the per-event `ProcessedResult`.

mod event;
mod frame;
mod geometry;
mod peak;
mod result;

pub use event::{DataField, Event, EventData, EventId, EventKind, FieldValue};
pub use frame::{Frame, Mask};
pub use geometry::GeometryInfo;
pub use peak::{Peak, PeakList};
pub use result::{fields, ProcessedResult, ResultValue};
