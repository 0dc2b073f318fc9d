// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-event processing pipeline.
//!
//! Stages run in a fixed order and each one can be switched off by leaving its parameter
//! group out of the configuration:
//!
//! ```text
//! extract → calibration → correction → peakfinder8 → hit classification → ProcessedResult
//! ```
//!
//! A failing stage degrades the result instead of aborting the worker: calibration and
//! correction failures end processing of that event, a peak detection failure only leaves
//! the peak fields out.

mod calibration;
mod correction;
mod hit;
mod peakfinder8;
mod processor;

pub use calibration::{Calibration, CalibrationConstants, CellConstants};
pub use correction::Correction;
pub use hit::HitClassifier;
pub use peakfinder8::Peakfinder8;
pub use processor::Pipeline;
