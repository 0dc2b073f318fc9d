// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod accumulator;   // rolling window + running mean frame
pub mod backends;      // backend registry and built-in profiles
pub mod broadcast;     // snapshot publishing
pub mod config;        // parameter store + runtime builder
pub mod engine;        // coordinator/worker nodes
pub mod errors;        // error taxonomy
pub mod model;         // events, frames, peaks, results
pub mod observability;
pub mod pipeline;      // calibration -> correction -> peakfinder8 -> hit
pub mod traits;        // backend capability interface
pub mod utils;
