// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Facility backends and the registry that resolves them by profile name.
//!
//! # Available Profiles
//!
//! ## `synthetic`
//! Simulated facility producing frames with Gaussian spots at a configurable hit fraction:
//! - **Stream**: infinite, or bounded by `num_events`
//! - **Sharding**: round-robin by global event index
//! - **Use Case**: demos, soak runs, end-to-end tests
//!
//! ## `files`
//! Replay of JSON frame files listed in a list file:
//! - **Stream**: bounded, ends when the worker's block of files is exhausted
//! - **Sharding**: contiguous blocks of `ceil(n / workers)` files
//! - **Use Case**: re-processing recorded data
//!
//! ## Stub Backend (Test-Only)
//! Scriptable failures, panics and stalls with a ledger of opens and closes. Only available
//! in test builds.
//!
//! # Architecture
//!
//! ```text
//! profile name → BackendRegistry → BackendDescriptor { source, framework, data } → nodes
//! ```

pub mod files;
pub mod registry;
#[cfg(test)]
pub mod stub;
pub mod synthetic;

pub use registry::{BackendDescriptor, BackendRegistry};
