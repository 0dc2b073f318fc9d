// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod params;
mod runtime;

pub mod consts;
pub mod groups;
pub mod reference;

pub use groups::MonitorConfig;
pub use params::{MonitorParams, ParamType};
pub use runtime::RuntimeBuilder;
