// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::sync::Arc;

use super::{files, synthetic};
use crate::config::MonitorParams;
use crate::errors::ConfigError;
use crate::model::EventKind;
use crate::traits::{DataSourcePlugin, EventFramework, EventSourcePlugin};

/// The three plugins of one backend, bound together once at startup.
///
/// Construction checks that all three agree on the event representation; a descriptor is
/// immutable afterwards and cheap to clone into every node.
#[derive(Clone)]
pub struct BackendDescriptor {
    profile: String,
    source: Arc<dyn EventSourcePlugin>,
    framework: Arc<dyn EventFramework>,
    data: Arc<dyn DataSourcePlugin>,
}

impl BackendDescriptor {
    pub fn new(
        profile: impl Into<String>,
        source: Arc<dyn EventSourcePlugin>,
        framework: Arc<dyn EventFramework>,
        data: Arc<dyn DataSourcePlugin>,
    ) -> Result<Self, ConfigError> {
        let profile = profile.into();
        let kind = source.event_kind();
        for (role, other) in [("framework", framework.event_kind()), ("data source", data.event_kind())] {
            if other != kind {
                return Err(ConfigError::IncompatibleBackend {
                    profile,
                    reason: format!("event source produces '{}' events but the {} expects '{}'", kind, role, other),
                });
            }
        }
        Ok(Self {
            profile,
            source,
            framework,
            data,
        })
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn event_kind(&self) -> EventKind {
        self.source.event_kind()
    }

    pub fn source(&self) -> &Arc<dyn EventSourcePlugin> {
        &self.source
    }

    pub fn framework(&self) -> &Arc<dyn EventFramework> {
        &self.framework
    }

    pub fn data(&self) -> &Arc<dyn DataSourcePlugin> {
        &self.data
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("profile", &self.profile)
            .field("event_kind", &self.event_kind())
            .field("supported_fields", &self.data.supported_fields())
            .finish()
    }
}

type BackendBuilder = fn(&MonitorParams) -> Result<BackendDescriptor, ConfigError>;

/// Static table of built-in facility profiles.
const PROFILES: &[(&str, BackendBuilder)] = &[
    (synthetic::PROFILE, synthetic::build),
    (files::PROFILE, files::build),
];

/// Resolves facility profile names to bound backends.
pub struct BackendRegistry;

impl BackendRegistry {
    /// Looks up `profile` and builds its plugins from the parameter store.
    ///
    /// Unknown names fail immediately with `ConfigError::UnknownBackend`, before any node
    /// has started.
    pub fn resolve(profile: &str, params: &MonitorParams) -> Result<BackendDescriptor, ConfigError> {
        let (_, build) = PROFILES
            .iter()
            .find(|(name, _)| *name == profile)
            .ok_or_else(|| ConfigError::UnknownBackend {
                profile: profile.to_string(),
                available: Self::list_available_profiles(),
            })?;
        build(params)
    }

    pub fn list_available_profiles() -> Vec<&'static str> {
        PROFILES.iter().map(|(name, _)| *name).collect()
    }

    pub fn is_profile_available(profile: &str) -> bool {
        Self::list_available_profiles().contains(&profile)
    }
}
