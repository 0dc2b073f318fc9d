// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::{BackendError, ConfigError, TransportError};

/// Fatal, single-cause errors that terminate a node.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("rank {rank}: backend failed {attempts} times in a row, giving up: {source}")]
    BackendFatal {
        rank: usize,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("rank {rank} terminated abnormally: {reason}")]
    NodeCrashed { rank: usize, reason: String },

    #[error("broadcast channel failure: {0}")]
    Broadcast(#[source] std::io::Error),
}
