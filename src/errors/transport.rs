// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("rank {rank}: send buffer still full after {attempts} attempts, result dropped")]
    Timeout { rank: usize, attempts: u32 },

    #[error("rank {rank}: coordinator channel closed")]
    Closed { rank: usize },
}
