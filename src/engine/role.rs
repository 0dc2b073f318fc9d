// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use crate::config::groups::ENGINE_GROUP;
use crate::errors::ConfigError;
use crate::traits::ShardInfo;

/// Role of a node, fixed by its rank: rank 0 coordinates, every other rank works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    Coordinator,
    Worker,
}

impl WorkerRole {
    pub fn from_rank(rank: usize) -> Self {
        if rank == 0 {
            WorkerRole::Coordinator
        } else {
            WorkerRole::Worker
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerRole::Coordinator => f.write_str("coordinator"),
            WorkerRole::Worker => f.write_str("worker"),
        }
    }
}

/// Lifecycle of a node: `Initializing -> Running -> Draining -> Shutdown`.
///
/// Workers skip `Draining`; it is the coordinator's wait for in-flight results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EngineState {
    Initializing,
    Running,
    Draining,
    Shutdown,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Initializing => "Initializing",
            EngineState::Running => "Running",
            EngineState::Draining => "Draining",
            EngineState::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Identity of one node in the parallel group, passed explicitly into engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessConfig {
    rank: usize,
    group_size: usize,
}

impl ProcessConfig {
    /// Fails unless `rank < group_size` and the group has room for one coordinator plus at
    /// least one worker.
    pub fn new(rank: usize, group_size: usize) -> Result<Self, ConfigError> {
        if group_size < 2 {
            return Err(ConfigError::invalid(
                ENGINE_GROUP,
                "node_pool_size",
                "needs one coordinator and at least one worker",
            ));
        }
        if rank >= group_size {
            return Err(ConfigError::invalid(
                ENGINE_GROUP,
                "node_pool_size",
                format!("rank {} is outside a group of {}", rank, group_size),
            ));
        }
        Ok(Self { rank, group_size })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn num_workers(&self) -> usize {
        self.group_size - 1
    }

    pub fn role(&self) -> WorkerRole {
        WorkerRole::from_rank(self.rank)
    }

    pub fn shard(&self, source: Option<String>) -> ShardInfo {
        ShardInfo {
            rank: self.rank,
            node_pool_size: self.group_size,
            source,
        }
    }
}
