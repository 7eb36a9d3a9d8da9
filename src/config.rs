//! Run and cluster configuration.
//!
//! ## Environment variables
//!
//! - `TRAVERSAL_BUFFER`: `queue` (BFS, default) or `stack` (DFS)
//! - `TRAVERSAL_DIRECTION`: `forward`, `backward` or `both` (default)
//! - `TRAVERSAL_IDLE_WAIT_MS`: satellite idle sleep (default: 5)
//! - `TRAVERSAL_POLL_INTERVAL_MS`: coordinator poll interval (default: 10)
//! - `TRAVERSAL_TERMINATION`: `double_wave` (default) or `single_round`

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::BufferKind;
use crate::error::{ChannelError, TraversalError, TraversalResult};
use crate::polling::TerminationStrategy;
use crate::types::{PartitionId, TraversalDirection};

/// Default satellite idle wait in milliseconds.
pub const DEFAULT_IDLE_WAIT_MS: u64 = 5;

/// Default coordinator poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Parameters of a traversal run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Buffer discipline (BFS or DFS).
    pub buffer: BufferKind,
    /// Which incidences to follow.
    pub direction: TraversalDirection,
    /// How long an idle satellite sleeps before rechecking its buffer.
    pub idle_wait_ms: u64,
    /// Interval between two poll rounds of the polling coordinator.
    pub poll_interval_ms: u64,
    /// Quiescence rule of the polling coordinator.
    pub termination: TerminationStrategy,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            buffer: BufferKind::Queue,
            direction: TraversalDirection::Both,
            idle_wait_ms: DEFAULT_IDLE_WAIT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            termination: TerminationStrategy::DoubleWave,
        }
    }
}

impl TraversalConfig {
    /// Breadth-first defaults.
    pub fn bfs() -> Self {
        Self::default()
    }

    /// Depth-first defaults.
    pub fn dfs() -> Self {
        Self {
            buffer: BufferKind::Stack,
            ..Self::default()
        }
    }

    /// Builder: set the traversal direction.
    #[must_use]
    pub fn with_direction(mut self, direction: TraversalDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Builder: set the termination strategy.
    #[must_use]
    pub fn with_termination(mut self, termination: TerminationStrategy) -> Self {
        self.termination = termination;
        self
    }

    /// Builder: set idle wait and poll interval together.
    #[must_use]
    pub fn with_timing(mut self, idle_wait_ms: u64, poll_interval_ms: u64) -> Self {
        self.idle_wait_ms = idle_wait_ms;
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Idle wait as a duration.
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Read configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to defaults with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("TRAVERSAL_BUFFER") {
            match BufferKind::from_str(&raw) {
                Some(kind) => config.buffer = kind,
                None => tracing::warn!(value = %raw, "Ignoring invalid TRAVERSAL_BUFFER"),
            }
        }
        if let Ok(raw) = std::env::var("TRAVERSAL_DIRECTION") {
            match TraversalDirection::from_str(&raw) {
                Some(direction) => config.direction = direction,
                None => tracing::warn!(value = %raw, "Ignoring invalid TRAVERSAL_DIRECTION"),
            }
        }
        if let Ok(raw) = std::env::var("TRAVERSAL_TERMINATION") {
            match TerminationStrategy::from_str(&raw) {
                Some(strategy) => config.termination = strategy,
                None => tracing::warn!(value = %raw, "Ignoring invalid TRAVERSAL_TERMINATION"),
            }
        }
        config.idle_wait_ms = env_millis("TRAVERSAL_IDLE_WAIT_MS", config.idle_wait_ms);
        config.poll_interval_ms = env_millis("TRAVERSAL_POLL_INTERVAL_MS", config.poll_interval_ms);

        config
    }
}

fn env_millis(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key = key, value = %raw, "Ignoring invalid duration");
            default
        }),
        Err(_) => default,
    }
}

/// Placement of stations: which host serves which partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Partition whose station also acts as coordinator.
    pub coordinator: PartitionId,
    /// Hostname (`host:port`) per partition.
    pub stations: BTreeMap<PartitionId, String>,
}

impl ClusterConfig {
    /// Parse a cluster description from JSON.
    pub fn from_json(json: &str) -> TraversalResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TraversalError::Channel(ChannelError::Decode(e.to_string())))?;
        if !config.stations.contains_key(&config.coordinator) {
            return Err(TraversalError::UnknownPartition(config.coordinator));
        }
        Ok(config)
    }

    /// Read a cluster description from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> TraversalResult<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TraversalError::Channel(ChannelError::UnknownHost(format!(
                "{}: {}",
                path.as_ref().display(),
                e
            )))
        })?;
        Self::from_json(&json)
    }

    /// Hostname of the coordinator station.
    pub fn coordinator_host(&self) -> Option<&str> {
        self.stations.get(&self.coordinator).map(String::as_str)
    }
}
