//! Station service state.
//!
//! A station serves the remote surfaces of the roles it hosts: the
//! mediated satellite, the peer satellite and, on the coordinator's
//! partition, the matching coordinator.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mediated::{Coordinator, MediatedSatellite};
use crate::polling::{PeerSatellite, PollingCoordinator};
use crate::store::GraphAccessor;
use crate::types::PartitionId;
use crate::visitor::Visitor;

/// Protocol a station takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationRole {
    /// Coordinator-mediated protocol.
    Mediated,
    /// Peer-to-peer protocol with polling termination.
    Polling,
}

impl StationRole {
    /// Parse from a config string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mediated" => Some(Self::Mediated),
            "polling" | "peer" => Some(Self::Polling),
            _ => None,
        }
    }
}

impl std::fmt::Display for StationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mediated => write!(f, "mediated"),
            Self::Polling => write!(f, "polling"),
        }
    }
}

/// Shared service state.
pub struct StationState<G, V> {
    partition: PartitionId,
    started_at: DateTime<Utc>,
    /// Mediating coordinator, if this station hosts it.
    pub coordinator: Option<Arc<Coordinator<V>>>,
    /// Polling coordinator, if this station hosts it.
    pub polling_coordinator: Option<Arc<PollingCoordinator>>,
    /// Mediated satellite of this partition.
    pub mediated: Option<Arc<MediatedSatellite<G>>>,
    /// Peer satellite of this partition.
    pub peer: Option<Arc<PeerSatellite<G, V>>>,
}

impl<G: GraphAccessor, V: Visitor> StationState<G, V> {
    /// Create state for a station serving `partition` with no role yet.
    pub fn new(partition: PartitionId) -> Self {
        Self {
            partition,
            started_at: Utc::now(),
            coordinator: None,
            polling_coordinator: None,
            mediated: None,
            peer: None,
        }
    }

    /// Builder: host the mediating coordinator.
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: Arc<Coordinator<V>>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Builder: host the polling coordinator.
    #[must_use]
    pub fn with_polling_coordinator(mut self, coordinator: Arc<PollingCoordinator>) -> Self {
        self.polling_coordinator = Some(coordinator);
        self
    }

    /// Builder: host a mediated satellite.
    #[must_use]
    pub fn with_mediated(mut self, satellite: Arc<MediatedSatellite<G>>) -> Self {
        self.mediated = Some(satellite);
        self
    }

    /// Builder: host a peer satellite.
    #[must_use]
    pub fn with_peer(mut self, satellite: Arc<PeerSatellite<G, V>>) -> Self {
        self.peer = Some(satellite);
        self
    }

    /// Partition served by this station.
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// When the station started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Names of the hosted roles.
    pub fn roles(&self) -> Vec<&'static str> {
        let mut roles = Vec::new();
        if self.coordinator.is_some() {
            roles.push("coordinator");
        }
        if self.polling_coordinator.is_some() {
            roles.push("polling_coordinator");
        }
        if self.mediated.is_some() {
            roles.push("mediated_satellite");
        }
        if self.peer.is_some() {
            roles.push("peer_satellite");
        }
        roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraversalConfig;
    use crate::store::InMemoryPartition;

    #[test]
    fn test_roles_follow_builders() {
        let partition = PartitionId(2);
        let peer = Arc::new(PeerSatellite::new(
            Arc::new(InMemoryPartition::new(partition)),
            TraversalConfig::default(),
            (),
        ));
        let state: StationState<InMemoryPartition, ()> = StationState::new(partition)
            .with_peer(peer)
            .with_polling_coordinator(Arc::new(PollingCoordinator::new(
                partition,
                TraversalConfig::default(),
            )));
        assert_eq!(state.roles(), vec!["polling_coordinator", "peer_satellite"]);
        assert_eq!(state.partition(), partition);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(StationRole::from_str("Mediated"), Some(StationRole::Mediated));
        assert_eq!(StationRole::from_str("peer"), Some(StationRole::Polling));
        assert_eq!(StationRole::from_str("gossip"), None);
    }
}
