//! Station-to-station calls.
//!
//! Every role exposes a client trait with synchronous call semantics: the
//! caller awaits until the callee has executed the call (and applied its
//! side effect) on the owning station. Transports implement the traits:
//!
//! - [`local::InProcess`] calls a station living in the same process.
//! - `http::HttpStation` (feature `service`) speaks JSON over HTTP.
//!
//! Stubs are obtained by hostname through a [`Connector`] and kept per
//! partition in a [`StationDirectory`].

pub mod local;

#[cfg(feature = "service")]
pub mod http;
#[cfg(feature = "service")]
pub mod wire;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::ClusterConfig;
use crate::error::{ChannelError, TraversalError, TraversalResult};
use crate::mediated::RunReport;
use crate::polling::SatelliteStatus;
use crate::types::{EdgeId, ElementCounts, IncidenceId, PartitionId, VertexId};
use crate::visitor::VisitEvent;

/// Remote surface of the mediating coordinator.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    /// Run a traversal from `start`.
    async fn run(&self, start: VertexId) -> TraversalResult<RunReport>;

    /// Partition the coordinator lives on.
    async fn partition_id(&self) -> TraversalResult<PartitionId>;

    /// Test-and-mark an edge; `true` if this call discovered it.
    async fn test_and_process_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<bool>;

    /// Test-and-mark a vertex; `true` if this call discovered it.
    async fn test_and_process_vertex(
        &self,
        vertex: VertexId,
        via: IncidenceId,
    ) -> TraversalResult<bool>;

    /// Deliver a hook notification to the coordinator's visitor.
    async fn notify(&self, event: VisitEvent) -> TraversalResult<()>;
}

/// Remote surface of a satellite in the mediated protocol.
#[async_trait]
pub trait MediatedSatelliteClient: Send + Sync {
    /// Local element counts, used to size the coordinator's marks.
    async fn element_counts(&self) -> TraversalResult<ElementCounts>;

    /// Resolve the start vertex on its owning station.
    async fn process_root(&self, vertex: VertexId) -> TraversalResult<()>;

    /// Expand a discovered vertex.
    async fn process_vertex(&self, vertex: VertexId) -> TraversalResult<()>;

    /// Expand a discovered edge owned by this station, skipping `via`.
    async fn process_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<()>;
}

/// Remote surface of a satellite in the polling protocol.
#[async_trait]
pub trait PeerSatelliteClient: Send + Sync {
    /// Mark and enqueue the start vertex.
    async fn enqueue_root(&self, vertex: VertexId) -> TraversalResult<()>;

    /// Test-and-mark a local edge, enqueueing it on discovery.
    async fn test_and_enqueue_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<bool>;

    /// Test-and-mark a local vertex, enqueueing it on discovery.
    async fn test_and_enqueue_vertex(
        &self,
        vertex: VertexId,
        via: IncidenceId,
    ) -> TraversalResult<bool>;

    /// Whether the satellite is draining or holds pending work.
    async fn is_working(&self) -> TraversalResult<bool>;

    /// Detailed status for termination detection.
    async fn status(&self) -> TraversalResult<SatelliteStatus>;

    /// Stop the satellite's loop.
    async fn stop(&self) -> TraversalResult<()>;
}

/// Partition → client stub.
pub struct StationDirectory<C: ?Sized> {
    stations: RwLock<BTreeMap<PartitionId, Arc<C>>>,
}

impl<C: ?Sized> StationDirectory<C> {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            stations: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register (or replace) the stub for a partition.
    pub fn register(&self, partition: PartitionId, client: Arc<C>) {
        self.stations.write().insert(partition, client);
    }

    /// Stub for a partition.
    pub fn get(&self, partition: PartitionId) -> TraversalResult<Arc<C>> {
        self.stations
            .read()
            .get(&partition)
            .cloned()
            .ok_or(TraversalError::UnknownPartition(partition))
    }

    /// Registered partitions in ascending order.
    pub fn partitions(&self) -> Vec<PartitionId> {
        self.stations.read().keys().copied().collect()
    }

    /// Snapshot of every registered stub.
    pub fn all(&self) -> Vec<(PartitionId, Arc<C>)> {
        self.stations
            .read()
            .iter()
            .map(|(p, c)| (*p, Arc::clone(c)))
            .collect()
    }

    /// Number of registered stations.
    pub fn len(&self) -> usize {
        self.stations.read().len()
    }

    /// Whether no station is registered.
    pub fn is_empty(&self) -> bool {
        self.stations.read().is_empty()
    }
}

impl<C: ?Sized> Default for StationDirectory<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates client stubs for named stations.
#[async_trait]
pub trait Connector<C: ?Sized + Send + Sync>: Send + Sync {
    /// Create a stub for the station at `hostname`.
    async fn connect(&self, hostname: &str) -> Result<Arc<C>, ChannelError>;
}

/// Partition → hostname resolution.
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
    hosts: BTreeMap<PartitionId, String>,
}

impl StationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the hostname serving a partition.
    pub fn insert(&mut self, partition: PartitionId, hostname: impl Into<String>) {
        self.hosts.insert(partition, hostname.into());
    }

    /// Hostname serving a partition.
    pub fn hostname(&self, partition: PartitionId) -> TraversalResult<&str> {
        self.hosts
            .get(&partition)
            .map(String::as_str)
            .ok_or(TraversalError::UnknownPartition(partition))
    }

    /// Known partitions.
    pub fn partitions(&self) -> Vec<PartitionId> {
        self.hosts.keys().copied().collect()
    }

    /// Connect to the station of one partition.
    pub async fn connect<C>(
        &self,
        connector: &dyn Connector<C>,
        partition: PartitionId,
    ) -> TraversalResult<Arc<C>>
    where
        C: ?Sized + Send + Sync,
    {
        let host = self.hostname(partition)?;
        Ok(connector.connect(host).await?)
    }

    /// Connect to every known station and register the stubs.
    pub async fn connect_all<C>(
        &self,
        connector: &dyn Connector<C>,
        directory: &StationDirectory<C>,
    ) -> TraversalResult<()>
    where
        C: ?Sized + Send + Sync,
    {
        for (partition, host) in &self.hosts {
            let client = connector.connect(host).await?;
            tracing::debug!(partition = %partition, host = %host, "Station stub created");
            directory.register(*partition, client);
        }
        Ok(())
    }
}

impl From<&ClusterConfig> for StationRegistry {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            hosts: config.stations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::local::InProcessConnector;

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Station(String);

    impl Named for Station {
        fn name(&self) -> &str {
            &self.0
        }
    }

    #[test]
    fn test_directory_lookup() {
        let directory: StationDirectory<dyn Named> = StationDirectory::new();
        assert!(directory.is_empty());
        directory.register(PartitionId(1), Arc::new(Station("b".into())));
        directory.register(PartitionId(0), Arc::new(Station("a".into())));

        assert_eq!(directory.partitions(), vec![PartitionId(0), PartitionId(1)]);
        assert_eq!(directory.get(PartitionId(1)).unwrap().name(), "b");
        assert!(matches!(
            directory.get(PartitionId(2)),
            Err(TraversalError::UnknownPartition(PartitionId(2)))
        ));
    }

    #[tokio::test]
    async fn test_registry_connects_by_hostname() {
        let connector: InProcessConnector<dyn Named> = InProcessConnector::new();
        connector.register("alpha:1", Arc::new(Station("alpha".into())));
        connector.register("beta:1", Arc::new(Station("beta".into())));

        let mut registry = StationRegistry::new();
        registry.insert(PartitionId(0), "alpha:1");
        registry.insert(PartitionId(1), "beta:1");

        let directory = StationDirectory::new();
        registry.connect_all(&connector, &directory).await.unwrap();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.get(PartitionId(1)).unwrap().name(), "beta");

        let single = registry.connect(&connector, PartitionId(0)).await.unwrap();
        assert_eq!(single.name(), "alpha");
    }

    #[tokio::test]
    async fn test_registry_unknown_host_fails() {
        let connector: InProcessConnector<dyn Named> = InProcessConnector::new();
        let mut registry = StationRegistry::new();
        registry.insert(PartitionId(0), "nowhere:1");

        let directory = StationDirectory::new();
        let err = registry.connect_all(&connector, &directory).await.unwrap_err();
        assert!(matches!(err, TraversalError::Channel(ChannelError::UnknownHost(_))));
        assert!(matches!(
            registry.hostname(PartitionId(9)),
            Err(TraversalError::UnknownPartition(_))
        ));
    }
}
