//! In-process transport.
//!
//! Stations of one process call each other directly. Stubs hold a weak
//! reference so that mutually registered stations do not keep each other
//! alive; calling a dropped station is [`ChannelError::Unavailable`].

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    Connector, CoordinatorClient, MediatedSatelliteClient, PeerSatelliteClient,
};
use crate::error::{ChannelError, TraversalResult};
use crate::mediated::{Coordinator, MediatedSatellite, RunReport};
use crate::polling::{PeerSatellite, SatelliteStatus};
use crate::store::GraphAccessor;
use crate::types::{EdgeId, ElementCounts, IncidenceId, PartitionId, VertexId};
use crate::visitor::{VisitEvent, Visitor};

/// Stub for a station living in this process.
pub struct InProcess<T> {
    target: Weak<T>,
}

impl<T> InProcess<T> {
    /// Create a stub for `target`.
    pub fn new(target: &Arc<T>) -> Self {
        Self {
            target: Arc::downgrade(target),
        }
    }

    fn station(&self) -> Result<Arc<T>, ChannelError> {
        self.target.upgrade().ok_or_else(|| {
            ChannelError::Unavailable(format!(
                "in-process {} was dropped",
                std::any::type_name::<T>()
            ))
        })
    }
}

impl<T> Clone for InProcess<T> {
    fn clone(&self) -> Self {
        Self {
            target: Weak::clone(&self.target),
        }
    }
}

#[async_trait]
impl<V: Visitor + 'static> CoordinatorClient for InProcess<Coordinator<V>> {
    async fn run(&self, start: VertexId) -> TraversalResult<RunReport> {
        let coordinator = self.station()?;
        coordinator.run(start).await
    }

    async fn partition_id(&self) -> TraversalResult<PartitionId> {
        Ok(self.station()?.partition_id())
    }

    async fn test_and_process_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<bool> {
        self.station()?.test_and_process_edge(edge, via)
    }

    async fn test_and_process_vertex(
        &self,
        vertex: VertexId,
        via: IncidenceId,
    ) -> TraversalResult<bool> {
        self.station()?.test_and_process_vertex(vertex, via)
    }

    async fn notify(&self, event: VisitEvent) -> TraversalResult<()> {
        self.station()?.notify(event);
        Ok(())
    }
}

#[async_trait]
impl<G: GraphAccessor + 'static> MediatedSatelliteClient for InProcess<MediatedSatellite<G>> {
    async fn element_counts(&self) -> TraversalResult<ElementCounts> {
        let satellite = self.station()?;
        satellite.element_counts().await
    }

    async fn process_root(&self, vertex: VertexId) -> TraversalResult<()> {
        let satellite = self.station()?;
        satellite.process_root(vertex).await
    }

    async fn process_vertex(&self, vertex: VertexId) -> TraversalResult<()> {
        let satellite = self.station()?;
        satellite.process_vertex(vertex).await
    }

    async fn process_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<()> {
        let satellite = self.station()?;
        satellite.process_edge(edge, via).await
    }
}

#[async_trait]
impl<G, V> PeerSatelliteClient for InProcess<PeerSatellite<G, V>>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    async fn enqueue_root(&self, vertex: VertexId) -> TraversalResult<()> {
        let satellite = self.station()?;
        satellite.enqueue_root(vertex).await
    }

    async fn test_and_enqueue_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<bool> {
        self.station()?.test_and_enqueue_edge(edge, via)
    }

    async fn test_and_enqueue_vertex(
        &self,
        vertex: VertexId,
        via: IncidenceId,
    ) -> TraversalResult<bool> {
        self.station()?.test_and_enqueue_vertex(vertex, via)
    }

    async fn is_working(&self) -> TraversalResult<bool> {
        self.station()?.is_working()
    }

    async fn status(&self) -> TraversalResult<SatelliteStatus> {
        Ok(self.station()?.status())
    }

    async fn stop(&self) -> TraversalResult<()> {
        self.station()?.stop();
        Ok(())
    }
}

/// Hostname → in-process stub, for wiring a cluster by name.
pub struct InProcessConnector<C: ?Sized> {
    hosts: RwLock<HashMap<String, Arc<C>>>,
}

impl<C: ?Sized> InProcessConnector<C> {
    /// Create an empty connector.
    pub fn new() -> Self {
        Self {
            hosts: RwLock::new(HashMap::new()),
        }
    }

    /// Make `client` reachable under `hostname`.
    pub fn register(&self, hostname: impl Into<String>, client: Arc<C>) {
        self.hosts.write().insert(hostname.into(), client);
    }
}

impl<C: ?Sized> Default for InProcessConnector<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C: ?Sized + Send + Sync> Connector<C> for InProcessConnector<C> {
    async fn connect(&self, hostname: &str) -> Result<Arc<C>, ChannelError> {
        self.hosts
            .read()
            .get(hostname)
            .cloned()
            .ok_or_else(|| ChannelError::UnknownHost(hostname.to_string()))
    }
}
