//! Mediated satellite: a stateless expansion worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::{CoordinatorClient, MediatedSatelliteClient, StationDirectory};
use crate::error::{TraversalError, TraversalResult};
use crate::store::GraphAccessor;
use crate::types::{
    EdgeId, Element, ElementCounts, IncidenceId, PartitionId, TraversalDirection, VertexId,
};

/// Counters of one mediated satellite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionStats {
    /// Vertices expanded.
    pub vertices: u64,
    /// Edges expanded.
    pub edges: u64,
    /// Test calls sent to the coordinator.
    pub coordinator_calls: u64,
    /// Edge expansions forwarded to another satellite.
    pub forwarded_edges: u64,
}

#[derive(Default)]
struct Counters {
    vertices: AtomicU64,
    edges: AtomicU64,
    coordinator_calls: AtomicU64,
    forwarded_edges: AtomicU64,
}

/// Satellite of the mediated protocol.
///
/// Holds no marks: every discovery decision is a call to the coordinator.
pub struct MediatedSatellite<G> {
    partition: PartitionId,
    accessor: Arc<G>,
    direction: TraversalDirection,
    coordinator: Arc<dyn CoordinatorClient>,
    peers: StationDirectory<dyn MediatedSatelliteClient>,
    counters: Counters,
}

impl<G: GraphAccessor> MediatedSatellite<G> {
    /// Create a satellite reporting to `coordinator`.
    pub fn new(
        accessor: Arc<G>,
        direction: TraversalDirection,
        coordinator: Arc<dyn CoordinatorClient>,
    ) -> Self {
        Self {
            partition: accessor.partition(),
            accessor,
            direction,
            coordinator,
            peers: StationDirectory::new(),
            counters: Counters::default(),
        }
    }

    /// Partition owned by this satellite.
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Stubs of the other satellites, used to forward edge expansions.
    pub fn peers(&self) -> &StationDirectory<dyn MediatedSatelliteClient> {
        &self.peers
    }

    /// Counters.
    pub fn stats(&self) -> ExpansionStats {
        ExpansionStats {
            vertices: self.counters.vertices.load(Ordering::Relaxed),
            edges: self.counters.edges.load(Ordering::Relaxed),
            coordinator_calls: self.counters.coordinator_calls.load(Ordering::Relaxed),
            forwarded_edges: self.counters.forwarded_edges.load(Ordering::Relaxed),
        }
    }

    /// Local element counts.
    pub async fn element_counts(&self) -> TraversalResult<ElementCounts> {
        self.accessor
            .element_counts()
            .await
            .map_err(TraversalError::from_accessor)
    }

    /// Check that the start vertex lives here.
    pub async fn process_root(&self, vertex: VertexId) -> TraversalResult<()> {
        self.ensure_owned(Element::Vertex(vertex))?;
        let exists = self
            .accessor
            .has_vertex(vertex)
            .await
            .map_err(TraversalError::from_accessor)?;
        if !exists {
            return Err(TraversalError::VertexNotFound(vertex));
        }
        Ok(())
    }

    /// Expand a vertex: test every incident edge, expand the ones won.
    pub async fn process_vertex(&self, vertex: VertexId) -> TraversalResult<()> {
        self.ensure_owned(Element::Vertex(vertex))?;
        let incidences = self
            .accessor
            .vertex_incidences(vertex, self.direction.from_vertex())
            .await
            .map_err(TraversalError::from_accessor)?;
        self.counters.vertices.fetch_add(1, Ordering::Relaxed);
        debug!(vertex = %vertex, incidences = incidences.len(), "Expanding vertex");

        for inc in incidences {
            self.counters.coordinator_calls.fetch_add(1, Ordering::Relaxed);
            if !self.coordinator.test_and_process_edge(inc.edge, inc.id).await? {
                continue;
            }
            if inc.edge.partition() == self.partition {
                self.process_edge(inc.edge, inc.id).await?;
            } else {
                let owner = self.peers.get(inc.edge.partition())?;
                self.counters.forwarded_edges.fetch_add(1, Ordering::Relaxed);
                owner.process_edge(inc.edge, inc.id).await?;
            }
        }
        Ok(())
    }

    /// Expand an edge: test every endpoint except the arriving incidence.
    pub async fn process_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<()> {
        self.ensure_owned(Element::Edge(edge))?;
        let incidences = self
            .accessor
            .edge_incidences(edge, self.direction.from_edge())
            .await
            .map_err(TraversalError::from_accessor)?;
        self.counters.edges.fetch_add(1, Ordering::Relaxed);
        debug!(edge = %edge, via = %via, incidences = incidences.len(), "Expanding edge");

        for inc in incidences.into_iter().filter(|inc| inc.id != via) {
            self.counters.coordinator_calls.fetch_add(1, Ordering::Relaxed);
            self.coordinator
                .test_and_process_vertex(inc.vertex, inc.id)
                .await?;
        }
        Ok(())
    }

    fn ensure_owned(&self, element: Element) -> TraversalResult<()> {
        if element.partition() != self.partition {
            return Err(TraversalError::WrongPartition {
                element,
                station: self.partition,
            });
        }
        Ok(())
    }
}
