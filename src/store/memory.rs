//! In-memory partitioned hypergraph.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::GraphAccessor;
use crate::types::{
    Direction, EdgeId, ElementCounts, Incidence, IncidenceId, PartitionId, VertexId,
};

/// Error type for the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InMemoryError {
    /// Vertex id belongs to another partition.
    #[error("Vertex {vertex} is not stored on partition {partition}")]
    ForeignVertex {
        /// Requested vertex.
        vertex: VertexId,
        /// Partition that was asked.
        partition: PartitionId,
    },
    /// Edge id belongs to another partition.
    #[error("Edge {edge} is not stored on partition {partition}")]
    ForeignEdge {
        /// Requested edge.
        edge: EdgeId,
        /// Partition that was asked.
        partition: PartitionId,
    },
    /// Vertex not found.
    #[error("Vertex not found: {0}")]
    VertexNotFound(VertexId),
    /// Edge not found.
    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),
    /// Partition outside the builder's range.
    #[error("Partition {0} does not exist")]
    UnknownPartition(PartitionId),
}

/// One partition's slice of a hypergraph, held in memory.
///
/// Uses BTreeMaps keyed by local id for deterministic iteration; each
/// element's incidence list keeps insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryPartition {
    partition: PartitionId,
    vertices: BTreeMap<u32, Vec<Incidence>>,
    edges: BTreeMap<u32, Vec<Incidence>>,
}

impl InMemoryPartition {
    /// Create an empty partition.
    pub fn new(partition: PartitionId) -> Self {
        Self {
            partition,
            vertices: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    /// Load a partition from its JSON dump.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Dump the partition as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Number of local vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of local edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Local vertex ids.
    pub fn vertex_ids(&self) -> Vec<VertexId> {
        self.vertices
            .keys()
            .map(|l| VertexId::new(self.partition, *l))
            .collect()
    }

    /// Local edge ids.
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges
            .keys()
            .map(|l| EdgeId::new(self.partition, *l))
            .collect()
    }

    fn add_vertex(&mut self) -> VertexId {
        let local = self.vertices.keys().next_back().map_or(1, |l| l + 1);
        self.vertices.insert(local, Vec::new());
        VertexId::new(self.partition, local)
    }

    fn add_edge(&mut self) -> EdgeId {
        let local = self.edges.keys().next_back().map_or(1, |l| l + 1);
        self.edges.insert(local, Vec::new());
        EdgeId::new(self.partition, local)
    }

    fn local_vertex(&self, vertex: VertexId) -> Result<&Vec<Incidence>, InMemoryError> {
        if vertex.partition() != self.partition {
            return Err(InMemoryError::ForeignVertex {
                vertex,
                partition: self.partition,
            });
        }
        self.vertices
            .get(&vertex.local())
            .ok_or(InMemoryError::VertexNotFound(vertex))
    }

    fn local_edge(&self, edge: EdgeId) -> Result<&Vec<Incidence>, InMemoryError> {
        if edge.partition() != self.partition {
            return Err(InMemoryError::ForeignEdge {
                edge,
                partition: self.partition,
            });
        }
        self.edges
            .get(&edge.local())
            .ok_or(InMemoryError::EdgeNotFound(edge))
    }
}

#[async_trait]
impl GraphAccessor for InMemoryPartition {
    type Error = InMemoryError;

    fn partition(&self) -> PartitionId {
        self.partition
    }

    async fn element_counts(&self) -> Result<ElementCounts, Self::Error> {
        Ok(ElementCounts::new(
            self.vertices.keys().next_back().copied().unwrap_or(0),
            self.edges.keys().next_back().copied().unwrap_or(0),
        ))
    }

    async fn has_vertex(&self, vertex: VertexId) -> Result<bool, Self::Error> {
        Ok(vertex.partition() == self.partition && self.vertices.contains_key(&vertex.local()))
    }

    async fn has_edge(&self, edge: EdgeId) -> Result<bool, Self::Error> {
        Ok(edge.partition() == self.partition && self.edges.contains_key(&edge.local()))
    }

    async fn vertex_incidences(
        &self,
        vertex: VertexId,
        direction: Option<Direction>,
    ) -> Result<Vec<Incidence>, Self::Error> {
        Ok(self
            .local_vertex(vertex)?
            .iter()
            .filter(|inc| inc.matches(direction))
            .copied()
            .collect())
    }

    async fn edge_incidences(
        &self,
        edge: EdgeId,
        direction: Option<Direction>,
    ) -> Result<Vec<Incidence>, Self::Error> {
        Ok(self
            .local_edge(edge)?
            .iter()
            .filter(|inc| inc.matches(direction))
            .copied()
            .collect())
    }
}

/// Builds a hypergraph and splits it into partitions as it goes.
///
/// Every element is placed on the partition the caller names. An incidence
/// takes its id from the vertex's partition and is recorded on both the
/// vertex's and the edge's partition.
#[derive(Debug, Clone)]
pub struct HypergraphBuilder {
    partitions: Vec<InMemoryPartition>,
    next_incidence: Vec<u32>,
}

impl HypergraphBuilder {
    /// Create a builder for `count` partitions numbered `0..count`.
    pub fn new(count: u16) -> Self {
        Self {
            partitions: (0..count).map(|p| InMemoryPartition::new(PartitionId(p))).collect(),
            next_incidence: vec![1; count as usize],
        }
    }

    /// Number of partitions.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Add a vertex to a partition.
    pub fn add_vertex(&mut self, partition: PartitionId) -> Result<VertexId, InMemoryError> {
        Ok(self.slot(partition)?.add_vertex())
    }

    /// Add an edge to a partition.
    pub fn add_edge(&mut self, partition: PartitionId) -> Result<EdgeId, InMemoryError> {
        Ok(self.slot(partition)?.add_edge())
    }

    /// Connect a vertex and an edge.
    pub fn connect(
        &mut self,
        vertex: VertexId,
        edge: EdgeId,
        direction: Direction,
    ) -> Result<IncidenceId, InMemoryError> {
        let vertex_part = vertex.partition();
        let edge_part = edge.partition();
        if !self.slot(vertex_part)?.vertices.contains_key(&vertex.local()) {
            return Err(InMemoryError::VertexNotFound(vertex));
        }
        if !self.slot(edge_part)?.edges.contains_key(&edge.local()) {
            return Err(InMemoryError::EdgeNotFound(edge));
        }

        let counter = &mut self.next_incidence[vertex_part.0 as usize];
        let id = IncidenceId::new(vertex_part, *counter);
        *counter += 1;

        let incidence = Incidence::new(id, vertex, edge, direction);
        self.slot(vertex_part)?
            .vertices
            .entry(vertex.local())
            .or_default()
            .push(incidence);
        self.slot(edge_part)?
            .edges
            .entry(edge.local())
            .or_default()
            .push(incidence);
        Ok(id)
    }

    /// Add a binary directed edge `from → to` on `partition`.
    pub fn link(
        &mut self,
        partition: PartitionId,
        from: VertexId,
        to: VertexId,
    ) -> Result<EdgeId, InMemoryError> {
        let edge = self.add_edge(partition)?;
        self.connect(from, edge, Direction::VertexToEdge)?;
        self.connect(to, edge, Direction::EdgeToVertex)?;
        Ok(edge)
    }

    /// Finish building and return the partitions in id order.
    pub fn build(self) -> Vec<InMemoryPartition> {
        self.partitions
    }

    fn slot(&mut self, partition: PartitionId) -> Result<&mut InMemoryPartition, InMemoryError> {
        self.partitions
            .get_mut(partition.0 as usize)
            .ok_or(InMemoryError::UnknownPartition(partition))
    }
}
