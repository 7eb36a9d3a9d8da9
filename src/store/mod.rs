//! Graph accessors.
//!
//! A station only ever dereferences the elements of its own partition.
//! The traversal core reads the graph exclusively through
//! [`GraphAccessor`]; persistence and iteration belong to the storage
//! layer behind it.

pub mod memory;

use async_trait::async_trait;

use crate::types::{Direction, EdgeId, ElementCounts, Incidence, PartitionId, VertexId};

/// Read-only view of one partition of the hypergraph.
///
/// Incidence lists are returned in the accessor's own iteration order; the
/// traversal imposes no further ordering.
#[async_trait]
pub trait GraphAccessor: Send + Sync {
    /// Error type for accessor operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Partition served by this accessor.
    fn partition(&self) -> PartitionId;

    /// Highest local vertex and edge ids on this partition.
    async fn element_counts(&self) -> Result<ElementCounts, Self::Error>;

    /// Whether a local vertex exists.
    async fn has_vertex(&self, vertex: VertexId) -> Result<bool, Self::Error>;

    /// Whether a local edge exists.
    async fn has_edge(&self, edge: EdgeId) -> Result<bool, Self::Error>;

    /// Incidences of a local vertex, optionally filtered by direction.
    async fn vertex_incidences(
        &self,
        vertex: VertexId,
        direction: Option<Direction>,
    ) -> Result<Vec<Incidence>, Self::Error>;

    /// Incidences of a local edge, optionally filtered by direction.
    async fn edge_incidences(
        &self,
        edge: EdgeId,
        direction: Option<Direction>,
    ) -> Result<Vec<Incidence>, Self::Error>;
}

pub use memory::{HypergraphBuilder, InMemoryError, InMemoryPartition};
