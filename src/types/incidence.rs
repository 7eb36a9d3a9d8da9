//! Incidences: the directed links between vertices and (hyper)edges.

use serde::{Deserialize, Serialize};

use super::id::{EdgeId, IncidenceId, VertexId};

/// Direction of an incidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The vertex is a source of the edge.
    VertexToEdge,
    /// The vertex is a target of the edge.
    EdgeToVertex,
}

impl Direction {
    /// The reverse direction.
    pub fn opposite(&self) -> Self {
        match self {
            Self::VertexToEdge => Self::EdgeToVertex,
            Self::EdgeToVertex => Self::VertexToEdge,
        }
    }

    /// Parse direction from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "vertex_to_edge" | "out" => Some(Self::VertexToEdge),
            "edge_to_vertex" | "in" => Some(Self::EdgeToVertex),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VertexToEdge => write!(f, "vertex_to_edge"),
            Self::EdgeToVertex => write!(f, "edge_to_vertex"),
        }
    }
}

/// Which incidences a traversal follows.
///
/// From a vertex the sweep follows incidences in [`Self::from_vertex`];
/// from a freshly discovered edge it follows the opposite direction, so
/// `Forward` walks sources → edge → targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    /// Follow vertex→edge, then edge→vertex.
    Forward,
    /// Follow edge→vertex, then vertex→edge.
    Backward,
    /// Ignore incidence direction.
    Both,
}

impl TraversalDirection {
    /// Direction filter applied to a vertex's incidences.
    pub fn from_vertex(&self) -> Option<Direction> {
        match self {
            Self::Forward => Some(Direction::VertexToEdge),
            Self::Backward => Some(Direction::EdgeToVertex),
            Self::Both => None,
        }
    }

    /// Direction filter applied to an edge's incidences.
    pub fn from_edge(&self) -> Option<Direction> {
        self.from_vertex().map(|d| d.opposite())
    }

    /// Parse traversal direction from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "forward" => Some(Self::Forward),
            "backward" => Some(Self::Backward),
            "both" | "" => Some(Self::Both),
            _ => None,
        }
    }
}

impl Default for TraversalDirection {
    fn default() -> Self {
        Self::Both
    }
}

impl std::fmt::Display for TraversalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// Incidence between a vertex and an edge.
///
/// The incidence id lives in the vertex's partition; the record itself is
/// visible from both the vertex's and the edge's station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Incidence {
    /// Incidence identifier.
    pub id: IncidenceId,
    /// Vertex end.
    pub vertex: VertexId,
    /// Edge end.
    pub edge: EdgeId,
    /// Direction relative to the vertex.
    pub direction: Direction,
}

impl Incidence {
    /// Create a new incidence.
    pub fn new(id: IncidenceId, vertex: VertexId, edge: EdgeId, direction: Direction) -> Self {
        Self {
            id,
            vertex,
            edge,
            direction,
        }
    }

    /// Whether this incidence passes an optional direction filter.
    pub fn matches(&self, filter: Option<Direction>) -> bool {
        filter.map_or(true, |d| d == self.direction)
    }

    /// Whether the vertex and edge live on different partitions.
    pub fn crosses_partition(&self) -> bool {
        self.vertex.partition() != self.edge.partition()
    }
}
