//! Visited marks.
//!
//! Marks are kept per partition in two fixed-size arrays indexed by local
//! id (slot 0 is the unmarked sentinel). A mark is written at most once:
//! the first caller of [`MarkTable::test_and_set`] wins, every later caller
//! observes the element as already discovered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::{EdgeId, Element, IncidenceId, PartitionId, VertexId};
use crate::error::{TraversalError, TraversalResult};

/// Number of vertices and edges stored on one partition.
///
/// Local ids on that partition range over `1..=vertices` and `1..=edges`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementCounts {
    /// Highest vertex local id.
    pub vertices: u32,
    /// Highest edge local id.
    pub edges: u32,
}

impl ElementCounts {
    /// Create element counts.
    pub fn new(vertices: u32, edges: u32) -> Self {
        Self { vertices, edges }
    }
}

/// Discovery state of a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "incidence", rename_all = "snake_case")]
pub enum Mark {
    /// Not (yet) reached.
    Undiscovered,
    /// The run's start vertex.
    Root,
    /// Discovered through the given tree incidence.
    Tree(IncidenceId),
}

impl Mark {
    /// Whether the element has been discovered.
    pub fn is_discovered(&self) -> bool {
        !matches!(self, Self::Undiscovered)
    }

    /// The tree incidence that discovered the element, if any.
    pub fn discoverer(&self) -> Option<IncidenceId> {
        match self {
            Self::Tree(inc) => Some(*inc),
            _ => None,
        }
    }
}

impl Default for Mark {
    fn default() -> Self {
        Self::Undiscovered
    }
}

/// Marking arrays for the elements owned by one partition.
#[derive(Debug, Clone)]
pub struct MarkTable {
    partition: PartitionId,
    vertices: Vec<Mark>,
    edges: Vec<Mark>,
}

impl MarkTable {
    /// Allocate marks for a partition, one slot per local id plus the sentinel.
    pub fn new(partition: PartitionId, counts: ElementCounts) -> Self {
        Self {
            partition,
            vertices: vec![Mark::Undiscovered; counts.vertices as usize + 1],
            edges: vec![Mark::Undiscovered; counts.edges as usize + 1],
        }
    }

    /// Partition these marks belong to.
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Counts the table was sized from.
    pub fn counts(&self) -> ElementCounts {
        ElementCounts::new(
            (self.vertices.len() - 1) as u32,
            (self.edges.len() - 1) as u32,
        )
    }

    /// Current mark of an element.
    pub fn get(&self, element: Element) -> TraversalResult<Mark> {
        let (slots, index) = self.slot(element)?;
        Ok(match slots {
            Slots::Vertices => self.vertices[index],
            Slots::Edges => self.edges[index],
        })
    }

    /// Atomically (with respect to `&mut self`) test and mark an element.
    ///
    /// Returns `true` when this call discovered the element.
    pub fn test_and_set(&mut self, element: Element, mark: Mark) -> TraversalResult<bool> {
        let (slots, index) = self.slot(element)?;
        let entry = match slots {
            Slots::Vertices => &mut self.vertices[index],
            Slots::Edges => &mut self.edges[index],
        };
        if entry.is_discovered() {
            return Ok(false);
        }
        *entry = mark;
        Ok(true)
    }

    /// Number of discovered vertices and edges.
    pub fn discovered(&self) -> (usize, usize) {
        let count = |marks: &[Mark]| marks.iter().filter(|m| m.is_discovered()).count();
        (count(&self.vertices), count(&self.edges))
    }

    /// All discovered elements with their marks, vertices first.
    pub fn iter_discovered(&self) -> impl Iterator<Item = (Element, Mark)> + '_ {
        let partition = self.partition;
        let vertices = self
            .vertices
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_discovered())
            .map(move |(i, m)| (Element::Vertex(VertexId::new(partition, i as u32)), *m));
        let edges = self
            .edges
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_discovered())
            .map(move |(i, m)| (Element::Edge(EdgeId::new(partition, i as u32)), *m));
        vertices.chain(edges)
    }

    fn slot(&self, element: Element) -> TraversalResult<(Slots, usize)> {
        if element.partition() != self.partition {
            return Err(TraversalError::WrongPartition {
                element,
                station: self.partition,
            });
        }
        let (slots, len) = match element {
            Element::Vertex(_) => (Slots::Vertices, self.vertices.len()),
            Element::Edge(_) => (Slots::Edges, self.edges.len()),
        };
        let index = element.global().local_of() as usize;
        if index == 0 || index >= len {
            return Err(TraversalError::OutOfRange {
                element,
                partition: self.partition,
                capacity: (len - 1) as u32,
            });
        }
        Ok((slots, index))
    }
}

#[derive(Debug, Clone, Copy)]
enum Slots {
    Vertices,
    Edges,
}

/// Marks for every partition of the graph, as held by a mediating coordinator.
#[derive(Debug, Clone, Default)]
pub struct GlobalMarks {
    tables: BTreeMap<PartitionId, MarkTable>,
}

impl GlobalMarks {
    /// Create an empty set of tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the table for one partition.
    pub fn insert(&mut self, table: MarkTable) {
        self.tables.insert(table.partition(), table);
    }

    /// Whether no partition has been sized yet.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Current mark of an element.
    pub fn get(&self, element: Element) -> TraversalResult<Mark> {
        self.table(element.partition())?.get(element)
    }

    /// Test and mark an element on its owning partition's table.
    pub fn test_and_set(&mut self, element: Element, mark: Mark) -> TraversalResult<bool> {
        let partition = element.partition();
        self.tables
            .get_mut(&partition)
            .ok_or(TraversalError::UnknownPartition(partition))?
            .test_and_set(element, mark)
    }

    /// Total discovered vertices and edges across partitions.
    pub fn discovered(&self) -> (usize, usize) {
        self.tables
            .values()
            .map(MarkTable::discovered)
            .fold((0, 0), |acc, d| (acc.0 + d.0, acc.1 + d.1))
    }

    /// All discovered elements across partitions.
    pub fn iter_discovered(&self) -> impl Iterator<Item = (Element, Mark)> + '_ {
        self.tables.values().flat_map(|t| t.iter_discovered())
    }

    fn table(&self, partition: PartitionId) -> TraversalResult<&MarkTable> {
        self.tables
            .get(&partition)
            .ok_or(TraversalError::UnknownPartition(partition))
    }
}
