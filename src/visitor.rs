//! Visitor hooks.
//!
//! Traversals call a [`Visitor`] at fixed points; the visitor carries no
//! traversal logic. Hooks fire on the station that owns the marking
//! decision (the coordinator in the mediated protocol, the element's owner
//! in the polling protocol) inside the same critical section as the mark,
//! so a visitor never sees two tree events for one element.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::types::{EdgeId, Element, IncidenceId, Mark, VertexId};

/// Callbacks fired by a traversal. Every hook defaults to a no-op.
pub trait Visitor: Send {
    /// The start vertex was marked.
    fn on_root(&mut self, _vertex: VertexId) {}

    /// A vertex was discovered (also fired for the root).
    fn on_vertex(&mut self, _vertex: VertexId) {}

    /// An edge was discovered.
    fn on_edge(&mut self, _edge: EdgeId) {}

    /// `incidence` discovered `reached` for the first time.
    fn on_tree_incidence(&mut self, _incidence: IncidenceId, _reached: Element) {}

    /// `incidence` touched `reached`, which was already discovered.
    fn on_cross_incidence(&mut self, _incidence: IncidenceId, _reached: Element) {}
}

impl Visitor for () {}

impl<A: Visitor, B: Visitor> Visitor for (A, B) {
    fn on_root(&mut self, vertex: VertexId) {
        self.0.on_root(vertex);
        self.1.on_root(vertex);
    }

    fn on_vertex(&mut self, vertex: VertexId) {
        self.0.on_vertex(vertex);
        self.1.on_vertex(vertex);
    }

    fn on_edge(&mut self, edge: EdgeId) {
        self.0.on_edge(edge);
        self.1.on_edge(edge);
    }

    fn on_tree_incidence(&mut self, incidence: IncidenceId, reached: Element) {
        self.0.on_tree_incidence(incidence, reached);
        self.1.on_tree_incidence(incidence, reached);
    }

    fn on_cross_incidence(&mut self, incidence: IncidenceId, reached: Element) {
        self.0.on_cross_incidence(incidence, reached);
        self.1.on_cross_incidence(incidence, reached);
    }
}

/// A hook invocation as data, so it can travel over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "hook", rename_all = "snake_case")]
pub enum VisitEvent {
    /// `on_root`.
    Root {
        /// Start vertex.
        vertex: VertexId,
    },
    /// `on_vertex`.
    Vertex {
        /// Discovered vertex.
        vertex: VertexId,
    },
    /// `on_edge`.
    Edge {
        /// Discovered edge.
        edge: EdgeId,
    },
    /// `on_tree_incidence`.
    TreeIncidence {
        /// Discovering incidence.
        incidence: IncidenceId,
        /// Element it reached.
        reached: Element,
    },
    /// `on_cross_incidence`.
    CrossIncidence {
        /// Incidence that arrived late.
        incidence: IncidenceId,
        /// Element it reached.
        reached: Element,
    },
}

impl VisitEvent {
    /// Invoke the matching hook on a visitor.
    pub fn dispatch<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        match *self {
            Self::Root { vertex } => visitor.on_root(vertex),
            Self::Vertex { vertex } => visitor.on_vertex(vertex),
            Self::Edge { edge } => visitor.on_edge(edge),
            Self::TreeIncidence { incidence, reached } => {
                visitor.on_tree_incidence(incidence, reached)
            }
            Self::CrossIncidence { incidence, reached } => {
                visitor.on_cross_incidence(incidence, reached)
            }
        }
    }
}

/// Counts every hook invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingVisitor {
    /// `on_root` calls.
    pub roots: u64,
    /// `on_vertex` calls.
    pub vertices: u64,
    /// `on_edge` calls.
    pub edges: u64,
    /// `on_tree_incidence` calls.
    pub tree_incidences: u64,
    /// `on_cross_incidence` calls.
    pub cross_incidences: u64,
}

impl CountingVisitor {
    /// Create a zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Incidence visits seen so far (tree + cross).
    pub fn incidences_visited(&self) -> u64 {
        self.tree_incidences + self.cross_incidences
    }

    /// Add another station's counters to this one.
    pub fn merge(&mut self, other: &Self) {
        self.roots += other.roots;
        self.vertices += other.vertices;
        self.edges += other.edges;
        self.tree_incidences += other.tree_incidences;
        self.cross_incidences += other.cross_incidences;
    }
}

impl Visitor for CountingVisitor {
    fn on_root(&mut self, _vertex: VertexId) {
        self.roots += 1;
    }

    fn on_vertex(&mut self, _vertex: VertexId) {
        self.vertices += 1;
    }

    fn on_edge(&mut self, _edge: EdgeId) {
        self.edges += 1;
    }

    fn on_tree_incidence(&mut self, _incidence: IncidenceId, _reached: Element) {
        self.tree_incidences += 1;
    }

    fn on_cross_incidence(&mut self, _incidence: IncidenceId, _reached: Element) {
        self.cross_incidences += 1;
    }
}

/// Records every hook invocation in order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<VisitEvent>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events.
    pub fn events(&self) -> &[VisitEvent] {
        &self.events
    }

    /// Vertices in the order `on_vertex` saw them.
    pub fn vertex_order(&self) -> Vec<VertexId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                VisitEvent::Vertex { vertex } => Some(*vertex),
                _ => None,
            })
            .collect()
    }
}

impl Visitor for EventLog {
    fn on_root(&mut self, vertex: VertexId) {
        self.events.push(VisitEvent::Root { vertex });
    }

    fn on_vertex(&mut self, vertex: VertexId) {
        self.events.push(VisitEvent::Vertex { vertex });
    }

    fn on_edge(&mut self, edge: EdgeId) {
        self.events.push(VisitEvent::Edge { edge });
    }

    fn on_tree_incidence(&mut self, incidence: IncidenceId, reached: Element) {
        self.events.push(VisitEvent::TreeIncidence { incidence, reached });
    }

    fn on_cross_incidence(&mut self, incidence: IncidenceId, reached: Element) {
        self.events.push(VisitEvent::CrossIncidence { incidence, reached });
    }
}

/// Extracts the spanning forest: one parent pointer per discovered element
/// plus the set of cross classifications.
#[derive(Debug, Clone, Default)]
pub struct SpanningForest {
    parents: BTreeMap<Element, Mark>,
    cross: BTreeSet<(IncidenceId, Element)>,
}

impl SpanningForest {
    /// Create an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parent mark of an element (`None` if never discovered).
    pub fn parent(&self, element: Element) -> Option<Mark> {
        self.parents.get(&element).copied()
    }

    /// Discovered elements with their parent marks.
    pub fn parents(&self) -> &BTreeMap<Element, Mark> {
        &self.parents
    }

    /// Cross classifications.
    pub fn cross(&self) -> &BTreeSet<(IncidenceId, Element)> {
        &self.cross
    }

    /// Incidences that belong to the forest.
    pub fn tree_incidences(&self) -> BTreeSet<IncidenceId> {
        self.parents.values().filter_map(Mark::discoverer).collect()
    }

    /// Discovered vertices.
    pub fn vertices(&self) -> BTreeSet<VertexId> {
        self.parents
            .keys()
            .filter_map(|e| match e {
                Element::Vertex(v) => Some(*v),
                Element::Edge(_) => None,
            })
            .collect()
    }

    /// Discovered edges.
    pub fn edges(&self) -> BTreeSet<EdgeId> {
        self.parents
            .keys()
            .filter_map(|e| match e {
                Element::Edge(edge) => Some(*edge),
                Element::Vertex(_) => None,
            })
            .collect()
    }

    /// Fold another station's partial forest into this one.
    pub fn merge(&mut self, other: &Self) {
        self.parents.extend(other.parents.iter().map(|(k, v)| (*k, *v)));
        self.cross.extend(other.cross.iter().copied());
    }

    /// Order-independent snapshot of the classification.
    pub fn classification(&self) -> Classification {
        Classification {
            tree: self.parents.iter().map(|(k, v)| (*k, *v)).collect(),
            cross: self.cross.iter().copied().collect(),
        }
    }
}

impl Visitor for SpanningForest {
    fn on_root(&mut self, vertex: VertexId) {
        self.parents.insert(Element::Vertex(vertex), Mark::Root);
    }

    fn on_tree_incidence(&mut self, incidence: IncidenceId, reached: Element) {
        self.parents.insert(reached, Mark::Tree(incidence));
    }

    fn on_cross_incidence(&mut self, incidence: IncidenceId, reached: Element) {
        self.cross.insert((incidence, reached));
    }
}

/// TREE/CROSS classification of a finished run, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Discovered elements with their parent marks, sorted by element.
    pub tree: Vec<(Element, Mark)>,
    /// Cross classifications, sorted.
    pub cross: Vec<(IncidenceId, Element)>,
}

impl Classification {
    /// Stable hash of the classification, for comparing runs.
    pub fn fingerprint(&self) -> String {
        canonical_hash_hex(self)
    }
}
