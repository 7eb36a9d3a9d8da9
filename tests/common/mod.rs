//! Shared fixtures: an abstract hypergraph that can be split over any
//! number of partitions and mapped back to abstract indices afterwards.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use partitioned_traversal::{
    Direction, EdgeId, Element, HypergraphBuilder, IncidenceId, InMemoryPartition, Mark,
    PartitionId, SpanningForest, VertexId,
};

/// Partition-free description of a hypergraph.
///
/// `edges[i] = (partition hint, endpoints)`; the first endpoint is the
/// source, the rest are targets.
#[derive(Debug, Clone)]
pub struct Shape {
    pub vertex_parts: Vec<u16>,
    pub edges: Vec<(u16, Vec<usize>)>,
}

impl Shape {
    /// A tree: vertex `i > 0` either gets a fresh edge to an earlier vertex
    /// or joins an existing edge. `picks[i - 1] = (attach_to_edge, target)`.
    pub fn tree(vertex_parts: Vec<u16>, picks: &[(bool, usize)]) -> Self {
        let mut edges: Vec<(u16, Vec<usize>)> = Vec::new();
        for i in 1..vertex_parts.len() {
            let (join, target) = picks.get(i - 1).copied().unwrap_or((false, 0));
            if join && !edges.is_empty() {
                let e = target % edges.len();
                edges[e].1.push(i);
            } else {
                let hint = vertex_parts[i].wrapping_add(1);
                edges.push((hint, vec![target % i, i]));
            }
        }
        Self {
            vertex_parts,
            edges,
        }
    }

    /// Two rings joined by a chord, plus one vertex nothing reaches.
    pub fn rings() -> Self {
        let vertex_parts = vec![0, 1, 2, 0, 1, 2, 0, 1, 2];
        let edges = vec![
            (0, vec![0, 1]),
            (1, vec![1, 2]),
            (2, vec![2, 3]),
            (0, vec![3, 0]),
            (1, vec![3, 4, 5]),
            (2, vec![5, 6]),
            (0, vec![6, 7]),
            (1, vec![7, 4]),
        ];
        Self {
            vertex_parts,
            edges,
        }
    }

    fn incident_edges(&self, vertex: usize) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, (_, ends))| ends.contains(&vertex))
            .map(|(e, _)| e)
            .collect()
    }

    /// BFS levels (vertex hops) of every vertex reachable from `root`.
    pub fn levels(&self, root: usize) -> BTreeMap<usize, u32> {
        let mut levels = BTreeMap::from([(root, 0)]);
        let mut seen_edges = BTreeSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(v) = queue.pop_front() {
            let level = levels[&v];
            for e in self.incident_edges(v) {
                if !seen_edges.insert(e) {
                    continue;
                }
                for &w in &self.edges[e].1 {
                    levels.entry(w).or_insert_with(|| {
                        queue.push_back(w);
                        level + 1
                    });
                }
            }
        }
        levels
    }

    /// Edges reachable from `root`.
    pub fn reachable_edges(&self, root: usize) -> BTreeSet<usize> {
        self.levels(root)
            .keys()
            .flat_map(|&v| self.incident_edges(v))
            .collect()
    }

    /// Incidence visits a traversal from `root` makes: every incidence of a
    /// discovered vertex, and every incidence of a discovered edge except
    /// the one it arrived by.
    pub fn expected_visits(&self, root: usize) -> u64 {
        let vertex_side: usize = self
            .levels(root)
            .keys()
            .map(|&v| self.incident_edges(v).len())
            .sum();
        let edge_side: usize = self
            .reachable_edges(root)
            .iter()
            .map(|&e| self.edges[e].1.len() - 1)
            .sum();
        (vertex_side + edge_side) as u64
    }
}

/// A shape materialized over `count` partitions.
pub struct Fixture {
    pub partitions: Vec<InMemoryPartition>,
    pub vertices: Vec<VertexId>,
    pub edges: Vec<EdgeId>,
    pub incidences: Vec<IncidenceId>,
    incidence_ends: HashMap<IncidenceId, (VertexId, EdgeId)>,
}

impl Fixture {
    pub fn build(shape: &Shape, count: u16) -> Self {
        let mut builder = HypergraphBuilder::new(count);
        let vertices: Vec<_> = shape
            .vertex_parts
            .iter()
            .map(|p| builder.add_vertex(PartitionId(p % count)).unwrap())
            .collect();

        let mut edges = Vec::new();
        let mut incidences = Vec::new();
        let mut incidence_ends = HashMap::new();
        for (hint, ends) in &shape.edges {
            let edge = builder.add_edge(PartitionId(hint % count)).unwrap();
            for (i, &v) in ends.iter().enumerate() {
                let direction = if i == 0 {
                    Direction::VertexToEdge
                } else {
                    Direction::EdgeToVertex
                };
                let id = builder.connect(vertices[v], edge, direction).unwrap();
                incidences.push(id);
                incidence_ends.insert(id, (vertices[v], edge));
            }
            edges.push(edge);
        }

        Self {
            partitions: builder.build(),
            vertices,
            edges,
            incidences,
            incidence_ends,
        }
    }

    pub fn vertex_index(&self, vertex: VertexId) -> usize {
        self.vertices.iter().position(|v| *v == vertex).unwrap()
    }

    pub fn edge_index(&self, edge: EdgeId) -> usize {
        self.edges.iter().position(|e| *e == edge).unwrap()
    }

    pub fn incidence_index(&self, incidence: IncidenceId) -> usize {
        self.incidences.iter().position(|i| *i == incidence).unwrap()
    }

    /// Discovered vertices as abstract indices.
    pub fn abstract_vertices(&self, forest: &SpanningForest) -> BTreeSet<usize> {
        forest
            .vertices()
            .into_iter()
            .map(|v| self.vertex_index(v))
            .collect()
    }

    /// Tree incidences as abstract indices.
    pub fn abstract_tree(&self, forest: &SpanningForest) -> BTreeSet<usize> {
        forest
            .tree_incidences()
            .into_iter()
            .map(|i| self.incidence_index(i))
            .collect()
    }

    /// The element on the other side of the incidence that discovered
    /// `element`.
    pub fn parent_of(&self, element: Element, mark: Mark) -> Option<Element> {
        let via = mark.discoverer()?;
        let (vertex, edge) = self.incidence_ends[&via];
        match element {
            Element::Vertex(v) => {
                assert_eq!(v, vertex, "{via} does not touch {element}");
                Some(Element::Edge(edge))
            }
            Element::Edge(e) => {
                assert_eq!(e, edge, "{via} does not touch {element}");
                Some(Element::Vertex(vertex))
            }
        }
    }

    /// Assert the forest is a tree rooted at `root`: every parent pointer
    /// uses an incidence touching the element, and following parents
    /// reaches the root.
    pub fn assert_spanning_tree(&self, forest: &SpanningForest, root: VertexId) {
        let parents = forest.parents();
        assert_eq!(parents.get(&Element::Vertex(root)), Some(&Mark::Root));
        for (&element, &mark) in parents {
            let mut current = (element, mark);
            let mut steps = 0;
            while let Some(parent) = self.parent_of(current.0, current.1) {
                let parent_mark = *parents
                    .get(&parent)
                    .unwrap_or_else(|| panic!("parent {parent} of {element} never discovered"));
                current = (parent, parent_mark);
                steps += 1;
                assert!(steps <= parents.len(), "cycle above {element}");
            }
            assert_eq!(current.0, Element::Vertex(root));
        }
    }
}
