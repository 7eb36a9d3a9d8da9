//! Mediating coordinator: owns every mark of the run.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::buffer::{Buffer, BufferKind, WorkBuffer};
use crate::channel::{MediatedSatelliteClient, StationDirectory};
use crate::config::TraversalConfig;
use crate::error::{TraversalError, TraversalResult};
use crate::types::{
    DiscoveryOrder, EdgeId, Element, GlobalMarks, IncidenceId, Mark, MarkTable, PartitionId,
    RunState, RunToken, VertexId,
};
use crate::visitor::{VisitEvent, Visitor};

/// Summary of a finished mediated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Start vertex.
    pub root: VertexId,
    /// Buffer discipline used.
    pub buffer: BufferKind,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the buffer ran dry.
    pub finished_at: DateTime<Utc>,
    /// Discovered vertices (root included).
    pub discovered_vertices: usize,
    /// Discovered edges.
    pub discovered_edges: usize,
    /// Test calls that discovered an element.
    pub tree_incidences: u64,
    /// Test calls that found the element already discovered.
    pub cross_incidences: u64,
    /// Vertices handed to satellites for expansion.
    pub expansions: u64,
    /// Global discovery order.
    pub order: DiscoveryOrder,
}

#[derive(Debug, Default)]
struct CoordinatorStats {
    tree: u64,
    cross: u64,
    expansions: u64,
}

struct CoordinatorState<V> {
    token: RunToken,
    marks: GlobalMarks,
    order: DiscoveryOrder,
    buffer: WorkBuffer<VertexId>,
    visitor: V,
    stats: CoordinatorStats,
}

/// Coordinator of the mediated protocol.
///
/// Every test-and-mark runs in one critical section that also covers the
/// discovery order, the buffer insert and the hooks, so concurrent callers
/// from different satellites see exactly one winner per element.
pub struct Coordinator<V> {
    partition: PartitionId,
    config: TraversalConfig,
    satellites: StationDirectory<dyn MediatedSatelliteClient>,
    state: Mutex<CoordinatorState<V>>,
}

impl<V: Visitor> Coordinator<V> {
    /// Create a coordinator living on `partition`.
    pub fn new(partition: PartitionId, config: TraversalConfig, visitor: V) -> Self {
        Self {
            partition,
            state: Mutex::new(CoordinatorState {
                token: RunToken::new(),
                marks: GlobalMarks::new(),
                order: DiscoveryOrder::default(),
                buffer: WorkBuffer::new(config.buffer),
                visitor,
                stats: CoordinatorStats::default(),
            }),
            config,
            satellites: StationDirectory::new(),
        }
    }

    /// Partition the coordinator lives on.
    pub fn partition_id(&self) -> PartitionId {
        self.partition
    }

    /// Satellite stubs, the coordinator's own partition included.
    pub fn satellites(&self) -> &StationDirectory<dyn MediatedSatelliteClient> {
        &self.satellites
    }

    /// Run state of the coordinator's token.
    pub fn run_state(&self) -> RunState {
        self.state.lock().token.state()
    }

    /// Current mark of any element.
    pub fn mark(&self, element: Element) -> TraversalResult<Mark> {
        self.state.lock().marks.get(element)
    }

    /// Discovery order so far.
    pub fn order(&self) -> DiscoveryOrder {
        self.state.lock().order.clone()
    }

    /// Borrow the visitor.
    pub fn with_visitor<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.state.lock().visitor)
    }

    /// Traverse the whole partitioned graph from `start`.
    ///
    /// Fails with [`TraversalError::Reuse`] unless this is the first run.
    pub async fn run(&self, start: VertexId) -> TraversalResult<RunReport> {
        let run_id = {
            let mut state = self.state.lock();
            if !state.marks.is_empty() {
                return Err(TraversalError::Reuse(state.token.state()));
            }
            state.token.begin()?;
            state.token.id()
        };
        info!(
            run_id = %run_id,
            root = %start,
            buffer = %self.config.buffer,
            stations = self.satellites.len(),
            "Mediated run started"
        );

        let outcome = self.drive(start).await;

        let mut state = self.state.lock();
        state.token.finish();
        if let Err(e) = outcome {
            warn!(run_id = %run_id, error = %e, "Mediated run failed");
            return Err(e);
        }

        let (discovered_vertices, discovered_edges) = state.marks.discovered();
        let report = RunReport {
            run_id,
            root: start,
            buffer: self.config.buffer,
            started_at: state.token.started_at().unwrap_or_else(Utc::now),
            finished_at: state.token.finished_at().unwrap_or_else(Utc::now),
            discovered_vertices,
            discovered_edges,
            tree_incidences: state.stats.tree,
            cross_incidences: state.stats.cross,
            expansions: state.stats.expansions,
            order: state.order.clone(),
        };
        info!(
            run_id = %run_id,
            vertices = discovered_vertices,
            edges = discovered_edges,
            cross = report.cross_incidences,
            "Mediated run finished"
        );
        Ok(report)
    }

    async fn drive(&self, start: VertexId) -> TraversalResult<()> {
        let stations = self.satellites.all();
        let mut tables = Vec::with_capacity(stations.len());
        for (partition, satellite) in &stations {
            let counts = satellite.element_counts().await?;
            tables.push(MarkTable::new(*partition, counts));
        }
        {
            let mut state = self.state.lock();
            for table in tables {
                state.marks.insert(table);
            }
        }

        let owner = self.satellites.get(start.partition())?;
        owner.process_root(start).await?;
        self.mark_root(start)?;

        while let Some(vertex) = self.next_vertex() {
            let owner = self.satellites.get(vertex.partition())?;
            owner.process_vertex(vertex).await?;
        }
        Ok(())
    }

    fn mark_root(&self, start: VertexId) -> TraversalResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.marks.test_and_set(Element::Vertex(start), Mark::Root)?;
        state.visitor.on_root(start);
        state.visitor.on_vertex(start);
        state.order.vertices.push(start);
        state.buffer.add(start);
        Ok(())
    }

    fn next_vertex(&self) -> Option<VertexId> {
        let mut state = self.state.lock();
        let vertex = state.buffer.get()?;
        state.stats.expansions += 1;
        Some(vertex)
    }

    /// Test-and-mark an edge on behalf of a satellite.
    pub fn test_and_process_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<bool> {
        self.test_and_mark(Element::Edge(edge), via)
    }

    /// Test-and-mark a vertex on behalf of a satellite; winners are
    /// enqueued for expansion.
    pub fn test_and_process_vertex(
        &self,
        vertex: VertexId,
        via: IncidenceId,
    ) -> TraversalResult<bool> {
        self.test_and_mark(Element::Vertex(vertex), via)
    }

    /// Deliver a hook notification to the visitor.
    pub fn notify(&self, event: VisitEvent) {
        event.dispatch(&mut self.state.lock().visitor);
    }

    fn test_and_mark(&self, element: Element, via: IncidenceId) -> TraversalResult<bool> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.token.ensure_running()?;
        if state.marks.is_empty() {
            return Err(TraversalError::NotStarted);
        }

        let won = state.marks.test_and_set(element, Mark::Tree(via))?;
        if won {
            match element {
                Element::Vertex(vertex) => {
                    state.visitor.on_vertex(vertex);
                    state.order.vertices.push(vertex);
                    state.buffer.add(vertex);
                }
                Element::Edge(edge) => {
                    state.visitor.on_edge(edge);
                    state.order.edges.push(edge);
                }
            }
            state.visitor.on_tree_incidence(via, element);
            state.stats.tree += 1;
        } else {
            state.visitor.on_cross_incidence(via, element);
            state.stats.cross += 1;
        }
        debug!(element = %element, via = %via, won = won, "Test-and-mark");
        Ok(won)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElementCounts;
    use crate::visitor::CountingVisitor;

    const P0: PartitionId = PartitionId(0);

    fn running(counts: ElementCounts) -> Coordinator<CountingVisitor> {
        let coordinator = Coordinator::new(P0, TraversalConfig::default(), CountingVisitor::new());
        {
            let mut state = coordinator.state.lock();
            state.token.begin().unwrap();
            state.marks.insert(MarkTable::new(P0, counts));
        }
        coordinator
    }

    #[test]
    fn test_exactly_one_winner_per_element() {
        let coordinator = running(ElementCounts::new(2, 1));
        let edge = EdgeId::new(P0, 1);
        assert!(coordinator.test_and_process_edge(edge, IncidenceId::new(P0, 1)).unwrap());
        assert!(!coordinator.test_and_process_edge(edge, IncidenceId::new(P0, 2)).unwrap());

        assert_eq!(
            coordinator.mark(Element::Edge(edge)).unwrap(),
            Mark::Tree(IncidenceId::new(P0, 1))
        );
        let counts = coordinator.with_visitor(|v| *v);
        assert_eq!(counts.edges, 1);
        assert_eq!(counts.tree_incidences, 1);
        assert_eq!(counts.cross_incidences, 1);
        assert_eq!(coordinator.order().edges, vec![edge]);
    }

    #[test]
    fn test_vertex_winner_is_enqueued() {
        let coordinator = running(ElementCounts::new(2, 1));
        let vertex = VertexId::new(P0, 2);
        assert!(coordinator
            .test_and_process_vertex(vertex, IncidenceId::new(P0, 1))
            .unwrap());
        assert_eq!(coordinator.next_vertex(), Some(vertex));
        assert_eq!(coordinator.next_vertex(), None);
    }

    #[test]
    fn test_contended_vertex_has_one_winner() {
        const THREADS: u32 = 8;
        for _ in 0..50 {
            let coordinator = running(ElementCounts::new(2, 1));
            let vertex = VertexId::new(P0, 2);
            let barrier = std::sync::Barrier::new(THREADS as usize);

            let winners = std::thread::scope(|s| {
                let handles: Vec<_> = (1..=THREADS)
                    .map(|i| {
                        let (coordinator, barrier) = (&coordinator, &barrier);
                        s.spawn(move || {
                            barrier.wait();
                            coordinator
                                .test_and_process_vertex(vertex, IncidenceId::new(P0, i))
                                .unwrap()
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count()
            });

            assert_eq!(winners, 1);
            let counts = coordinator.with_visitor(|v| *v);
            assert_eq!(counts.vertices, 1);
            assert_eq!(counts.tree_incidences, 1);
            assert_eq!(counts.cross_incidences, u64::from(THREADS - 1));
            assert_eq!(coordinator.next_vertex(), Some(vertex));
            assert_eq!(coordinator.next_vertex(), None);
        }
    }

    #[test]
    fn test_calls_before_run_fail() {
        let coordinator = Coordinator::new(P0, TraversalConfig::default(), ());
        assert!(matches!(
            coordinator.test_and_process_edge(EdgeId::new(P0, 1), IncidenceId::new(P0, 1)),
            Err(TraversalError::NotStarted)
        ));
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        let coordinator = running(ElementCounts::new(1, 1));
        assert!(matches!(
            coordinator.test_and_process_vertex(VertexId::new(P0, 5), IncidenceId::new(P0, 1)),
            Err(TraversalError::OutOfRange { .. })
        ));
        assert!(matches!(
            coordinator.test_and_process_vertex(VertexId::new(PartitionId(4), 1), IncidenceId::new(P0, 1)),
            Err(TraversalError::UnknownPartition(PartitionId(4)))
        ));
    }

    #[test]
    fn test_notify_dispatches_to_visitor() {
        let coordinator = Coordinator::new(P0, TraversalConfig::default(), CountingVisitor::new());
        coordinator.notify(VisitEvent::Edge { edge: EdgeId::new(P0, 1) });
        assert_eq!(coordinator.with_visitor(|v| v.edges), 1);
    }
}
