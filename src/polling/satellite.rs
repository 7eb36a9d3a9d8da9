//! Peer satellite: owns the marks, buffer and visitor of one partition.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::termination::{SatelliteState, SatelliteStatus};
use crate::buffer::{Buffer, WorkBuffer};
use crate::channel::{PeerSatelliteClient, StationDirectory};
use crate::config::TraversalConfig;
use crate::error::{TraversalError, TraversalResult};
use crate::store::GraphAccessor;
use crate::types::{
    EdgeId, Element, IncidenceId, Mark, MarkTable, PartitionId, RunState, RunToken, VertexId,
};
use crate::visitor::Visitor;

/// Element waiting to be expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
    /// Expand a vertex's incidences.
    Vertex {
        /// Vertex to expand.
        vertex: VertexId,
    },
    /// Expand an edge's incidences, skipping the one it was reached by.
    Edge {
        /// Edge to expand.
        edge: EdgeId,
        /// Incidence that discovered the edge.
        via: IncidenceId,
    },
}

impl WorkItem {
    fn discovered(element: Element, via: IncidenceId) -> Self {
        match element {
            Element::Vertex(vertex) => Self::Vertex { vertex },
            Element::Edge(edge) => Self::Edge { edge, via },
        }
    }
}

/// Counters of one satellite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteStats {
    /// Work items expanded.
    pub expanded: u64,
    /// Elements enqueued (root included).
    pub activity: u64,
    /// Test calls sent to other stations.
    pub remote_calls: u64,
    /// Test calls received from other stations.
    pub received_calls: u64,
}

struct PeerState<V> {
    token: RunToken,
    marks: Option<MarkTable>,
    buffer: WorkBuffer<WorkItem>,
    visitor: V,
    flag: SatelliteState,
    activity: u64,
    expanded: u64,
    failure: Option<String>,
}

enum LoopStep {
    Drain,
    Wait,
    Exit,
}

/// Satellite of the polling protocol.
///
/// Marks, buffer, flag and visitor sit behind one mutex, so an inbound
/// test-and-enqueue is a single critical section covering the mark, the
/// hooks and the buffer insert. The lock is never held across an await.
pub struct PeerSatellite<G, V> {
    partition: PartitionId,
    accessor: Arc<G>,
    config: TraversalConfig,
    peers: StationDirectory<dyn PeerSatelliteClient>,
    state: Mutex<PeerState<V>>,
    remote_calls: AtomicU64,
    received_calls: AtomicU64,
}

impl<G: GraphAccessor, V: Visitor> PeerSatellite<G, V> {
    /// Create a satellite over a partition accessor.
    pub fn new(accessor: Arc<G>, config: TraversalConfig, visitor: V) -> Self {
        Self {
            partition: accessor.partition(),
            state: Mutex::new(PeerState {
                token: RunToken::new(),
                marks: None,
                buffer: WorkBuffer::new(config.buffer),
                visitor,
                flag: SatelliteState::Idle,
                activity: 0,
                expanded: 0,
                failure: None,
            }),
            accessor,
            config,
            peers: StationDirectory::new(),
            remote_calls: AtomicU64::new(0),
            received_calls: AtomicU64::new(0),
        }
    }

    /// Partition owned by this satellite.
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Stubs of the other satellites.
    pub fn peers(&self) -> &StationDirectory<dyn PeerSatelliteClient> {
        &self.peers
    }

    /// Size the marks from the local element counts and start the run.
    pub async fn prepare(&self) -> TraversalResult<()> {
        let counts = self
            .accessor
            .element_counts()
            .await
            .map_err(TraversalError::from_accessor)?;

        let mut state = self.state.lock();
        if state.marks.is_some() {
            return Err(TraversalError::Reuse(state.token.state()));
        }
        state.token.begin()?;
        state.marks = Some(MarkTable::new(self.partition, counts));
        debug!(
            partition = %self.partition,
            vertices = counts.vertices,
            edges = counts.edges,
            "Satellite marks sized"
        );
        Ok(())
    }

    /// Mark the start vertex as root and enqueue it.
    pub async fn enqueue_root(&self, vertex: VertexId) -> TraversalResult<()> {
        self.ensure_owned(Element::Vertex(vertex))?;
        let exists = self
            .accessor
            .has_vertex(vertex)
            .await
            .map_err(TraversalError::from_accessor)?;
        if !exists {
            return Err(TraversalError::VertexNotFound(vertex));
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        self.accepting(state)?;
        let marks = state.marks.as_mut().ok_or(TraversalError::NotStarted)?;
        if marks.test_and_set(Element::Vertex(vertex), Mark::Root)? {
            state.visitor.on_root(vertex);
            state.visitor.on_vertex(vertex);
            state.buffer.add(WorkItem::Vertex { vertex });
            state.activity += 1;
            info!(partition = %self.partition, root = %vertex, "Root enqueued");
        } else {
            debug!(partition = %self.partition, root = %vertex, "Root already discovered");
        }
        Ok(())
    }

    /// Inbound test of a local edge.
    pub fn test_and_enqueue_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<bool> {
        self.inbound(Element::Edge(edge), via)
    }

    /// Inbound test of a local vertex.
    pub fn test_and_enqueue_vertex(
        &self,
        vertex: VertexId,
        via: IncidenceId,
    ) -> TraversalResult<bool> {
        self.inbound(Element::Vertex(vertex), via)
    }

    /// Whether the satellite is draining or has work waiting.
    pub fn is_working(&self) -> TraversalResult<bool> {
        let state = self.state.lock();
        if state.flag == SatelliteState::Failed {
            return Err(self.failed(&state));
        }
        Ok(state.flag == SatelliteState::Working || !state.buffer.is_empty())
    }

    /// Snapshot of flag, buffer size and activity counter.
    pub fn status(&self) -> SatelliteStatus {
        let state = self.state.lock();
        SatelliteStatus {
            partition: self.partition,
            state: state.flag,
            pending: state.buffer.len(),
            activity: state.activity,
            failure: state.failure.clone(),
        }
    }

    /// Ask the loop to exit once its current drain is over.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if state.flag != SatelliteState::Failed {
            state.flag = SatelliteState::Stopped;
        }
        info!(partition = %self.partition, flag = %state.flag, "Satellite stop requested");
    }

    /// Run state of this satellite's token.
    pub fn run_state(&self) -> RunState {
        self.state.lock().token.state()
    }

    /// Current mark of a local element.
    pub fn mark(&self, element: Element) -> TraversalResult<Mark> {
        let state = self.state.lock();
        state
            .marks
            .as_ref()
            .ok_or(TraversalError::NotStarted)?
            .get(element)
    }

    /// Counters.
    pub fn stats(&self) -> SatelliteStats {
        let state = self.state.lock();
        SatelliteStats {
            expanded: state.expanded,
            activity: state.activity,
            remote_calls: self.remote_calls.load(Ordering::Relaxed),
            received_calls: self.received_calls.load(Ordering::Relaxed),
        }
    }

    /// Borrow the visitor.
    pub fn with_visitor<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.state.lock().visitor)
    }

    /// Satellite loop: drain while there is work, sleep while idle, exit
    /// once stopped.
    pub async fn run(&self) -> TraversalResult<()> {
        info!(partition = %self.partition, buffer = %self.config.buffer, "Satellite loop started");
        let outcome = self.drive().await;

        let mut state = self.state.lock();
        state.token.finish();
        match outcome {
            Ok(()) => {
                info!(
                    partition = %self.partition,
                    expanded = state.expanded,
                    activity = state.activity,
                    "Satellite loop stopped"
                );
                Ok(())
            }
            Err(e) => {
                warn!(partition = %self.partition, error = %e, "Satellite loop failed");
                state.flag = SatelliteState::Failed;
                state.failure = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Expand items until the buffer is empty.
    pub async fn process_buffer(&self) -> TraversalResult<()> {
        while let Some(item) = self.next_item() {
            self.expand(item).await?;
        }
        Ok(())
    }

    async fn drive(&self) -> TraversalResult<()> {
        loop {
            match self.next_step() {
                LoopStep::Drain => self.process_buffer().await?,
                LoopStep::Wait => tokio::time::sleep(self.config.idle_wait()).await,
                LoopStep::Exit => return Ok(()),
            }
        }
    }

    fn next_step(&self) -> LoopStep {
        let mut state = self.state.lock();
        match state.flag {
            SatelliteState::Stopped | SatelliteState::Failed => LoopStep::Exit,
            _ if !state.buffer.is_empty() => {
                state.flag = SatelliteState::Working;
                LoopStep::Drain
            }
            _ => {
                state.flag = SatelliteState::Idle;
                LoopStep::Wait
            }
        }
    }

    fn next_item(&self) -> Option<WorkItem> {
        self.state.lock().buffer.get()
    }

    async fn expand(&self, item: WorkItem) -> TraversalResult<()> {
        match item {
            WorkItem::Vertex { vertex } => {
                let incidences = self
                    .accessor
                    .vertex_incidences(vertex, self.config.direction.from_vertex())
                    .await
                    .map_err(TraversalError::from_accessor)?;
                debug!(vertex = %vertex, incidences = incidences.len(), "Expanding vertex");
                for inc in incidences {
                    self.route(Element::Edge(inc.edge), inc.id).await?;
                }
            }
            WorkItem::Edge { edge, via } => {
                let incidences = self
                    .accessor
                    .edge_incidences(edge, self.config.direction.from_edge())
                    .await
                    .map_err(TraversalError::from_accessor)?;
                debug!(edge = %edge, incidences = incidences.len(), "Expanding edge");
                for inc in incidences.into_iter().filter(|inc| inc.id != via) {
                    self.route(Element::Vertex(inc.vertex), inc.id).await?;
                }
            }
        }
        self.state.lock().expanded += 1;
        Ok(())
    }

    async fn route(&self, element: Element, via: IncidenceId) -> TraversalResult<bool> {
        let owner = element.partition();
        if owner == self.partition {
            return self.discover(element, via);
        }

        let peer = self.peers.get(owner)?;
        self.remote_calls.fetch_add(1, Ordering::Relaxed);
        match element {
            Element::Vertex(vertex) => peer.test_and_enqueue_vertex(vertex, via).await,
            Element::Edge(edge) => peer.test_and_enqueue_edge(edge, via).await,
        }
    }

    fn inbound(&self, element: Element, via: IncidenceId) -> TraversalResult<bool> {
        self.received_calls.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        self.accepting(&state)?;
        Self::test_and_enqueue(&mut state, element, via)
    }

    fn discover(&self, element: Element, via: IncidenceId) -> TraversalResult<bool> {
        let mut state = self.state.lock();
        state.token.ensure_running()?;
        Self::test_and_enqueue(&mut state, element, via)
    }

    /// Mark, hooks and enqueue; the caller holds the state lock.
    fn test_and_enqueue(
        state: &mut PeerState<V>,
        element: Element,
        via: IncidenceId,
    ) -> TraversalResult<bool> {
        let marks = state.marks.as_mut().ok_or(TraversalError::NotStarted)?;

        let won = marks.test_and_set(element, Mark::Tree(via))?;
        if won {
            match element {
                Element::Vertex(vertex) => state.visitor.on_vertex(vertex),
                Element::Edge(edge) => state.visitor.on_edge(edge),
            }
            state.visitor.on_tree_incidence(via, element);
            state.buffer.add(WorkItem::discovered(element, via));
            state.activity += 1;
        } else {
            state.visitor.on_cross_incidence(via, element);
        }
        Ok(won)
    }

    fn accepting(&self, state: &PeerState<V>) -> TraversalResult<()> {
        match state.flag {
            SatelliteState::Stopped => Err(TraversalError::Stopped(self.partition)),
            SatelliteState::Failed => Err(self.failed(state)),
            SatelliteState::Idle | SatelliteState::Working => state.token.ensure_running(),
        }
    }

    fn failed(&self, state: &PeerState<V>) -> TraversalError {
        TraversalError::SatelliteFailed {
            partition: self.partition,
            message: state.failure.clone().unwrap_or_default(),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{HypergraphBuilder, InMemoryPartition};
    use crate::visitor::CountingVisitor;

    const P0: PartitionId = PartitionId(0);

    fn single_partition() -> (InMemoryPartition, VertexId, VertexId, EdgeId) {
        let mut builder = HypergraphBuilder::new(1);
        let a = builder.add_vertex(P0).unwrap();
        let b = builder.add_vertex(P0).unwrap();
        let e = builder.link(P0, a, b).unwrap();
        (builder.build().remove(0), a, b, e)
    }

    #[tokio::test]
    async fn test_prepare_twice_is_reuse() {
        let (part, ..) = single_partition();
        let sat = PeerSatellite::new(Arc::new(part), TraversalConfig::default(), ());
        sat.prepare().await.unwrap();
        assert!(matches!(sat.prepare().await, Err(TraversalError::Reuse(_))));
    }

    #[tokio::test]
    async fn test_calls_before_prepare_fail() {
        let (part, a, _, e) = single_partition();
        let sat = PeerSatellite::new(Arc::new(part), TraversalConfig::default(), ());
        assert!(matches!(sat.enqueue_root(a).await, Err(TraversalError::NotStarted)));
        assert!(matches!(
            sat.test_and_enqueue_edge(e, IncidenceId::new(P0, 1)),
            Err(TraversalError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_local_drain_discovers_everything() {
        let (part, a, b, e) = single_partition();
        let sat = PeerSatellite::new(Arc::new(part), TraversalConfig::default(), CountingVisitor::new());
        sat.prepare().await.unwrap();
        sat.enqueue_root(a).await.unwrap();
        assert!(sat.is_working().unwrap());

        sat.process_buffer().await.unwrap();
        assert!(sat.mark(Element::Edge(e)).unwrap().is_discovered());
        assert!(sat.mark(Element::Vertex(b)).unwrap().is_discovered());
        assert_eq!(sat.mark(Element::Vertex(a)).unwrap(), Mark::Root);

        let counts = sat.with_visitor(|v| *v);
        assert_eq!(counts.vertices, 2);
        assert_eq!(counts.edges, 1);
        assert_eq!(counts.tree_incidences, 2);
        assert_eq!(sat.stats().remote_calls, 0);
    }

    #[tokio::test]
    async fn test_inbound_test_is_idempotent() {
        let (part, _, b, _) = single_partition();
        let sat = PeerSatellite::new(Arc::new(part), TraversalConfig::default(), CountingVisitor::new());
        sat.prepare().await.unwrap();

        let via = IncidenceId::new(PartitionId(7), 1);
        assert!(sat.test_and_enqueue_vertex(b, via).unwrap());
        assert!(!sat.test_and_enqueue_vertex(b, via).unwrap());

        let status = sat.status();
        assert_eq!(status.pending, 1);
        assert_eq!(status.activity, 1);
        assert_eq!(sat.stats().received_calls, 2);
        assert_eq!(sat.with_visitor(|v| v.cross_incidences), 1);
    }

    #[tokio::test]
    async fn test_root_must_be_local_and_exist() {
        let (part, ..) = single_partition();
        let sat = PeerSatellite::new(Arc::new(part), TraversalConfig::default(), ());
        sat.prepare().await.unwrap();
        assert!(matches!(
            sat.enqueue_root(VertexId::new(PartitionId(1), 1)).await,
            Err(TraversalError::WrongPartition { .. })
        ));
        assert!(matches!(
            sat.enqueue_root(VertexId::new(P0, 40)).await,
            Err(TraversalError::VertexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_contended_inbound_vertex_has_one_winner() {
        const THREADS: u32 = 8;
        for _ in 0..50 {
            let (part, _, b, _) = single_partition();
            let sat = PeerSatellite::new(Arc::new(part), TraversalConfig::default(), CountingVisitor::new());
            sat.prepare().await.unwrap();
            let barrier = std::sync::Barrier::new(THREADS as usize);

            let winners = std::thread::scope(|s| {
                let handles: Vec<_> = (1..=THREADS)
                    .map(|i| {
                        let (sat, barrier) = (&sat, &barrier);
                        s.spawn(move || {
                            barrier.wait();
                            sat.test_and_enqueue_vertex(b, IncidenceId::new(PartitionId(9), i))
                                .unwrap()
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count()
            });

            assert_eq!(winners, 1);
            assert_eq!(sat.status().pending, 1);
            assert_eq!(sat.status().activity, 1);
            let counts = sat.with_visitor(|v| *v);
            assert_eq!(counts.vertices, 1);
            assert_eq!(counts.cross_incidences, u64::from(THREADS - 1));
        }
    }

    #[tokio::test]
    async fn test_no_inbound_discovery_after_stop() {
        const THREADS: u32 = 8;
        for _ in 0..20 {
            let (part, a, b, e) = single_partition();
            let sat = PeerSatellite::new(Arc::new(part), TraversalConfig::default(), CountingVisitor::new());
            sat.prepare().await.unwrap();
            let barrier = std::sync::Barrier::new(THREADS as usize + 1);
            let via = IncidenceId::new(PartitionId(9), 1);

            std::thread::scope(|s| {
                for i in 0..THREADS {
                    let (sat, barrier) = (&sat, &barrier);
                    s.spawn(move || {
                        barrier.wait();
                        let _ = match i % 3 {
                            0 => sat.test_and_enqueue_vertex(a, via),
                            1 => sat.test_and_enqueue_vertex(b, via),
                            _ => sat.test_and_enqueue_edge(e, via),
                        };
                    });
                }
                barrier.wait();
                sat.stop();
            });

            // Whatever got in before the stop is fully recorded; nothing
            // after it is.
            let discovered = [Element::Vertex(a), Element::Vertex(b), Element::Edge(e)]
                .into_iter()
                .filter(|el| sat.mark(*el).unwrap().is_discovered())
                .count() as u64;
            let status = sat.status();
            assert_eq!(status.activity, discovered);
            assert_eq!(status.pending as u64, discovered);

            assert!(matches!(
                sat.test_and_enqueue_edge(e, via),
                Err(TraversalError::Stopped(P0))
            ));
            assert_eq!(sat.status().activity, discovered);
            assert_eq!(sat.stats().received_calls, u64::from(THREADS) + 1);
        }
    }

    #[tokio::test]
    async fn test_stopped_satellite_rejects_inbound_work() {
        let (part, _, b, _) = single_partition();
        let sat = Arc::new(PeerSatellite::new(Arc::new(part), TraversalConfig::default(), ()));
        sat.prepare().await.unwrap();

        let looping = Arc::clone(&sat);
        let handle = tokio::spawn(async move { looping.run().await });
        sat.stop();
        handle.await.unwrap().unwrap();

        assert_eq!(sat.status().state, SatelliteState::Stopped);
        assert_eq!(sat.run_state(), RunState::Done);
        assert!(matches!(
            sat.test_and_enqueue_vertex(b, IncidenceId::new(P0, 1)),
            Err(TraversalError::Stopped(P0))
        ));
    }
}
