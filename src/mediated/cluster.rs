//! In-process mediated cluster.

use std::sync::Arc;

use crate::channel::local::InProcess;
use crate::channel::CoordinatorClient;
use crate::config::TraversalConfig;
use crate::error::{TraversalError, TraversalResult};
use crate::store::GraphAccessor;
use crate::types::{PartitionId, VertexId};
use crate::visitor::Visitor;

use super::coordinator::{Coordinator, RunReport};
use super::satellite::MediatedSatellite;

/// Mediated satellites for every partition, plus a coordinator living on
/// the first one.
pub struct MediatedCluster<G, V> {
    coordinator: Arc<Coordinator<V>>,
    satellites: Vec<Arc<MediatedSatellite<G>>>,
}

impl<G, V> MediatedCluster<G, V>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    /// Build a cluster over the given partitions.
    pub fn new(partitions: Vec<G>, config: TraversalConfig, visitor: V) -> TraversalResult<Self> {
        let home = partitions
            .first()
            .map(GraphAccessor::partition)
            .ok_or(TraversalError::UnknownPartition(PartitionId(0)))?;
        let direction = config.direction;
        let coordinator = Arc::new(Coordinator::new(home, config, visitor));
        let client: Arc<dyn CoordinatorClient> = Arc::new(InProcess::new(&coordinator));

        let satellites: Vec<_> = partitions
            .into_iter()
            .map(|accessor| {
                Arc::new(MediatedSatellite::new(
                    Arc::new(accessor),
                    direction,
                    Arc::clone(&client),
                ))
            })
            .collect();

        for target in &satellites {
            coordinator
                .satellites()
                .register(target.partition(), Arc::new(InProcess::new(target)));
            for source in &satellites {
                if source.partition() != target.partition() {
                    source
                        .peers()
                        .register(target.partition(), Arc::new(InProcess::new(target)));
                }
            }
        }

        Ok(Self {
            coordinator,
            satellites,
        })
    }

    /// The coordinator.
    pub fn coordinator(&self) -> &Arc<Coordinator<V>> {
        &self.coordinator
    }

    /// Satellites in partition order.
    pub fn satellites(&self) -> &[Arc<MediatedSatellite<G>>] {
        &self.satellites
    }

    /// Run the traversal from `root`.
    pub async fn run(&self, root: VertexId) -> TraversalResult<RunReport> {
        self.coordinator.run(root).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HypergraphBuilder;
    use crate::types::{Element, Mark};
    use crate::visitor::CountingVisitor;

    const P0: PartitionId = PartitionId(0);
    const P1: PartitionId = PartitionId(1);

    #[tokio::test]
    async fn test_edge_owned_elsewhere_is_forwarded() {
        // a(P0) --e(P1)--> b(P0)
        let mut builder = HypergraphBuilder::new(2);
        let a = builder.add_vertex(P0).unwrap();
        let b = builder.add_vertex(P0).unwrap();
        let e = builder.link(P1, a, b).unwrap();

        let cluster =
            MediatedCluster::new(builder.build(), TraversalConfig::default(), CountingVisitor::new())
                .unwrap();
        let report = cluster.run(a).await.unwrap();

        assert_eq!(report.discovered_vertices, 2);
        assert_eq!(report.discovered_edges, 1);
        assert_eq!(cluster.satellites()[0].stats().forwarded_edges, 1);
        assert_eq!(cluster.satellites()[1].stats().edges, 1);
        assert!(matches!(
            cluster.coordinator().mark(Element::Edge(e)).unwrap(),
            Mark::Tree(_)
        ));
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let mut builder = HypergraphBuilder::new(1);
        let a = builder.add_vertex(P0).unwrap();
        let cluster = MediatedCluster::new(builder.build(), TraversalConfig::default(), ()).unwrap();

        cluster.run(a).await.unwrap();
        assert!(matches!(cluster.run(a).await, Err(TraversalError::Reuse(_))));
    }

    #[tokio::test]
    async fn test_missing_root_aborts() {
        let builder = HypergraphBuilder::new(1);
        let cluster = MediatedCluster::new(builder.build(), TraversalConfig::default(), ()).unwrap();
        let err = cluster.run(VertexId::new(P0, 1)).await.unwrap_err();
        assert!(matches!(err, TraversalError::VertexNotFound(_)));
    }
}
