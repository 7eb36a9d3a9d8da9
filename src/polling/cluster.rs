//! In-process polling cluster: one satellite task per partition.

use std::sync::Arc;

use crate::channel::local::InProcess;
use crate::config::TraversalConfig;
use crate::error::{TraversalError, TraversalResult};
use crate::store::GraphAccessor;
use crate::types::{PartitionId, VertexId};
use crate::visitor::Visitor;

use super::coordinator::{PollReport, PollingCoordinator};
use super::satellite::PeerSatellite;

/// Polling satellites wired to each other and to a coordinator living on
/// the first partition.
pub struct PollingCluster<G, V> {
    coordinator: Arc<PollingCoordinator>,
    satellites: Vec<Arc<PeerSatellite<G, V>>>,
}

impl<G, V> PollingCluster<G, V>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    /// Build a cluster; `visitor` creates each satellite's visitor.
    pub fn new(
        partitions: Vec<G>,
        config: TraversalConfig,
        mut visitor: impl FnMut(PartitionId) -> V,
    ) -> TraversalResult<Self> {
        let satellites: Vec<_> = partitions
            .into_iter()
            .map(|accessor| {
                let partition = accessor.partition();
                Arc::new(PeerSatellite::new(
                    Arc::new(accessor),
                    config.clone(),
                    visitor(partition),
                ))
            })
            .collect();

        let home = satellites
            .first()
            .map(|s| s.partition())
            .ok_or(TraversalError::UnknownPartition(PartitionId(0)))?;
        let coordinator = Arc::new(PollingCoordinator::new(home, config));

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
    pub fn coordinator(&self) -> &Arc<PollingCoordinator> {
        &self.coordinator
    }

    /// Satellites in partition order.
    pub fn satellites(&self) -> &[Arc<PeerSatellite<G, V>>] {
        &self.satellites
    }

    /// Prepare every satellite, spawn their loops, run the coordinator and
    /// wait for every loop to exit.
    pub async fn run(&self, root: VertexId) -> TraversalResult<PollReport> {
        for satellite in &self.satellites {
            satellite.prepare().await?;
        }

        let handles: Vec<_> = self
            .satellites
            .iter()
            .map(|satellite| {
                let satellite = Arc::clone(satellite);
                let partition = satellite.partition();
                (partition, tokio::spawn(async move { satellite.run().await }))
            })
            .collect();

        let outcome = self.coordinator.run(root).await;

        let mut loop_error = None;
        for (partition, handle) in handles {
            let result = handle.await.map_err(|e| TraversalError::SatelliteFailed {
                partition,
                message: e.to_string(),
            });
            if let Err(e) = result.and_then(|r| r) {
                loop_error.get_or_insert(e);
            }
        }

        let report = outcome?;
        match loop_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Call `f` with every satellite's visitor, in partition order.
    pub fn for_each_visitor(&self, mut f: impl FnMut(PartitionId, &V)) {
        for satellite in &self.satellites {
            satellite.with_visitor(|v| f(satellite.partition(), v));
        }
    }
}
