//! Polling coordinator: seeds the root, polls until quiescent, stops.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::termination::{
    SatelliteStatus, TerminationDetector, TerminationStrategy, Verdict,
};
use crate::channel::{PeerSatelliteClient, StationDirectory};
use crate::config::TraversalConfig;
use crate::error::TraversalResult;
use crate::types::{PartitionId, RunState, RunToken, VertexId};

/// Summary of a finished polling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Start vertex.
    pub root: VertexId,
    /// Quiescence rule that ended the run.
    pub strategy: TerminationStrategy,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the satellites were stopped.
    pub finished_at: DateTime<Utc>,
    /// Poll rounds until quiescence.
    pub poll_rounds: u64,
    /// Statuses of the final (quiescent) round.
    pub statuses: Vec<SatelliteStatus>,
}

impl PollReport {
    /// Sum of the activity counters of the final round.
    pub fn total_activity(&self) -> u64 {
        self.statuses.iter().map(|s| s.activity).sum()
    }
}

/// Coordinator of the polling protocol. Holds no marks of its own.
pub struct PollingCoordinator {
    partition: PartitionId,
    config: TraversalConfig,
    satellites: StationDirectory<dyn PeerSatelliteClient>,
    token: Mutex<RunToken>,
}

impl PollingCoordinator {
    /// Create a coordinator living on `partition`.
    pub fn new(partition: PartitionId, config: TraversalConfig) -> Self {
        Self {
            partition,
            config,
            satellites: StationDirectory::new(),
            token: Mutex::new(RunToken::new()),
        }
    }

    /// Partition the coordinator lives on.
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Stubs of every satellite, the coordinator's own included.
    pub fn satellites(&self) -> &StationDirectory<dyn PeerSatelliteClient> {
        &self.satellites
    }

    /// Run state of the coordinator's token.
    pub fn run_state(&self) -> RunState {
        self.token.lock().state()
    }

    /// Run a traversal from `root` and stop every satellite afterwards.
    ///
    /// Each satellite receives exactly one `stop()`, also when the run
    /// fails; no satellite is polled after it was stopped.
    pub async fn run(&self, root: VertexId) -> TraversalResult<PollReport> {
        let run_id = {
            let mut token = self.token.lock();
            token.begin()?;
            token.id()
        };
        info!(
            run_id = %run_id,
            root = %root,
            strategy = %self.config.termination,
            stations = self.satellites.len(),
            "Polling run started"
        );

        let outcome = self.drive(root).await;
        let stopped = self.stop_all().await;

        let (started_at, finished_at) = {
            let mut token = self.token.lock();
            token.finish();
            (
                token.started_at().unwrap_or_else(Utc::now),
                token.finished_at().unwrap_or_else(Utc::now),
            )
        };

        let (poll_rounds, statuses) = match outcome {
            Ok(done) => done,
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Polling run failed");
                return Err(e);
            }
        };
        stopped?;

        let report = PollReport {
            run_id,
            root,
            strategy: self.config.termination,
            started_at,
            finished_at,
            poll_rounds,
            statuses,
        };
        info!(
            run_id = %run_id,
            poll_rounds = report.poll_rounds,
            activity = report.total_activity(),
            "Polling run finished"
        );
        Ok(report)
    }

    async fn drive(&self, root: VertexId) -> TraversalResult<(u64, Vec<SatelliteStatus>)> {
        let owner = self.satellites.get(root.partition())?;
        owner.enqueue_root(root).await?;

        let stations = self.satellites.all();
        let mut detector = TerminationDetector::new(self.config.termination);
        loop {
            tokio::time::sleep(self.config.poll_interval()).await;

            let mut round = Vec::with_capacity(stations.len());
            for (partition, station) in &stations {
                let status = match detector.strategy() {
                    TerminationStrategy::SingleRound => {
                        SatelliteStatus::from_working(*partition, station.is_working().await?)
                    }
                    TerminationStrategy::DoubleWave => station.status().await?,
                };
                round.push(status);
            }

            if detector.observe(&round)? == Verdict::Quiescent {
                return Ok((detector.rounds(), round));
            }
        }
    }

    async fn stop_all(&self) -> TraversalResult<()> {
        let mut first_error = None;
        for (partition, station) in self.satellites.all() {
            if let Err(e) = station.stop().await {
                warn!(partition = %partition, error = %e, "Failed to stop satellite");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for PollingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingCoordinator")
            .field("partition", &self.partition)
            .field("satellites", &self.satellites.partitions())
            .field("state", &self.run_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TraversalError;

    #[tokio::test]
    async fn test_run_without_owner_fails_and_consumes_token() {
        let coordinator = PollingCoordinator::new(PartitionId(0), TraversalConfig::default());
        let err = coordinator
            .run(VertexId::new(PartitionId(3), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, TraversalError::UnknownPartition(PartitionId(3))));
        assert_eq!(coordinator.run_state(), RunState::Done);

        let again = coordinator.run(VertexId::new(PartitionId(0), 1)).await;
        assert!(matches!(again, Err(TraversalError::Reuse(RunState::Done))));
    }
}
