//! Quiescence detection for the polling protocol.
//!
//! A single round of "nobody is working" answers is not enough: satellite
//! A can answer idle, then satellite B (still working) enqueues onto A,
//! then B answers idle. [`TerminationStrategy::DoubleWave`] closes that
//! window with a per-satellite activity counter bumped on every enqueue.
//! Two consecutive rounds in which every satellite is idle, holds no
//! pending work and shows the same counter prove that no enqueue happened
//! between the rounds; callers stay `Working` while a remote call is in
//! flight, so no call can be outstanding at the end of the first round.

use serde::{Deserialize, Serialize};

use crate::error::{TraversalError, TraversalResult};
use crate::types::PartitionId;

/// Rule deciding when the polling coordinator may stop the satellites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationStrategy {
    /// Stop after one round in which no satellite reports work.
    SingleRound,
    /// Stop after two identical quiet rounds.
    DoubleWave,
}

impl TerminationStrategy {
    /// Parse from a config string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single_round" | "single" => Some(Self::SingleRound),
            "double_wave" | "double" => Some(Self::DoubleWave),
            _ => None,
        }
    }
}

impl Default for TerminationStrategy {
    fn default() -> Self {
        Self::DoubleWave
    }
}

impl std::fmt::Display for TerminationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleRound => write!(f, "single_round"),
            Self::DoubleWave => write!(f, "double_wave"),
        }
    }
}

/// State flag of a polling satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatelliteState {
    /// Buffer empty, sleeping between checks.
    Idle,
    /// Draining the buffer (including awaiting remote calls).
    Working,
    /// Stopped by the coordinator. Terminal.
    Stopped,
    /// The loop died on an error. Terminal.
    Failed,
}

impl std::fmt::Display for SatelliteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Working => write!(f, "working"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One satellite's answer to a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteStatus {
    /// Reporting partition.
    pub partition: PartitionId,
    /// Current state flag.
    pub state: SatelliteState,
    /// Items waiting in the buffer.
    pub pending: usize,
    /// Number of enqueues since the run started.
    pub activity: u64,
    /// Error message when `state` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl SatelliteStatus {
    /// Status synthesized from a bare `is_working` answer.
    pub fn from_working(partition: PartitionId, working: bool) -> Self {
        Self {
            partition,
            state: if working {
                SatelliteState::Working
            } else {
                SatelliteState::Idle
            },
            pending: 0,
            activity: 0,
            failure: None,
        }
    }

    /// Idle with nothing pending.
    pub fn is_quiet(&self) -> bool {
        self.state == SatelliteState::Idle && self.pending == 0
    }
}

/// Outcome of observing one poll round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep polling.
    Continue,
    /// Every satellite is done; stop them.
    Quiescent,
}

/// Consumes poll rounds and decides when the run is over.
#[derive(Debug, Clone)]
pub struct TerminationDetector {
    strategy: TerminationStrategy,
    previous: Option<Vec<SatelliteStatus>>,
    rounds: u64,
}

impl TerminationDetector {
    /// Create a detector.
    pub fn new(strategy: TerminationStrategy) -> Self {
        Self {
            strategy,
            previous: None,
            rounds: 0,
        }
    }

    /// Strategy in use.
    pub fn strategy(&self) -> TerminationStrategy {
        self.strategy
    }

    /// Rounds observed so far.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Observe one round (statuses in partition order).
    ///
    /// Fails on the first `Failed` or `Stopped` satellite.
    pub fn observe(&mut self, round: &[SatelliteStatus]) -> TraversalResult<Verdict> {
        self.rounds += 1;

        for status in round {
            match status.state {
                SatelliteState::Failed => {
                    return Err(TraversalError::SatelliteFailed {
                        partition: status.partition,
                        message: status
                            .failure
                            .clone()
                            .unwrap_or_else(|| "unknown failure".to_string()),
                    })
                }
                SatelliteState::Stopped => return Err(TraversalError::Stopped(status.partition)),
                SatelliteState::Idle | SatelliteState::Working => {}
            }
        }

        let quiet = round.iter().all(SatelliteStatus::is_quiet);
        let verdict = match self.strategy {
            TerminationStrategy::SingleRound => {
                if quiet {
                    Verdict::Quiescent
                } else {
                    Verdict::Continue
                }
            }
            TerminationStrategy::DoubleWave => {
                let stable = quiet && self.previous.as_deref() == Some(round);
                self.previous = quiet.then(|| round.to_vec());
                if stable {
                    Verdict::Quiescent
                } else {
                    Verdict::Continue
                }
            }
        };

        tracing::trace!(
            round = self.rounds,
            strategy = %self.strategy,
            quiet = quiet,
            verdict = ?verdict,
            "Poll round observed"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(p: u16, state: SatelliteState, pending: usize, activity: u64) -> SatelliteStatus {
        SatelliteStatus {
            partition: PartitionId(p),
            state,
            pending,
            activity,
            failure: None,
        }
    }

    #[test]
    fn test_single_round_stops_on_first_quiet_round() {
        let mut detector = TerminationDetector::new(TerminationStrategy::SingleRound);
        let busy = [status(0, SatelliteState::Working, 0, 1), status(1, SatelliteState::Idle, 0, 0)];
        assert_eq!(detector.observe(&busy).unwrap(), Verdict::Continue);

        let quiet = [status(0, SatelliteState::Idle, 0, 1), status(1, SatelliteState::Idle, 0, 0)];
        assert_eq!(detector.observe(&quiet).unwrap(), Verdict::Quiescent);
        assert_eq!(detector.rounds(), 2);
    }

    #[test]
    fn test_double_wave_needs_two_identical_rounds() {
        let mut detector = TerminationDetector::new(TerminationStrategy::DoubleWave);
        let quiet = [status(0, SatelliteState::Idle, 0, 3), status(1, SatelliteState::Idle, 0, 2)];
        assert_eq!(detector.observe(&quiet).unwrap(), Verdict::Continue);
        assert_eq!(detector.observe(&quiet).unwrap(), Verdict::Quiescent);
    }

    #[test]
    fn test_double_wave_detects_enqueue_between_rounds() {
        // Partition 1 received work from 0 and drained it between the polls.
        let mut detector = TerminationDetector::new(TerminationStrategy::DoubleWave);
        let first = [status(0, SatelliteState::Idle, 0, 3), status(1, SatelliteState::Idle, 0, 2)];
        let second = [status(0, SatelliteState::Idle, 0, 3), status(1, SatelliteState::Idle, 0, 4)];
        assert_eq!(detector.observe(&first).unwrap(), Verdict::Continue);
        assert_eq!(detector.observe(&second).unwrap(), Verdict::Continue);
        assert_eq!(detector.observe(&second).unwrap(), Verdict::Quiescent);
    }

    #[test]
    fn test_pending_work_is_not_quiet() {
        let mut detector = TerminationDetector::new(TerminationStrategy::SingleRound);
        let round = [status(0, SatelliteState::Idle, 1, 1)];
        assert_eq!(detector.observe(&round).unwrap(), Verdict::Continue);
    }

    #[test]
    fn test_busy_round_resets_double_wave() {
        let mut detector = TerminationDetector::new(TerminationStrategy::DoubleWave);
        let quiet = [status(0, SatelliteState::Idle, 0, 5)];
        let busy = [status(0, SatelliteState::Working, 0, 5)];
        detector.observe(&quiet).unwrap();
        assert_eq!(detector.observe(&busy).unwrap(), Verdict::Continue);
        assert_eq!(detector.observe(&quiet).unwrap(), Verdict::Continue);
        assert_eq!(detector.observe(&quiet).unwrap(), Verdict::Quiescent);
    }

    #[test]
    fn test_failed_satellite_aborts() {
        let mut detector = TerminationDetector::new(TerminationStrategy::DoubleWave);
        let mut failed = status(2, SatelliteState::Failed, 0, 0);
        failed.failure = Some("accessor down".into());
        let err = detector
            .observe(&[status(0, SatelliteState::Idle, 0, 0), failed])
            .unwrap_err();
        assert!(matches!(
            err,
            TraversalError::SatelliteFailed { partition: PartitionId(2), ref message } if message == "accessor down"
        ));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(TerminationStrategy::from_str("SINGLE_ROUND"), Some(TerminationStrategy::SingleRound));
        assert_eq!(TerminationStrategy::from_str("double"), Some(TerminationStrategy::DoubleWave));
        assert_eq!(TerminationStrategy::from_str("never"), None);
        assert_eq!(TerminationStrategy::default().to_string(), "double_wave");
    }
}
