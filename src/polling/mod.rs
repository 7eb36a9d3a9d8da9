//! Peer-to-peer traversal with polling termination.
//!
//! Every satellite owns the marks and the buffer of its partition and runs
//! its own loop. Local elements are tested and enqueued locally; elements
//! owned elsewhere are tested on their owner, which enqueues them on its
//! own buffer. The coordinator only seeds the root and polls the
//! satellites until the [`TerminationDetector`] declares the run quiescent.

pub mod cluster;
pub mod coordinator;
pub mod satellite;
pub mod termination;

pub use cluster::PollingCluster;
pub use coordinator::{PollReport, PollingCoordinator};
pub use satellite::{PeerSatellite, SatelliteStats, WorkItem};
pub use termination::{
    SatelliteState, SatelliteStatus, TerminationDetector, TerminationStrategy, Verdict,
};
