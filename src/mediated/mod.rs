//! Coordinator-mediated traversal.
//!
//! The coordinator holds the marks of every partition and the single
//! global buffer. Satellites are stateless workers that expand vertices
//! and edges of their own partition and ask the coordinator to
//! test-and-mark every element they reach.

pub mod cluster;
pub mod coordinator;
pub mod satellite;

pub use cluster::MediatedCluster;
pub use coordinator::{Coordinator, RunReport};
pub use satellite::{ExpansionStats, MediatedSatellite};
