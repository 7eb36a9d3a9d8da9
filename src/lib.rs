//! # partitioned-traversal
//!
//! Breadth- and depth-first traversal of a hypergraph whose vertices and
//! edges are spread over several partitions, each served by its own station.
//!
//! Every element (vertex, edge, incidence) carries a global id that names
//! its owning partition. A station only dereferences its own elements;
//! everything else goes through a remote call to the owner.
//!
//! ## Protocols
//!
//! ```text
//! Mediated:  Coordinator (marks + buffer) ⇄ MediatedSatellite × N
//!
//! Polling:   PeerSatellite ⇄ PeerSatellite ⇄ ...   (marks + buffer each)
//!                 ↑ enqueue_root / status / stop
//!            PollingCoordinator → TerminationDetector
//! ```
//!
//! ## Guarantees
//!
//! - Every element reachable from the root is discovered exactly once
//! - Every traversed incidence is classified TREE or CROSS exactly once
//! - A run token is single-use; a second run fails instead of re-traversing

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod canonical;
pub mod channel;
pub mod config;
pub mod error;
pub mod mediated;
pub mod polling;
pub mod store;
pub mod types;
pub mod visitor;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use buffer::{Buffer, BufferKind, Queue, Stack, WorkBuffer};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use channel::{
    CoordinatorClient, MediatedSatelliteClient, PeerSatelliteClient, StationDirectory,
    StationRegistry,
};
pub use config::{ClusterConfig, TraversalConfig};
pub use error::{ChannelError, TraversalError, TraversalResult};
pub use mediated::{Coordinator, MediatedCluster, MediatedSatellite, RunReport};
pub use polling::{
    PeerSatellite, PollReport, PollingCluster, PollingCoordinator, SatelliteState,
    SatelliteStatus, TerminationDetector, TerminationStrategy,
};
pub use store::{GraphAccessor, HypergraphBuilder, InMemoryPartition};
pub use types::{
    Direction, DiscoveryOrder, EdgeId, Element, ElementCounts, GlobalId, Incidence,
    IncidenceId, Mark, PartitionId, RunState, RunToken, TraversalDirection, VertexId,
};
pub use visitor::{
    Classification, CountingVisitor, EventLog, SpanningForest, VisitEvent, Visitor,
};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, StationRole, StationState};
