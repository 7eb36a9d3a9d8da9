//! Error types for traversal runs and the remote call channel.

use crate::types::{EdgeId, Element, PartitionId, RunState, VertexId};

/// Result alias used throughout the crate.
pub type TraversalResult<T> = Result<T, TraversalError>;

/// Failures of the station-to-station channel itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// No hostname is registered for the requested station.
    #[error("Unknown station host: {0}")]
    UnknownHost(String),
    /// The station exists but is no longer reachable.
    #[error("Station unavailable: {0}")]
    Unavailable(String),
    /// Transport-level failure (connection refused, reset, ...).
    #[error("Transport error: {0}")]
    Transport(String),
    /// The reply could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Error type for traversal operations.
#[derive(Debug, thiserror::Error)]
pub enum TraversalError {
    /// A run token was started twice, or marks were already initialized.
    #[error("Run token cannot be reused (state: {0})")]
    Reuse(RunState),
    /// A marking call arrived before the run sized its marks.
    #[error("Run has not been started")]
    NotStarted,
    /// Vertex does not exist on its owning partition.
    #[error("Vertex not found: {0}")]
    VertexNotFound(VertexId),
    /// Edge does not exist on its owning partition.
    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),
    /// No station is registered for a partition.
    #[error("No station registered for partition {0}")]
    UnknownPartition(PartitionId),
    /// Local id outside the sized marking array (or the sentinel slot).
    #[error("{element} is outside the marking range of partition {partition} (capacity {capacity})")]
    OutOfRange {
        /// Offending element.
        element: Element,
        /// Partition whose marks were addressed.
        partition: PartitionId,
        /// Number of real slots in that partition.
        capacity: u32,
    },
    /// A station was asked to act on an element it does not own.
    #[error("{element} is owned by partition {}, not station {station}", .element.partition())]
    WrongPartition {
        /// Offending element.
        element: Element,
        /// Station that received the request.
        station: PartitionId,
    },
    /// Error raised by the graph accessor, propagated unchanged.
    #[error("Graph accessor error: {0}")]
    Accessor(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The channel failed before a reply arrived.
    #[error("Remote call failed: {0}")]
    Channel(#[from] ChannelError),
    /// The remote station executed the call and reported an error.
    #[error("Station {station} reported: {message}")]
    Remote {
        /// Station that reported the error.
        station: String,
        /// Error message as reported.
        message: String,
    },
    /// A polled satellite reported that its loop died.
    #[error("Satellite {partition} failed: {message}")]
    SatelliteFailed {
        /// Failed partition.
        partition: PartitionId,
        /// Failure reported by the satellite.
        message: String,
    },
    /// Work was sent to a satellite that has already been stopped.
    #[error("Satellite {0} is stopped")]
    Stopped(PartitionId),
}

impl TraversalError {
    /// Wrap an error coming from a graph accessor.
    pub fn from_accessor<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Accessor(Box::new(e))
    }

    /// Stable machine-readable code, used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Reuse(_) => "RUN_REUSED",
            Self::NotStarted => "RUN_NOT_STARTED",
            Self::VertexNotFound(_) => "VERTEX_NOT_FOUND",
            Self::EdgeNotFound(_) => "EDGE_NOT_FOUND",
            Self::UnknownPartition(_) => "UNKNOWN_PARTITION",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::WrongPartition { .. } => "WRONG_PARTITION",
            Self::Accessor(_) => "ACCESSOR_ERROR",
            Self::Channel(_) => "CHANNEL_ERROR",
            Self::Remote { .. } => "REMOTE_ERROR",
            Self::SatelliteFailed { .. } => "SATELLITE_FAILED",
            Self::Stopped(_) => "SATELLITE_STOPPED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct DiskError;

    #[test]
    fn test_accessor_error_keeps_source() {
        let err = TraversalError::from_accessor(DiskError);
        assert_eq!(err.to_string(), "Graph accessor error: disk on fire");
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.code(), "ACCESSOR_ERROR");
    }

    #[test]
    fn test_wrong_partition_message() {
        let err = TraversalError::WrongPartition {
            element: Element::Vertex(VertexId::new(PartitionId(2), 4)),
            station: PartitionId(1),
        };
        assert_eq!(err.to_string(), "v2:4 is owned by partition 2, not station 1");
    }

    #[test]
    fn test_channel_error_converts() {
        let err: TraversalError = ChannelError::Unavailable("p1".into()).into();
        assert!(matches!(err, TraversalError::Channel(ChannelError::Unavailable(_))));
    }
}
