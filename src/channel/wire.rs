//! JSON bodies and paths shared by the HTTP station service and its
//! client stubs.

use serde::{Deserialize, Serialize};

use crate::error::TraversalError;
use crate::types::{EdgeId, IncidenceId, PartitionId, VertexId};

/// Route paths. Every remote call is a `POST` with a JSON body.
pub mod paths {
    /// `CoordinatorClient::run`.
    pub const COORDINATOR_RUN: &str = "/coordinator/run";
    /// Polling run driven by this station's polling coordinator.
    pub const COORDINATOR_POLL_RUN: &str = "/coordinator/poll_run";
    /// `CoordinatorClient::partition_id`.
    pub const COORDINATOR_PARTITION: &str = "/coordinator/partition";
    /// `CoordinatorClient::test_and_process_edge`.
    pub const COORDINATOR_TEST_EDGE: &str = "/coordinator/test_edge";
    /// `CoordinatorClient::test_and_process_vertex`.
    pub const COORDINATOR_TEST_VERTEX: &str = "/coordinator/test_vertex";
    /// `CoordinatorClient::notify`.
    pub const COORDINATOR_NOTIFY: &str = "/coordinator/notify";

    /// `MediatedSatelliteClient::element_counts`.
    pub const MEDIATED_COUNTS: &str = "/mediated/counts";
    /// `MediatedSatelliteClient::process_root`.
    pub const MEDIATED_ROOT: &str = "/mediated/process_root";
    /// `MediatedSatelliteClient::process_vertex`.
    pub const MEDIATED_VERTEX: &str = "/mediated/process_vertex";
    /// `MediatedSatelliteClient::process_edge`.
    pub const MEDIATED_EDGE: &str = "/mediated/process_edge";

    /// `PeerSatelliteClient::enqueue_root`.
    pub const PEER_ROOT: &str = "/peer/enqueue_root";
    /// `PeerSatelliteClient::test_and_enqueue_edge`.
    pub const PEER_TEST_EDGE: &str = "/peer/test_edge";
    /// `PeerSatelliteClient::test_and_enqueue_vertex`.
    pub const PEER_TEST_VERTEX: &str = "/peer/test_vertex";
    /// `PeerSatelliteClient::is_working`.
    pub const PEER_WORKING: &str = "/peer/working";
    /// `PeerSatelliteClient::status`.
    pub const PEER_STATUS: &str = "/peer/status";
    /// `PeerSatelliteClient::stop`.
    pub const PEER_STOP: &str = "/peer/stop";
}

/// A vertex argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexRequest {
    /// Target vertex.
    pub vertex: VertexId,
}

/// A vertex reached through an incidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexViaRequest {
    /// Target vertex.
    pub vertex: VertexId,
    /// Incidence that reached it.
    pub via: IncidenceId,
}

/// An edge reached through an incidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeViaRequest {
    /// Target edge.
    pub edge: EdgeId,
    /// Incidence that reached it.
    pub via: IncidenceId,
}

/// Result of a test-and-mark call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredResponse {
    /// `true` if this call discovered the element.
    pub discovered: bool,
}

/// Result of `is_working`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingResponse {
    /// Whether the satellite has or is doing work.
    pub working: bool,
}

/// Result of `partition_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionResponse {
    /// Partition of the answering station.
    pub partition: PartitionId,
}

/// Empty body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {}

/// Error body returned by a station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Additional error details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create an error response.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Add details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<&TraversalError> for ErrorResponse {
    fn from(e: &TraversalError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}
