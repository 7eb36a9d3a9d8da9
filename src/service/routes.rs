//! Axum routes for a station.

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::channel::wire::{
    paths, Ack, DiscoveredResponse, EdgeViaRequest, ErrorResponse, PartitionResponse,
    VertexRequest, VertexViaRequest, WorkingResponse,
};
use crate::error::TraversalError;
use crate::mediated::{Coordinator, MediatedSatellite, RunReport};
use crate::polling::{PeerSatellite, PollReport, PollingCoordinator, SatelliteStatus};
use crate::store::GraphAccessor;
use crate::types::{ElementCounts, PartitionId, RunState};
use crate::visitor::{VisitEvent, Visitor};

use super::middleware::{record_poll_metrics, record_run_metrics};
use super::state::StationState;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Response Types
// ============================================================================

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always `alive`.
    pub status: String,
}

/// Station health (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the peer satellite failed.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Partition served.
    pub partition: PartitionId,
    /// Hosted roles.
    pub roles: Vec<String>,
    /// Seconds since startup.
    pub uptime_secs: i64,
    /// Run state of the hosted coordinator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<RunState>,
    /// Status of the hosted peer satellite.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<SatelliteStatus>,
}

/// Map a traversal error onto a status code and error body.
pub fn api_error(e: TraversalError) -> ApiError {
    let status = match &e {
        TraversalError::Reuse(_) | TraversalError::NotStarted | TraversalError::Stopped(_) => {
            StatusCode::CONFLICT
        }
        TraversalError::VertexNotFound(_)
        | TraversalError::EdgeNotFound(_)
        | TraversalError::UnknownPartition(_) => StatusCode::NOT_FOUND,
        TraversalError::OutOfRange { .. } | TraversalError::WrongPartition { .. } => {
            StatusCode::BAD_REQUEST
        }
        TraversalError::Channel(_) | TraversalError::Remote { .. } => StatusCode::BAD_GATEWAY,
        TraversalError::Accessor(_) | TraversalError::SatelliteFailed { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    tracing::warn!(code = e.code(), error = %e, status = status.as_u16(), "Station call failed");
    (status, Json(ErrorResponse::from(&e)))
}

fn role_missing(role: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(
            ErrorResponse::new("ROLE_NOT_SERVED", format!("This station does not host a {}", role))
                .with_details(role.to_string()),
        ),
    )
}

fn coordinator<G, V>(state: &StationState<G, V>) -> Result<Arc<Coordinator<V>>, ApiError> {
    state.coordinator.clone().ok_or_else(|| role_missing("coordinator"))
}

fn polling_coordinator<G, V>(
    state: &StationState<G, V>,
) -> Result<Arc<PollingCoordinator>, ApiError> {
    state
        .polling_coordinator
        .clone()
        .ok_or_else(|| role_missing("polling coordinator"))
}

fn mediated<G, V>(state: &StationState<G, V>) -> Result<Arc<MediatedSatellite<G>>, ApiError> {
    state.mediated.clone().ok_or_else(|| role_missing("mediated satellite"))
}

fn peer<G, V>(state: &StationState<G, V>) -> Result<Arc<PeerSatellite<G, V>>, ApiError> {
    state.peer.clone().ok_or_else(|| role_missing("peer satellite"))
}

// ============================================================================
// Coordinator Handlers
// ============================================================================

async fn coordinator_run<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
    Json(request): Json<VertexRequest>,
) -> ApiResult<RunReport>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let coordinator = coordinator(&state)?;
    let report = coordinator.run(request.vertex).await.map_err(api_error)?;
    record_run_metrics(&report);
    Ok(Json(report))
}

async fn coordinator_poll_run<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
    Json(request): Json<VertexRequest>,
) -> ApiResult<PollReport>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let coordinator = polling_coordinator(&state)?;
    let report = coordinator.run(request.vertex).await.map_err(api_error)?;
    record_poll_metrics(&report);
    Ok(Json(report))
}

async fn coordinator_partition<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
) -> ApiResult<PartitionResponse>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let coordinator = coordinator(&state)?;
    Ok(Json(PartitionResponse {
        partition: coordinator.partition_id(),
    }))
}

async fn coordinator_test_edge<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
    Json(request): Json<EdgeViaRequest>,
) -> ApiResult<DiscoveredResponse>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let discovered = coordinator(&state)?
        .test_and_process_edge(request.edge, request.via)
        .map_err(api_error)?;
    Ok(Json(DiscoveredResponse { discovered }))
}

async fn coordinator_test_vertex<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
    Json(request): Json<VertexViaRequest>,
) -> ApiResult<DiscoveredResponse>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let discovered = coordinator(&state)?
        .test_and_process_vertex(request.vertex, request.via)
        .map_err(api_error)?;
    Ok(Json(DiscoveredResponse { discovered }))
}

async fn coordinator_notify<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
    Json(event): Json<VisitEvent>,
) -> ApiResult<Ack>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    coordinator(&state)?.notify(event);
    Ok(Json(Ack {}))
}

// ============================================================================
// Mediated Satellite Handlers
// ============================================================================

async fn mediated_counts<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
) -> ApiResult<ElementCounts>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let satellite = mediated(&state)?;
    let counts = satellite.element_counts().await.map_err(api_error)?;
    Ok(Json(counts))
}

async fn mediated_root<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
    Json(request): Json<VertexRequest>,
) -> ApiResult<Ack>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let satellite = mediated(&state)?;
    satellite.process_root(request.vertex).await.map_err(api_error)?;
    Ok(Json(Ack {}))
}

async fn mediated_vertex<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
    Json(request): Json<VertexRequest>,
) -> ApiResult<Ack>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let satellite = mediated(&state)?;
    satellite.process_vertex(request.vertex).await.map_err(api_error)?;
    Ok(Json(Ack {}))
}

async fn mediated_edge<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
    Json(request): Json<EdgeViaRequest>,
) -> ApiResult<Ack>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let satellite = mediated(&state)?;
    satellite
        .process_edge(request.edge, request.via)
        .await
        .map_err(api_error)?;
    Ok(Json(Ack {}))
}

// ============================================================================
// Peer Satellite Handlers
// ============================================================================

async fn peer_root<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
    Json(request): Json<VertexRequest>,
) -> ApiResult<Ack>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let satellite = peer(&state)?;
    satellite.enqueue_root(request.vertex).await.map_err(api_error)?;
    Ok(Json(Ack {}))
}

async fn peer_test_edge<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
    Json(request): Json<EdgeViaRequest>,
) -> ApiResult<DiscoveredResponse>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let discovered = peer(&state)?
        .test_and_enqueue_edge(request.edge, request.via)
        .map_err(api_error)?;
    Ok(Json(DiscoveredResponse { discovered }))
}

async fn peer_test_vertex<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
    Json(request): Json<VertexViaRequest>,
) -> ApiResult<DiscoveredResponse>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let discovered = peer(&state)?
        .test_and_enqueue_vertex(request.vertex, request.via)
        .map_err(api_error)?;
    Ok(Json(DiscoveredResponse { discovered }))
}

async fn peer_working<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
) -> ApiResult<WorkingResponse>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let working = peer(&state)?.is_working().map_err(api_error)?;
    Ok(Json(WorkingResponse { working }))
}

async fn peer_status<G, V>(
    State(state): State<Arc<StationState<G, V>>>,
) -> ApiResult<SatelliteStatus>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    Ok(Json(peer(&state)?.status()))
}

async fn peer_stop<G, V>(State(state): State<Arc<StationState<G, V>>>) -> ApiResult<Ack>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    peer(&state)?.stop();
    Ok(Json(Ack {}))
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Liveness probe. Does NOT check peers.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Detailed health: hosted roles and their state.
async fn health_handler<G, V>(State(state): State<Arc<StationState<G, V>>>) -> Json<HealthResponse>
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let peer = state.peer.as_ref().map(|p| p.status());
    let degraded = peer
        .as_ref()
        .is_some_and(|s| s.state == crate::polling::SatelliteState::Failed);

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        partition: state.partition(),
        roles: state.roles().into_iter().map(String::from).collect(),
        uptime_secs: (chrono::Utc::now() - state.started_at()).num_seconds(),
        coordinator: state.coordinator.as_ref().map(|c| c.run_state()),
        peer,
    })
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for a station.
pub fn create_router<G, V>(state: StationState<G, V>) -> Router
where
    G: GraphAccessor + 'static,
    V: Visitor + 'static,
{
    let state = Arc::new(state);

    Router::new()
        // Mediating coordinator
        .route(paths::COORDINATOR_RUN, post(coordinator_run::<G, V>))
        .route(paths::COORDINATOR_POLL_RUN, post(coordinator_poll_run::<G, V>))
        .route(paths::COORDINATOR_PARTITION, post(coordinator_partition::<G, V>))
        .route(paths::COORDINATOR_TEST_EDGE, post(coordinator_test_edge::<G, V>))
        .route(paths::COORDINATOR_TEST_VERTEX, post(coordinator_test_vertex::<G, V>))
        .route(paths::COORDINATOR_NOTIFY, post(coordinator_notify::<G, V>))
        // Mediated satellite
        .route(paths::MEDIATED_COUNTS, post(mediated_counts::<G, V>))
        .route(paths::MEDIATED_ROOT, post(mediated_root::<G, V>))
        .route(paths::MEDIATED_VERTEX, post(mediated_vertex::<G, V>))
        .route(paths::MEDIATED_EDGE, post(mediated_edge::<G, V>))
        // Peer satellite
        .route(paths::PEER_ROOT, post(peer_root::<G, V>))
        .route(paths::PEER_TEST_EDGE, post(peer_test_edge::<G, V>))
        .route(paths::PEER_TEST_VERTEX, post(peer_test_vertex::<G, V>))
        .route(paths::PEER_WORKING, post(peer_working::<G, V>))
        .route(paths::PEER_STATUS, post(peer_status::<G, V>))
        .route(paths::PEER_STOP, post(peer_stop::<G, V>))
        // Health checks
        .route("/health", get(health_handler::<G, V>))
        .route("/health/live", get(liveness_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::local::InProcess;
    use crate::channel::CoordinatorClient;
    use crate::config::TraversalConfig;
    use crate::store::{HypergraphBuilder, InMemoryPartition};
    use crate::types::VertexId;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn mediated_station() -> (Router, VertexId) {
        let p = PartitionId(0);
        let mut builder = HypergraphBuilder::new(1);
        let a = builder.add_vertex(p).unwrap();
        let b = builder.add_vertex(p).unwrap();
        builder.link(p, a, b).unwrap();
        let accessor = Arc::new(builder.build().remove(0));

        let config = TraversalConfig::default();
        let coordinator = Arc::new(Coordinator::new(p, config.clone(), ()));
        let client: Arc<dyn CoordinatorClient> = Arc::new(InProcess::new(&coordinator));
        let satellite = Arc::new(MediatedSatellite::new(accessor, config.direction, client));
        coordinator
            .satellites()
            .register(p, Arc::new(InProcess::new(&satellite)));

        let state: StationState<InMemoryPartition, ()> = StationState::new(p)
            .with_coordinator(coordinator)
            .with_mediated(satellite);
        (create_router(state), a)
    }

    fn post_json(path: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_run_over_http_then_reuse_conflict() {
        let (router, root) = mediated_station();
        let request = serde_json::json!({ "vertex": root });

        let response = router
            .clone()
            .oneshot(post_json(paths::COORDINATOR_RUN, request.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["discovered_vertices"], 2);

        let response = router
            .oneshot(post_json(paths::COORDINATOR_RUN, request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "RUN_REUSED");
    }

    #[tokio::test]
    async fn test_unserved_role_is_not_found() {
        let (router, _) = mediated_station();
        let response = router
            .oneshot(post_json(paths::PEER_WORKING, serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "ROLE_NOT_SERVED");
    }

    #[test]
    fn test_error_status_mapping() {
        let (status, body) = api_error(TraversalError::Reuse(RunState::Done));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "RUN_REUSED");

        let (status, _) = api_error(TraversalError::VertexNotFound(VertexId::new(PartitionId(0), 3)));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = role_missing("coordinator");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "ROLE_NOT_SERVED");
    }
}
