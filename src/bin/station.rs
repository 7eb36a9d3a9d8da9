//! Station Service Binary
//!
//! Serves one partition of the hypergraph and, on the coordinator's
//! partition, the coordinator of the chosen protocol.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `STATION_PARTITION`: partition served by this station (required)
//! - `STATION_ROLE`: `mediated` (default) or `polling`
//! - `CLUSTER_CONFIG`: path of the cluster JSON (default: cluster.json)
//! - `GRAPH_PATH`: path of this partition's JSON dump (required)
//! - `PORT`: Service port (default: 8001)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//! - `TRAVERSAL_*`: run parameters, see `TraversalConfig::from_env`
//!
//! ## Usage
//!
//! ```bash
//! STATION_PARTITION=0 GRAPH_PATH=p0.json CLUSTER_CONFIG=cluster.json \
//!     cargo run --bin station --features service
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use partitioned_traversal::channel::http::{HttpConnector, HttpPoolConfig};
use partitioned_traversal::channel::local::InProcess;
use partitioned_traversal::channel::{
    CoordinatorClient, MediatedSatelliteClient, PeerSatelliteClient, StationRegistry,
};
use partitioned_traversal::service::{
    create_router, metrics_middleware, StationRole, StationState,
};
use partitioned_traversal::{
    ClusterConfig, Coordinator, CountingVisitor, GraphAccessor, InMemoryPartition,
    MediatedSatellite, PartitionId, PeerSatellite, PollingCoordinator, TraversalConfig,
};

type Station = StationState<InMemoryPartition, CountingVisitor>;

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "station=info,partitioned_traversal=info,tower_http=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

/// Request logging middleware that adds a request id and timing
async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let request_id = request
        .headers()
        .get("X-Request-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %uri,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();
    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as u64);

    tracing::debug!(
        target: "station::access",
        request_id = %request_id,
        method = %method,
        path = %uri,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request completed"
    );

    response
}

fn required_env(key: &str) -> Result<String, Box<dyn std::error::Error>> {
    std::env::var(key).map_err(|_| format!("{} must be set", key).into())
}

async fn mediated_station(
    partition: PartitionId,
    accessor: Arc<InMemoryPartition>,
    cluster: &ClusterConfig,
    registry: &StationRegistry,
    connector: &HttpConnector,
    config: TraversalConfig,
) -> Result<Station, Box<dyn std::error::Error>> {
    let home = partition == cluster.coordinator;
    let coordinator = home.then(|| {
        Arc::new(Coordinator::new(partition, config.clone(), CountingVisitor::new()))
    });

    let coordinator_client: Arc<dyn CoordinatorClient> = match &coordinator {
        Some(c) => Arc::new(InProcess::new(c)),
        None => {
            registry
                .connect::<dyn CoordinatorClient>(connector, cluster.coordinator)
                .await?
        }
    };

    let satellite = Arc::new(MediatedSatellite::new(
        accessor,
        config.direction,
        coordinator_client,
    ));
    registry
        .connect_all::<dyn MediatedSatelliteClient>(connector, satellite.peers())
        .await?;
    satellite
        .peers()
        .register(partition, Arc::new(InProcess::new(&satellite)));

    let mut state = StationState::new(partition).with_mediated(Arc::clone(&satellite));
    if let Some(coordinator) = coordinator {
        registry
            .connect_all::<dyn MediatedSatelliteClient>(connector, coordinator.satellites())
            .await?;
        coordinator
            .satellites()
            .register(partition, Arc::new(InProcess::new(&satellite)));
        info!(stations = coordinator.satellites().len(), "Mediating coordinator hosted");
        state = state.with_coordinator(coordinator);
    }
    Ok(state)
}

async fn polling_station(
    partition: PartitionId,
    accessor: Arc<InMemoryPartition>,
    cluster: &ClusterConfig,
    registry: &StationRegistry,
    connector: &HttpConnector,
    config: TraversalConfig,
) -> Result<Station, Box<dyn std::error::Error>> {
    let satellite = Arc::new(PeerSatellite::new(
        accessor,
        config.clone(),
        CountingVisitor::new(),
    ));
    registry
        .connect_all::<dyn PeerSatelliteClient>(connector, satellite.peers())
        .await?;
    satellite.prepare().await?;

    let looping = Arc::clone(&satellite);
    tokio::spawn(async move {
        if let Err(e) = looping.run().await {
            error!(error = %e, "Satellite loop terminated with an error");
        }
    });

    let mut state = StationState::new(partition).with_peer(Arc::clone(&satellite));
    if partition == cluster.coordinator {
        let coordinator = Arc::new(PollingCoordinator::new(partition, config));
        registry
            .connect_all::<dyn PeerSatelliteClient>(connector, coordinator.satellites())
            .await?;
        coordinator
            .satellites()
            .register(partition, Arc::new(InProcess::new(&satellite)));
        info!(stations = coordinator.satellites().len(), "Polling coordinator hosted");
        state = state.with_polling_coordinator(coordinator);
    }
    Ok(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    info!(version = version, "Starting station");

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8001);
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    let partition = PartitionId(required_env("STATION_PARTITION")?.parse()?);
    let role = match std::env::var("STATION_ROLE") {
        Ok(raw) => StationRole::from_str(&raw).ok_or_else(|| format!("Unknown STATION_ROLE: {}", raw))?,
        Err(_) => StationRole::Mediated,
    };
    let cluster_path =
        std::env::var("CLUSTER_CONFIG").unwrap_or_else(|_| "cluster.json".to_string());
    let cluster = ClusterConfig::from_path(&cluster_path)?;
    let config = TraversalConfig::from_env();

    let load_start = Instant::now();
    let graph = InMemoryPartition::from_json(&std::fs::read_to_string(required_env("GRAPH_PATH")?)?)?;
    if graph.partition() != partition {
        return Err(format!(
            "GRAPH_PATH holds partition {}, station serves {}",
            graph.partition(),
            partition
        )
        .into());
    }
    info!(
        partition = %partition,
        vertices = graph.num_vertices(),
        edges = graph.num_edges(),
        latency_ms = load_start.elapsed().as_millis() as u64,
        "Partition loaded"
    );

    let registry = StationRegistry::from(&cluster);
    let connector = HttpConnector::new(&HttpPoolConfig::default())?;
    let accessor = Arc::new(graph);

    let state = match role {
        StationRole::Mediated => {
            mediated_station(partition, accessor, &cluster, &registry, &connector, config).await?
        }
        StationRole::Polling => {
            polling_station(partition, accessor, &cluster, &registry, &connector, config).await?
        }
    };
    info!(role = %role, roles = ?state.roles(), "Station state initialized");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(address = %addr, partition = %partition, "Station listening");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
            _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Station shutdown complete");
    Ok(())
}
