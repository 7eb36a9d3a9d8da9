//! Station REST Service
//!
//! Exposes a station's remote surfaces over HTTP/JSON. Every call is a
//! `POST` with a JSON body (see [`crate::channel::wire`]).
//!
//! ## Endpoints
//!
//! - `POST /coordinator/{run,poll_run,partition,test_edge,test_vertex,notify}`
//! - `POST /mediated/{counts,process_root,process_vertex,process_edge}`
//! - `POST /peer/{enqueue_root,test_edge,test_vertex,working,status,stop}`
//! - `GET /health` - Detailed station health
//! - `GET /health/live` - Liveness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_poll_metrics, record_run_metrics};
pub use routes::{api_error, create_router};
pub use state::{StationRole, StationState};
