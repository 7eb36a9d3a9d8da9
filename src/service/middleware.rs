//! Service middleware and run metrics.
//!
//! ## Metrics Exposed (as structured log events)
//!
//! - `request` - count and latency by path, method, status
//! - `mediated_run` - discovered elements and cross incidences per run
//! - `polling_run` - poll rounds and activity per run

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

use crate::mediated::RunReport;
use crate::polling::PollReport;

/// Metrics middleware that records request counts and latency.
///
/// Route paths are static, so the raw path is a low-cardinality label.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    info!(
        target: "partitioned_traversal::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request_metric"
    );

    response
}

/// Record the outcome of a mediated run.
pub fn record_run_metrics(report: &RunReport) {
    let duration_ms = (report.finished_at - report.started_at).num_milliseconds();
    info!(
        target: "partitioned_traversal::metrics",
        metric_type = "mediated_run",
        run_id = %report.run_id,
        vertices = report.discovered_vertices,
        edges = report.discovered_edges,
        cross = report.cross_incidences,
        expansions = report.expansions,
        duration_ms = duration_ms,
        "mediated_run_metric"
    );
}

/// Record the outcome of a polling run.
pub fn record_poll_metrics(report: &PollReport) {
    let duration_ms = (report.finished_at - report.started_at).num_milliseconds();
    info!(
        target: "partitioned_traversal::metrics",
        metric_type = "polling_run",
        run_id = %report.run_id,
        strategy = %report.strategy,
        poll_rounds = report.poll_rounds,
        activity = report.total_activity(),
        duration_ms = duration_ms,
        "polling_run_metric"
    );
}
