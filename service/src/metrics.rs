//! Prometheus counters and histograms, exposed on `/metrics`.

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

pub struct Metrics {
    pub tasks_created_total: IntCounter,
    pub tasks_completed_total: IntCounter,
    pub tasks_failed_total: IntCounter,
    pub task_processing_duration_seconds: Histogram,
    pub http_requests_total: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| Metrics {
        tasks_created_total: register_int_counter!(
            "tasks_created_total",
            "Number of tasks accepted at the submission gateway"
        )
        .expect("register tasks_created_total"),
        tasks_completed_total: register_int_counter!(
            "tasks_completed_total",
            "Number of tasks that finalized with status complete"
        )
        .expect("register tasks_completed_total"),
        tasks_failed_total: register_int_counter!(
            "tasks_failed_total",
            "Number of tasks that finalized with status failed"
        )
        .expect("register tasks_failed_total"),
        task_processing_duration_seconds: register_histogram!(
            "task_processing_duration_seconds",
            "Wall-clock time from task enqueue to finalize"
        )
        .expect("register task_processing_duration_seconds"),
        http_requests_total: register_int_counter_vec!(
            "http_requests_total",
            "HTTP requests served by the submission gateway",
            &["method", "path", "status"]
        )
        .expect("register http_requests_total"),
    })
}

pub fn render() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    encoder
        .encode(&families, &mut buf)
        .expect("encode prometheus metrics");
    buf
}

/// Route-level middleware that counts every request by method, matched route
/// template, and response status. Applied with `route_layer` so it only sees
/// traffic that reached a registered route, by which point `MatchedPath` is
/// populated in the request extensions.
pub async fn track_requests(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    metrics()
        .http_requests_total
        .with_label_values(&[&method, &path, response.status().as_str()])
        .inc();

    response
}
