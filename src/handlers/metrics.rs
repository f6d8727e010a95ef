//! Metrics endpoint handler for Prometheus scraping.
//!
//! This module provides the `/metrics` endpoint handler. The refresh task keeps the
//! registry current, so a scrape only gathers and encodes.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let families = state.registry.gather();

    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        return Err(MetricsError::EncodingFailed);
    }

    // Record response size
    let response_size_kb = buffer.len() as f64 / 1024.0;
    state
        .health_stats
        .record_metrics_response_size_kb(response_size_kb);

    // Record metrics request statistics
    let request_duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    state.health_stats.record_metrics_endpoint_call();
    state
        .health_stats
        .record_request_duration(request_duration_ms);
    state.health_stats.record_http_request();

    state
        .metrics
        .scrape_duration_seconds
        .set(start.elapsed().as_secs_f64());

    let series_count = families.iter().map(|f| f.get_metric().len()).sum::<usize>();
    debug!(
        "Metrics request completed: {} series, {} bytes, {:.3}ms",
        series_count,
        buffer.len(),
        request_duration_ms
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}
