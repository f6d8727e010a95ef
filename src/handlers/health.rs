//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! per-instance refresh status and exporter statistics.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use std::time::SystemTime;
use tracing::{debug, instrument};

use crate::state::{AppState, SharedState};

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = concat!(
    "prometheus-cardinality-exporter ",
    env!("CARGO_PKG_VERSION")
);

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    state.health_stats.record_http_request();

    let healthy = state.all_instances_healthy();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let message = if healthy {
        "OK"
    } else if state
        .instances
        .iter()
        .all(|slot| slot.status().last_success.is_none())
    {
        "Waiting for first refresh"
    } else {
        "Refresh failed for one or more instances"
    };

    let uptime_str = format_uptime(state.health_stats.get_uptime_seconds());
    let instances = render_instance_table(&state);
    let table = state.health_stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\nUptime: {uptime_str}\n\n{instances}\n{table}\n{FOOTER_TEXT}"),
    )
}

fn format_uptime(uptime_seconds: u64) -> String {
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    }
}

/// Renders per-instance refresh status as a plain-text table.
fn render_instance_table(state: &AppState) -> String {
    let mut out = String::new();
    writeln!(out, "INSTANCES").ok();
    writeln!(out, "=========").ok();
    writeln!(out).ok();
    writeln!(
        out,
        "{:30} | {:>8} | {:>10} | {:>12} | {:>8}",
        "Instance", "Status", "Series", "Duration (s)", "Age (s)"
    )
    .ok();
    writeln!(out, "{}", "-".repeat(80)).ok();

    for slot in &state.instances {
        let status = slot.status();
        let label = match status.last_success {
            Some(true) => "ok",
            Some(false) => "failed",
            None => "pending",
        };
        let age = status
            .last_refresh
            .and_then(|t| SystemTime::now().duration_since(t).ok())
            .map(|d| d.as_secs().to_string())
            .unwrap_or_else(|| "-".to_string());

        writeln!(
            out,
            "{:30} | {:>8} | {:>10} | {:>12.3} | {:>8}",
            slot.name, label, status.exposed_series, status.duration_seconds, age
        )
        .ok();
        if let Some(error) = &status.last_error {
            writeln!(out, "  last error: {}", error).ok();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(90), "1.5 minutes");
        assert_eq!(format_uptime(7200), "2.0 hours");
        assert_eq!(format_uptime(172800), "2.0 days");
    }
}
