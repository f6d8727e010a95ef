//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with the monitored instances and available endpoints.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let mut instance_rows = String::new();
    for slot in &state.instances {
        let status = slot.status();
        let state_str = match status.last_success {
            Some(true) => "ok",
            Some(false) => "failed",
            None => "pending",
        };
        instance_rows.push_str(&format!(
            "        <li><code>{}</code> <span class=\"status-{}\">{}</span> ({} series)</li>\n",
            html_escape(&slot.name),
            state_str,
            state_str,
            status.exposed_series
        ));
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Prometheus Cardinality Exporter</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{
            color: #333;
            border-bottom: 3px solid #e6522c;
            padding-bottom: 15px;
        }}
        .info {{
            background: #e9ecef;
            padding: 15px;
            border-radius: 4px;
            margin: 20px 0;
        }}
        .status-ok {{ color: #28a745; }}
        .status-failed {{ color: #dc3545; }}
        .status-pending {{ color: #6c757d; }}
        .footer {{
            margin-top: 40px;
            padding-top: 20px;
            border-top: 1px solid #ddd;
            color: #666;
            font-size: 0.9em;
            text-align: center;
        }}
        code {{
            background: #e9ecef;
            padding: 2px 6px;
            border-radius: 3px;
        }}
    </style>
</head>
<body>
<div class="container">
    <h1>Prometheus Cardinality Exporter</h1>
    <div class="info">Version {version} | Uptime {uptime}</div>

    <h2>Instances</h2>
    <ul>
{instances}    </ul>

    <h2>Endpoints</h2>
    <ul>
        <li><a href="/metrics">/metrics</a> cardinality gauges in Prometheus text format</li>
        <li><a href="/health">/health</a> refresh status and exporter statistics (text)</li>
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        instances = instance_rows,
        footer = FOOTER_TEXT
    );

    Html(html)
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
