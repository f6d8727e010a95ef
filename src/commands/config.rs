//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config, InstanceConfig};

/// Default configuration with one sample instance, so the output validates as-is.
pub fn sample_config() -> Config {
    Config {
        instances: vec![InstanceConfig {
            namespace: "monitoring".into(),
            name: "prometheus-0".into(),
            sharded_name: Some("prometheus".into()),
            address: "http://localhost:9090".into(),
            auth_value: None,
            auth_file: None,
        }],
        ..Config::default()
    }
}

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = sample_config();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("cardinality-exporter.yaml"),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Prometheus Cardinality Exporter Configuration
# ==============================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                  # Bind IP (0.0.0.0 = all interfaces)
# port: 9090                       # HTTP port
#
# Refresh Loop
# ------------
# refresh_interval_seconds: 300    # Seconds between refresh cycles
# request_timeout_seconds: 30      # Timeout per TSDB status request
#
# Feature Flags
# -------------
# enable_health: true              # Enable /health endpoint
#
# Logging
# -------
# log_level: "info"                # off, error, warn, info, debug, trace
#
# Cross-Dimensional Expansion
# ---------------------------
# expansion:
#   series_by_metric_per_label: true   # Series count by metric name, per label name
#   label_count_per_metric: true       # Label value count by label name, per metric name
#   concurrency: 4                     # Secondary requests in flight per instance
#   policy: fail-fast                  # fail-fast or best-effort
#   eviction_cycles: 0                 # Forget keys absent this many cycles (0 = never)
#
# Instances
# ---------
# instances:
#   - namespace: monitoring            # Exported as instance_namespace
#     name: prometheus-0               # Exported as scraped_instance
#     sharded_name: prometheus         # Exported as sharded_instance (default: name)
#     address: http://prometheus:9090  # Base URL of the Prometheus server
#     auth_value: null                 # Authorization header value
#     auth_file: null                  # File containing the Authorization header value
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false                # Enable HTTPS (default: false)
# tls_cert_path: null              # Path to TLS certificate (PEM format)
# tls_key_path: null               # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}
