//! prometheus-cardinality-exporter
//!
//! Exports TSDB cardinality statistics of Prometheus instances with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod state;
mod updater;

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use cardinality_exporter::health_stats::HealthStats;
use cardinality_exporter::{CardinalityInstance, CardinalityMetrics, HttpStatusClient};
use clap::Parser;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_config, command_test};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use handlers::{health_handler, metrics_handler, root_handler};
use state::{AppState, InstanceSlot};

/// Initializes tracing logging subsystem with the configured log level.
fn setup_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let level = config.effective_log_level()?;
    let log_level = match level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };

    let Some(log_level) = log_level else {
        return Ok(());
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Logging initialized with level: {:?}", level);
    Ok(())
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Builds one instance slot per configured instance.
fn build_instances(config: &Config) -> anyhow::Result<Vec<InstanceSlot>> {
    config
        .instances
        .iter()
        .map(|instance| {
            let identity = instance.identity()?;
            debug!(
                "Configured instance {} ({}) at {}",
                identity.name, identity.namespace, identity.address
            );
            Ok(InstanceSlot::new(CardinalityInstance::new(identity)))
        })
        .collect()
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),

            Commands::Test { expand, format } => {
                let config = load_validated_config(&args)?;
                setup_logging(&config)?;
                command_test(*expand, format.clone(), &config).await
            }
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&config)?;

    info!("Starting prometheus-cardinality-exporter");

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics = CardinalityMetrics::new(&registry)?;
    debug!("All metrics registered successfully");

    let timeout = config
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    let client = HttpStatusClient::new(Duration::from_secs(timeout))?;

    let instances = build_instances(&config)?;
    info!("Monitoring {} Prometheus instance(s)", instances.len());

    let state = Arc::new(AppState {
        registry,
        metrics,
        client,
        instances,
        config: Arc::new(config.clone()),
        health_stats: Arc::new(HealthStats::new()),
        start_time: Instant::now(),
    });

    // Background refresh: first cycle runs immediately
    let refresh_task = tokio::spawn(updater::run_refresh_loop(state.clone()));

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state.clone());

    match (
        config.enable_tls.unwrap_or(false),
        config.tls_cert_path.as_ref(),
        config.tls_key_path.as_ref(),
    ) {
        (true, Some(cert_path), Some(key_path)) => {
            info!("Loading TLS certificate from: {}", cert_path);
            info!("Loading TLS private key from: {}", key_path);

            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .map_err(|e| {
                    error!("Failed to load TLS configuration: {}", e);
                    e
                })?;

            info!(
                "prometheus-cardinality-exporter listening on https://{}:{}",
                bind_ip_str, port
            );

            let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!("Server error: {}", e);
                        return Err(e.into());
                    }
                }
                _ = shutdown_signal => {
                    info!("Shutdown signal received, exiting...");
                }
            }
        }
        (true, _, _) => {
            return Err("TLS is enabled but certificate or key path is missing".into());
        }
        _ => {
            let listener = TcpListener::bind(addr).await?;
            info!(
                "prometheus-cardinality-exporter listening on http://{}:{}",
                bind_ip_str, port
            );

            let server = axum::serve(listener, app);

            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!("Server error: {}", e);
                        return Err(e.into());
                    }
                }
                _ = shutdown_signal => {
                    info!("Shutdown signal received, exiting...");
                }
            }
        }
    }

    refresh_task.abort();
    info!("prometheus-cardinality-exporter stopped gracefully");
    Ok(())
}
