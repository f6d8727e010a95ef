//! CLI arguments and subcommands for prometheus-cardinality-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Name as accepted on the command line and in config files.
    pub fn name(&self) -> String {
        self.to_possible_value()
            .map(|value| value.get_name().to_string())
            .unwrap_or_default()
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "prometheus-cardinality-exporter",
    about = "Prometheus exporter for TSDB cardinality statistics of Prometheus instances",
    long_about = "Prometheus exporter for TSDB cardinality statistics of Prometheus instances.\n\n\
                  Periodically queries /api/v1/status/tsdb on every configured instance and \
                  republishes the top series-count, label-value-count, memory and label-pair \
                  contributors as gauges, including per-label and per-metric breakdowns.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides log_level from the config file; default: info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Seconds between refresh cycles
    #[arg(short = 'f', long)]
    pub refresh_interval: Option<u64>,

    /// Timeout in seconds for each status request
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Address of a single Prometheus instance to monitor (added to configured instances)
    #[arg(long)]
    pub instance_address: Option<String>,

    /// Name of the instance given with --instance-address
    #[arg(long, requires = "instance_address")]
    pub instance_name: Option<String>,

    /// Namespace of the instance given with --instance-address
    #[arg(long, requires = "instance_address")]
    pub instance_namespace: Option<String>,

    /// Secondary requests in flight per instance during expansion
    #[arg(long)]
    pub expansion_concurrency: Option<usize>,

    /// Keep expanding remaining keys when one key fails
    #[arg(long)]
    pub best_effort_expansion: bool,

    /// Disable per-label and per-metric breakdowns
    #[arg(long)]
    pub disable_expansion: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Fetch the TSDB status of every configured instance once and print it
    Test {
        /// Also fetch the per-label and per-metric breakdowns
        #[arg(long)]
        expand: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },
}
