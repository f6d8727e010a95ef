//! Configuration management for prometheus-cardinality-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use anyhow::Context;
use cardinality_exporter::{ExpansionOptions, ExpansionPolicy, InstanceIdentity};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use clap::ValueEnum;

use crate::cli::{Args, ConfigFormat, LogLevel};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9090;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Cross-dimensional expansion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Export series count by metric name per label name (default: true)
    #[serde(default = "default_true")]
    pub series_by_metric_per_label: bool,

    /// Export label value count by label name per metric name (default: true)
    #[serde(default = "default_true")]
    pub label_count_per_metric: bool,

    /// Secondary requests in flight per instance (default: 4)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// "fail-fast" or "best-effort" (default: fail-fast)
    #[serde(default)]
    pub policy: ExpansionPolicy,

    /// Forget a label/metric name after this many refreshes without it (0 = never)
    #[serde(default, alias = "eviction-cycles")]
    pub eviction_cycles: u32,
}

fn default_true() -> bool {
    true
}
fn default_concurrency() -> usize {
    cardinality_exporter::expander::DEFAULT_EXPANSION_CONCURRENCY
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            series_by_metric_per_label: true,
            label_count_per_metric: true,
            concurrency: default_concurrency(),
            policy: ExpansionPolicy::default(),
            eviction_cycles: 0,
        }
    }
}

impl ExpansionConfig {
    pub fn options(&self) -> ExpansionOptions {
        ExpansionOptions {
            concurrency: self.concurrency,
            policy: self.policy,
            eviction_cycles: self.eviction_cycles,
        }
    }
}

/// One monitored Prometheus instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Namespace the instance runs in
    #[serde(default)]
    pub namespace: String,
    /// Instance name, exported as `scraped_instance`
    pub name: String,
    /// Shard name, exported as `sharded_instance` (default: name)
    #[serde(default, alias = "sharded-name")]
    pub sharded_name: Option<String>,
    /// Base URL, e.g. http://prometheus:9090
    pub address: String,
    /// Literal Authorization header value
    #[serde(default, alias = "auth-value", skip_serializing_if = "Option::is_none")]
    pub auth_value: Option<String>,
    /// File holding the Authorization header value
    #[serde(default, alias = "auth-file")]
    pub auth_file: Option<PathBuf>,
}

impl InstanceConfig {
    /// Builds the instance identity, reading the auth file if one is configured.
    pub fn identity(&self) -> anyhow::Result<InstanceIdentity> {
        let sharded = self.sharded_name.clone().unwrap_or_else(|| self.name.clone());
        let identity = InstanceIdentity::new(&self.namespace, &self.name, sharded, &self.address);

        let auth = match (&self.auth_value, &self.auth_file) {
            (Some(value), _) => value.clone(),
            (None, Some(path)) => fs::read_to_string(path)
                .with_context(|| {
                    format!(
                        "can't read auth file {} for instance {}",
                        path.display(),
                        self.name
                    )
                })?
                .trim()
                .to_string(),
            (None, None) => String::new(),
        };

        Ok(identity.with_auth(auth))
    }
}

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Refresh loop
    #[serde(alias = "refresh-interval-seconds")]
    pub refresh_interval_seconds: Option<u64>,
    #[serde(alias = "request-timeout-seconds")]
    pub request_timeout_seconds: Option<u64>,

    // Feature flags
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    // Cross-dimensional expansion
    #[serde(default)]
    pub expansion: ExpansionConfig,

    // Monitored instances
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            refresh_interval_seconds: Some(DEFAULT_REFRESH_INTERVAL_SECS),
            request_timeout_seconds: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            enable_health: Some(true),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            expansion: ExpansionConfig::default(),
            instances: Vec::new(),
        }
    }
}

impl Config {
    /// Log level from `log_level`, defaulting to info.
    pub fn effective_log_level(&self) -> Result<LogLevel, String> {
        let name = self.log_level.as_deref().unwrap_or("info");
        LogLevel::from_str(name, true).map_err(|_| {
            format!(
                "invalid log_level '{}' (expected off, error, warn, info, debug or trace)",
                name
            )
        })
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    cfg.effective_log_level()?;

    if cfg.refresh_interval_seconds == Some(0) {
        return Err("refresh_interval_seconds must be greater than 0".into());
    }
    if cfg.request_timeout_seconds == Some(0) {
        return Err("request_timeout_seconds must be greater than 0".into());
    }
    if cfg.expansion.concurrency == 0 {
        return Err("expansion.concurrency must be greater than 0".into());
    }

    if cfg.instances.is_empty() {
        return Err("No instances configured (set instances or --instance-address)".into());
    }

    for (idx, instance) in cfg.instances.iter().enumerate() {
        if instance.name.trim().is_empty() {
            return Err(format!("instances[{}]: name must not be empty", idx).into());
        }
        if instance.address.trim().is_empty() {
            return Err(format!("instance '{}': address must not be empty", instance.name).into());
        }
        if !(instance.address.starts_with("http://") || instance.address.starts_with("https://")) {
            return Err(format!(
                "instance '{}': address '{}' must start with http:// or https://",
                instance.name, instance.address
            )
            .into());
        }
        if instance.auth_value.is_some() && instance.auth_file.is_some() {
            return Err(format!(
                "instance '{}': set only one of auth_value and auth_file",
                instance.name
            )
            .into());
        }
    }

    let mut names: Vec<&str> = cfg.instances.iter().map(|i| i.name.as_str()).collect();
    names.sort_unstable();
    if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(format!("instance name '{}' is configured more than once", pair[0]).into());
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    let file = Path::new(path);
    if !file.exists() {
        return Err(format!("TLS {} file not found: {}", what, path).into());
    }
    match fs::metadata(file) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Err(e) => {
            Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into())
        }
        Ok(_) => Ok(()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(interval) = args.refresh_interval {
        config.refresh_interval_seconds = Some(interval);
    }
    if let Some(timeout) = args.request_timeout {
        config.request_timeout_seconds = Some(timeout);
    }
    if let Some(level) = &args.log_level {
        config.log_level = Some(level.name());
    }

    // Single instance from the command line
    if let Some(address) = &args.instance_address {
        let name = args
            .instance_name
            .clone()
            .unwrap_or_else(|| instance_name_from_address(address));
        config.instances.push(InstanceConfig {
            namespace: args.instance_namespace.clone().unwrap_or_default(),
            name,
            address: address.clone(),
            ..InstanceConfig::default()
        });
    }

    // Expansion
    if let Some(concurrency) = args.expansion_concurrency {
        config.expansion.concurrency = concurrency;
    }
    if args.best_effort_expansion {
        config.expansion.policy = ExpansionPolicy::BestEffort;
    }
    if args.disable_expansion {
        config.expansion.series_by_metric_per_label = false;
        config.expansion.label_count_per_metric = false;
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Derives an instance name from its address: host and port without the scheme.
fn instance_name_from_address(address: &str) -> String {
    let without_scheme = address
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(address);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/cardinality-exporter/config.yaml",
                "/etc/cardinality-exporter/config.yml",
                "/etc/cardinality-exporter/config.json",
                "./cardinality-exporter.yaml",
                "./cardinality-exporter.yml",
                "./cardinality-exporter.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(found) => PathBuf::from(found),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)
        .map_err(|e| format!("can't read config file {}: {}", path.display(), e))?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = render_config(config, &format)?;
    println!("{output}");
    Ok(())
}

/// Serializes configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}
