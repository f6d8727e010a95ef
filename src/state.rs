//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background refresh task.

use cardinality_exporter::health_stats::HealthStats;
use cardinality_exporter::{CardinalityInstance, CardinalityMetrics, HttpStatusClient};
use prometheus::Registry;
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::{Instant, SystemTime};
use tokio::sync::Mutex;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Outcome of the most recent cycle of one instance, read by `/health`.
#[derive(Debug, Clone, Default)]
pub struct InstanceStatus {
    /// Outcome of the latest primary refresh; `None` before the first one.
    pub last_success: Option<bool>,
    pub last_error: Option<String>,
    pub last_refresh: Option<SystemTime>,
    pub exposed_series: usize,
    pub duration_seconds: f64,
}

impl InstanceStatus {
    /// True once the latest primary refresh succeeded.
    pub fn is_healthy(&self) -> bool {
        self.last_success == Some(true)
    }
}

/// One monitored instance plus the status snapshot shown to handlers.
///
/// The instance itself is only touched by the refresh task; handlers read `status`.
pub struct InstanceSlot {
    pub name: String,
    pub instance: Mutex<CardinalityInstance>,
    pub status: StdRwLock<InstanceStatus>,
}

impl InstanceSlot {
    pub fn new(instance: CardinalityInstance) -> Self {
        Self {
            name: instance.identity().name.clone(),
            instance: Mutex::new(instance),
            status: StdRwLock::new(InstanceStatus::default()),
        }
    }

    pub fn status(&self) -> InstanceStatus {
        self.status
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: CardinalityMetrics,
    pub client: HttpStatusClient,
    pub instances: Vec<InstanceSlot>,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// True when the latest refresh of every instance succeeded.
    pub fn all_instances_healthy(&self) -> bool {
        self.instances.iter().all(|slot| slot.status().is_healthy())
    }
}
