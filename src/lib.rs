//! Prometheus Cardinality Exporter Library
//!
//! This library republishes the top-N statistics of a Prometheus TSDB status endpoint
//! (`/api/v1/status/tsdb`) as gauge families in a local registry, and keeps the
//! exported series in sync with every new snapshot.
//!
//! # Features
//!
//! - **Reconciliation**: ranked entries are created or updated, entries that dropped out
//!   of the top-N are deleted, so no stale series survive a cycle
//! - **Cross-Dimensional Expansion**: per-label and per-metric breakdowns fetched with
//!   filtered status requests, each tracked independently
//! - **Pluggable Seams**: the HTTP client and the gauge store sit behind traits
//!
//! # Usage
//!
//! ```rust,no_run
//! use cardinality_exporter::{
//!     CardinalityInstance, CardinalityMetrics, ExpansionOptions, HttpStatusClient,
//!     InstanceIdentity,
//! };
//! use prometheus::Registry;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::new();
//! let metrics = CardinalityMetrics::new(&registry)?;
//! let client = HttpStatusClient::new(Duration::from_secs(30))?;
//!
//! let identity = InstanceIdentity::new("monitoring", "prometheus-0", "prometheus", "http://prometheus:9090");
//! let mut instance = CardinalityInstance::new(identity);
//!
//! instance.refresh(&client).await?;
//! instance.expose_primary(&metrics.primary)?;
//! instance
//!     .expand_series_by_metric_per_label(
//!         &client,
//!         &metrics.series_count_by_metric_name_per_label,
//!         &ExpansionOptions::default(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod expander;
pub mod health_stats;
pub mod instance;
pub mod metrics;
pub mod reconciler;
pub mod snapshot;
pub mod store;

// Re-export main types for convenience
pub use client::{fetch_snapshot, HttpStatusClient, StatusClient, StatusQuery};
pub use error::CardinalityError;
pub use expander::{CrossDimensionalTable, ExpansionKind, ExpansionOptions, ExpansionPolicy};
pub use instance::{CardinalityInstance, InstanceIdentity, PrimaryGauges};
pub use metrics::CardinalityMetrics;
pub use reconciler::{reconcile, RankedSeries};
pub use snapshot::{Dimension, LabelValuePair, Snapshot, TopN};
pub use store::{GaugeHandle, GaugeStore, LabelSet};
