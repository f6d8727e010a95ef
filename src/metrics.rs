//! Prometheus metric families exported by the cardinality exporter.
//!
//! Defines the six cardinality gauge families plus the exporter's own telemetry and
//! registers them with a registry.

use prometheus::{Gauge, GaugeVec, Opts, Registry};

use crate::expander::ExpansionKind;
use crate::instance::{InstanceIdentity, PrimaryGauges};
use crate::snapshot::Dimension;
use crate::store::IDENTITY_LABELS;

/// Metric name prefix shared by every exported family.
pub const METRIC_PREFIX: &str = "cardinality_exporter";

/// Collection of Prometheus metrics exported by the exporter.
#[derive(Clone)]
pub struct CardinalityMetrics {
    // ========== Primary Dimensions ==========
    pub primary: PrimaryGauges<GaugeVec>,

    // ========== Cross-Dimensional Breakdowns ==========
    pub series_count_by_metric_name_per_label: GaugeVec, // labels: metric, label
    pub label_value_count_by_label_name_per_metric: GaugeVec, // labels: metric, label

    // ========== Exporter Telemetry ==========
    pub refresh_success: GaugeVec,          // labels: identity
    pub refresh_duration_seconds: GaugeVec, // labels: identity
    pub exposed_series: GaugeVec,           // labels: identity
    pub scrape_duration_seconds: Gauge,
}

fn cardinality_vec(name: &str, help: &str, key_labels: &[&str]) -> prometheus::Result<GaugeVec> {
    let labels: Vec<&str> = key_labels
        .iter()
        .chain(IDENTITY_LABELS.iter())
        .copied()
        .collect();
    GaugeVec::new(Opts::new(format!("{METRIC_PREFIX}_{name}"), help), &labels)
}

impl CardinalityMetrics {
    /// Creates and registers all metric families with the registry.
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let primary = PrimaryGauges {
            series_count_by_metric_name: cardinality_vec(
                "series_count_by_metric_name_total",
                "Series count by metric name, top 10 reported by the TSDB status endpoint",
                &[Dimension::SeriesCountByMetricName.key_label()],
            )?,
            label_value_count_by_label_name: cardinality_vec(
                "label_value_count_by_label_name_total",
                "Label value count by label name, top 10 reported by the TSDB status endpoint",
                &[Dimension::LabelValueCountByLabelName.key_label()],
            )?,
            memory_in_bytes_by_label_name: cardinality_vec(
                "memory_in_bytes_by_label_name_total",
                "Memory in bytes used by label name, top 10 reported by the TSDB status endpoint",
                &[Dimension::MemoryInBytesByLabelName.key_label()],
            )?,
            series_count_by_label_value_pair: cardinality_vec(
                "series_count_by_label_value_pair_total",
                "Series count by label value pair, top 10 reported by the TSDB status endpoint",
                &[Dimension::SeriesCountByLabelValuePair.key_label()],
            )?,
        };

        let series_count_by_metric_name_per_label = cardinality_vec(
            "series_count_by_metric_name_per_label_total",
            "Series count by metric name among series carrying a label",
            &["metric", "label"],
        )?;
        let label_value_count_by_label_name_per_metric = cardinality_vec(
            "label_value_count_by_label_name_per_metric_total",
            "Label value count by label name within one metric",
            &["metric", "label"],
        )?;

        let refresh_success = cardinality_vec(
            "refresh_success",
            "Whether the last refresh of the instance succeeded (1) or failed (0)",
            &[],
        )?;
        let refresh_duration_seconds = cardinality_vec(
            "refresh_duration_seconds",
            "Time spent on the last full refresh cycle of the instance",
            &[],
        )?;
        let exposed_series = cardinality_vec(
            "exposed_series",
            "Number of cardinality series currently exported for the instance",
            &[],
        )?;
        let scrape_duration_seconds = Gauge::new(
            format!("{METRIC_PREFIX}_scrape_duration_seconds"),
            "Time spent serving the last /metrics request",
        )?;

        registry.register(Box::new(primary.series_count_by_metric_name.clone()))?;
        registry.register(Box::new(primary.label_value_count_by_label_name.clone()))?;
        registry.register(Box::new(primary.memory_in_bytes_by_label_name.clone()))?;
        registry.register(Box::new(primary.series_count_by_label_value_pair.clone()))?;
        registry.register(Box::new(series_count_by_metric_name_per_label.clone()))?;
        registry.register(Box::new(label_value_count_by_label_name_per_metric.clone()))?;
        registry.register(Box::new(refresh_success.clone()))?;
        registry.register(Box::new(refresh_duration_seconds.clone()))?;
        registry.register(Box::new(exposed_series.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;

        Ok(Self {
            primary,
            series_count_by_metric_name_per_label,
            label_value_count_by_label_name_per_metric,
            refresh_success,
            refresh_duration_seconds,
            exposed_series,
            scrape_duration_seconds,
        })
    }

    /// Gauge family written by an expansion kind.
    pub fn expansion(&self, kind: ExpansionKind) -> &GaugeVec {
        match kind {
            ExpansionKind::SeriesByMetricPerLabel => &self.series_count_by_metric_name_per_label,
            ExpansionKind::LabelCountPerMetric => &self.label_value_count_by_label_name_per_metric,
        }
    }

    /// Records the outcome of one refresh cycle for an instance.
    pub fn record_refresh(
        &self,
        identity: &InstanceIdentity,
        success: bool,
        duration_seconds: f64,
        exposed: usize,
    ) {
        let values = identity_values(identity);
        self.refresh_success
            .with_label_values(&values)
            .set(if success { 1.0 } else { 0.0 });
        self.refresh_duration_seconds
            .with_label_values(&values)
            .set(duration_seconds);
        self.exposed_series
            .with_label_values(&values)
            .set(exposed as f64);
    }
}

fn identity_values(identity: &InstanceIdentity) -> [&str; 3] {
    [
        identity.name.as_str(),
        identity.sharded_name.as_str(),
        identity.namespace.as_str(),
    ]
}
