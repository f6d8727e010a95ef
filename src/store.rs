//! Gauge store seam.
//!
//! The reconciler only needs three operations from a metrics registry: get-or-create a
//! gauge for a label set, set its value, and delete a label set. [`GaugeStore`] names
//! that contract; `prometheus::GaugeVec` is the production implementation.

use prometheus::{Gauge, GaugeVec};
use std::collections::{BTreeMap, HashMap};

/// Label name → label value. Ordered so equality and display are deterministic.
pub type LabelSet = BTreeMap<String, String>;

/// Identity label: the monitored instance name.
pub const SCRAPED_INSTANCE_LABEL: &str = "scraped_instance";
/// Identity label: the shard the monitored instance belongs to.
pub const SHARDED_INSTANCE_LABEL: &str = "sharded_instance";
/// Identity label: the namespace of the monitored instance.
pub const INSTANCE_NAMESPACE_LABEL: &str = "instance_namespace";

/// Identity labels carried by every exported cardinality series.
pub const IDENTITY_LABELS: [&str; 3] = [
    SCRAPED_INSTANCE_LABEL,
    SHARDED_INSTANCE_LABEL,
    INSTANCE_NAMESPACE_LABEL,
];

/// Handle to a single gauge series.
pub trait GaugeHandle {
    fn set(&self, value: f64);
}

/// A registry of gauges keyed by label set.
///
/// Implementations must be safe to share between instance workers.
pub trait GaugeStore: Send + Sync {
    type Handle: GaugeHandle;

    fn get_or_create(&self, labels: &LabelSet) -> Result<Self::Handle, prometheus::Error>;

    /// Removes the series with exactly these labels. Returns whether one existed.
    fn delete(&self, labels: &LabelSet) -> bool;
}

impl GaugeHandle for Gauge {
    fn set(&self, value: f64) {
        Gauge::set(self, value);
    }
}

impl GaugeStore for GaugeVec {
    type Handle = Gauge;

    fn get_or_create(&self, labels: &LabelSet) -> Result<Gauge, prometheus::Error> {
        self.get_metric_with(&label_view(labels))
    }

    fn delete(&self, labels: &LabelSet) -> bool {
        self.remove(&label_view(labels)).is_ok()
    }
}

fn label_view(labels: &LabelSet) -> HashMap<&str, &str> {
    labels
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

/// Builds a label set from `(name, value)` pairs.
pub fn label_set<K, V, I>(pairs: I) -> LabelSet
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Returns `key` extended with `extra`. Keys in `extra` win on conflict.
pub fn merge_labels(key: &LabelSet, extra: &LabelSet) -> LabelSet {
    let mut merged = key.clone();
    merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
