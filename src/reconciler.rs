//! Gauge reconciliation.
//!
//! [`reconcile`] makes the series exposed for one dimension match a fresh top-N list:
//! every ranked entry is created or updated, and every previously tracked key that is no
//! longer ranked is deleted. The returned [`TopN`] of keys becomes the tracked state for
//! the next cycle. On error the caller keeps its previous tracked state.

use tracing::{debug, trace, warn};

use crate::error::CardinalityError;
use crate::snapshot::{LabelValuePair, TopN};
use crate::store::{label_set, merge_labels, GaugeHandle, GaugeStore, LabelSet};

/// One ranked series: its identifying labels and the value to expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedSeries {
    pub key: LabelSet,
    pub count: u64,
}

impl RankedSeries {
    pub fn new(key: LabelSet, count: u64) -> Self {
        Self { key, count }
    }
}

/// Keys a primary top-N list under `key_label` (`metric`, `label`, ...).
pub fn primary_series(pairs: &TopN<LabelValuePair>, key_label: &str) -> TopN<RankedSeries> {
    pairs.map(|pair| RankedSeries::new(label_set([(key_label, pair.name.as_str())]), pair.value))
}

/// Reconciles `store` against `entries`, given the keys exposed by the previous pass.
///
/// `identity` is merged into every label set sent to the store. Returns the keys now
/// exposed, in rank order.
pub fn reconcile<S>(
    store: &S,
    entries: &TopN<RankedSeries>,
    tracked: &TopN<LabelSet>,
    identity: &LabelSet,
) -> Result<TopN<LabelSet>, CardinalityError>
where
    S: GaugeStore + ?Sized,
{
    let mut exposed: Vec<LabelSet> = Vec::with_capacity(entries.len());

    for entry in entries {
        let labels = merge_labels(&entry.key, identity);
        match store.get_or_create(&labels) {
            Ok(gauge) => {
                gauge.set(entry.count as f64);
                trace!(?labels, value = entry.count, "gauge updated");
                exposed.push(entry.key.clone());
            }
            Err(source) => {
                // Series created in this pass are not tracked anywhere yet.
                for key in exposed.iter().filter(|key| !tracked.contains(key)) {
                    store.delete(&merge_labels(key, identity));
                }
                warn!(?labels, "gauge store rejected label set: {}", source);
                return Err(CardinalityError::Store { labels, source });
            }
        }
    }

    let mut deleted = 0usize;
    for old in tracked {
        if old.is_empty() || exposed.contains(old) {
            continue;
        }
        store.delete(&merge_labels(old, identity));
        deleted += 1;
    }

    if deleted > 0 {
        debug!(deleted, exposed = exposed.len(), "retracted series no longer ranked");
    }

    Ok(exposed.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SCRAPED_INSTANCE_LABEL;
    use prometheus::{GaugeVec, Opts};

    fn store() -> GaugeVec {
        GaugeVec::new(
            Opts::new("test_series_count", "test"),
            &["metric", SCRAPED_INSTANCE_LABEL],
        )
        .unwrap()
    }

    fn identity() -> LabelSet {
        label_set([(SCRAPED_INSTANCE_LABEL, "prom-0")])
    }

    fn pairs(items: &[(&str, u64)]) -> TopN<LabelValuePair> {
        items
            .iter()
            .map(|(name, value)| LabelValuePair::new(*name, *value))
            .collect()
    }

    #[test]
    fn test_primary_series_keys_by_label() {
        let series = primary_series(&pairs(&[("up", 3)]), "metric");
        assert_eq!(series.len(), 1);
        assert_eq!(series.get(0).unwrap().key, label_set([("metric", "up")]));
        assert_eq!(series.get(0).unwrap().count, 3);
    }

    #[test]
    fn test_reconcile_sets_values_and_tracks_keys() {
        let store = store();
        let entries = primary_series(&pairs(&[("a", 10), ("b", 5)]), "metric");

        let tracked = reconcile(&store, &entries, &TopN::new(), &identity()).unwrap();

        assert_eq!(tracked.len(), 2);
        assert_eq!(store.with_label_values(&["a", "prom-0"]).get(), 10.0);
        assert_eq!(store.with_label_values(&["b", "prom-0"]).get(), 5.0);
    }

    #[test]
    fn test_reconcile_failure_rolls_back_new_series() {
        let store = GaugeVec::new(Opts::new("test_strict", "test"), &["metric"]).unwrap();
        let entries = primary_series(&pairs(&[("a", 1)]), "metric");

        // Identity labels are unknown to this vec, so the first get-or-create fails.
        let err = reconcile(&store, &entries, &TopN::new(), &identity()).unwrap_err();
        assert!(matches!(err, CardinalityError::Store { .. }));
    }
}
