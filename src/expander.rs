//! Cross-dimensional expansion.
//!
//! For each name ranked in one primary dimension, a filtered status request yields a
//! nested breakdown: series count by metric name among series carrying a label, or
//! label value count by label name within one metric. Each breakdown is reconciled
//! against its own tracked keys, kept in a [`CrossDimensionalTable`].
//!
//! Secondary requests run as a bounded, order-preserving stream; results are
//! reconciled one at a time in rank order by the worker that owns the instance.

use ahash::AHashMap as HashMap;
use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::client::{fetch_snapshot, StatusClient, StatusQuery};
use crate::error::{CardinalityError, ExpansionFailure};
use crate::instance::CardinalityInstance;
use crate::reconciler::{reconcile, RankedSeries};
use crate::snapshot::{Dimension, Snapshot, TopN};
use crate::store::{label_set, merge_labels, GaugeStore, LabelSet};

/// Default number of secondary requests in flight per instance.
pub const DEFAULT_EXPANSION_CONCURRENCY: usize = 4;

/// The two nested breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpansionKind {
    /// Series count by metric name, per label name.
    SeriesByMetricPerLabel,
    /// Label value count by label name, per metric name.
    LabelCountPerMetric,
}

impl ExpansionKind {
    pub const ALL: [ExpansionKind; 2] = [
        ExpansionKind::SeriesByMetricPerLabel,
        ExpansionKind::LabelCountPerMetric,
    ];

    /// Primary dimension whose names drive the expansion.
    pub fn outer(self) -> Dimension {
        match self {
            ExpansionKind::SeriesByMetricPerLabel => Dimension::LabelValueCountByLabelName,
            ExpansionKind::LabelCountPerMetric => Dimension::SeriesCountByMetricName,
        }
    }

    /// Dimension of the secondary snapshot that is exported.
    pub fn inner(self) -> Dimension {
        match self {
            ExpansionKind::SeriesByMetricPerLabel => Dimension::SeriesCountByMetricName,
            ExpansionKind::LabelCountPerMetric => Dimension::LabelValueCountByLabelName,
        }
    }

    pub fn query(self, key: &str) -> StatusQuery {
        match self {
            ExpansionKind::SeriesByMetricPerLabel => StatusQuery::label_present(key),
            ExpansionKind::LabelCountPerMetric => StatusQuery::metric_name(key),
        }
    }

    /// Identifying labels of one nested series.
    pub fn series_key(self, outer: &str, inner: &str) -> LabelSet {
        let (metric, label) = match self {
            ExpansionKind::SeriesByMetricPerLabel => (inner, outer),
            ExpansionKind::LabelCountPerMetric => (outer, inner),
        };
        label_set([("metric", metric), ("label", label)])
    }

    /// Ranked nested series for `key`, taken from its secondary snapshot.
    pub fn secondary_series(self, key: &str, secondary: &Snapshot) -> TopN<RankedSeries> {
        secondary
            .dimension(self.inner())
            .map(|pair| RankedSeries::new(self.series_key(key, &pair.name), pair.value))
    }

    pub fn name(self) -> &'static str {
        match self {
            ExpansionKind::SeriesByMetricPerLabel => "series_count_by_metric_name_per_label",
            ExpansionKind::LabelCountPerMetric => "label_value_count_by_label_name_per_metric",
        }
    }
}

/// What to do when one key of an expansion fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpansionPolicy {
    /// Stop at the first failing key. Keys already expanded stay committed.
    #[default]
    FailFast,
    /// Expand every key and report all failures together.
    BestEffort,
}

/// Tuning for an expansion pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionOptions {
    /// Secondary requests in flight at once. Zero is treated as one.
    pub concurrency: usize,
    pub policy: ExpansionPolicy,
    /// Evict a key after this many consecutive primary snapshots without it.
    /// Zero keeps keys forever.
    pub eviction_cycles: u32,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_EXPANSION_CONCURRENCY,
            policy: ExpansionPolicy::FailFast,
            eviction_cycles: 0,
        }
    }
}

/// Tracked keys of one outer name.
#[derive(Debug, Clone, Default)]
pub struct TrackedKey {
    pub tracked: TopN<LabelSet>,
    /// Consecutive primary snapshots in which the outer name was not ranked.
    pub absent_cycles: u32,
}

/// Outer name → tracked nested series.
#[derive(Debug, Default)]
pub struct CrossDimensionalTable {
    entries: HashMap<String, TrackedKey>,
}

impl CrossDimensionalTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&TrackedKey> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn exposed_series(&self) -> usize {
        self.entries.values().map(|e| e.tracked.len()).sum()
    }

    fn entry_mut(&mut self, key: &str) -> &mut TrackedKey {
        self.entries.entry(key.to_string()).or_default()
    }

    /// Updates absence counters against the names ranked in the current snapshot and
    /// evicts keys that reached `eviction_cycles`, deleting their series from `store`.
    ///
    /// Returns the number of evicted keys.
    fn age<S>(
        &mut self,
        ranked: &[String],
        eviction_cycles: u32,
        store: &S,
        identity: &LabelSet,
    ) -> usize
    where
        S: GaugeStore + ?Sized,
    {
        for (key, entry) in self.entries.iter_mut() {
            if ranked.contains(key) {
                entry.absent_cycles = 0;
            } else {
                entry.absent_cycles = entry.absent_cycles.saturating_add(1);
            }
        }

        if eviction_cycles == 0 {
            return 0;
        }

        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.absent_cycles >= eviction_cycles)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = self.entries.remove(key) {
                for series in &entry.tracked {
                    store.delete(&merge_labels(series, identity));
                }
                debug!(key = %key, series = entry.tracked.len(), "evicted expansion key");
            }
        }
        expired.len()
    }
}

impl CardinalityInstance {
    /// Exposes series count by metric name for every ranked label name.
    pub async fn expand_series_by_metric_per_label<C, S>(
        &mut self,
        client: &C,
        store: &S,
        options: &ExpansionOptions,
    ) -> Result<(), CardinalityError>
    where
        C: StatusClient + ?Sized,
        S: GaugeStore + ?Sized,
    {
        self.expand(ExpansionKind::SeriesByMetricPerLabel, client, store, options)
            .await
    }

    /// Exposes label value count by label name for every ranked metric name.
    pub async fn expand_label_count_per_metric<C, S>(
        &mut self,
        client: &C,
        store: &S,
        options: &ExpansionOptions,
    ) -> Result<(), CardinalityError>
    where
        C: StatusClient + ?Sized,
        S: GaugeStore + ?Sized,
    {
        self.expand(ExpansionKind::LabelCountPerMetric, client, store, options)
            .await
    }

    /// Runs one expansion pass over the names ranked in the current snapshot.
    #[instrument(skip(self, client, store, options), fields(instance = %self.identity.name, kind = kind.name()))]
    pub async fn expand<C, S>(
        &mut self,
        kind: ExpansionKind,
        client: &C,
        store: &S,
        options: &ExpansionOptions,
    ) -> Result<(), CardinalityError>
    where
        C: StatusClient + ?Sized,
        S: GaugeStore + ?Sized,
    {
        let Self {
            identity,
            snapshot,
            series_by_metric_per_label,
            label_count_per_metric,
            ..
        } = self;
        let table = match kind {
            ExpansionKind::SeriesByMetricPerLabel => series_by_metric_per_label,
            ExpansionKind::LabelCountPerMetric => label_count_per_metric,
        };
        let identity = &*identity;
        let identity_labels = identity.labels();

        let keys: Vec<String> = snapshot
            .dimension(kind.outer())
            .names()
            .map(str::to_owned)
            .collect();

        let evicted = table.age(&keys, options.eviction_cycles, store, &identity_labels);
        if evicted > 0 {
            info!(
                "Evicted {} {} key(s) for {} after {} absent cycles",
                evicted,
                kind.name(),
                identity.name,
                options.eviction_cycles
            );
        }

        let mut fetches = stream::iter(keys)
            .map(move |key: String| {
                async move {
                    let fetched = fetch_snapshot(client, identity, &kind.query(&key)).await;
                    (key, fetched)
                }
                .boxed()
            })
            .buffered(options.concurrency.max(1));

        let mut failures = Vec::new();
        let mut expanded = 0usize;

        while let Some((key, fetched)) = fetches.next().await {
            let outcome = fetched.and_then(|secondary| {
                let entries = kind.secondary_series(&key, &secondary);
                let entry = table.entry_mut(&key);
                entry.tracked = reconcile(store, &entries, &entry.tracked, &identity_labels)?;
                Ok(())
            });

            match outcome {
                Ok(()) => expanded += 1,
                Err(error) => match options.policy {
                    ExpansionPolicy::FailFast => {
                        warn!(key = %key, "expansion aborted: {}", error);
                        return Err(CardinalityError::Expansion {
                            key,
                            source: Box::new(error),
                        });
                    }
                    ExpansionPolicy::BestEffort => {
                        warn!(key = %key, "expansion failed, continuing: {}", error);
                        failures.push(ExpansionFailure {
                            key,
                            error,
                        });
                    }
                },
            }
        }

        debug!(
            expanded,
            failed = failures.len(),
            tracked_keys = table.len(),
            "expansion pass finished"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CardinalityError::PartialExpansion { failures })
        }
    }
}
