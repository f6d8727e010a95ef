//! Per-instance coordination.
//!
//! A [`CardinalityInstance`] owns everything known about one monitored Prometheus:
//! its identity, the latest primary snapshot, the tracked keys of the four primary
//! dimensions and the two cross-dimensional tracking tables. It is driven by a single
//! worker at a time; the gauge stores it writes to are shared.

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::client::{fetch_snapshot, StatusClient, StatusQuery};
use crate::error::CardinalityError;
use crate::expander::{CrossDimensionalTable, ExpansionKind};
use crate::reconciler::{primary_series, reconcile};
use crate::snapshot::{Dimension, Snapshot, TopN};
use crate::store::{
    label_set, GaugeStore, LabelSet, INSTANCE_NAMESPACE_LABEL, SCRAPED_INSTANCE_LABEL,
    SHARDED_INSTANCE_LABEL,
};

/// Immutable description of a monitored instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceIdentity {
    pub namespace: String,
    pub name: String,
    pub sharded_name: String,
    pub address: String,
    #[serde(skip)]
    pub auth: Option<String>,
}

impl InstanceIdentity {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        sharded_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            sharded_name: sharded_name.into(),
            address: address.into(),
            auth: None,
        }
    }

    /// Sets the `Authorization` header value. Empty values are ignored.
    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        let auth = auth.into();
        self.auth = (!auth.is_empty()).then_some(auth);
        self
    }

    /// Identity labels attached to every series exported for this instance.
    pub fn labels(&self) -> LabelSet {
        label_set([
            (SCRAPED_INSTANCE_LABEL, self.name.as_str()),
            (SHARDED_INSTANCE_LABEL, self.sharded_name.as_str()),
            (INSTANCE_NAMESPACE_LABEL, self.namespace.as_str()),
        ])
    }
}

/// The four primary gauge families, one per [`Dimension`].
#[derive(Debug, Clone)]
pub struct PrimaryGauges<S> {
    pub series_count_by_metric_name: S,
    pub label_value_count_by_label_name: S,
    pub memory_in_bytes_by_label_name: S,
    pub series_count_by_label_value_pair: S,
}

impl<S> PrimaryGauges<S> {
    pub fn for_dimension(&self, dimension: Dimension) -> &S {
        match dimension {
            Dimension::SeriesCountByMetricName => &self.series_count_by_metric_name,
            Dimension::LabelValueCountByLabelName => &self.label_value_count_by_label_name,
            Dimension::MemoryInBytesByLabelName => &self.memory_in_bytes_by_label_name,
            Dimension::SeriesCountByLabelValuePair => &self.series_count_by_label_value_pair,
        }
    }
}

/// State of one monitored instance.
#[derive(Debug)]
pub struct CardinalityInstance {
    pub(crate) identity: InstanceIdentity,
    pub(crate) snapshot: Snapshot,
    pub(crate) primary_tracked: [TopN<LabelSet>; 4],
    pub(crate) series_by_metric_per_label: CrossDimensionalTable,
    pub(crate) label_count_per_metric: CrossDimensionalTable,
}

impl CardinalityInstance {
    pub fn new(identity: InstanceIdentity) -> Self {
        Self {
            identity,
            snapshot: Snapshot::default(),
            primary_tracked: Default::default(),
            series_by_metric_per_label: CrossDimensionalTable::default(),
            label_count_per_metric: CrossDimensionalTable::default(),
        }
    }

    pub fn identity(&self) -> &InstanceIdentity {
        &self.identity
    }

    /// The latest successfully fetched primary snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Keys currently exposed for a primary dimension.
    pub fn tracked(&self, dimension: Dimension) -> &TopN<LabelSet> {
        &self.primary_tracked[dimension.index()]
    }

    pub fn table(&self, kind: ExpansionKind) -> &CrossDimensionalTable {
        match kind {
            ExpansionKind::SeriesByMetricPerLabel => &self.series_by_metric_per_label,
            ExpansionKind::LabelCountPerMetric => &self.label_count_per_metric,
        }
    }

    /// Number of series this instance currently exposes across all families.
    pub fn exposed_series(&self) -> usize {
        let primary: usize = self.primary_tracked.iter().map(TopN::len).sum();
        primary
            + self.series_by_metric_per_label.exposed_series()
            + self.label_count_per_metric.exposed_series()
    }

    /// Replaces the current snapshot with a freshly fetched one.
    ///
    /// On error the previous snapshot is kept.
    #[instrument(skip(self, client), fields(instance = %self.identity.name))]
    pub async fn refresh<C>(&mut self, client: &C) -> Result<(), CardinalityError>
    where
        C: StatusClient + ?Sized,
    {
        let snapshot = fetch_snapshot(client, &self.identity, &StatusQuery::all()).await?;
        debug!(
            entries = snapshot.entry_count(),
            status = %snapshot.status,
            "fetched TSDB status"
        );
        self.snapshot = snapshot;
        Ok(())
    }

    /// Reconciles the four primary gauge families against the current snapshot.
    ///
    /// Stops at the first failing dimension; later dimensions keep their tracked state.
    #[instrument(skip(self, gauges), fields(instance = %self.identity.name))]
    pub fn expose_primary<S>(&mut self, gauges: &PrimaryGauges<S>) -> Result<(), CardinalityError>
    where
        S: GaugeStore,
    {
        let identity = self.identity.labels();
        for dimension in Dimension::ALL {
            let entries = primary_series(self.snapshot.dimension(dimension), dimension.key_label());
            let tracked = reconcile(
                gauges.for_dimension(dimension),
                &entries,
                &self.primary_tracked[dimension.index()],
                &identity,
            )?;
            self.primary_tracked[dimension.index()] = tracked;
        }
        info!(
            "Exposed primary cardinality for {} ({} series)",
            self.identity.name,
            self.primary_tracked.iter().map(TopN::len).sum::<usize>()
        );
        Ok(())
    }
}
