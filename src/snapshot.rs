//! Snapshot model for the TSDB status endpoint.
//!
//! A [`Snapshot`] is one parsed `/api/v1/status/tsdb` response: four rank-ordered
//! top-N lists. An entry with an empty name ends a list: everything after it is
//! ignored, as is anything past [`TOP_N_CAPACITY`].

use serde::{Deserialize, Serialize};

/// Number of ranked entries kept per dimension.
pub const TOP_N_CAPACITY: usize = 10;

/// One ranked contributor and its cardinality count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelValuePair {
    pub name: String,
    pub value: u64,
}

impl LabelValuePair {
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Bounded, rank-ordered sequence holding only populated slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TopN<T> {
    entries: Vec<T>,
}

impl<T> Default for TopN<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> TopN<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sequence from slots in rank order, stopping at the first empty slot
    /// or at capacity.
    pub fn from_slots<I>(slots: I) -> Self
    where
        I: IntoIterator<Item = Option<T>>,
    {
        let entries = slots
            .into_iter()
            .take(TOP_N_CAPACITY)
            .map_while(|slot| slot)
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, rank: usize) -> Option<&T> {
        self.entries.get(rank)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    pub fn map<U, F>(&self, f: F) -> TopN<U>
    where
        F: FnMut(&T) -> U,
    {
        TopN {
            entries: self.entries.iter().map(f).collect(),
        }
    }

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.entries.contains(item)
    }
}

impl<T> FromIterator<T> for TopN<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_slots(iter.into_iter().map(Some))
    }
}

impl<'a, T> IntoIterator for &'a TopN<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl TopN<LabelValuePair> {
    /// Names of the ranked entries, in rank order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|pair| pair.name.as_str())
    }
}

/// The four ranked lists reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    SeriesCountByMetricName,
    LabelValueCountByLabelName,
    MemoryInBytesByLabelName,
    SeriesCountByLabelValuePair,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::SeriesCountByMetricName,
        Dimension::LabelValueCountByLabelName,
        Dimension::MemoryInBytesByLabelName,
        Dimension::SeriesCountByLabelValuePair,
    ];

    pub fn index(self) -> usize {
        match self {
            Dimension::SeriesCountByMetricName => 0,
            Dimension::LabelValueCountByLabelName => 1,
            Dimension::MemoryInBytesByLabelName => 2,
            Dimension::SeriesCountByLabelValuePair => 3,
        }
    }

    /// Name of the label carrying the ranked name on the exported gauge.
    pub fn key_label(self) -> &'static str {
        match self {
            Dimension::SeriesCountByMetricName => "metric",
            Dimension::LabelValueCountByLabelName | Dimension::MemoryInBytesByLabelName => "label",
            Dimension::SeriesCountByLabelValuePair => "label_pair",
        }
    }

    /// Field name in the JSON response.
    pub fn json_field(self) -> &'static str {
        match self {
            Dimension::SeriesCountByMetricName => "seriesCountByMetricName",
            Dimension::LabelValueCountByLabelName => "labelValueCountByLabelName",
            Dimension::MemoryInBytesByLabelName => "memoryInBytesByLabelName",
            Dimension::SeriesCountByLabelValuePair => "seriesCountByLabelValuePair",
        }
    }
}

/// One parsed status response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub status: String,
    pub series_count_by_metric_name: TopN<LabelValuePair>,
    pub label_value_count_by_label_name: TopN<LabelValuePair>,
    pub memory_in_bytes_by_label_name: TopN<LabelValuePair>,
    pub series_count_by_label_value_pair: TopN<LabelValuePair>,
}

impl Snapshot {
    pub fn dimension(&self, dimension: Dimension) -> &TopN<LabelValuePair> {
        match dimension {
            Dimension::SeriesCountByMetricName => &self.series_count_by_metric_name,
            Dimension::LabelValueCountByLabelName => &self.label_value_count_by_label_name,
            Dimension::MemoryInBytesByLabelName => &self.memory_in_bytes_by_label_name,
            Dimension::SeriesCountByLabelValuePair => &self.series_count_by_label_value_pair,
        }
    }

    /// Parses a raw status response body.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let raw: RawStatus = serde_json::from_str(body)?;
        Ok(raw.into())
    }

    /// Total number of populated entries across all dimensions.
    pub fn entry_count(&self) -> usize {
        Dimension::ALL
            .iter()
            .map(|d| self.dimension(*d).len())
            .sum()
    }
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawData {
    #[serde(default)]
    series_count_by_metric_name: Option<Vec<RawPair>>,
    #[serde(default)]
    label_value_count_by_label_name: Option<Vec<RawPair>>,
    #[serde(default)]
    memory_in_bytes_by_label_name: Option<Vec<RawPair>>,
    #[serde(default)]
    series_count_by_label_value_pair: Option<Vec<RawPair>>,
}

#[derive(Debug, Deserialize)]
struct RawPair {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: u64,
}

fn ranked(pairs: Option<Vec<RawPair>>) -> TopN<LabelValuePair> {
    TopN::from_slots(pairs.unwrap_or_default().into_iter().map(|pair| {
        if pair.name.is_empty() {
            None
        } else {
            Some(LabelValuePair::new(pair.name, pair.value))
        }
    }))
}

impl From<RawStatus> for Snapshot {
    fn from(raw: RawStatus) -> Self {
        let data = raw.data.unwrap_or_default();
        Self {
            status: raw.status.unwrap_or_default(),
            series_count_by_metric_name: ranked(data.series_count_by_metric_name),
            label_value_count_by_label_name: ranked(data.label_value_count_by_label_name),
            memory_in_bytes_by_label_name: ranked(data.memory_in_bytes_by_label_name),
            series_count_by_label_value_pair: ranked(data.series_count_by_label_value_pair),
        }
    }
}
