//! Shared fixtures for integration tests: an in-memory status client and a
//! recording gauge store built on a real `GaugeVec`.

#![allow(dead_code)]

use async_trait::async_trait;
use cardinality_exporter::store::{GaugeHandle, GaugeStore, IDENTITY_LABELS};
use cardinality_exporter::{CardinalityError, InstanceIdentity, LabelSet, StatusClient};
use prometheus::{Gauge, GaugeVec, Opts};
use reqwest::Url;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub const ADDRESS: &str = "http://prometheus.test:9090";

pub fn identity() -> InstanceIdentity {
    InstanceIdentity::new("monitoring", "prometheus-0", "prometheus", ADDRESS)
}

/// Identity labels of [`identity`], as merged into every exported series.
pub fn identity_labels() -> LabelSet {
    identity().labels()
}

/// Builds a label set from string pairs.
pub fn labels(pairs: &[(&str, &str)]) -> LabelSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// `key` plus the identity labels.
pub fn with_identity(key: &LabelSet) -> LabelSet {
    let mut merged = key.clone();
    merged.extend(identity_labels());
    merged
}

/// JSON array of `{"name", "value"}` objects.
pub fn pairs_json(items: &[(&str, u64)]) -> String {
    let entries: Vec<String> = items
        .iter()
        .map(|(name, value)| format!(r#"{{"name":"{}","value":{}}}"#, name, value))
        .collect();
    format!("[{}]", entries.join(","))
}

/// A TSDB status response body.
pub fn status_body(
    by_metric: &[(&str, u64)],
    by_label: &[(&str, u64)],
    memory: &[(&str, u64)],
    by_pair: &[(&str, u64)],
) -> String {
    format!(
        r#"{{"status":"success","data":{{"seriesCountByMetricName":{},"labelValueCountByLabelName":{},"memoryInBytesByLabelName":{},"seriesCountByLabelValuePair":{}}}}}"#,
        pairs_json(by_metric),
        pairs_json(by_label),
        pairs_json(memory),
        pairs_json(by_pair)
    )
}

#[derive(Debug, Clone)]
enum Reply {
    Body(String),
    Status(u16),
}

/// In-memory [`StatusClient`] keyed by the `match[]` matcher ("" for the primary query).
#[derive(Default)]
pub struct MockStatusClient {
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<String>>,
    auth_seen: Mutex<Vec<Option<String>>>,
}

impl MockStatusClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies to the unfiltered query.
    pub fn primary(&self, body: impl Into<String>) {
        self.respond("", body);
    }

    /// Replies to `match[]={label!=""}`.
    pub fn label(&self, label: &str, body: impl Into<String>) {
        self.respond(&format!(r#"{{{label}!=""}}"#), body);
    }

    /// Replies to `match[]={__name__="metric"}`.
    pub fn metric(&self, metric: &str, body: impl Into<String>) {
        self.respond(&format!(r#"{{__name__="{metric}"}}"#), body);
    }

    pub fn respond(&self, matcher: &str, body: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .insert(matcher.to_string(), Reply::Body(body.into()));
    }

    /// Makes `matcher` answer with an HTTP error status.
    pub fn fail(&self, matcher: &str, status: u16) {
        self.replies
            .lock()
            .unwrap()
            .insert(matcher.to_string(), Reply::Status(status));
    }

    pub fn fail_primary(&self, status: u16) {
        self.fail("", status);
    }

    pub fn fail_label(&self, label: &str, status: u16) {
        self.fail(&format!(r#"{{{label}!=""}}"#), status);
    }

    /// Matchers requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn auth_seen(&self) -> Vec<Option<String>> {
        self.auth_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusClient for MockStatusClient {
    async fn get_status(&self, url: &Url, auth: Option<&str>) -> Result<String, CardinalityError> {
        let matcher = url
            .query_pairs()
            .find(|(k, _)| k == "match[]")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();

        self.requests.lock().unwrap().push(matcher.clone());
        self.auth_seen.lock().unwrap().push(auth.map(str::to_owned));

        let reply = self.replies.lock().unwrap().get(&matcher).cloned();
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Status(status)) => Err(CardinalityError::Fetch {
                url: url.to_string(),
                status: Some(status),
                message: "mock failure".into(),
            }),
            None => Err(CardinalityError::Fetch {
                url: url.to_string(),
                status: Some(404),
                message: format!("no reply for {matcher:?}"),
            }),
        }
    }
}

/// Handle returned by [`RecordingStore`]: sets the real gauge and mirrors the value.
pub struct RecordingHandle {
    gauge: Gauge,
    labels: LabelSet,
    values: Arc<Mutex<BTreeMap<LabelSet, f64>>>,
}

impl GaugeHandle for RecordingHandle {
    fn set(&self, value: f64) {
        self.gauge.set(value);
        self.values
            .lock()
            .unwrap()
            .insert(self.labels.clone(), value);
    }
}

/// [`GaugeStore`] over a real `GaugeVec` that records every call.
pub struct RecordingStore {
    vec: GaugeVec,
    values: Arc<Mutex<BTreeMap<LabelSet, f64>>>,
    writes: Mutex<Vec<LabelSet>>,
    deletes: Mutex<Vec<LabelSet>>,
    reject_value: Mutex<Option<String>>,
}

impl RecordingStore {
    /// Store whose series carry `key_labels` plus the identity labels.
    pub fn new(key_labels: &[&str]) -> Self {
        let names: Vec<&str> = key_labels
            .iter()
            .chain(IDENTITY_LABELS.iter())
            .copied()
            .collect();
        let vec = GaugeVec::new(Opts::new("recorded_gauge", "recorded gauge"), &names)
            .expect("valid gauge vec");
        Self {
            vec,
            values: Arc::new(Mutex::new(BTreeMap::new())),
            writes: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            reject_value: Mutex::new(None),
        }
    }

    /// Rejects any label set holding `value` as a label value.
    pub fn reject(&self, value: &str) {
        *self.reject_value.lock().unwrap() = Some(value.to_string());
    }

    /// Exposed series and their values.
    pub fn exposed(&self) -> BTreeMap<LabelSet, f64> {
        self.values.lock().unwrap().clone()
    }

    pub fn value(&self, labels: &LabelSet) -> Option<f64> {
        self.values.lock().unwrap().get(labels).copied()
    }

    pub fn deletes(&self) -> Vec<LabelSet> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<LabelSet> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.writes.lock().unwrap().clear();
        self.deletes.lock().unwrap().clear();
    }
}

impl GaugeStore for RecordingStore {
    type Handle = RecordingHandle;

    fn get_or_create(&self, labels: &LabelSet) -> Result<RecordingHandle, prometheus::Error> {
        if let Some(rejected) = self.reject_value.lock().unwrap().as_deref() {
            if labels.values().any(|v| v == rejected) {
                return Err(prometheus::Error::Msg(format!("rejected {rejected}")));
            }
        }
        let gauge = self.vec.get_or_create(labels)?;
        self.writes.lock().unwrap().push(labels.clone());
        Ok(RecordingHandle {
            gauge,
            labels: labels.clone(),
            values: Arc::clone(&self.values),
        })
    }

    fn delete(&self, labels: &LabelSet) -> bool {
        self.deletes.lock().unwrap().push(labels.clone());
        self.values.lock().unwrap().remove(labels);
        self.vec.delete(labels)
    }
}
