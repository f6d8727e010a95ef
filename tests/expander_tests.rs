//! Integration tests for cross-dimensional expansion.

mod common;

use cardinality_exporter::{
    CardinalityError, CardinalityInstance, ExpansionKind, ExpansionOptions, ExpansionPolicy,
};
use common::{identity, labels, status_body, with_identity, MockStatusClient, RecordingStore};

fn per_label(metric: &str, label: &str) -> cardinality_exporter::LabelSet {
    with_identity(&labels(&[("metric", metric), ("label", label)]))
}

/// Primary snapshot ranking `label_names` by label value count.
fn primary_with_labels(label_names: &[&str]) -> String {
    let by_label: Vec<(&str, u64)> = label_names
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, 100 - i as u64))
        .collect();
    status_body(&[("up", 10)], &by_label, &[], &[])
}

/// Secondary snapshot for one label: series count by metric name.
fn secondary(metrics: &[(&str, u64)]) -> String {
    status_body(metrics, &[], &[], &[])
}

async fn refreshed(client: &MockStatusClient) -> CardinalityInstance {
    let mut instance = CardinalityInstance::new(identity());
    instance.refresh(client).await.unwrap();
    instance
}

#[tokio::test]
async fn test_expand_series_by_metric_per_label() {
    let client = MockStatusClient::new();
    client.primary(primary_with_labels(&["job", "instance"]));
    client.label("job", secondary(&[("up", 7), ("node_load1", 3)]));
    client.label("instance", secondary(&[("up", 5)]));
    let store = RecordingStore::new(&["metric", "label"]);

    let mut instance = refreshed(&client).await;
    instance
        .expand_series_by_metric_per_label(&client, &store, &ExpansionOptions::default())
        .await
        .unwrap();

    let exposed = store.exposed();
    assert_eq!(exposed.len(), 3);
    assert_eq!(exposed.get(&per_label("up", "job")), Some(&7.0));
    assert_eq!(exposed.get(&per_label("node_load1", "job")), Some(&3.0));
    assert_eq!(exposed.get(&per_label("up", "instance")), Some(&5.0));

    let table = instance.table(ExpansionKind::SeriesByMetricPerLabel);
    assert_eq!(table.len(), 2);
    assert_eq!(table.get("job").unwrap().tracked.len(), 2);
    assert!(instance.table(ExpansionKind::LabelCountPerMetric).is_empty());
}

#[tokio::test]
async fn test_expand_label_count_per_metric() {
    let client = MockStatusClient::new();
    client.primary(status_body(&[("up", 10)], &[], &[], &[]));
    client.metric("up", status_body(&[], &[("instance", 4), ("job", 2)], &[], &[]));
    let store = RecordingStore::new(&["metric", "label"]);

    let mut instance = refreshed(&client).await;
    instance
        .expand_label_count_per_metric(&client, &store, &ExpansionOptions::default())
        .await
        .unwrap();

    assert_eq!(store.value(&per_label("up", "instance")), Some(4.0));
    assert_eq!(store.value(&per_label("up", "job")), Some(2.0));
    assert!(instance
        .table(ExpansionKind::LabelCountPerMetric)
        .contains_key("up"));
    assert!(instance
        .table(ExpansionKind::SeriesByMetricPerLabel)
        .is_empty());
}

#[tokio::test]
async fn test_keys_are_retained_after_disappearing() {
    let client = MockStatusClient::new();
    client.primary(primary_with_labels(&["job", "instance"]));
    client.label("job", secondary(&[("up", 7)]));
    client.label("instance", secondary(&[("up", 5)]));
    let store = RecordingStore::new(&["metric", "label"]);
    let options = ExpansionOptions::default();

    let mut instance = refreshed(&client).await;
    instance
        .expand_series_by_metric_per_label(&client, &store, &options)
        .await
        .unwrap();

    client.primary(primary_with_labels(&["job"]));
    instance.refresh(&client).await.unwrap();
    instance
        .expand_series_by_metric_per_label(&client, &store, &options)
        .await
        .unwrap();

    let table = instance.table(ExpansionKind::SeriesByMetricPerLabel);
    assert_eq!(table.len(), 2);
    assert!(table.contains_key("instance"));
    assert_eq!(table.get("instance").unwrap().absent_cycles, 1);
    assert_eq!(client.requests().iter().filter(|m| m.contains("instance")).count(), 1);
    assert_eq!(store.value(&per_label("up", "instance")), Some(5.0));
    assert!(store.deletes().is_empty());
}

#[tokio::test]
async fn test_eviction_after_absent_cycles() {
    let client = MockStatusClient::new();
    client.primary(primary_with_labels(&["job", "instance"]));
    client.label("job", secondary(&[("up", 7)]));
    client.label("instance", secondary(&[("up", 5)]));
    let store = RecordingStore::new(&["metric", "label"]);
    let options = ExpansionOptions {
        eviction_cycles: 2,
        ..ExpansionOptions::default()
    };

    let mut instance = refreshed(&client).await;
    instance
        .expand_series_by_metric_per_label(&client, &store, &options)
        .await
        .unwrap();

    client.primary(primary_with_labels(&["job"]));
    for _ in 0..2 {
        instance.refresh(&client).await.unwrap();
        instance
            .expand_series_by_metric_per_label(&client, &store, &options)
            .await
            .unwrap();
    }

    let table = instance.table(ExpansionKind::SeriesByMetricPerLabel);
    assert!(!table.contains_key("instance"));
    assert!(table.contains_key("job"));
    assert_eq!(store.deletes(), vec![per_label("up", "instance")]);
    assert_eq!(store.value(&per_label("up", "instance")), None);
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() {
    let client = MockStatusClient::new();
    client.primary(primary_with_labels(&["job", "broken", "instance"]));
    client.label("job", secondary(&[("up", 7)]));
    client.fail_label("broken", 500);
    client.label("instance", secondary(&[("up", 5)]));
    let store = RecordingStore::new(&["metric", "label"]);
    let options = ExpansionOptions {
        concurrency: 1,
        ..ExpansionOptions::default()
    };

    let mut instance = refreshed(&client).await;
    let err = instance
        .expand_series_by_metric_per_label(&client, &store, &options)
        .await
        .unwrap_err();

    match &err {
        CardinalityError::Expansion { key, source } => {
            assert_eq!(key, "broken");
            assert!(source.is_fetch_stage());
        }
        other => panic!("expected expansion error, got {other:?}"),
    }

    // Keys before the failure stay committed, keys after it are untouched.
    let table = instance.table(ExpansionKind::SeriesByMetricPerLabel);
    assert!(table.contains_key("job"));
    assert!(!table.contains_key("broken"));
    assert!(!table.contains_key("instance"));
    assert_eq!(store.value(&per_label("up", "job")), Some(7.0));
    assert_eq!(store.value(&per_label("up", "instance")), None);
}

#[tokio::test]
async fn test_best_effort_continues_past_failures() {
    let client = MockStatusClient::new();
    client.primary(primary_with_labels(&["job", "broken", "instance"]));
    client.label("job", secondary(&[("up", 7)]));
    client.fail_label("broken", 500);
    client.label("instance", secondary(&[("up", 5)]));
    let store = RecordingStore::new(&["metric", "label"]);
    let options = ExpansionOptions {
        policy: ExpansionPolicy::BestEffort,
        ..ExpansionOptions::default()
    };

    let mut instance = refreshed(&client).await;
    let err = instance
        .expand_series_by_metric_per_label(&client, &store, &options)
        .await
        .unwrap_err();

    match &err {
        CardinalityError::PartialExpansion { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].key, "broken");
        }
        other => panic!("expected partial expansion, got {other:?}"),
    }

    assert_eq!(store.value(&per_label("up", "job")), Some(7.0));
    assert_eq!(store.value(&per_label("up", "instance")), Some(5.0));
}

#[tokio::test]
async fn test_failed_key_keeps_previous_series() {
    let client = MockStatusClient::new();
    client.primary(primary_with_labels(&["job"]));
    client.label("job", secondary(&[("up", 7), ("node_load1", 3)]));
    let store = RecordingStore::new(&["metric", "label"]);
    let options = ExpansionOptions::default();

    let mut instance = refreshed(&client).await;
    instance
        .expand_series_by_metric_per_label(&client, &store, &options)
        .await
        .unwrap();
    let before = store.exposed();

    client.fail_label("job", 503);
    assert!(instance
        .expand_series_by_metric_per_label(&client, &store, &options)
        .await
        .is_err());

    assert_eq!(store.exposed(), before);
    assert_eq!(
        instance
            .table(ExpansionKind::SeriesByMetricPerLabel)
            .get("job")
            .unwrap()
            .tracked
            .len(),
        2
    );
}

#[tokio::test]
async fn test_requests_follow_rank_order() {
    let client = MockStatusClient::new();
    let names = ["a", "b", "c", "d", "e", "f"];
    client.primary(primary_with_labels(&names));
    for name in names {
        client.label(name, secondary(&[("up", 1)]));
    }
    let store = RecordingStore::new(&["metric", "label"]);
    let options = ExpansionOptions {
        concurrency: 1,
        ..ExpansionOptions::default()
    };

    let mut instance = refreshed(&client).await;
    instance
        .expand_series_by_metric_per_label(&client, &store, &options)
        .await
        .unwrap();

    let expected: Vec<String> = std::iter::once(String::new())
        .chain(names.iter().map(|n| format!(r#"{{{n}!=""}}"#)))
        .collect();
    assert_eq!(client.requests(), expected);
    assert_eq!(store.exposed().len(), names.len());
}

#[tokio::test]
async fn test_secondary_removal_within_key() {
    let client = MockStatusClient::new();
    client.primary(primary_with_labels(&["job"]));
    client.label("job", secondary(&[("up", 7), ("node_load1", 3)]));
    let store = RecordingStore::new(&["metric", "label"]);
    let options = ExpansionOptions::default();

    let mut instance = refreshed(&client).await;
    instance
        .expand_series_by_metric_per_label(&client, &store, &options)
        .await
        .unwrap();

    client.label("job", secondary(&[("up", 8)]));
    instance
        .expand_series_by_metric_per_label(&client, &store, &options)
        .await
        .unwrap();

    assert_eq!(store.deletes(), vec![per_label("node_load1", "job")]);
    assert_eq!(store.value(&per_label("up", "job")), Some(8.0));
}
