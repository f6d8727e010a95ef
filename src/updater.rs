//! Periodic refresh of all monitored instances.
//!
//! Each tick runs one cycle per instance, concurrently across instances:
//! refresh the primary snapshot, reconcile the primary families, then run the
//! enabled cross-dimensional expansions.

use cardinality_exporter::health_stats::CycleStage;
use cardinality_exporter::ExpansionKind;
use futures::future::join_all;
use std::time::{Duration, Instant, SystemTime};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::config::DEFAULT_REFRESH_INTERVAL_SECS;
use crate::state::{InstanceSlot, InstanceStatus, SharedState};

/// Runs a cycle immediately and then once per refresh interval, forever.
pub async fn run_refresh_loop(state: SharedState) {
    let interval_secs = state
        .config
        .refresh_interval_seconds
        .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Refreshing {} instance(s) every {}s",
        state.instances.len(),
        interval_secs
    );

    loop {
        interval.tick().await;
        refresh_all(&state).await;
    }
}

/// Runs one cycle for every instance and waits for all of them.
pub async fn refresh_all(state: &SharedState) {
    let start = Instant::now();
    join_all(state.instances.iter().map(|slot| run_cycle(state, slot))).await;
    debug!(
        "Refresh of {} instance(s) finished in {:.3}s",
        state.instances.len(),
        start.elapsed().as_secs_f64()
    );
}

/// One refresh cycle for a single instance.
#[instrument(skip(state, slot), fields(instance = %slot.name))]
async fn run_cycle(state: &SharedState, slot: &InstanceSlot) {
    let start = Instant::now();
    let stats = &state.health_stats;
    let expansion = &state.config.expansion;
    let options = expansion.options();

    let mut instance = slot.instance.lock().await;
    let mut cycle_ok = true;
    let mut last_error = None;

    let refreshed = match instance.refresh(&state.client).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Refresh of {} failed: {}", slot.name, e);
            stats.record_failure(CycleStage::Refresh, &e);
            last_error = Some(e.to_string());
            false
        }
    };

    if refreshed {
        if let Err(e) = instance.expose_primary(&state.metrics.primary) {
            warn!("Primary reconciliation for {} failed: {}", slot.name, e);
            stats.record_failure(CycleStage::Primary, &e);
            last_error = Some(e.to_string());
            cycle_ok = false;
        }

        for kind in ExpansionKind::ALL {
            let enabled = match kind {
                ExpansionKind::SeriesByMetricPerLabel => expansion.series_by_metric_per_label,
                ExpansionKind::LabelCountPerMetric => expansion.label_count_per_metric,
            };
            if !enabled {
                continue;
            }
            let store = state.metrics.expansion(kind);
            if let Err(e) = instance.expand(kind, &state.client, store, &options).await {
                warn!("{} expansion for {} failed: {}", kind.name(), slot.name, e);
                stats.record_failure(CycleStage::Expansion, &e);
                last_error = Some(e.to_string());
                cycle_ok = false;
            }
        }
    } else {
        cycle_ok = false;
    }

    let duration = start.elapsed().as_secs_f64();
    let exposed = instance.exposed_series();
    let fetched = instance.snapshot().entry_count();

    stats.record_cycle(duration, fetched as u64, exposed as u64);
    if cycle_ok {
        stats.record_cycle_success();
    } else {
        stats.record_cycle_failure();
    }
    state
        .metrics
        .record_refresh(instance.identity(), refreshed, duration, exposed);

    if let Ok(mut status) = slot.status.write() {
        *status = InstanceStatus {
            last_success: Some(refreshed),
            last_error,
            last_refresh: Some(SystemTime::now()),
            exposed_series: exposed,
            duration_seconds: duration,
        };
    }

    if cycle_ok {
        info!(
            "Cycle for {} completed in {:.3}s ({} series exposed)",
            slot.name, duration, exposed
        );
    }
}
