//! Health statistics for the exporter.
//!
//! Tracks refresh cycle performance, per-stage failures and HTTP request metrics,
//! and renders them as the plain-text table served on `/health`.

use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant, SystemTime};

use crate::error::CardinalityError;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns `(last, avg, max, min, count)`.
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Thread-safe circular buffer for tracking HTTP request timestamps.
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(1024)),
        }
    }
}

impl RequestTimestamps {
    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            // Keep only the last 10 minutes
            while guard
                .front()
                .is_some_and(|&t| now.duration_since(t) > Duration::from_secs(600))
            {
                guard.pop_front();
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        if let Ok(guard) = self.inner.lock() {
            let now = Instant::now();
            guard
                .iter()
                .filter(|&&t| now.duration_since(t) <= Duration::from_secs(60))
                .count() as u64
        } else {
            0
        }
    }
}

/// Stage of an instance cycle, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Refresh,
    Primary,
    Expansion,
}

/// Exporter-wide health statistics.
pub struct HealthStats {
    // Cycle performance
    pub cycle_duration_seconds: Stat,
    pub fetched_entries: Stat,
    pub exposed_series: Stat,
    pub total_cycles: AtomicU64,
    pub cycle_success_count: AtomicU64,
    pub cycle_failure_count: AtomicU64,

    // Error tracking
    pub refresh_failures: AtomicU64,
    pub primary_failures: AtomicU64,
    pub expansion_failures: AtomicU64,
    pub fetch_errors: AtomicU64,
    pub parse_errors: AtomicU64,
    pub store_errors: AtomicU64,

    // HTTP server stats
    pub http_request_timestamps: RequestTimestamps,
    pub request_duration_ms: Stat,
    pub metrics_endpoint_calls: AtomicU64,
    pub metrics_response_size_kb: Stat,

    // Timing
    pub start_time: Instant,
    pub last_cycle_time: StdRwLock<Option<SystemTime>>,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            cycle_duration_seconds: Stat::default(),
            fetched_entries: Stat::default(),
            exposed_series: Stat::default(),
            total_cycles: AtomicU64::new(0),
            cycle_success_count: AtomicU64::new(0),
            cycle_failure_count: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
            primary_failures: AtomicU64::new(0),
            expansion_failures: AtomicU64::new(0),
            fetch_errors: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
            http_request_timestamps: RequestTimestamps::default(),
            request_duration_ms: Stat::default(),
            metrics_endpoint_calls: AtomicU64::new(0),
            metrics_response_size_kb: Stat::default(),
            start_time: Instant::now(),
            last_cycle_time: StdRwLock::new(None),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a finished instance cycle.
    pub fn record_cycle(&self, duration_seconds: f64, fetched_entries: u64, exposed_series: u64) {
        self.cycle_duration_seconds.add_sample(duration_seconds);
        self.fetched_entries.add_sample(fetched_entries as f64);
        self.exposed_series.add_sample(exposed_series as f64);
        self.total_cycles.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_cycle_time.write() {
            *guard = Some(SystemTime::now());
        }
    }

    pub fn record_cycle_success(&self) {
        self.cycle_success_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a cycle in which at least one stage failed.
    pub fn record_cycle_failure(&self) {
        self.cycle_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed stage and classifies the underlying error.
    pub fn record_failure(&self, stage: CycleStage, error: &CardinalityError) {
        let stage_counter = match stage {
            CycleStage::Refresh => &self.refresh_failures,
            CycleStage::Primary => &self.primary_failures,
            CycleStage::Expansion => &self.expansion_failures,
        };
        stage_counter.fetch_add(1, Ordering::Relaxed);
        self.record_error_kind(error);
    }

    fn record_error_kind(&self, error: &CardinalityError) {
        match error {
            CardinalityError::Fetch { .. } => {
                self.fetch_errors.fetch_add(1, Ordering::Relaxed);
            }
            CardinalityError::Parse { .. } => {
                self.parse_errors.fetch_add(1, Ordering::Relaxed);
            }
            CardinalityError::Store { .. } => {
                self.store_errors.fetch_add(1, Ordering::Relaxed);
            }
            CardinalityError::Expansion { source, .. } => self.record_error_kind(source),
            CardinalityError::PartialExpansion { failures } => {
                for failure in failures {
                    self.record_error_kind(&failure.error);
                }
            }
        }
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn record_request_duration(&self, duration_ms: f64) {
        self.request_duration_ms.add_sample(duration_ms);
    }

    pub fn record_metrics_endpoint_call(&self) {
        self.metrics_endpoint_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_metrics_response_size_kb(&self, size_kb: f64) {
        self.metrics_response_size_kb.add_sample(size_kb);
    }

    pub fn get_cycle_success_rate(&self) -> f64 {
        let success = self.cycle_success_count.load(Ordering::Relaxed);
        let failure = self.cycle_failure_count.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_last_cycle_time_str(&self) -> String {
        const SECS_PER_DAY: u64 = 86400;
        const SECS_PER_HOUR: u64 = 3600;
        const SECS_PER_MINUTE: u64 = 60;

        let last = self.last_cycle_time.read().ok().and_then(|guard| *guard);
        match last.and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok()) {
            Some(since_epoch) => {
                let secs = since_epoch.as_secs();
                let hours = (secs % SECS_PER_DAY) / SECS_PER_HOUR;
                let minutes = (secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
                let seconds = secs % SECS_PER_MINUTE;
                format!("{:02}:{:02}:{:02} UTC", hours, minutes, seconds)
            }
            None => "N/A".to_string(),
        }
    }

    pub fn render_table(&self) -> String {
        let (cd_cur, cd_avg, cd_max, cd_min, _) = self.cycle_duration_seconds.snapshot();
        let (fe_cur, fe_avg, fe_max, fe_min, _) = self.fetched_entries.snapshot();
        let (es_cur, es_avg, es_max, es_min, _) = self.exposed_series.snapshot();
        let (rd_cur, rd_avg, rd_max, rd_min, _) = self.request_duration_ms.snapshot();
        let (rs_cur, rs_avg, rs_max, rs_min, _) = self.metrics_response_size_kb.snapshot();

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - EXPORTER INTERNAL STATS").ok();
        writeln!(out, "==========================================").ok();
        writeln!(out).ok();

        let row = |out: &mut String, name: &str, cols: [String; 4]| {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                name,
                cols[0],
                cols[1],
                cols[2],
                cols[3],
                left = left_col,
                col = col_w
            )
            .ok();
        };

        row(
            &mut out,
            "",
            [
                "current".into(),
                "average".into(),
                "max".into(),
                "min".into(),
            ],
        );

        writeln!(out).ok();
        writeln!(out, "REFRESH CYCLES").ok();
        writeln!(out, "--------------").ok();
        row(
            &mut out,
            "cycle_duration (s)",
            [
                format!("{:.3}", cd_cur),
                format!("{:.3}", cd_avg),
                format!("{:.3}", cd_max),
                format!("{:.3}", cd_min),
            ],
        );
        row(
            &mut out,
            "fetched_entries",
            [
                format!("{:.0}", fe_cur),
                format!("{:.1}", fe_avg),
                format!("{:.0}", fe_max),
                format!("{:.0}", fe_min),
            ],
        );
        row(
            &mut out,
            "exposed_series",
            [
                format!("{:.0}", es_cur),
                format!("{:.1}", es_avg),
                format!("{:.0}", es_max),
                format!("{:.0}", es_min),
            ],
        );

        writeln!(out).ok();
        writeln!(out, "HTTP SERVER").ok();
        writeln!(out, "-----------").ok();
        row(
            &mut out,
            "request_duration (ms)",
            [
                format!("{:.2}", rd_cur),
                format!("{:.2}", rd_avg),
                format!("{:.2}", rd_max),
                format!("{:.2}", rd_min),
            ],
        );
        row(
            &mut out,
            "metrics_response (KB)",
            [
                format!("{:.1}", rs_cur),
                format!("{:.1}", rs_avg),
                format!("{:.1}", rs_max),
                format!("{:.1}", rs_min),
            ],
        );

        writeln!(out).ok();
        writeln!(out, "COUNTERS").ok();
        writeln!(out, "--------").ok();
        let counters = [
            ("total_cycles", self.total_cycles.load(Ordering::Relaxed)),
            ("refresh_failures", self.refresh_failures.load(Ordering::Relaxed)),
            ("primary_failures", self.primary_failures.load(Ordering::Relaxed)),
            ("expansion_failures", self.expansion_failures.load(Ordering::Relaxed)),
            ("fetch_errors", self.fetch_errors.load(Ordering::Relaxed)),
            ("parse_errors", self.parse_errors.load(Ordering::Relaxed)),
            ("store_errors", self.store_errors.load(Ordering::Relaxed)),
            (
                "metrics_endpoint_calls",
                self.metrics_endpoint_calls.load(Ordering::Relaxed),
            ),
            (
                "http_requests_last_minute",
                self.http_request_timestamps.count_last_minute(),
            ),
        ];
        for (name, value) in counters {
            writeln!(out, "{:left$} | {}", name, value, left = left_col).ok();
        }
        writeln!(
            out,
            "{:left$} | {:.1}",
            "cycle_success_rate (%)",
            self.get_cycle_success_rate(),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {}",
            "last_cycle",
            self.get_last_cycle_time_str(),
            left = left_col
        )
        .ok();

        out
    }
}
