//! Telemetry Store
//!
//! Single shared aggregator for decision events:
//! - totals per verdict and per backend (monotonic until `reset`)
//! - ring of the most recent events, newest first, capacity-bounded
//! - per-second buckets over a trailing window of W seconds
//!
//! All state sits behind one mutex, so `record`, `snapshot` and `reset`
//! are linearizable and a bucket is never observed half-updated.
//! Expired buckets are swept on every write; reads fill gaps with zeros.

use std::collections::{BTreeMap, HashMap, VecDeque};
use chrono::{Local, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::Verdict;
use super::event::DecisionEvent;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default ring capacity (rows kept for the recent-events table)
pub const DEFAULT_RECENT_CAPACITY: usize = 2000;

/// Default trailing window (10 minutes)
pub const DEFAULT_HISTORY_SECONDS: u32 = 600;

/// Length of the short series
pub const SHORT_SERIES_SECONDS: usize = 10;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub recent_capacity: usize,
    pub history_seconds: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            recent_capacity: DEFAULT_RECENT_CAPACITY,
            history_seconds: DEFAULT_HISTORY_SECONDS,
        }
    }
}

/// Running totals per verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictTotals {
    #[serde(rename = "ALLOW")]
    pub allow: u64,
    #[serde(rename = "REROUTE")]
    pub reroute: u64,
    #[serde(rename = "BLOCK")]
    pub block: u64,
}

impl VerdictTotals {
    fn bump(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Allow => self.allow += 1,
            Verdict::Reroute => self.reroute += 1,
            Verdict::Block => self.block += 1,
        }
    }

    pub fn get(&self, verdict: Verdict) -> u64 {
        match verdict {
            Verdict::Allow => self.allow,
            Verdict::Reroute => self.reroute,
            Verdict::Block => self.block,
        }
    }

    pub fn sum(&self) -> u64 {
        self.allow + self.reroute + self.block
    }

    pub fn bot(&self) -> u64 {
        self.reroute + self.block
    }
}

/// Aggregate for one second
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub total: u64,
    pub allow: u64,
    pub bot: u64,
}

impl BucketCounts {
    fn bump(&mut self, verdict: Verdict) {
        self.total += 1;
        if verdict.is_bot() {
            self.bot += 1;
        } else {
            self.allow += 1;
        }
        debug_assert_eq!(self.total, self.allow + self.bot);
    }
}

/// One point of a series, as served to chart consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Epoch seconds
    pub t: i64,

    /// Local wall clock, HH:MM:SS
    pub time: String,

    pub total: u64,
    pub allow: u64,
    pub bot: u64,
}

impl Bucket {
    fn new(t: i64, counts: BucketCounts) -> Self {
        Self {
            t,
            time: clock_label(t),
            total: counts.total,
            allow: counts.allow,
            bot: counts.bot,
        }
    }
}

fn clock_label(t: i64) -> String {
    Local
        .timestamp_opt(t, 0)
        .earliest()
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Point-in-time copy of the store
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    pub totals: VerdictTotals,
    pub per_backend: BTreeMap<String, u64>,

    /// Newest first
    pub recent: Vec<DecisionEvent>,
    pub recent_count: usize,

    /// Last 10 seconds of `series10m`
    pub series10s: Vec<Bucket>,

    /// One bucket per second of the trailing window, oldest first
    pub series10m: Vec<Bucket>,
}

/// Source address activity within the recent ring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRow {
    pub ip: String,
    pub count: u64,
    pub blocked: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSummary {
    pub total: u64,
    pub bot_pct: f64,
    pub rps_10s: f64,
    pub window_seconds: u32,
    pub recent_count: usize,
    pub recent_capacity: usize,
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Default)]
struct StoreState {
    totals: VerdictTotals,
    per_backend: BTreeMap<String, u64>,
    recent: VecDeque<DecisionEvent>,
    buckets: BTreeMap<i64, BucketCounts>,
}

impl StoreState {
    fn seeded(backends: &[String]) -> Self {
        Self {
            per_backend: backends.iter().map(|id| (id.clone(), 0)).collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct TelemetryStore {
    config: StoreConfig,

    /// Backend ids reported with a zero count before any traffic
    known_backends: Vec<String>,

    state: Mutex<StoreState>,
}

impl TelemetryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_backends(config, Vec::new())
    }

    pub fn with_backends(config: StoreConfig, known_backends: Vec<String>) -> Self {
        let state = StoreState::seeded(&known_backends);
        Self {
            config,
            known_backends,
            state: Mutex::new(state),
        }
    }

    /// First second still inside the window ending at `now`
    fn window_start(&self, now: i64) -> i64 {
        now - i64::from(self.config.history_seconds) + 1
    }

    /// Record a decision event
    pub fn record(&self, event: DecisionEvent) {
        self.record_at(event, Utc::now().timestamp());
    }

    /// Record with an explicit clock (epoch seconds)
    pub fn record_at(&self, event: DecisionEvent, now: i64) {
        let second = event.epoch_second();
        let cutoff = self.window_start(now);

        let mut state = self.state.lock();

        state.totals.bump(event.decision);

        if let Some(backend) = &event.chosen_backend {
            *state.per_backend.entry(backend.clone()).or_insert(0) += 1;
        }

        // Events already outside the window count in totals only
        if second >= cutoff {
            state.buckets.entry(second).or_default().bump(event.decision);
        }

        let expired = state
            .buckets
            .first_key_value()
            .is_some_and(|(oldest, _)| *oldest < cutoff);
        if expired {
            let kept = state.buckets.split_off(&cutoff);
            state.buckets = kept;
        }

        state.recent.push_front(event);
        state.recent.truncate(self.config.recent_capacity);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot_at(Utc::now().timestamp())
    }

    /// Snapshot with an explicit clock (epoch seconds)
    pub fn snapshot_at(&self, now: i64) -> TelemetrySnapshot {
        let start = self.window_start(now);

        let (totals, per_backend, recent, counts) = {
            let state = self.state.lock();
            let counts: Vec<(i64, BucketCounts)> = state
                .buckets
                .range(start..=now)
                .map(|(t, c)| (*t, *c))
                .collect();
            (
                state.totals,
                state.per_backend.clone(),
                state.recent.iter().cloned().collect::<Vec<_>>(),
                counts,
            )
        };

        let series10m = fill_series(start, now, &counts);
        let series10s = series10m[series10m.len().saturating_sub(SHORT_SERIES_SECONDS)..].to_vec();

        TelemetrySnapshot {
            totals,
            per_backend,
            recent_count: recent.len(),
            recent,
            series10s,
            series10m,
        }
    }

    /// Clear all totals, the ring and the buckets
    pub fn reset(&self) {
        *self.state.lock() = StoreState::seeded(&self.known_backends);
        tracing::info!("Telemetry store reset");
    }

    /// Most active source addresses in the recent ring
    pub fn top_sources(&self, limit: usize) -> Vec<SourceRow> {
        let mut rows: HashMap<String, SourceRow> = HashMap::new();
        {
            let state = self.state.lock();
            for event in &state.recent {
                let Some(ip) = event.meta.src_ip.as_deref() else {
                    continue;
                };
                let row = rows.entry(ip.to_string()).or_insert_with(|| SourceRow {
                    ip: ip.to_string(),
                    count: 0,
                    blocked: 0,
                });
                row.count += 1;
                if event.decision == Verdict::Block {
                    row.blocked += 1;
                }
            }
        }

        let mut rows: Vec<SourceRow> = rows.into_values().collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.ip.cmp(&b.ip)));
        rows.truncate(limit);
        rows
    }

    pub fn summary(&self) -> TrafficSummary {
        self.summary_at(Utc::now().timestamp())
    }

    pub fn summary_at(&self, now: i64) -> TrafficSummary {
        let short_start = (now - SHORT_SERIES_SECONDS as i64 + 1).max(self.window_start(now));

        let (totals, recent_count, last_10s) = {
            let state = self.state.lock();
            let last_10s: u64 = state.buckets.range(short_start..=now).map(|(_, c)| c.total).sum();
            (state.totals, state.recent.len(), last_10s)
        };

        let total = totals.sum();
        let bot_pct = if total > 0 {
            totals.bot() as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        TrafficSummary {
            total,
            bot_pct,
            rps_10s: last_10s as f64 / SHORT_SERIES_SECONDS as f64,
            window_seconds: self.config.history_seconds,
            recent_count,
            recent_capacity: self.config.recent_capacity,
        }
    }
}

/// One bucket per second in `[start, end]`, zeros where nothing was recorded.
/// `counts` must be sorted by second.
fn fill_series(start: i64, end: i64, counts: &[(i64, BucketCounts)]) -> Vec<Bucket> {
    let mut present = counts.iter().peekable();
    let mut series = Vec::with_capacity((end - start + 1).max(0) as usize);

    for t in start..=end {
        let value = present
            .next_if(|(second, _)| *second == t)
            .map(|(_, c)| *c)
            .unwrap_or_default();
        series.push(Bucket::new(t, value));
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    const NOW: i64 = 1_714_564_800;

    fn event_at(second: i64, verdict: Verdict) -> DecisionEvent {
        let ts = DateTime::from_timestamp(second, 0).unwrap();
        DecisionEvent::at(ts, 0.5, verdict)
    }

    fn store() -> TelemetryStore {
        TelemetryStore::new(StoreConfig::default())
    }

    #[test]
    fn test_totals_count_every_record() {
        let store = store();
        let verdicts = [Verdict::Allow, Verdict::Block, Verdict::Reroute, Verdict::Allow, Verdict::Allow];
        for (i, v) in verdicts.iter().enumerate() {
            store.record_at(event_at(NOW - i as i64, *v), NOW);
        }

        let snap = store.snapshot_at(NOW);
        assert_eq!(snap.totals.sum(), 5);
        assert_eq!(snap.totals.get(Verdict::Allow), 3);
        assert_eq!(snap.totals.get(Verdict::Reroute), 1);
        assert_eq!(snap.totals.get(Verdict::Block), 1);
    }

    #[test]
    fn test_series_has_no_gaps() {
        let store = store();
        store.record_at(event_at(NOW - 300, Verdict::Allow), NOW);
        store.record_at(event_at(NOW, Verdict::Block), NOW);

        let snap = store.snapshot_at(NOW);
        assert_eq!(snap.series10m.len(), 600);
        assert_eq!(snap.series10m.first().unwrap().t, NOW - 599);
        assert_eq!(snap.series10m.last().unwrap().t, NOW);
        for pair in snap.series10m.windows(2) {
            assert_eq!(pair[1].t, pair[0].t + 1);
        }

        let total: u64 = snap.series10m.iter().map(|b| b.total).sum();
        assert_eq!(total, 2);

        // Empty store still yields a full series
        let snap = TelemetryStore::new(StoreConfig::default()).snapshot_at(NOW);
        assert_eq!(snap.series10m.len(), 600);
        assert!(snap.series10m.iter().all(|b| b.total == 0));
    }

    #[test]
    fn test_short_series_is_window_suffix() {
        let store = store();
        for i in 0..20 {
            store.record_at(event_at(NOW - i, Verdict::Allow), NOW);
        }

        let snap = store.snapshot_at(NOW);
        assert_eq!(snap.series10s.len(), 10);
        assert_eq!(snap.series10s[..], snap.series10m[590..]);
        assert!(snap.series10s.iter().all(|b| b.total == 1));
    }

    #[test]
    fn test_bucket_arithmetic() {
        let store = store();
        for i in 0..60 {
            let verdict = Verdict::ALL[i % 3];
            store.record_at(event_at(NOW - (i as i64 % 7), verdict), NOW);
        }

        let snap = store.snapshot_at(NOW);
        for bucket in &snap.series10m {
            assert_eq!(bucket.total, bucket.allow + bucket.bot);
        }
        let bot: u64 = snap.series10m.iter().map(|b| b.bot).sum();
        assert_eq!(bot, snap.totals.bot());
    }

    #[test]
    fn test_ring_capacity() {
        let store = TelemetryStore::new(StoreConfig {
            recent_capacity: 3,
            history_seconds: 600,
        });

        let events: Vec<DecisionEvent> = (0..4).map(|i| event_at(NOW - 3 + i, Verdict::Allow)).collect();
        for event in &events {
            store.record_at(event.clone(), NOW);
        }

        let snap = store.snapshot_at(NOW);
        assert_eq!(snap.recent_count, 3);
        assert_eq!(snap.recent.len(), 3);
        assert_eq!(snap.recent[0].id, events[3].id);
        assert!(snap.recent.iter().all(|e| e.id != events[0].id));
        // Totals are not bounded by the ring
        assert_eq!(snap.totals.sum(), 4);
    }

    #[test]
    fn test_expired_buckets_evicted_on_write() {
        let store = store();
        store.record_at(event_at(NOW, Verdict::Allow), NOW);
        store.record_at(event_at(NOW + 100, Verdict::Allow), NOW + 100);
        assert_eq!(store.state.lock().buckets.len(), 2);

        let later = NOW + 700;
        store.record_at(event_at(later, Verdict::Block), later);

        let state = store.state.lock();
        let cutoff = later - 600 + 1;
        assert!(state.buckets.keys().all(|k| *k >= cutoff));
        assert_eq!(state.buckets.keys().copied().collect::<Vec<_>>(), vec![later]);
    }

    #[test]
    fn test_stale_event_counts_without_bucket() {
        let store = store();
        store.record_at(event_at(NOW - 5000, Verdict::Reroute), NOW);

        assert!(store.state.lock().buckets.is_empty());
        let snap = store.snapshot_at(NOW);
        assert_eq!(snap.totals.reroute, 1);
        assert_eq!(snap.recent_count, 1);
    }

    #[test]
    fn test_snapshot_window_follows_clock() {
        let store = store();
        store.record_at(event_at(NOW, Verdict::Allow), NOW);

        // Not yet swept, but outside the window at read time
        let snap = store.snapshot_at(NOW + 600);
        assert!(snap.series10m.iter().all(|b| b.total == 0));
        assert_eq!(snap.series10m.len(), 600);
    }

    #[test]
    fn test_per_backend_totals() {
        let store = TelemetryStore::with_backends(
            StoreConfig::default(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
        );

        store.record_at(event_at(NOW, Verdict::Allow).with_backend("A"), NOW);
        store.record_at(event_at(NOW, Verdict::Allow).with_backend("A"), NOW);
        store.record_at(event_at(NOW, Verdict::Allow).with_backend("D"), NOW);
        store.record_at(event_at(NOW, Verdict::Block), NOW);

        let snap = store.snapshot_at(NOW);
        assert_eq!(snap.per_backend["A"], 2);
        assert_eq!(snap.per_backend["B"], 0);
        assert_eq!(snap.per_backend["C"], 0);
        assert_eq!(snap.per_backend["D"], 1);
    }

    #[test]
    fn test_reset() {
        let store = TelemetryStore::with_backends(StoreConfig::default(), vec!["A".to_string()]);
        for _ in 0..10 {
            store.record_at(event_at(NOW, Verdict::Allow).with_backend("A"), NOW);
        }

        store.reset();

        let snap = store.snapshot_at(NOW);
        assert_eq!(snap.totals, VerdictTotals::default());
        assert_eq!(snap.per_backend.get("A"), Some(&0));
        assert!(snap.recent.is_empty());
        assert!(snap.series10m.iter().all(|b| b.total == 0));
    }

    #[test]
    fn test_concurrent_records() {
        let store = TelemetryStore::new(StoreConfig {
            recent_capacity: 100,
            history_seconds: 600,
        });

        std::thread::scope(|s| {
            for worker in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..1000 {
                        let verdict = Verdict::ALL[(worker + i) % 3];
                        store.record_at(event_at(NOW - (i as i64 % 30), verdict), NOW);
                    }
                });
            }
        });

        let snap = store.snapshot_at(NOW);
        assert_eq!(snap.totals.sum(), 8000);
        assert_eq!(snap.recent_count, 100);

        let series_total: u64 = snap.series10m.iter().map(|b| b.total).sum();
        assert_eq!(series_total, 8000);
        for bucket in &snap.series10m {
            assert_eq!(bucket.total, bucket.allow + bucket.bot);
        }
    }

    #[test]
    fn test_snapshot_consistent_under_writes() {
        let store = store();

        std::thread::scope(|s| {
            for _ in 0..4 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..2000 {
                        store.record_at(event_at(NOW, Verdict::ALL[i % 3]), NOW);
                    }
                });
            }

            let store = &store;
            s.spawn(move || {
                for _ in 0..200 {
                    let snap = store.snapshot_at(NOW);
                    let series_total: u64 = snap.series10m.iter().map(|b| b.total).sum();
                    assert_eq!(series_total, snap.totals.sum());
                    for bucket in &snap.series10s {
                        assert_eq!(bucket.total, bucket.allow + bucket.bot);
                    }
                }
            });
        });

        assert_eq!(store.snapshot_at(NOW).totals.sum(), 8000);
    }

    #[test]
    fn test_top_sources() {
        let store = store();
        let ev = |ip: &str, verdict| {
            event_at(NOW, verdict).with_meta(crate::telemetry::RequestMeta {
                src_ip: Some(ip.to_string()),
                ..Default::default()
            })
        };

        store.record_at(ev("10.0.0.2", Verdict::Block), NOW);
        store.record_at(ev("10.0.0.1", Verdict::Allow), NOW);
        store.record_at(ev("10.0.0.2", Verdict::Reroute), NOW);
        store.record_at(ev("10.0.0.3", Verdict::Block), NOW);
        store.record_at(event_at(NOW, Verdict::Block), NOW);

        let rows = store.top_sources(2);
        assert_eq!(
            rows,
            vec![
                SourceRow { ip: "10.0.0.2".to_string(), count: 2, blocked: 1 },
                SourceRow { ip: "10.0.0.1".to_string(), count: 1, blocked: 0 },
            ]
        );
    }

    #[test]
    fn test_summary() {
        let store = store();
        for i in 0..20 {
            let verdict = if i < 15 { Verdict::Allow } else { Verdict::Block };
            store.record_at(event_at(NOW - i, verdict), NOW);
        }

        let summary = store.summary_at(NOW);
        assert_eq!(summary.total, 20);
        assert_eq!(summary.bot_pct, 25.0);
        assert_eq!(summary.rps_10s, 1.0);
        assert_eq!(summary.window_seconds, 600);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let store = store();
        store.record_at(event_at(NOW, Verdict::Reroute), NOW);

        let value = serde_json::to_value(store.snapshot_at(NOW)).unwrap();
        assert_eq!(value["totals"]["REROUTE"], 1);
        assert_eq!(value["totals"]["ALLOW"], 0);
        assert_eq!(value["recent_count"], 1);
        assert_eq!(value["series10s"].as_array().unwrap().len(), 10);

        let last = &value["series10m"][599];
        assert_eq!(last["t"], NOW);
        assert_eq!(last["total"], 1);
        assert_eq!(last["bot"], 1);
        assert_eq!(last["time"].as_str().unwrap().len(), 8);
    }
}
