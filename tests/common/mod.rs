#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use histmon::logfiles::LogFileSet;
use histmon::metrics::ReplayMetrics;
use histmon::query::{AllowAllUser, IntervalSink, ReplayQuery};
use histmon::registry::InMemoryRegistry;
use histmon::replay::{ReplayStats, Replayer};
use histmon::state::{LogPeriod, ObjectState};

pub fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).expect("timestamp in range")
}

pub fn period(since: i64, until: i64) -> LogPeriod {
    LogPeriod::new(at(since), at(until))
}

pub fn write_log(dir: &Path, name: &str, lines: &[String]) {
    let mut file = File::create(dir.join(name)).expect("create log file");
    for line in lines {
        writeln!(file, "{line}").expect("write log line");
    }
}

pub fn host_state(time: i64, host: &str, word: &str) -> String {
    format!("[{time}] CURRENT HOST STATE: {host};{word};HARD;1;checked")
}

pub fn host_alert(time: i64, host: &str, word: &str) -> String {
    format!("[{time}] HOST ALERT: {host};{word};HARD;1;checked")
}

pub fn svc_initial(time: i64, host: &str, service: &str, word: &str) -> String {
    format!("[{time}] INITIAL SERVICE STATE: {host};{service};{word};HARD;1;checked")
}

pub fn svc_alert(time: i64, host: &str, service: &str, word: &str) -> String {
    format!("[{time}] SERVICE ALERT: {host};{service};{word};HARD;1;checked")
}

pub fn svc_downtime(time: i64, host: &str, service: &str, started: bool) -> String {
    let what = if started { "STARTED" } else { "STOPPED" };
    format!("[{time}] SERVICE DOWNTIME ALERT: {host};{service};{what}; scheduled downtime")
}

pub fn host_downtime(time: i64, host: &str, started: bool) -> String {
    let what = if started { "STARTED" } else { "STOPPED" };
    format!("[{time}] HOST DOWNTIME ALERT: {host};{what}; scheduled downtime")
}

pub fn svc_flapping(time: i64, host: &str, service: &str, started: bool) -> String {
    let what = if started { "STARTED" } else { "STOPPED" };
    format!("[{time}] SERVICE FLAPPING ALERT: {host};{service};{what}; flap detection")
}

pub fn timeperiod_transition(time: i64, payload: &str) -> String {
    format!("[{time}] TIMEPERIOD TRANSITION: {payload}")
}

pub fn log_initial_states(time: i64) -> String {
    format!("[{time}] logging initial states")
}

pub fn core_starting(time: i64) -> String {
    format!("[{time}] Monitoring core 2.4.0 starting... (PID 42)")
}

/// Sink that keeps every offered interval; optionally refuses after a count
/// to drive the abort path.
#[derive(Default)]
pub struct CollectSink {
    pub rows: Vec<ObjectState>,
    pub abort_after: Option<usize>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IntervalSink for CollectSink {
    fn accept(&mut self, interval: &ObjectState) -> bool {
        self.rows.push(interval.clone());
        self.abort_after.map_or(true, |count| self.rows.len() < count)
    }
}

pub fn replay_dir(
    dir: &Path,
    registry: &InMemoryRegistry,
    query: &ReplayQuery,
) -> (Vec<ObjectState>, ReplayStats) {
    replay_dir_with_sink(dir, registry, query, CollectSink::new())
}

pub fn replay_dir_with_sink(
    dir: &Path,
    registry: &InMemoryRegistry,
    query: &ReplayQuery,
    mut sink: CollectSink,
) -> (Vec<ObjectState>, ReplayStats) {
    let files = LogFileSet::scan(dir).expect("scan log directory");
    let metrics = ReplayMetrics::new().expect("metrics");
    let user = AllowAllUser;
    let replayer = Replayer::new(registry, &user, query, &metrics, 100_000);
    let stats = replayer.replay(&files, &mut sink);
    (sink.rows, stats)
}

pub fn rows_for<'a>(rows: &'a [ObjectState], host: &str, service: &str) -> Vec<&'a ObjectState> {
    rows.iter()
        .filter(|row| row.host_name == host && row.service_description == service)
        .collect()
}

/// Every object's intervals must tile the window: interval n+1 starts where
/// interval n ended.
pub fn assert_contiguous(rows: &[&ObjectState]) {
    for pair in rows.windows(2) {
        assert_eq!(
            pair[0].until, pair[1].from,
            "intervals must be contiguous: {} != {}",
            pair[0].until, pair[1].from
        );
    }
}

/// The per-state buckets of a row must partition its duration.
pub fn assert_buckets_partition(row: &ObjectState) {
    let sum = row.duration_ok
        + row.duration_warning
        + row.duration_critical
        + row.duration_unknown
        + row.duration_unmonitored;
    assert_eq!(sum, row.duration, "buckets must sum to the duration");
}
