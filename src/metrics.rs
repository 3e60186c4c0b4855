use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramTimer, IntCounter, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Metrics registry for the replay engine.
#[derive(Clone)]
pub struct ReplayMetrics {
    registry: Registry,
    entries_scanned: IntCounter,
    intervals_emitted: IntCounter,
    intervals_unauthorized: IntCounter,
    objects_tracked: IntGauge,
    objects_blacklisted: IntCounter,
    replay_duration: Histogram,
}

impl ReplayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("histmon".into()), None)?;

        let entries_scanned = IntCounter::with_opts(Opts::new(
            "log_entries_scanned_total",
            "Log entries fed into the replay state machine",
        ))?;
        registry.register(Box::new(entries_scanned.clone()))?;

        let intervals_emitted = IntCounter::with_opts(Opts::new(
            "intervals_emitted_total",
            "State intervals offered to the sink",
        ))?;
        registry.register(Box::new(intervals_emitted.clone()))?;

        let intervals_unauthorized = IntCounter::with_opts(Opts::new(
            "intervals_unauthorized_total",
            "State intervals suppressed by the authorization check",
        ))?;
        registry.register(Box::new(intervals_unauthorized.clone()))?;

        let objects_tracked = IntGauge::with_opts(Opts::new(
            "objects_tracked",
            "Hosts and services tracked by the last replay",
        ))?;
        registry.register(Box::new(objects_tracked.clone()))?;

        let objects_blacklisted = IntCounter::with_opts(Opts::new(
            "objects_blacklisted_total",
            "Objects rejected by the query filter during insertion",
        ))?;
        registry.register(Box::new(objects_blacklisted.clone()))?;

        let replay_duration = Histogram::with_opts(HistogramOpts::new(
            "replay_duration_seconds",
            "Wall time of one replay",
        ))?;
        registry.register(Box::new(replay_duration.clone()))?;

        Ok(Self {
            registry,
            entries_scanned,
            intervals_emitted,
            intervals_unauthorized,
            objects_tracked,
            objects_blacklisted,
            replay_duration,
        })
    }

    pub fn inc_entries_scanned(&self) {
        self.entries_scanned.inc();
    }

    pub fn inc_intervals_emitted(&self) {
        self.intervals_emitted.inc();
    }

    pub fn inc_intervals_unauthorized(&self) {
        self.intervals_unauthorized.inc();
    }

    pub fn inc_objects_blacklisted(&self) {
        self.objects_blacklisted.inc();
    }

    pub fn set_objects_tracked(&self, count: usize) {
        self.objects_tracked.set(count as i64);
    }

    pub fn start_replay_timer(&self) -> HistogramTimer {
        self.replay_duration.start_timer()
    }

    /// Encode metrics into Prometheus exposition format.
    pub fn encode(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
