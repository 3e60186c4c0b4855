use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, Serializer};

use crate::registry::ObjectId;

/// Half-open query window `[since, until)` in wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPeriod {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl LogPeriod {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }

    pub fn empty(&self) -> bool {
        self.since >= self.until
    }

    pub fn duration(&self) -> TimeDelta {
        self.until - self.since
    }
}

impl fmt::Display for LogPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.since.timestamp(),
            self.until.timestamp()
        )
    }
}

fn seconds<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(value.num_seconds())
}

/// The tracked state of one host or service during a replay. Between two
/// emissions it accumulates one interval: `from` is frozen, `until` follows
/// the latest observed event. An emission closes `[from, until)` and moves
/// `from` up to `until`.
///
/// The serialized form is the emitted row.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectState {
    #[serde(skip)]
    pub is_host: bool,
    /// Registry key of the owning host (for hosts: the object itself).
    #[serde(skip)]
    pub host: Option<ObjectId>,
    #[serde(skip)]
    pub service: Option<ObjectId>,
    pub host_name: String,
    pub service_description: String,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,
    pub lineno: u32,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub from: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub until: DateTime<Utc>,
    #[serde(serialize_with = "seconds")]
    pub duration: TimeDelta,
    pub duration_part: f64,

    /// `-1` = unmonitored, `0..3` = OK/WARN/CRIT/UNKNOWN (services) or
    /// UP/DOWN/UNREACH (hosts).
    pub state: i32,
    pub host_down: i32,
    pub in_downtime: i32,
    pub in_host_downtime: i32,
    pub is_flapping: i32,
    pub in_notification_period: i32,
    pub notification_period: String,
    pub in_service_period: i32,
    pub service_period: String,
    pub debug_info: String,
    pub log_output: String,
    pub long_log_output: String,

    #[serde(serialize_with = "seconds")]
    pub duration_ok: TimeDelta,
    pub duration_part_ok: f64,
    #[serde(serialize_with = "seconds")]
    pub duration_warning: TimeDelta,
    pub duration_part_warning: f64,
    #[serde(serialize_with = "seconds")]
    pub duration_critical: TimeDelta,
    pub duration_part_critical: f64,
    #[serde(serialize_with = "seconds")]
    pub duration_unknown: TimeDelta,
    pub duration_part_unknown: f64,
    #[serde(serialize_with = "seconds")]
    pub duration_unmonitored: TimeDelta,
    pub duration_part_unmonitored: f64,

    #[serde(skip)]
    pub may_no_longer_exist: bool,
    #[serde(skip)]
    pub has_vanished: bool,
    #[serde(skip)]
    pub last_known_time: DateTime<Utc>,
    /// For hosts: keys of the services whose state cascades from this host.
    #[serde(skip)]
    pub services: Vec<ObjectId>,
}

impl Default for ObjectState {
    fn default() -> Self {
        Self {
            is_host: false,
            host: None,
            service: None,
            host_name: String::new(),
            service_description: String::new(),
            time: DateTime::UNIX_EPOCH,
            lineno: 0,
            from: DateTime::UNIX_EPOCH,
            until: DateTime::UNIX_EPOCH,
            duration: TimeDelta::zero(),
            duration_part: 0.0,
            state: 0,
            host_down: 0,
            in_downtime: 0,
            in_host_downtime: 0,
            is_flapping: 0,
            in_notification_period: 1,
            notification_period: String::new(),
            in_service_period: 1,
            service_period: String::new(),
            debug_info: String::new(),
            log_output: String::new(),
            long_log_output: String::new(),
            duration_ok: TimeDelta::zero(),
            duration_part_ok: 0.0,
            duration_warning: TimeDelta::zero(),
            duration_part_warning: 0.0,
            duration_critical: TimeDelta::zero(),
            duration_part_critical: 0.0,
            duration_unknown: TimeDelta::zero(),
            duration_part_unknown: 0.0,
            duration_unmonitored: TimeDelta::zero(),
            duration_part_unmonitored: 0.0,
            may_no_longer_exist: false,
            has_vanished: false,
            last_known_time: DateTime::UNIX_EPOCH,
            services: Vec::new(),
        }
    }
}

impl ObjectState {
    /// Recompute `duration` from the open interval and assign it wholly to
    /// the bucket of the current state; the other buckets are zeroed. The
    /// `_part` ratios are relative to the query window.
    pub fn compute_per_state_durations(&mut self, window: TimeDelta) {
        self.duration = self.until - self.from;
        self.duration_part = ratio(self.duration, window);

        self.duration_ok = TimeDelta::zero();
        self.duration_part_ok = 0.0;
        self.duration_warning = TimeDelta::zero();
        self.duration_part_warning = 0.0;
        self.duration_critical = TimeDelta::zero();
        self.duration_part_critical = 0.0;
        self.duration_unknown = TimeDelta::zero();
        self.duration_part_unknown = 0.0;
        self.duration_unmonitored = TimeDelta::zero();
        self.duration_part_unmonitored = 0.0;

        match self.state {
            -1 => {
                self.duration_unmonitored = self.duration;
                self.duration_part_unmonitored = self.duration_part;
            }
            0 => {
                self.duration_ok = self.duration;
                self.duration_part_ok = self.duration_part;
            }
            1 => {
                self.duration_warning = self.duration;
                self.duration_part_warning = self.duration_part;
            }
            2 => {
                self.duration_critical = self.duration;
                self.duration_part_critical = self.duration_part;
            }
            3 => {
                self.duration_unknown = self.duration;
                self.duration_part_unknown = self.duration_part;
            }
            _ => {}
        }
    }
}

fn ratio(duration: TimeDelta, window: TimeDelta) -> f64 {
    if window <= TimeDelta::zero() {
        return 0.0;
    }
    duration.num_seconds() as f64 / window.num_seconds() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    #[test]
    fn period_is_half_open() {
        assert!(LogPeriod::new(at(100), at(100)).empty());
        assert!(LogPeriod::new(at(200), at(100)).empty());
        let period = LogPeriod::new(at(100), at(250));
        assert!(!period.empty());
        assert_eq!(period.duration(), TimeDelta::seconds(150));
        assert_eq!(period.to_string(), "[100, 250)");
    }

    #[test]
    fn durations_partition_into_the_current_state_bucket() {
        let mut state = ObjectState {
            from: at(100),
            until: at(150),
            state: 2,
            ..ObjectState::default()
        };
        state.compute_per_state_durations(TimeDelta::seconds(200));

        assert_eq!(state.duration, TimeDelta::seconds(50));
        assert_eq!(state.duration_critical, TimeDelta::seconds(50));
        assert_eq!(state.duration_ok, TimeDelta::zero());
        assert!((state.duration_part - 0.25).abs() < 1e-9);
        assert!((state.duration_part_critical - 0.25).abs() < 1e-9);

        let bucket_sum = state.duration_ok
            + state.duration_warning
            + state.duration_critical
            + state.duration_unknown
            + state.duration_unmonitored;
        assert_eq!(bucket_sum, state.duration);
    }

    #[test]
    fn unmonitored_goes_to_its_own_bucket() {
        let mut state = ObjectState {
            from: at(0),
            until: at(60),
            state: -1,
            ..ObjectState::default()
        };
        state.compute_per_state_durations(TimeDelta::seconds(120));
        assert_eq!(state.duration_unmonitored, TimeDelta::seconds(60));
        assert!((state.duration_part_unmonitored - 0.5).abs() < 1e-9);
    }

    #[test]
    fn buckets_are_reset_between_emissions() {
        let mut state = ObjectState {
            from: at(0),
            until: at(10),
            state: 0,
            ..ObjectState::default()
        };
        state.compute_per_state_durations(TimeDelta::seconds(100));
        assert_eq!(state.duration_ok, TimeDelta::seconds(10));

        state.from = at(10);
        state.until = at(30);
        state.state = 1;
        state.compute_per_state_durations(TimeDelta::seconds(100));
        assert_eq!(state.duration_ok, TimeDelta::zero());
        assert_eq!(state.duration_warning, TimeDelta::seconds(20));
    }
}
