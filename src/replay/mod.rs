use std::collections::HashSet;

use chrono::TimeDelta;
use tracing::{debug, warn};

use crate::cursor::LogEntryCursor;
use crate::logentry::{LogEntry, LogEntryKind};
use crate::logfiles::LogFileSet;
use crate::metrics::ReplayMetrics;
use crate::query::{IntervalSink, QueryFilter, QueryUser, ReplayQuery};
use crate::registry::{ObjectId, ObjectRegistry};

mod periods;
mod table;
mod transition;

pub use periods::{PeriodTracker, TimeperiodTransition};
pub use table::ObjectStateTable;

use transition::{EmitCtx, ModificationStatus, emit_interval, insert_new_state, update_state};

/// Summary of one replay run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayStats {
    pub entries_processed: u64,
    pub objects_tracked: usize,
    pub aborted: bool,
}

/// Top-level driver: positions the cursor on the right log file, replays
/// every entry of the query window through the per-object state machines,
/// and finalizes open intervals at the window end.
pub struct Replayer<'a> {
    registry: &'a dyn ObjectRegistry,
    user: &'a dyn QueryUser,
    query: &'a ReplayQuery,
    metrics: &'a ReplayMetrics,
    max_lines_per_log_file: usize,
}

impl<'a> Replayer<'a> {
    pub fn new(
        registry: &'a dyn ObjectRegistry,
        user: &'a dyn QueryUser,
        query: &'a ReplayQuery,
        metrics: &'a ReplayMetrics,
        max_lines_per_log_file: usize,
    ) -> Self {
        Self {
            registry,
            user,
            query,
            metrics,
            max_lines_per_log_file,
        }
    }

    pub fn replay(&self, files: &LogFileSet, sink: &mut dyn IntervalSink) -> ReplayStats {
        let timer = self.metrics.start_replay_timer();
        let stats = self.run(files, sink);
        timer.observe_duration();
        stats
    }

    fn run(&self, files: &LogFileSet, sink: &mut dyn IntervalSink) -> ReplayStats {
        let mut stats = ReplayStats::default();
        let period = self.query.period;
        if period.empty() {
            debug!(period = %period, "empty query period");
            return stats;
        }

        let mut cursor = LogEntryCursor::new(files, self.max_lines_per_log_file);
        if !cursor.rewind_to_start(&period) {
            return stats;
        }

        let object_filter = self.query.object_filter();
        let mut table = ObjectStateTable::new();
        let mut blacklist: HashSet<ObjectId> = HashSet::new();
        let mut periods = PeriodTracker::new();

        // Warm-up until the first in-window entry; emissions start after the
        // flip.
        let mut only_update = true;
        let mut in_initial_states = false;
        let mut aborted = false;

        let ctx = EmitCtx {
            period,
            registry: self.registry,
            user: self.user,
            metrics: self.metrics,
        };

        while let Some(entry) = cursor.next_entry() {
            if aborted || entry.time >= period.until {
                break;
            }
            stats.entries_processed += 1;
            self.metrics.inc_entries_scanned();

            if only_update && entry.time >= period.since {
                // Window start reached: every tracked object begins its
                // first real interval exactly here.
                for state in table.values_mut() {
                    state.from = period.since;
                    state.until = period.since;
                }
                only_update = false;
            }

            match entry.kind {
                LogEntryKind::None
                | LogEntryKind::CoreStarting
                | LogEntryKind::CoreStopping
                | LogEntryKind::LogVersion
                | LogEntryKind::AcknowledgeAlertHost
                | LogEntryKind::AcknowledgeAlertService => {
                    set_unknown_to_unmonitored(in_initial_states, &mut table);
                    in_initial_states = false;
                }
                LogEntryKind::StateServiceInitial => {
                    self.handle_state_entry(
                        &entry,
                        false,
                        only_update,
                        &mut table,
                        &mut blacklist,
                        &periods,
                        &object_filter,
                        &ctx,
                        sink,
                        &mut aborted,
                    );
                }
                LogEntryKind::AlertService
                | LogEntryKind::StateService
                | LogEntryKind::DowntimeAlertService
                | LogEntryKind::FlappingService => {
                    set_unknown_to_unmonitored(in_initial_states, &mut table);
                    self.handle_state_entry(
                        &entry,
                        false,
                        only_update,
                        &mut table,
                        &mut blacklist,
                        &periods,
                        &object_filter,
                        &ctx,
                        sink,
                        &mut aborted,
                    );
                    in_initial_states = false;
                }
                LogEntryKind::StateHostInitial => {
                    self.handle_state_entry(
                        &entry,
                        true,
                        only_update,
                        &mut table,
                        &mut blacklist,
                        &periods,
                        &object_filter,
                        &ctx,
                        sink,
                        &mut aborted,
                    );
                }
                LogEntryKind::AlertHost
                | LogEntryKind::StateHost
                | LogEntryKind::DowntimeAlertHost
                | LogEntryKind::FlappingHost => {
                    set_unknown_to_unmonitored(in_initial_states, &mut table);
                    self.handle_state_entry(
                        &entry,
                        true,
                        only_update,
                        &mut table,
                        &mut blacklist,
                        &periods,
                        &object_filter,
                        &ctx,
                        sink,
                        &mut aborted,
                    );
                    in_initial_states = false;
                }
                LogEntryKind::TimeperiodTransition => {
                    set_unknown_to_unmonitored(in_initial_states, &mut table);
                    handle_timeperiod_transition(
                        &entry,
                        &mut table,
                        &mut periods,
                        only_update,
                        &ctx,
                        sink,
                        &mut aborted,
                    );
                    in_initial_states = false;
                }
                LogEntryKind::LogInitialStates => {
                    set_unknown_to_unmonitored(in_initial_states, &mut table);
                    handle_log_initial_states(&entry, &mut table);
                    in_initial_states = true;
                }
            }
        }

        stats.objects_tracked = table.len();
        self.metrics.set_objects_tracked(table.len());

        if !aborted {
            self.final_reports(&mut table, &ctx, sink, &mut aborted);
        }
        stats.aborted = aborted;
        stats
    }

    /// Resolve the entry against the registry, create the object state on
    /// first sight, run the state machine, and cascade host-level changes to
    /// the host's services.
    #[allow(clippy::too_many_arguments)]
    fn handle_state_entry(
        &self,
        entry: &LogEntry,
        is_host_entry: bool,
        only_update: bool,
        table: &mut ObjectStateTable,
        blacklist: &mut HashSet<ObjectId>,
        periods: &PeriodTracker,
        object_filter: &QueryFilter,
        ctx: &EmitCtx<'_>,
        sink: &mut dyn IntervalSink,
        aborted: &mut bool,
    ) {
        let entry_host = self.registry.find_host(&entry.host_name);
        let entry_service = if entry.service_description.is_empty() {
            None
        } else {
            self.registry
                .find_service(&entry.host_name, &entry.service_description)
        };

        let key = if is_host_entry {
            entry_host.map(|host| host.id)
        } else {
            entry_service.map(|service| service.id)
        };
        let Some(key) = key else {
            debug!(
                host = %entry.host_name,
                service = %entry.service_description,
                "log entry does not match a monitored object"
            );
            return;
        };

        if blacklist.contains(&key) {
            return;
        }

        if !table.contains(key) {
            insert_new_state(
                table,
                blacklist,
                object_filter,
                entry,
                entry_host,
                entry_service,
                key,
                periods,
                only_update,
                ctx.period,
                self.metrics,
            );
        }
        let status = match table.get_mut(key) {
            Some(state) => update_state(
                state,
                entry,
                None,
                periods,
                only_update,
                ctx,
                sink,
                aborted,
            ),
            // The insertion above was filtered out; drop the entry too.
            None => return,
        };

        // A host state or host downtime change affects every service of the
        // host, at the same timestamp.
        if matches!(
            entry.kind,
            LogEntryKind::AlertHost | LogEntryKind::StateHost | LogEntryKind::DowntimeAlertHost
        ) && status == ModificationStatus::Changed
        {
            let service_keys = table
                .get(key)
                .map(|state| state.services.clone())
                .unwrap_or_default();
            for service_key in service_keys {
                if let Some(service_state) = table.get_mut(service_key) {
                    update_state(
                        service_state,
                        entry,
                        None,
                        periods,
                        only_update,
                        ctx,
                        sink,
                        aborted,
                    );
                }
            }
        }
    }

    /// Emit the final interval of every tracked object at the window end
    /// (one second early; the window is half-open and an emission at exactly
    /// `until` would be dropped downstream). Vanished objects first close at
    /// the last time they were known to exist.
    fn final_reports(
        &self,
        table: &mut ObjectStateTable,
        ctx: &EmitCtx<'_>,
        sink: &mut dyn IntervalSink,
        aborted: &mut bool,
    ) {
        for state in table.values_mut() {
            if state.may_no_longer_exist {
                // No trace since the last core startup.
                state.time = state.last_known_time;
                state.until = state.last_known_time;
                emit_interval(state, ctx, sink, aborted);

                state.state = -1;
                state.debug_info = "UNMONITORED".to_string();
                state.log_output.clear();
                state.long_log_output.clear();
            }

            state.time = ctx.period.until - TimeDelta::seconds(1);
            state.until = state.time;
            emit_interval(state, ctx, sink, aborted);
        }
    }
}

/// After an initial-states block, anything that did not re-announce itself
/// has vanished from the monitoring configuration.
fn set_unknown_to_unmonitored(in_initial_states: bool, table: &mut ObjectStateTable) {
    if in_initial_states {
        for state in table.values_mut() {
            if state.may_no_longer_exist {
                state.has_vanished = true;
            }
        }
    }
}

/// Each core startup logs the initial state of everything it monitors; an
/// object that stays silent afterwards may have been removed.
fn handle_log_initial_states(entry: &LogEntry, table: &mut ObjectStateTable) {
    for state in table.values_mut() {
        if !state.has_vanished {
            state.last_known_time = entry.time;
            state.may_no_longer_exist = true;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_timeperiod_transition(
    entry: &LogEntry,
    table: &mut ObjectStateTable,
    periods: &mut PeriodTracker,
    only_update: bool,
    ctx: &EmitCtx<'_>,
    sink: &mut dyn IntervalSink,
    aborted: &mut bool,
) {
    match TimeperiodTransition::parse(&entry.options) {
        Ok(transition) => {
            periods.apply(&transition);
            for key in table.keys() {
                if let Some(state) = table.get_mut(key) {
                    update_state(
                        state,
                        entry,
                        Some(&transition),
                        periods,
                        only_update,
                        ctx,
                        sink,
                        aborted,
                    );
                }
            }
        }
        Err(err) => {
            warn!(
                message = %entry.message,
                error = %err,
                "invalid syntax of TIMEPERIOD TRANSITION"
            );
        }
    }
}
