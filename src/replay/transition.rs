use std::collections::HashSet;

use chrono::TimeDelta;

use crate::logentry::{LogEntry, LogEntryKind};
use crate::metrics::ReplayMetrics;
use crate::query::{IdentityView, IntervalSink, QueryFilter, QueryUser};
use crate::registry::{HostObject, ObjectId, ObjectRegistry, ServiceObject};
use crate::state::{LogPeriod, ObjectState};

use super::periods::{PeriodTracker, TimeperiodTransition};
use super::table::ObjectStateTable;

/// Whether an update changed the tracked attribute of the object; decides
/// host→service cascading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModificationStatus {
    Unchanged,
    Changed,
}

/// Everything an emission needs besides the state and the sink.
pub(crate) struct EmitCtx<'a> {
    pub period: LogPeriod,
    pub registry: &'a dyn ObjectRegistry,
    pub user: &'a dyn QueryUser,
    pub metrics: &'a ReplayMetrics,
}

/// Close the open interval `[from, until)`: compute its duration
/// decomposition, offer it to the sink if the user may see the object, then
/// open the next interval at `until`. A sink refusal latches the abort flag.
pub(crate) fn emit_interval(
    state: &mut ObjectState,
    ctx: &EmitCtx<'_>,
    sink: &mut dyn IntervalSink,
    aborted: &mut bool,
) {
    state.duration = state.until - state.from;
    state.compute_per_state_durations(ctx.period.duration());

    let host = ctx.registry.find_host(&state.host_name);
    let service = if state.service_description.is_empty() {
        None
    } else {
        ctx.registry
            .find_service(&state.host_name, &state.service_description)
    };

    if ctx.user.is_authorized_for(host, service, false) {
        ctx.metrics.inc_intervals_emitted();
        if !sink.accept(state) {
            *aborted = true;
        }
    } else {
        ctx.metrics.inc_intervals_unauthorized();
    }

    state.from = state.until;
}

/// Create and store the state for an object seen for the first time.
/// Service-level objects pass the filter gate first; a rejected key goes on
/// the blacklist and nothing is stored.
#[allow(clippy::too_many_arguments)]
pub(crate) fn insert_new_state(
    table: &mut ObjectStateTable,
    blacklist: &mut HashSet<ObjectId>,
    object_filter: &QueryFilter,
    entry: &LogEntry,
    entry_host: Option<&HostObject>,
    entry_service: Option<&ServiceObject>,
    key: ObjectId,
    periods: &PeriodTracker,
    only_update: bool,
    period: LogPeriod,
    metrics: &ReplayMetrics,
) {
    let mut state = ObjectState {
        is_host: entry.service_description.is_empty(),
        host: entry_host.map(|host| host.id),
        service: entry_service.map(|service| service.id),
        host_name: entry.host_name.clone(),
        service_description: entry.service_description.clone(),
        ..ObjectState::default()
    };

    // Hosts are never filter-gated: services may need their host for
    // downtime cascading even when the host itself is filtered out.
    if !state.is_host {
        let view = IdentityView {
            host_name: &state.host_name,
            service_description: &state.service_description,
            host: entry_host,
            service: entry_service,
        };
        if !object_filter.accepts(&view) {
            blacklist.insert(key);
            metrics.inc_objects_blacklisted();
            return;
        }
    }

    // Wire host↔service back-links, keys only. Each live service ends up at
    // most once on its host: either here (host seen first) or below when the
    // host appears later and collects existing services.
    if state.is_host {
        for (other_key, other) in table.iter() {
            if !other.is_host && other.host == Some(key) {
                state.services.push(other_key);
            }
        }
    } else if let Some(host_key) = state.host {
        if let Some(host_state) = table.get_mut(host_key) {
            host_state.services.push(key);
        }
    }

    state.from = period.since;

    // Period names come from the live registry; an object the core no longer
    // knows gets empty names.
    state.notification_period = entry_service
        .map(|service| service.notification_period.clone())
        .or_else(|| entry_host.map(|host| host.notification_period.clone()))
        .unwrap_or_default();
    state.service_period = entry_service
        .map(|service| service.service_period.clone())
        .or_else(|| entry_host.map(|host| host.service_period.clone()))
        .unwrap_or_default();
    state.in_notification_period = periods.is_active(&state.notification_period);
    state.in_service_period = periods.is_active(&state.service_period);

    // A service inherits its host's downtime and down-ness at birth.
    if !state.is_host {
        if let Some(host_state) = state.host.and_then(|host_key| table.get(host_key)) {
            state.in_host_downtime = host_state.in_host_downtime;
            state.host_down = host_state.host_down;
        }
    }

    // An object first seen well into the window was unmonitored until now;
    // the grace period covers core startup.
    if !only_update && entry.time - period.since > TimeDelta::minutes(10) {
        state.debug_info = "UNMONITORED ".to_string();
        state.state = -1;
    }

    table.insert(key, state);
}

/// The per-event state machine: apply one entry to one object, emitting the
/// open interval before any tracked attribute is overwritten.
#[allow(clippy::too_many_arguments)]
pub(crate) fn update_state(
    state: &mut ObjectState,
    entry: &LogEntry,
    transition: Option<&TimeperiodTransition>,
    periods: &PeriodTracker,
    only_update: bool,
    ctx: &EmitCtx<'_>,
    sink: &mut dyn IntervalSink,
    aborted: &mut bool,
) -> ModificationStatus {
    let mut status = ModificationStatus::Changed;

    // Revive a vanished object: close its frozen interval at the last time
    // it was known to exist, then restart it as unmonitored.
    if entry.kind != LogEntryKind::TimeperiodTransition && state.has_vanished {
        state.time = state.last_known_time;
        state.until = state.last_known_time;
        if !only_update {
            emit_interval(state, ctx, sink, aborted);
        }
        state.may_no_longer_exist = false;
        state.has_vanished = false;
        state.state = -1;
        state.debug_info = "UNMONITORED".to_string();
        state.in_downtime = 0;
        state.is_flapping = 0;
        state.log_output.clear();
        state.long_log_output.clear();
        state.in_notification_period = periods.is_active(&state.notification_period);
        state.in_service_period = periods.is_active(&state.service_period);
    }

    state.time = entry.time;
    state.lineno = entry.lineno;
    state.until = entry.time;

    // A timeperiod entry never brings an absent object back into existence.
    if entry.kind != LogEntryKind::TimeperiodTransition {
        state.may_no_longer_exist = false;
    }

    match entry.kind {
        LogEntryKind::StateHost | LogEntryKind::StateHostInitial | LogEntryKind::AlertHost => {
            let down = i32::from(entry.state > 0);
            if state.is_host {
                if state.state != entry.state {
                    if !only_update {
                        emit_interval(state, ctx, sink, aborted);
                    }
                    state.state = entry.state;
                    state.host_down = down;
                    state.debug_info = "HOST STATE".to_string();
                } else {
                    status = ModificationStatus::Unchanged;
                }
            } else if state.host_down != down {
                if !only_update {
                    emit_interval(state, ctx, sink, aborted);
                }
                state.host_down = down;
                state.debug_info = "SVC HOST STATE".to_string();
            }
        }
        LogEntryKind::StateService
        | LogEntryKind::StateServiceInitial
        | LogEntryKind::AlertService => {
            if state.state != entry.state {
                if !only_update {
                    emit_interval(state, ctx, sink, aborted);
                }
                state.debug_info = "SVC ALERT".to_string();
                state.state = entry.state;
            }
        }
        LogEntryKind::DowntimeAlertHost => {
            let active = i32::from(entry.state_type.starts_with("STARTED"));
            if state.in_host_downtime != active {
                if !only_update {
                    emit_interval(state, ctx, sink, aborted);
                }
                state.debug_info = if state.is_host {
                    "HOST DOWNTIME"
                } else {
                    "SVC HOST DOWNTIME"
                }
                .to_string();
                state.in_host_downtime = active;
                if state.is_host {
                    state.in_downtime = active;
                }
            } else {
                status = ModificationStatus::Unchanged;
            }
        }
        LogEntryKind::DowntimeAlertService => {
            let active = i32::from(entry.state_type.starts_with("STARTED"));
            if state.in_downtime != active {
                if !only_update {
                    emit_interval(state, ctx, sink, aborted);
                }
                state.debug_info = "DOWNTIME SERVICE".to_string();
                state.in_downtime = active;
            }
        }
        LogEntryKind::FlappingHost | LogEntryKind::FlappingService => {
            let active = i32::from(entry.state_type.starts_with("STARTED"));
            if state.is_flapping != active {
                if !only_update {
                    emit_interval(state, ctx, sink, aborted);
                }
                state.debug_info = "FLAPPING ".to_string();
                state.is_flapping = active;
            } else {
                status = ModificationStatus::Unchanged;
            }
        }
        LogEntryKind::TimeperiodTransition => {
            if let Some(transition) = transition {
                // Without a live host object the initial in-period value (1)
                // never changes.
                if state.host.is_some()
                    && transition.name == state.notification_period
                    && transition.to != state.in_notification_period
                {
                    if !only_update {
                        emit_interval(state, ctx, sink, aborted);
                    }
                    state.debug_info = "TIMEPERIOD ".to_string();
                    state.in_notification_period = transition.to;
                }
                if state.host.is_some()
                    && transition.name == state.service_period
                    && transition.to != state.in_service_period
                {
                    if !only_update {
                        emit_interval(state, ctx, sink, aborted);
                    }
                    state.debug_info = "TIMEPERIOD ".to_string();
                    state.in_service_period = transition.to;
                }
            }
        }
        LogEntryKind::None
        | LogEntryKind::CoreStarting
        | LogEntryKind::CoreStopping
        | LogEntryKind::LogVersion
        | LogEntryKind::LogInitialStates
        | LogEntryKind::AcknowledgeAlertHost
        | LogEntryKind::AcknowledgeAlertService => {}
    }

    if entry.kind != LogEntryKind::TimeperiodTransition {
        // Initial-state entries log "(null)" when the check never ran.
        let blank_output = matches!(
            entry.kind,
            LogEntryKind::StateHostInitial | LogEntryKind::StateServiceInitial
        ) && entry.plugin_output == "(null)";
        state.log_output = if blank_output {
            String::new()
        } else {
            entry.plugin_output.clone()
        };
        state.long_log_output = entry.long_plugin_output.clone();
    }

    status
}
