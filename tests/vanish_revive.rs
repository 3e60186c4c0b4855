mod common;

use chrono::TimeDelta;
use common::*;
use histmon::query::ReplayQuery;
use histmon::registry::InMemoryRegistry;

fn registry() -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    registry.add_host("app01", "24X7", "24X7");
    registry.add_service("app01", "cpu", "24X7", "24X7");
    registry.add_service("app01", "disk", "24X7", "24X7");
    registry
}

#[test]
fn vanish_and_revive_inserts_an_unmonitored_gap() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_log(
        dir.path(),
        "monitoring.log",
        &[
            svc_initial(10, "app01", "cpu", "OK"),
            log_initial_states(500),
            core_starting(600),
            svc_alert(700, "app01", "cpu", "WARNING"),
        ],
    );

    let query = ReplayQuery::new(period(0, 1000));
    let (rows, _) = replay_dir(dir.path(), &registry(), &query);

    let service_rows = rows_for(&rows, "app01", "cpu");
    assert_eq!(service_rows.len(), 3);

    let last_known = service_rows[0];
    assert_eq!(last_known.from, at(0));
    assert_eq!(last_known.until, at(500), "closed at the initial-states time");
    assert_eq!(last_known.state, 0);

    let gap = service_rows[1];
    assert_eq!(gap.from, at(500));
    assert_eq!(gap.until, at(700));
    assert_eq!(gap.state, -1);
    assert_eq!(gap.debug_info, "UNMONITORED");
    assert_eq!(gap.duration_unmonitored, TimeDelta::seconds(200));

    let revived = service_rows[2];
    assert_eq!(revived.from, at(700));
    assert_eq!(revived.until, at(999));
    assert_eq!(revived.state, 1);

    assert_contiguous(&service_rows);
}

#[test]
fn object_that_never_returns_is_reported_gone() {
    let dir = tempfile::tempdir().expect("tempdir");
    // disk re-announces itself after the restart, cpu does not.
    write_log(
        dir.path(),
        "monitoring.log",
        &[
            svc_initial(10, "app01", "cpu", "OK"),
            svc_initial(15, "app01", "disk", "OK"),
            log_initial_states(500),
            svc_initial(510, "app01", "disk", "OK"),
        ],
    );

    let query = ReplayQuery::new(period(0, 1000));
    let (rows, _) = replay_dir(dir.path(), &registry(), &query);

    let cpu_rows = rows_for(&rows, "app01", "cpu");
    assert_eq!(cpu_rows.len(), 2);
    assert_eq!(cpu_rows[0].until, at(500), "closed at the last known time");
    assert_eq!(cpu_rows[0].state, 0);
    assert_eq!(cpu_rows[1].state, -1, "reported unmonitored afterwards");
    assert_eq!(cpu_rows[1].until, at(999));
    assert_eq!(cpu_rows[1].debug_info, "UNMONITORED");
    assert!(cpu_rows[1].log_output.is_empty());

    let disk_rows = rows_for(&rows, "app01", "disk");
    assert_eq!(disk_rows.len(), 1, "disk survived the restart unchanged");
    assert_eq!(disk_rows[0].state, 0);
    assert_eq!(disk_rows[0].until, at(999));
}

#[test]
fn initial_state_entries_keep_the_vanish_window_open() {
    let dir = tempfile::tempdir().expect("tempdir");
    // The initial-state entry for disk right after the block must not let
    // cpu vanish: only a non-initial event closes the block.
    write_log(
        dir.path(),
        "monitoring.log",
        &[
            svc_initial(10, "app01", "cpu", "OK"),
            log_initial_states(500),
            svc_initial(505, "app01", "disk", "OK"),
            svc_initial(510, "app01", "cpu", "OK"),
        ],
    );

    let query = ReplayQuery::new(period(0, 1000));
    let (rows, _) = replay_dir(dir.path(), &registry(), &query);

    let cpu_rows = rows_for(&rows, "app01", "cpu");
    assert_eq!(cpu_rows.len(), 1, "cpu re-announced itself; no gap");
    assert_eq!(cpu_rows[0].state, 0);
}
