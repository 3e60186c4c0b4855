use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::logentry::LogEntry;
use crate::logfiles::{LogFile, LogFileSet};
use crate::state::LogPeriod;

/// Forward iterator over the relevant entries of consecutive log files.
///
/// Freshly constructed, the cursor is exhausted; `rewind_to_start` positions
/// it at the newest file that is guaranteed to contain no in-window entries
/// earlier than its first entry.
pub struct LogEntryCursor<'a> {
    files: &'a [LogFile],
    max_lines_per_file: usize,
    file_index: usize,
    buffer: VecDeque<LogEntry>,
}

impl<'a> LogEntryCursor<'a> {
    pub fn new(files: &'a LogFileSet, max_lines_per_file: usize) -> Self {
        Self {
            files: files.files(),
            max_lines_per_file,
            file_index: files.len(),
            buffer: VecDeque::new(),
        }
    }

    /// Position the cursor for a replay of `period`. Returns `false` when
    /// there is nothing to replay: no log files at all, or every file starts
    /// at or after `period.until`.
    pub fn rewind_to_start(&mut self, period: &LogPeriod) -> bool {
        if self.files.is_empty() {
            debug!("no log files found");
            return false;
        }

        // Walk back from the newest file to the newest one starting strictly
        // before the query period (or the first file overall). Older files
        // cannot contain entries within the period.
        let newest = self.files.len() - 1;
        let mut index = newest;
        while index > 0 && self.files[index].since >= period.since {
            index -= 1;
        }

        if self.files[index].since >= period.until {
            debug!(period = %period, "all log files are newer than the query period");
            return false;
        }

        debug!(
            file = %self.files[index].path.display(),
            period = %period,
            "starting state history computation"
        );

        self.file_index = index;
        self.buffer = self.load(index);

        // A non-newest file that ends before the window contributes nothing:
        // the next file re-establishes all states with its initial-state
        // block.
        if index != newest {
            if let Some(last) = self.buffer.back() {
                if last.time < period.since {
                    self.buffer.clear();
                }
            }
        }
        true
    }

    /// Next entry in `(file, time, lineno)` order, refilling the buffer from
    /// the following file when the current one is exhausted.
    pub fn next_entry(&mut self) -> Option<LogEntry> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(entry);
            }
            if self.file_index >= self.files.len() {
                return None;
            }
            self.file_index += 1;
            if self.file_index >= self.files.len() {
                return None;
            }
            self.buffer = self.load(self.file_index);
        }
    }

    fn load(&self, index: usize) -> VecDeque<LogEntry> {
        match self.files[index].read_entries(self.max_lines_per_file) {
            Ok(entries) => entries.into(),
            Err(err) => {
                warn!(
                    file = %self.files[index].path.display(),
                    error = ?err,
                    "skipping unreadable log file"
                );
                VecDeque::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::fs::File;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    fn write_log(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).expect("create log");
        for line in lines {
            writeln!(file, "{line}").expect("write line");
        }
        path
    }

    fn host_line(time: i64, host: &str) -> String {
        format!("[{time}] CURRENT HOST STATE: {host};UP;HARD;1;ok")
    }

    fn period(since: i64, until: i64) -> LogPeriod {
        LogPeriod::new(
            DateTime::from_timestamp(since, 0).unwrap(),
            DateTime::from_timestamp(until, 0).unwrap(),
        )
    }

    #[test]
    fn empty_set_has_nothing_to_replay() {
        let set = LogFileSet::from_files(Vec::new());
        let mut cursor = LogEntryCursor::new(&set, 1000);
        assert!(!cursor.rewind_to_start(&period(0, 100)));
        assert!(cursor.next_entry().is_none());
    }

    #[test]
    fn all_files_newer_than_window_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_log(dir.path(), "a.log", &[host_line(500, "h")]);
        let set = LogFileSet::scan(dir.path()).expect("scan");
        let mut cursor = LogEntryCursor::new(&set, 1000);
        assert!(!cursor.rewind_to_start(&period(100, 200)));
    }

    #[test]
    fn starts_at_newest_file_before_window() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_log(
            dir.path(),
            "a.log",
            &[host_line(100, "old"), host_line(150, "old")],
        );
        write_log(
            dir.path(),
            "b.log",
            &[host_line(300, "warm"), host_line(450, "warm")],
        );
        write_log(dir.path(), "c.log", &[host_line(600, "new")]);

        let set = LogFileSet::scan(dir.path()).expect("scan");
        let mut cursor = LogEntryCursor::new(&set, 1000);
        assert!(cursor.rewind_to_start(&period(400, 1000)));
        // b.log reaches into the window, so replay starts at its first entry.
        let first = cursor.next_entry().expect("entry");
        assert_eq!(first.time.timestamp(), 300);
        let times: Vec<i64> = std::iter::from_fn(|| cursor.next_entry())
            .map(|entry| entry.time.timestamp())
            .collect();
        assert_eq!(times, vec![450, 600]);
    }

    #[test]
    fn skips_non_newest_file_ending_before_window() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_log(
            dir.path(),
            "a.log",
            &[host_line(100, "old"), host_line(150, "old")],
        );
        write_log(dir.path(), "b.log", &[host_line(600, "new")]);

        let set = LogFileSet::scan(dir.path()).expect("scan");
        let mut cursor = LogEntryCursor::new(&set, 1000);
        assert!(cursor.rewind_to_start(&period(400, 1000)));
        let first = cursor.next_entry().expect("entry");
        assert_eq!(first.time.timestamp(), 600, "wholly-pre-window file skipped");
    }

    #[test]
    fn newest_file_is_replayed_from_its_first_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_log(
            dir.path(),
            "a.log",
            &[host_line(100, "h"), host_line(200, "h")],
        );
        let set = LogFileSet::scan(dir.path()).expect("scan");
        let mut cursor = LogEntryCursor::new(&set, 1000);
        assert!(cursor.rewind_to_start(&period(400, 1000)));
        assert_eq!(cursor.next_entry().expect("entry").time.timestamp(), 100);
    }
}
