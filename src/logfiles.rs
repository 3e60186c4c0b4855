use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::logentry::{LogClass, LogEntry};

/// One archive file. `since` is the timestamp of its first parseable line and
/// orders the file within the set; entries are materialized on demand.
#[derive(Debug, Clone)]
pub struct LogFile {
    pub path: PathBuf,
    pub since: DateTime<Utc>,
}

impl LogFile {
    /// Open a file and determine its `since`. Fails when no line carries a
    /// timestamp.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        for line in BufReader::new(file).lines() {
            let line = line
                .with_context(|| format!("failed to read log file {}", path.display()))?;
            if let Some(entry) = LogEntry::parse(1, &line) {
                return Ok(Self {
                    path: path.to_path_buf(),
                    since: entry.time,
                });
            }
        }
        bail!("no timestamped lines in {}", path.display());
    }

    /// Materialize the entries relevant to a replay: alert, program, and
    /// state class lines, in `(time, lineno)` order, truncated at
    /// `max_lines`.
    pub fn read_entries(&self, max_lines: usize) -> Result<Vec<LogEntry>> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open log file {}", self.path.display()))?;
        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .with_context(|| format!("failed to read log file {}", self.path.display()))?;
            let Some(entry) = LogEntry::parse(index as u32 + 1, &line) else {
                continue;
            };
            if !matches!(
                entry.class(),
                LogClass::Alert | LogClass::Program | LogClass::State
            ) {
                continue;
            }
            if entries.len() >= max_lines {
                debug!(
                    file = %self.path.display(),
                    max_lines,
                    "truncating log file at the line limit"
                );
                break;
            }
            entries.push(entry);
        }
        entries.sort_by_key(|entry| (entry.time, entry.lineno));
        Ok(entries)
    }
}

/// The ordered log archive: files sorted by ascending `since`.
#[derive(Debug, Default)]
pub struct LogFileSet {
    files: Vec<LogFile>,
}

impl LogFileSet {
    /// Scan a directory (non-recursive). Unreadable files and files without
    /// any timestamped line are skipped with a warning.
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        let entries = fs::read_dir(dir)
            .with_context(|| format!("failed to read log directory {}", dir.display()))?;
        for dir_entry in entries {
            let path = dir_entry
                .with_context(|| format!("failed to list log directory {}", dir.display()))?
                .path();
            if !path.is_file() {
                continue;
            }
            match LogFile::open(&path) {
                Ok(file) => files.push(file),
                Err(err) => {
                    warn!(file = %path.display(), error = ?err, "skipping unusable log file");
                }
            }
        }
        Ok(Self::from_files(files))
    }

    pub fn from_files(mut files: Vec<LogFile>) -> Self {
        files.sort_by_key(|file| file.since);
        Self { files }
    }

    pub fn files(&self) -> &[LogFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
