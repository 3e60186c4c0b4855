use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use clap::Parser;
use dotenvy::Error as DotenvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use histmon::config;
use histmon::logfiles::LogFileSet;
use histmon::metrics::ReplayMetrics;
use histmon::query::{AllowAllUser, IntervalSink, QueryFilter, ReplayQuery};
use histmon::registry::InMemoryRegistry;
use histmon::replay::Replayer;
use histmon::state::{LogPeriod, ObjectState};

#[derive(Debug, Parser)]
#[command(author, version, about = "histmon — monitoring state-history replay")]
struct Cli {
    /// Path to YAML configuration file. Defaults to env HISTMON_CONFIG or built-in defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Window start, seconds since the epoch (inclusive).
    #[arg(long)]
    since: i64,
    /// Window end, seconds since the epoch (exclusive).
    #[arg(long)]
    until: i64,
    /// Filter clause `column=value` or `column!=value`; may be repeated.
    #[arg(long = "filter")]
    filters: Vec<String>,
    /// Stop after emitting this many intervals.
    #[arg(long)]
    limit: Option<u64>,
    /// Shift emitted time columns by this many seconds.
    #[arg(long, default_value_t = 0)]
    timezone_offset: i64,
    /// Print Prometheus metrics to stderr after the replay.
    #[arg(long)]
    metrics: bool,
}

fn main() -> Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    let files = LogFileSet::scan(&config.log_directory)?;
    info!(
        files = files.len(),
        dir = %config.log_directory.display(),
        "scanned log archive"
    );

    let registry = match &config.objects_file {
        Some(path) => InMemoryRegistry::load(path)?,
        None => {
            warn!("no objects file configured; building the registry from the logs themselves");
            let registry =
                InMemoryRegistry::from_log_files(&files, config.max_lines_per_log_file);
            info!(
                hosts = registry.host_count(),
                services = registry.service_count(),
                "registered objects from log scan"
            );
            registry
        }
    };

    let query = ReplayQuery {
        period: LogPeriod::new(epoch(cli.since)?, epoch(cli.until)?),
        filter: QueryFilter::parse(&cli.filters)?,
        timezone_offset: TimeDelta::seconds(cli.timezone_offset),
    };

    let metrics = ReplayMetrics::new()?;
    let user = AllowAllUser;
    let replayer = Replayer::new(
        &registry,
        &user,
        &query,
        &metrics,
        config.max_lines_per_log_file,
    );

    let stdout = std::io::stdout();
    let mut sink = JsonLinesSink {
        out: stdout.lock(),
        limit: cli.limit,
        written: 0,
        offset: query.timezone_offset,
    };
    let stats = replayer.replay(&files, &mut sink);

    info!(
        entries = stats.entries_processed,
        intervals = sink.written,
        objects = stats.objects_tracked,
        aborted = stats.aborted,
        "replay finished"
    );

    if cli.metrics {
        eprint!("{}", metrics.encode()?);
    }
    Ok(())
}

fn epoch(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .with_context(|| format!("timestamp {seconds} out of range"))
}

/// Writes each interval as one JSON line; stops the replay at `--limit`.
struct JsonLinesSink<W: Write> {
    out: W,
    limit: Option<u64>,
    written: u64,
    offset: TimeDelta,
}

impl<W: Write> IntervalSink for JsonLinesSink<W> {
    fn accept(&mut self, interval: &ObjectState) -> bool {
        let mut row = interval.clone();
        if !self.offset.is_zero() {
            row.time = row.time + self.offset;
            row.from = row.from + self.offset;
            row.until = row.until + self.offset;
        }
        let line = match serde_json::to_string(&row) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = ?err, "failed to serialize interval");
                return false;
            }
        };
        if writeln!(self.out, "{line}").is_err() {
            return false;
        }
        self.written += 1;
        self.limit.map_or(true, |limit| self.written < limit)
    }
}

fn load_env() {
    if let Err(err) = dotenvy::dotenv() {
        match err {
            DotenvError::Io(io_err) if io_err.kind() == ErrorKind::NotFound => {}
            other => eprintln!("warning: failed to load .env file: {other}"),
        }
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("histmon=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
