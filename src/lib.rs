pub mod config;
pub mod cursor;
pub mod logentry;
pub mod logfiles;
pub mod metrics;
pub mod query;
pub mod registry;
pub mod replay;
pub mod state;

// Re-export the types most callers need.
pub use cursor::LogEntryCursor;
pub use logentry::{LogEntry, LogEntryKind};
pub use logfiles::{LogFile, LogFileSet};
pub use metrics::ReplayMetrics;
pub use query::{AllowAllUser, IntervalSink, QueryFilter, QueryUser, ReplayQuery};
pub use registry::{InMemoryRegistry, ObjectId, ObjectRegistry};
pub use replay::{Replayer, ReplayStats};
pub use state::{LogPeriod, ObjectState};
