use chrono::{DateTime, Utc};

/// Coarse classification of a log line; the cursor only materializes the
/// alert/program/state classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogClass {
    Info,
    Alert,
    Program,
    State,
}

/// Every line type the replay understands. Anything else parses as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEntryKind {
    None,
    CoreStarting,
    CoreStopping,
    LogVersion,
    LogInitialStates,
    AcknowledgeAlertHost,
    AcknowledgeAlertService,
    AlertHost,
    AlertService,
    StateHost,
    StateHostInitial,
    StateService,
    StateServiceInitial,
    DowntimeAlertHost,
    DowntimeAlertService,
    FlappingHost,
    FlappingService,
    TimeperiodTransition,
}

impl LogEntryKind {
    pub fn class(self) -> LogClass {
        match self {
            LogEntryKind::None => LogClass::Info,
            LogEntryKind::CoreStarting
            | LogEntryKind::CoreStopping
            | LogEntryKind::LogVersion
            | LogEntryKind::LogInitialStates => LogClass::Program,
            LogEntryKind::AcknowledgeAlertHost
            | LogEntryKind::AcknowledgeAlertService
            | LogEntryKind::AlertHost
            | LogEntryKind::AlertService
            | LogEntryKind::DowntimeAlertHost
            | LogEntryKind::DowntimeAlertService
            | LogEntryKind::FlappingHost
            | LogEntryKind::FlappingService => LogClass::Alert,
            LogEntryKind::StateHost
            | LogEntryKind::StateHostInitial
            | LogEntryKind::StateService
            | LogEntryKind::StateServiceInitial
            | LogEntryKind::TimeperiodTransition => LogClass::State,
        }
    }
}

/// One parsed monitoring log line.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub lineno: u32,
    pub kind: LogEntryKind,
    pub host_name: String,
    pub service_description: String,
    /// `-1` = unmonitored, otherwise OK/WARN/CRIT/UNKNOWN for services and
    /// UP/DOWN/UNREACH for hosts.
    pub state: i32,
    pub state_type: String,
    pub plugin_output: String,
    pub long_plugin_output: String,
    /// Raw payload of a TIMEPERIOD TRANSITION line.
    pub options: String,
    pub message: String,
}

impl LogEntry {
    /// Parse one `[<epoch>] <text>` line. Returns `None` when the timestamp
    /// prefix is missing or unreadable.
    pub fn parse(lineno: u32, line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (stamp, text) = rest.split_once("] ")?;
        let time = DateTime::from_timestamp(stamp.parse().ok()?, 0)?;

        let mut entry = Self {
            time,
            lineno,
            kind: LogEntryKind::None,
            host_name: String::new(),
            service_description: String::new(),
            state: 0,
            state_type: String::new(),
            plugin_output: String::new(),
            long_plugin_output: String::new(),
            options: String::new(),
            message: line.to_string(),
        };
        entry.classify(text);
        Some(entry)
    }

    pub fn class(&self) -> LogClass {
        self.kind.class()
    }

    fn classify(&mut self, text: &str) {
        if let Some(payload) = text.strip_prefix("INITIAL HOST STATE: ") {
            self.parse_host_state(LogEntryKind::StateHostInitial, payload);
        } else if let Some(payload) = text.strip_prefix("CURRENT HOST STATE: ") {
            self.parse_host_state(LogEntryKind::StateHost, payload);
        } else if let Some(payload) = text.strip_prefix("HOST ALERT: ") {
            self.parse_host_state(LogEntryKind::AlertHost, payload);
        } else if let Some(payload) = text.strip_prefix("HOST DOWNTIME ALERT: ") {
            self.parse_host_notice(LogEntryKind::DowntimeAlertHost, payload);
        } else if let Some(payload) = text.strip_prefix("HOST FLAPPING ALERT: ") {
            self.parse_host_notice(LogEntryKind::FlappingHost, payload);
        } else if let Some(payload) = text.strip_prefix("HOST ACKNOWLEDGE ALERT: ") {
            self.parse_host_notice(LogEntryKind::AcknowledgeAlertHost, payload);
        } else if let Some(payload) = text.strip_prefix("INITIAL SERVICE STATE: ") {
            self.parse_service_state(LogEntryKind::StateServiceInitial, payload);
        } else if let Some(payload) = text.strip_prefix("CURRENT SERVICE STATE: ") {
            self.parse_service_state(LogEntryKind::StateService, payload);
        } else if let Some(payload) = text.strip_prefix("SERVICE ALERT: ") {
            self.parse_service_state(LogEntryKind::AlertService, payload);
        } else if let Some(payload) = text.strip_prefix("SERVICE DOWNTIME ALERT: ") {
            self.parse_service_notice(LogEntryKind::DowntimeAlertService, payload);
        } else if let Some(payload) = text.strip_prefix("SERVICE FLAPPING ALERT: ") {
            self.parse_service_notice(LogEntryKind::FlappingService, payload);
        } else if let Some(payload) = text.strip_prefix("SERVICE ACKNOWLEDGE ALERT: ") {
            self.parse_service_notice(LogEntryKind::AcknowledgeAlertService, payload);
        } else if let Some(payload) = text.strip_prefix("TIMEPERIOD TRANSITION: ") {
            self.kind = LogEntryKind::TimeperiodTransition;
            self.options = payload.to_string();
        } else if text.starts_with("LOG VERSION: 2.0") {
            self.kind = LogEntryKind::LogVersion;
        } else if text == "logging initial states" {
            self.kind = LogEntryKind::LogInitialStates;
        } else if text.contains("starting...") {
            self.kind = LogEntryKind::CoreStarting;
        } else if text.contains("shutting down") || text.contains("Bailing out") {
            self.kind = LogEntryKind::CoreStopping;
        }
    }

    // <host>;<state>;<state type>;<attempt>;<output>
    fn parse_host_state(&mut self, kind: LogEntryKind, payload: &str) {
        let fields: Vec<&str> = payload.splitn(5, ';').collect();
        self.kind = kind;
        self.host_name = field(&fields, 0).to_string();
        self.state = host_state(field(&fields, 1));
        self.state_type = field(&fields, 2).to_string();
        let (short, long) = split_output(field(&fields, 4));
        self.plugin_output = short;
        self.long_plugin_output = long;
    }

    // <host>;<description>;<state>;<state type>;<attempt>;<output>
    fn parse_service_state(&mut self, kind: LogEntryKind, payload: &str) {
        let fields: Vec<&str> = payload.splitn(6, ';').collect();
        self.kind = kind;
        self.host_name = field(&fields, 0).to_string();
        self.service_description = field(&fields, 1).to_string();
        self.state = service_state(field(&fields, 2));
        self.state_type = field(&fields, 3).to_string();
        let (short, long) = split_output(field(&fields, 5));
        self.plugin_output = short;
        self.long_plugin_output = long;
    }

    // <host>;<state type>;<comment>
    fn parse_host_notice(&mut self, kind: LogEntryKind, payload: &str) {
        let fields: Vec<&str> = payload.splitn(3, ';').collect();
        self.kind = kind;
        self.host_name = field(&fields, 0).to_string();
        self.state_type = field(&fields, 1).to_string();
        self.plugin_output = field(&fields, 2).to_string();
    }

    // <host>;<description>;<state type>;<comment>
    fn parse_service_notice(&mut self, kind: LogEntryKind, payload: &str) {
        let fields: Vec<&str> = payload.splitn(4, ';').collect();
        self.kind = kind;
        self.host_name = field(&fields, 0).to_string();
        self.service_description = field(&fields, 1).to_string();
        self.state_type = field(&fields, 2).to_string();
        self.plugin_output = field(&fields, 3).to_string();
    }
}

fn field<'a>(fields: &[&'a str], index: usize) -> &'a str {
    fields.get(index).copied().unwrap_or("")
}

/// Plugin output carries its long part behind a literal `\n` marker.
fn split_output(raw: &str) -> (String, String) {
    match raw.split_once("\\n") {
        Some((short, long)) => (short.to_string(), long.replace("\\n", "\n")),
        None => (raw.to_string(), String::new()),
    }
}

fn host_state(word: &str) -> i32 {
    match word {
        "UP" => 0,
        "DOWN" => 1,
        _ => 2,
    }
}

fn service_state(word: &str) -> i32 {
    match word {
        "OK" => 0,
        "WARNING" => 1,
        "CRITICAL" => 2,
        _ => 3,
    }
}
