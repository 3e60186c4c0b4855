use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "/config/histmon.yaml";

/// Top-level configuration for the histmon CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory holding the monitoring log archive.
    #[serde(default = "AppConfig::default_log_directory")]
    pub log_directory: PathBuf,
    /// Soft truncation limit when materializing a single log file.
    #[serde(default = "AppConfig::default_max_lines_per_log_file")]
    pub max_lines_per_log_file: usize,
    /// YAML file describing monitored hosts/services. When absent, the logs
    /// themselves are pre-scanned to build the registry.
    #[serde(default)]
    pub objects_file: Option<PathBuf>,
}

impl AppConfig {
    fn default_log_directory() -> PathBuf {
        PathBuf::from("/var/log/monitoring/archive")
    }

    const fn default_max_lines_per_log_file() -> usize {
        1_000_000
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_directory: Self::default_log_directory(),
            max_lines_per_log_file: Self::default_max_lines_per_log_file(),
            objects_file: None,
        }
    }
}

/// Load configuration from a YAML file, falling back to defaults, then apply
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let target_path = if let Some(path) = path {
        path.to_path_buf()
    } else if let Ok(env_path) = env::var("HISTMON_CONFIG") {
        PathBuf::from(env_path)
    } else {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    };

    let mut config = match try_parse_file(&target_path)? {
        Some(cfg) => {
            info!(path = %target_path.display(), "loaded configuration");
            cfg
        }
        None => {
            warn!(path = %target_path.display(), "config file not found; using built-in defaults");
            AppConfig::default()
        }
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn try_parse_file(path: &Path) -> Result<Option<AppConfig>> {
    match fs::read_to_string(path) {
        Ok(raw) => {
            let cfg = serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse YAML config at {}", path.display()))?;
            Ok(Some(cfg))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => {
            Err(err).with_context(|| format!("failed to read config file at {}", path.display()))
        }
    }
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(dir) = env::var("HISTMON_LOG_DIR") {
        if !dir.is_empty() {
            config.log_directory = PathBuf::from(dir);
        }
    }
    if let Ok(objects) = env::var("HISTMON_OBJECTS") {
        if !objects.is_empty() {
            config.objects_file = Some(PathBuf::from(objects));
        }
    }
}
