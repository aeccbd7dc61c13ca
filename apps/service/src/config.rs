use std::collections::HashSet;
use std::time::Duration;
use std::{env, fmt, fs, path};

use logger::LogFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::database::TargetDefinition;
use crate::validation::{
    ValidationError, validate_interval, validate_retention_days, validate_target, validate_timeout,
};

pub const ENV_BOT_TOKEN: &str = "PORTWATCH_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "PORTWATCH_CHAT_ID";
pub const ENV_SQLITE_PATH: &str = "PORTWATCH_SQLITE_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFailed(#[source] std::io::Error),
    #[error("failed to write config file: {0}")]
    WriteFailed(#[source] std::io::Error),
    #[error("failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid target {name:?}: {source}")]
    InvalidTarget {
        name: String,
        #[source]
        source: ValidationError,
    },
    #[error("duplicate target name: {0}")]
    DuplicateTarget(String),
    #[error("invalid monitoring settings: {0}")]
    InvalidMonitoring(#[from] ValidationError),
    #[error(transparent)]
    InvalidLogFormat(#[from] logger::UnknownFormat),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bot: BotConfig,
    pub monitoring: MonitoringConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Empty disables all chat traffic
    pub token: String,
    pub chat_id: i64,
    pub api_base_url: String,
    pub commands_enabled: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            chat_id: 0,
            api_base_url: "https://api.telegram.org".into(),
            commands_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub interval_seconds: u64,
    pub connect_timeout_seconds: u64,
    /// 0 means one worker per target
    pub max_parallel_checks: usize,
    pub fast_recovery_window_seconds: u64,
    pub logs_limit_ceiling: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            connect_timeout_seconds: 2,
            max_parallel_checks: 0,
            fast_recovery_window_seconds: 30,
            logs_limit_ceiling: 50_000,
        }
    }
}

impl MonitoringConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn fast_recovery_window(&self) -> Duration {
        Duration::from_secs(self.fast_recovery_window_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
    /// Days of check history to keep; 0 keeps everything
    pub retention_days: i64,
    pub busy_timeout_ms: u64,
    pub max_connections: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "portwatch.db".into(),
            retention_days: 5,
            busy_timeout_ms: 5000,
            max_connections: 4,
        }
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: "compact".into() }
    }
}

impl LoggingConfig {
    pub fn log_format(&self) -> Result<LogFormat, ConfigError> {
        Ok(self.format.parse()?)
    }
}

/// A seed target; only written to an empty target store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub address: String,
    pub port: i64,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/portwatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("portwatch/config.toml"))
}

fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "(not set)".into();
    }
    let visible: String = token.chars().take(4).collect();
    format!("{visible}****")
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Configuration State:")?;
        write_title_1(f, "Bot")?;
        write_1(f, "Token", &mask_token(&self.bot.token))?;
        write_1(f, "Chat ID", &self.bot.chat_id)?;
        write_1(f, "API Base URL", &self.bot.api_base_url)?;
        write_1(f, "Commands Enabled", &self.bot.commands_enabled)?;

        write_title_1(f, "Monitoring")?;
        write_1(f, "Interval (s)", &self.monitoring.interval_seconds)?;
        write_1(f, "Connect Timeout (s)", &self.monitoring.connect_timeout_seconds)?;
        write_1(f, "Max Parallel Checks", &self.monitoring.max_parallel_checks)?;
        write_1(f, "Fast Recovery Window (s)", &self.monitoring.fast_recovery_window_seconds)?;
        write_1(f, "Logs Limit Ceiling", &self.monitoring.logs_limit_ceiling)?;

        write_title_1(f, "Storage")?;
        write_1(f, "Path", &self.storage.path)?;
        write_1(f, "Retention (days)", &self.storage.retention_days)?;
        write_1(f, "Busy Timeout (ms)", &self.storage.busy_timeout_ms)?;
        write_1(f, "Max Connections", &self.storage.max_connections)?;

        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;

        write_title_1(f, "Seed Targets")?;
        if self.targets.is_empty() {
            write_1(f, "Count", &0)?;
        }
        for target in &self.targets {
            write_2(f, &target.name, &format!("{}:{}", target.address, target.port))?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/portwatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist.
    /// Environment overrides are applied on top.
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let mut config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(ConfigError::ReadFailed)?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(ConfigError::WriteFailed)
    }

    /// Apply `PORTWATCH_*` overrides; empty values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let lookup = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(token) = lookup(ENV_BOT_TOKEN) {
            self.bot.token = token;
        }
        if let Some(raw) = lookup(ENV_CHAT_ID) {
            self.bot.chat_id = raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key: ENV_CHAT_ID, value: raw.clone() })?;
        }
        if let Some(path) = lookup(ENV_SQLITE_PATH) {
            self.storage.path = path;
        }
        Ok(())
    }

    /// Check everything that would otherwise fail at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_interval(self.monitoring.interval_seconds)?;
        validate_timeout(self.monitoring.connect_timeout_seconds)?;
        validate_retention_days(self.storage.retention_days)?;
        if self.monitoring.connect_timeout_seconds >= self.monitoring.interval_seconds {
            warn!(
                "Connect timeout ({}s) is not below the check interval ({}s); cycles may run back to back",
                self.monitoring.connect_timeout_seconds, self.monitoring.interval_seconds
            );
        }
        self.logging.log_format()?;

        let mut seen = HashSet::new();
        for target in &self.targets {
            let definition = validate_target(&target.name, &target.address, target.port).map_err(
                |source| ConfigError::InvalidTarget { name: target.name.clone(), source },
            )?;
            if !seen.insert(definition.name.to_lowercase()) {
                return Err(ConfigError::DuplicateTarget(definition.name));
            }
        }
        Ok(())
    }

    /// Seed targets in their stored form
    pub fn seed_targets(&self) -> Result<Vec<TargetDefinition>, ConfigError> {
        self.targets
            .iter()
            .map(|target| {
                validate_target(&target.name, &target.address, target.port).map_err(|source| {
                    ConfigError::InvalidTarget { name: target.name.clone(), source }
                })
            })
            .collect()
    }

    pub fn bot_enabled(&self) -> bool {
        !self.bot.token.is_empty()
    }
}
