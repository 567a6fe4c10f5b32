//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `homehub.toml` in the working directory unless a path is given
//! on the command line. Every field has a default so the file is optional.
//! Environment variables take precedence over file values.

use crate::scheduler::{Job, ScheduleParseError};
use homehub_coordinator::{CoordinatorConfig, RetryPolicy};
use homehub_core::constants::{
    DEFAULT_COMMAND_PORT, DEFAULT_GATE_CAPACITY, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_LINE_LENGTH,
    DEFAULT_POLL_FAILURE_BACKOFF_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_POLL_QUEUE_CAPACITY,
    DEFAULT_STOP_TIMEOUT_MS,
};
use homehub_core::{DeviceId, DeviceKind};
use homehub_hal::{AnyHal, FileDeviceConfig, FileHal, HalError, MockHal};
use homehub_network::CommandServerConfig;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Config file looked up when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "homehub.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Command server settings.
    pub server: ServerConfig,
    /// Access gate settings.
    pub gate: GateConfig,
    /// Device backend.
    pub hal: HalConfig,
    /// Shared timing for periodic and retried calls.
    pub retry: RetryConfig,
    /// Background polling.
    pub poller: PollerConfig,
    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,
    /// Interactive console.
    pub console: ConsoleConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Scheduled jobs (`[[schedule]]` tables).
    pub schedule: Vec<ScheduleConfig>,
}

/// Command server listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0:9998`).
    pub bind: SocketAddr,
    /// Maximum simultaneous client sessions.
    pub max_connections: usize,
    /// Longest accepted request line, in bytes.
    pub max_line_length: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// HAL calls allowed in flight at once.
    pub capacity: usize,
    /// Upper bound on one HAL call, in milliseconds.
    pub hal_timeout_ms: Option<u64>,
}

/// Backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HalBackend {
    /// In-memory simulated devices.
    #[default]
    Mock,
    /// Device nodes or plain files.
    File,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HalConfig {
    pub backend: HalBackend,
    /// Device table. Optional for `mock`, which otherwise uses its defaults.
    pub devices: Vec<HalDeviceConfig>,
    /// Artificial latency of the mock backend, in milliseconds.
    pub mock_latency_ms: Option<u64>,
}

/// One `[[hal.devices]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HalDeviceConfig {
    pub id: DeviceId,
    pub kind: DeviceKind,
    /// Required by the `file` backend.
    pub path: Option<PathBuf>,
}

/// `[retry]` section, turned into a [`RetryPolicy`].
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay between rounds after a success.
    pub interval_ms: u64,
    /// Delay after a failure.
    pub failure_backoff_ms: u64,
    /// Attempts per retried call, including the first.
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub enabled: bool,
    /// Devices read on every round.
    pub devices: Vec<String>,
    /// Capacity of the poll result queue.
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time each activity gets to stop, in milliseconds.
    pub stop_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// One `[[schedule]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleConfig {
    /// Name used in logs; defaults to the action text.
    pub name: Option<String>,
    /// `every <secs>` or `daily at HH:MM`.
    pub trigger: String,
    /// `set <id> <state>`, `read <id>` or `toggle <id>`.
    pub action: String,
}

impl Config {
    /// Load configuration, apply environment overrides and validate.
    ///
    /// Without `path`, a missing `homehub.toml` yields the defaults. An
    /// explicit path must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or fails
    /// validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::from_file(Path::new(DEFAULT_CONFIG_FILE)) {
                Err(ConfigError::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    Self::default()
                }
                other => other?,
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, in increasing precedence:
    /// `HOMEHUB_BIND`, `HOMEHUB_GATE_CAPACITY`, `HOMEHUB_LOG`, `RUST_LOG`.
    /// Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("HOMEHUB_BIND").and_then(|v| v.parse().ok()) {
            self.server.bind = bind;
        }
        if let Some(capacity) = lookup("HOMEHUB_GATE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.gate.capacity = capacity;
        }
        if let Some(filter) = lookup("HOMEHUB_LOG") {
            self.logging.filter = filter;
        }
        if let Some(filter) = lookup("RUST_LOG") {
            self.logging.filter = filter;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.gate.capacity == 0 {
            return Err(ConfigError::Validation("gate capacity must be at least 1".into()));
        }
        if self.gate.hal_timeout_ms == Some(0) {
            return Err(ConfigError::Validation("HAL timeout must be non-zero".into()));
        }
        if self.server.max_connections == 0 {
            return Err(ConfigError::Validation("max_connections must be at least 1".into()));
        }
        if self.server.max_line_length == 0 {
            return Err(ConfigError::Validation("max_line_length must be non-zero".into()));
        }
        if self.retry.interval_ms == 0 || self.retry.failure_backoff_ms == 0 {
            return Err(ConfigError::Validation("retry delays must be non-zero".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation("retry max_attempts must be at least 1".into()));
        }
        if self.poller.enabled {
            if self.poller.queue_capacity == 0 {
                return Err(ConfigError::Validation("poller queue_capacity must be at least 1".into()));
            }
            self.poller_devices()?;
        }
        if self.hal.backend == HalBackend::File {
            if self.hal.devices.is_empty() {
                return Err(ConfigError::Validation("file backend needs at least one device".into()));
            }
            self.file_devices()?;
        }
        self.schedule_jobs()?;
        Ok(())
    }

    /// Coordinator construction parameters.
    #[must_use]
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            gate_capacity: self.gate.capacity,
            hal_timeout: self.gate.hal_timeout_ms.map(Duration::from_millis),
        }
    }

    #[must_use]
    pub fn server_config(&self) -> CommandServerConfig {
        CommandServerConfig {
            bind_addr: self.server.bind,
            max_connections: self.server.max_connections,
            max_line_length: self.server.max_line_length,
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(self.retry.interval_ms),
            failure_backoff: Duration::from_millis(self.retry.failure_backoff_ms),
            max_attempts: self.retry.max_attempts,
        }
    }

    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown.stop_timeout_ms)
    }

    /// Devices the poller reads.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty list or an invalid id.
    pub fn poller_devices(&self) -> Result<Vec<DeviceId>, ConfigError> {
        if self.poller.devices.is_empty() {
            return Err(ConfigError::Validation("poller needs at least one device".into()));
        }
        self.poller
            .devices
            .iter()
            .map(|id| {
                DeviceId::new(id.as_str())
                    .map_err(|e| ConfigError::Validation(format!("poller device: {e}")))
            })
            .collect()
    }

    /// Device table for the file backend.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an entry without a path.
    pub fn file_devices(&self) -> Result<Vec<FileDeviceConfig>, ConfigError> {
        self.hal
            .devices
            .iter()
            .map(|device| {
                let path = device.path.clone().ok_or_else(|| {
                    ConfigError::Validation(format!("device {} has no path", device.id))
                })?;
                Ok(FileDeviceConfig {
                    id: device.id.clone(),
                    kind: device.kind,
                    path,
                })
            })
            .collect()
    }

    /// Build the configured HAL backend.
    ///
    /// File nodes that are missing or unwritable are logged but do not fail
    /// startup; a driver may create them later.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Hal` if the device table is inconsistent.
    pub async fn build_hal(&self) -> Result<AnyHal, ConfigError> {
        let hal = match self.hal.backend {
            HalBackend::Mock => {
                let (hal, _handle) = if self.hal.devices.is_empty() {
                    MockHal::new()
                } else {
                    MockHal::with_devices(
                        self.hal.devices.iter().map(|d| (d.id.clone(), d.kind)),
                    )
                };
                let hal = match self.hal.mock_latency_ms {
                    Some(ms) => hal.with_latency(Duration::from_millis(ms)),
                    None => hal,
                };
                AnyHal::from(hal)
            }
            HalBackend::File => {
                let hal = FileHal::new(self.file_devices()?)?;
                let problems = hal.validate().await;
                if !problems.is_empty() {
                    warn!(problems = problems.len(), "Some device nodes are not usable yet");
                }
                AnyHal::from(hal)
            }
        };
        info!(backend = ?self.hal.backend, "HAL initialized");
        Ok(hal)
    }

    /// Parsed scheduled jobs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Schedule` for the first entry that does not
    /// parse.
    pub fn schedule_jobs(&self) -> Result<Vec<Job>, ConfigError> {
        self.schedule
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let name = entry.name.clone().unwrap_or_else(|| entry.action.clone());
                Job::parse(name, &entry.trigger, &entry.action)
                    .map_err(|source| ConfigError::Schedule { index, source })
            })
            .collect()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_COMMAND_PORT)),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_GATE_CAPACITY,
            hal_timeout_ms: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            failure_backoff_ms: DEFAULT_POLL_FAILURE_BACKOFF_MS,
            max_attempts: 3,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            devices: vec!["sensor_temp_main".to_string()],
            queue_capacity: DEFAULT_POLL_QUEUE_CAPACITY,
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A `[[schedule]]` entry does not parse.
    #[error("schedule entry {index}: {source}")]
    Schedule {
        index: usize,
        source: ScheduleParseError,
    },
    /// The HAL rejected its device table.
    #[error("invalid HAL configuration: {0}")]
    Hal(#[from] HalError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use homehub_hal::DeviceHal;
    use std::collections::HashMap;
    use std::io::Write;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind.port(), 9998);
        assert_eq!(config.gate.capacity, 1);
        assert_eq!(config.hal.backend, HalBackend::Mock);
        assert!(config.poller.enabled);
        assert!(config.console.enabled);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.stop_timeout(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.max_connections, 32);
        assert!(config.schedule.is_empty());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [server]
            bind = "127.0.0.1:7000"
            max_connections = 4
            max_line_length = 1024

            [gate]
            capacity = 2
            hal_timeout_ms = 250

            [hal]
            backend = "file"
            devices = [
                { id = "light_hall", kind = "light", path = "/dev/light_hall" },
                { id = "temp_hall", kind = "sensor_temp", path = "/tmp/temp_hall" },
            ]

            [retry]
            interval_ms = 5000
            failure_backoff_ms = 15000
            max_attempts = 5

            [poller]
            devices = ["temp_hall"]
            queue_capacity = 10

            [shutdown]
            stop_timeout_ms = 1000

            [console]
            enabled = false

            [logging]
            filter = "debug"

            [[schedule]]
            name = "evening"
            trigger = "daily at 19:00"
            action = "set light_hall on"

            [[schedule]]
            trigger = "every 600"
            action = "read temp_hall"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server_config().bind_addr.port(), 7000);
        assert_eq!(
            config.coordinator_config().hal_timeout,
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.hal.backend, HalBackend::File);
        let devices = config.file_devices().unwrap();
        assert_eq!(devices[1].kind, DeviceKind::TempSensor);
        assert_eq!(config.retry_policy().max_attempts, 5);
        assert!(!config.console.enabled);

        let jobs = config.schedule_jobs().unwrap();
        assert_eq!(jobs[0].name, "evening");
        assert_eq!(jobs[1].name, "read temp_hall");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[
            ("HOMEHUB_BIND", "127.0.0.1:9000"),
            ("HOMEHUB_GATE_CAPACITY", "4"),
            ("HOMEHUB_LOG", "debug"),
        ]));
        assert_eq!(config.server.bind.port(), 9000);
        assert_eq!(config.gate.capacity, 4);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_rust_log_wins_over_homehub_log() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[("HOMEHUB_LOG", "debug"), ("RUST_LOG", "trace")]));
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn test_invalid_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[("HOMEHUB_BIND", "not-an-addr")]));
        assert_eq!(config.server.bind.port(), 9998);
    }

    #[test]
    fn test_rejects_zero_gate_capacity() {
        let mut config = Config::default();
        config.gate.capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_zero_max_connections() {
        let mut config = Config::default();
        config.server.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_poller_device() {
        let mut config = Config::default();
        config.poller.devices = vec!["two words".into()];
        assert!(config.validate().is_err());

        config.poller.devices.clear();
        assert!(config.validate().is_err());

        config.poller.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_file_device_without_path() {
        let toml = r#"
            [hal]
            backend = "file"
            devices = [{ id = "light_hall", kind = "light" }]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_schedule_time() {
        let toml = r#"
            [[schedule]]
            trigger = "daily at 7pm"
            action = "toggle light_livingroom"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Schedule { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_build_mock_hal_with_custom_devices() {
        let toml = r#"
            [hal]
            devices = [{ id = "fan_attic", kind = "socket" }]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let hal = config.build_hal().await.unwrap();

        assert_eq!(hal.backend_name(), "mock");
        let devices = hal.list_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices.get("fan_attic"), Some(&DeviceKind::Socket));
    }

    #[tokio::test]
    async fn test_build_file_hal_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("light");
        let toml = format!(
            r#"
            [hal]
            backend = "file"
            devices = [
                {{ id = "light", kind = "light", path = "{0}" }},
                {{ id = "light", kind = "light", path = "{0}" }},
            ]
            "#,
            path.display()
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert!(matches!(config.build_hal().await, Err(ConfigError::Hal(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gate]\ncapacity = 3").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.gate.capacity, 3);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gate\ncapacity = ").unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::Parse(_))
        ));
    }
}
