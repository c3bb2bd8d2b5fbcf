//! Configuration loading and validation for hubwatch server

use crate::events::STATUS_CHANNEL;
use crate::monitor::MonitorOptions;
use crate::types::ControllerRecord;
use controller::ClientOptions;
use discovery::{DiscoveryOptions, PROBE_PATH, SERVICE_TYPE, WellKnownHost, default_hosts};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "HUBWATCH_CONFIG";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub events: EventSettings,

    #[serde(default)]
    pub http: HttpSettings,

    /// Controllers loaded into the in-memory store at startup
    #[serde(default)]
    pub controllers: Vec<ControllerSeed>,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.monitor.validate()?;
        self.discovery.validate()?;
        self.events.validate()?;
        self.http.validate()?;
        for seed in &self.controllers {
            seed.validate()?;
        }

        let mut ids = HashSet::new();
        if self.controllers.iter().any(|seed| !ids.insert(seed.id.as_str())) {
            let mut errors = ValidationErrors::new();
            errors.add("controllers", ValidationError::new("duplicate_controller_id"));
            return Err(errors);
        }
        Ok(())
    }
}

/// Health monitor settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MonitorSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_monitor_interval")]
    pub interval: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_request_timeout")]
    pub request_timeout: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_request_timeout")]
    pub status_timeout: Duration,

    #[validate(range(min = 1, max = 64))]
    pub max_concurrent_checks: usize,
}

/// Discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Default passive listen window when a caller gives none
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_listen_window")]
    pub listen_window: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_request_timeout")]
    pub probe_timeout: Duration,

    #[validate(custom = "validate_service_type")]
    pub service_type: String,

    #[validate(custom = "validate_hosts")]
    pub hosts: Vec<WellKnownHost>,
}

/// Status event settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EventSettings {
    #[validate(length(min = 1))]
    pub channel: String,

    /// Messages buffered per subscriber
    #[validate(range(min = 1, max = 100000))]
    pub capacity: usize,
}

/// Operational HTTP endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HttpSettings {
    pub enabled: bool,

    #[validate(custom = "validate_listen_addr")]
    pub listen_addr: String,
}

/// A controller registered through configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ControllerSeed {
    #[validate(length(min = 1))]
    pub id: String,

    #[validate(custom = "validate_controller_url")]
    pub url: String,

    /// Bearer token
    #[serde(default)]
    pub credential: String,

    #[serde(default)]
    pub discovered_via: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

/// OpenTelemetry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub service_name: String,
    pub otlp_endpoint: String,
}

// Default implementations

impl Default for MonitorSettings {
    fn default() -> Self {
        let client = ClientOptions::default();
        Self {
            interval: Duration::from_secs(30),
            request_timeout: client.request_timeout,
            status_timeout: client.status_timeout,
            max_concurrent_checks: 1,
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            listen_window: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(3),
            service_type: SERVICE_TYPE.to_string(),
            hosts: default_hosts(),
        }
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            channel: STATUS_CHANNEL.to_string(),
            capacity: 256,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:9187".to_string(),
        }
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "hubwatch-server".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
        }
    }
}

// Custom validators

fn validate_monitor_interval(interval: &Duration) -> Result<(), ValidationError> {
    let millis = interval.as_millis();
    if millis < 1_000 || millis > 3_600_000 {
        return Err(ValidationError::new("monitor_interval_out_of_range"));
    }
    Ok(())
}

fn validate_request_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let millis = timeout.as_millis();
    if millis < 100 || millis > 120_000 {
        return Err(ValidationError::new("timeout_out_of_range"));
    }
    Ok(())
}

fn validate_listen_window(window: &Duration) -> Result<(), ValidationError> {
    if window.is_zero() || *window > discovery::types::MAX_LISTEN_WINDOW {
        return Err(ValidationError::new("listen_window_out_of_range"));
    }
    Ok(())
}

fn validate_service_type(service_type: &str) -> Result<(), ValidationError> {
    if !service_type.starts_with('_') || !service_type.ends_with(".local.") {
        return Err(ValidationError::new("service_type_invalid_format"));
    }
    Ok(())
}

fn validate_hosts(hosts: &[WellKnownHost]) -> Result<(), ValidationError> {
    if hosts.iter().any(|h| h.host.trim().is_empty() || h.port == 0) {
        return Err(ValidationError::new("probe_host_invalid"));
    }
    Ok(())
}

fn validate_listen_addr(addr: &str) -> Result<(), ValidationError> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("listen_addr_invalid"))
}

fn validate_controller_url(url: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(url.trim()).map_err(|_| ValidationError::new("url_invalid"))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ValidationError::new("url_invalid"));
    }
    Ok(())
}

// Configuration loading implementation

impl Config {
    /// Load configuration from default search paths
    ///
    /// `$HUBWATCH_CONFIG` wins when set and must exist.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound(path));
            }
            tracing::info!("Loading configuration from {}: {}", CONFIG_ENV, path.display());
            return Self::load_from_file(&path);
        }

        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/hubwatch/hubwatch.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./hubwatch.yaml"));

        paths.into_iter().find(|p| p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/hubwatch/hubwatch.yaml"))
    }

    /// Options for the health monitor
    pub fn to_monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            interval: self.monitor.interval,
            client: ClientOptions {
                request_timeout: self.monitor.request_timeout,
                status_timeout: self.monitor.status_timeout,
            },
            max_concurrent_checks: self.monitor.max_concurrent_checks,
            channel: self.events.channel.clone(),
        }
    }

    /// Options for the discovery service
    pub fn to_discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            service_type: self.discovery.service_type.clone(),
            probe_timeout: self.discovery.probe_timeout,
            probe_path: PROBE_PATH.to_string(),
            hosts: self.discovery.hosts.clone(),
        }
    }

    /// Seed records for the in-memory store
    pub fn records(&self) -> Vec<ControllerRecord> {
        self.controllers
            .iter()
            .map(|seed| {
                let mut record =
                    ControllerRecord::new(seed.id.clone(), seed.url.trim(), seed.credential.clone());
                record.discovered_via = Some(
                    seed.discovered_via
                        .clone()
                        .unwrap_or_else(|| "config".to_string()),
                );
                record
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionStatus;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_valid_yaml_parsing() {
        let yaml = r#"
monitor:
  interval: 15s
  request_timeout: 8s
  status_timeout: 2s
  max_concurrent_checks: 4

discovery:
  listen_window: 3s
  probe_timeout: 1500ms
  hosts:
    - host: hass.lan
      port: 8123

events:
  channel: controller_status_changes
  capacity: 64

http:
  listen_addr: "0.0.0.0:9100"

controllers:
  - id: living-room
    url: http://homeassistant.local:8123
    credential: abc123
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.monitor.interval, Duration::from_secs(15));
        assert_eq!(config.monitor.max_concurrent_checks, 4);
        assert_eq!(config.discovery.probe_timeout, Duration::from_millis(1500));
        assert_eq!(config.discovery.hosts, vec![WellKnownHost::new("hass.lan", 8123)]);
        assert_eq!(config.events.capacity, 64);
        assert_eq!(config.http.listen_addr, "0.0.0.0:9100");
        assert_eq!(config.controllers.len(), 1);
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
monitor:
  interval: 10s
"#;

        let config = Config::from_yaml(yaml).unwrap();
        // Should use default values
        assert_eq!(config.monitor.request_timeout, Duration::from_secs(10));
        assert_eq!(config.discovery.listen_window, Duration::from_secs(5));
        assert_eq!(config.discovery.hosts.len(), 4);
        assert_eq!(config.events.channel, "controller_status_changes");
        assert!(config.http.enabled);
        assert!(!config.telemetry.enabled);
    }

    #[test]
    fn test_invalid_monitor_interval() {
        // Too small
        let yaml = r#"
monitor:
  interval: 500ms  # Invalid: < 1s
"#;
        assert!(Config::from_yaml(yaml).is_err());

        // Too large
        let yaml = r#"
monitor:
  interval: 2h  # Invalid: > 1h
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_listen_window() {
        let yaml = r#"
discovery:
  listen_window: 90s  # Invalid: > 60s
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_concurrency() {
        let yaml = r#"
monitor:
  max_concurrent_checks: 0
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_listen_addr() {
        let yaml = r#"
http:
  listen_addr: "localhost"
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_controller_url_validation() {
        assert!(validate_controller_url("http://10.0.0.5:8123").is_ok());
        assert!(validate_controller_url("https://hass.example.com").is_ok());

        assert!(validate_controller_url("").is_err());
        assert!(validate_controller_url("ftp://10.0.0.5").is_err());
        assert!(validate_controller_url("10.0.0.5:8123").is_err());
    }

    #[test]
    fn test_duplicate_controller_ids_rejected() {
        let yaml = r#"
controllers:
  - id: hub
    url: http://10.0.0.5:8123
  - id: hub
    url: http://10.0.0.6:8123
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_service_type_validation() {
        assert!(validate_service_type("_home-assistant._tcp.local.").is_ok());
        assert!(validate_service_type("home-assistant").is_err());
    }

    #[test]
    fn test_config_to_monitor_options_conversion() {
        let config = Config::default();
        let options = config.to_monitor_options();

        assert_eq!(options.interval, Duration::from_secs(30));
        assert_eq!(options.client.request_timeout, Duration::from_secs(10));
        assert_eq!(options.client.status_timeout, Duration::from_secs(5));
        assert_eq!(options.max_concurrent_checks, 1);
        assert_eq!(options.channel, STATUS_CHANNEL);
    }

    #[test]
    fn test_config_to_discovery_options_conversion() {
        let options = Config::default().to_discovery_options();
        assert_eq!(options, DiscoveryOptions::default());
    }

    #[test]
    fn test_records_from_seeds() {
        let yaml = r#"
controllers:
  - id: hub
    url: http://10.0.0.5:8123
    credential: tok
  - id: cabin
    url: http://10.0.0.9:8123
    discovered_via: zeroconf
"#;
        let records = Config::from_yaml(yaml).unwrap().records();

        assert_eq!(records[0].id, "hub");
        assert_eq!(records[0].connection_status, ConnectionStatus::Offline);
        assert_eq!(records[0].discovered_via.as_deref(), Some("config"));
        assert_eq!(records[1].discovered_via.as_deref(), Some("zeroconf"));
        assert_eq!(records[1].credential.0, "");
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("hubwatch-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "monitor:\n  interval: 45s\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.monitor.interval, Duration::from_secs(45));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load_from_file("/nonexistent/hubwatch.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
