//! Configuration for the miner manager.

use miner_manager_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::http::RESERVED_PATHS;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] miner_manager_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// HTTP endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Target list settings.
    #[serde(default)]
    pub targets: TargetsConfig,

    /// Device polling settings.
    #[serde(default)]
    pub poller: PollerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (default: "0.0.0.0:5000").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for the scrape endpoint (default: "/metrics").
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

fn default_listen() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            metrics_path: default_metrics_path(),
        }
    }
}

/// Target list configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// File holding one device address per line.
    #[serde(default = "default_targets_path")]
    pub path: PathBuf,

    /// Addresses written to the file when it does not exist yet.
    #[serde(default = "default_targets")]
    pub defaults: Vec<String>,
}

fn default_targets_path() -> PathBuf {
    PathBuf::from("data/ips.txt")
}

fn default_targets() -> Vec<String> {
    vec!["192.168.68.10".to_string(), "192.168.68.11".to_string()]
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            path: default_targets_path(),
            defaults: default_targets(),
        }
    }
}

/// Device polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Per-device request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of devices polled at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Status document path on each device.
    #[serde(default = "default_status_path")]
    pub status_path: String,
}

fn default_timeout() -> u64 {
    5
}

fn default_concurrency() -> usize {
    8
}

fn default_status_path() -> String {
    "/api/system/info".to_string()
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            concurrency: default_concurrency(),
            status_path: default_status_path(),
        }
    }
}

impl PollerConfig {
    /// Per-device request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ManagerConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ManagerConfig = miner_manager_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ManagerConfig = miner_manager_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.server.listen
            )));
        }

        if !self.server.metrics_path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if RESERVED_PATHS.contains(&self.server.metrics_path.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Metrics path must not be {} (reserved)",
                self.server.metrics_path
            )));
        }

        if self.targets.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "Targets path must not be empty".to_string(),
            ));
        }

        if self.poller.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        if self.poller.concurrency == 0 {
            return Err(ConfigError::Validation(
                "concurrency must be > 0".to_string(),
            ));
        }

        if !self.poller.status_path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Status path must start with /".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miner_manager_common::LogFormat;

    #[test]
    fn test_parse_minimal_config() {
        let config = ManagerConfig::parse("{}").unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:5000");
        assert_eq!(config.server.metrics_path, "/metrics");
        assert_eq!(config.targets.path, PathBuf::from("data/ips.txt"));
        assert_eq!(
            config.targets.defaults,
            vec!["192.168.68.10", "192.168.68.11"]
        );
        assert_eq!(config.poller.timeout(), Duration::from_secs(5));
        assert_eq!(config.poller.concurrency, 8);
        assert_eq!(config.poller.status_path, "/api/system/info");
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            server: {
                listen: "127.0.0.1:8080",
                metrics_path: "/telegraf",
            },
            targets: {
                path: "/var/lib/miner-manager/ips.txt",
                defaults: [],
            },
            poller: {
                timeout_secs: 2,
                concurrency: 32,
                status_path: "/api/v2/info",
            },
            logging: {
                level: "debug",
                format: "json",
            },
        }"#;

        let config = ManagerConfig::parse(json).unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(config.server.metrics_path, "/telegraf");
        assert_eq!(
            config.targets.path,
            PathBuf::from("/var/lib/miner-manager/ips.txt")
        );
        assert!(config.targets.defaults.is_empty());
        assert_eq!(config.poller.timeout_secs, 2);
        assert_eq!(config.poller.concurrency, 32);
        assert_eq!(config.poller.status_path, "/api/v2/info");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_invalid_listen() {
        let result = ManagerConfig::parse(r#"{ server: { listen: "not-an-address" } }"#);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid listen address")
        );
    }

    #[test]
    fn test_validate_metrics_path() {
        let result = ManagerConfig::parse(r#"{ server: { metrics_path: "metrics" } }"#);
        assert!(result.unwrap_err().to_string().contains("must start with /"));

        let result = ManagerConfig::parse(r#"{ server: { metrics_path: "/" } }"#);
        assert!(result.unwrap_err().to_string().contains("must not be /"));
    }

    #[test]
    fn test_validate_metrics_path_reserved() {
        let result = ManagerConfig::parse(r#"{ server: { metrics_path: "/health" } }"#);
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("must not be /health"));

        for path in RESERVED_PATHS {
            let mut config = ManagerConfig::default();
            config.server.metrics_path = path.to_string();
            assert!(config.validate().is_err(), "{} accepted", path);
        }

        let config = ManagerConfig::parse(r#"{ server: { metrics_path: "/healthz" } }"#).unwrap();
        assert_eq!(config.server.metrics_path, "/healthz");
    }

    #[test]
    fn test_validate_zero_timeout() {
        let result = ManagerConfig::parse(r#"{ poller: { timeout_secs: 0 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let result = ManagerConfig::parse(r#"{ poller: { concurrency: 0 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_status_path() {
        let result = ManagerConfig::parse(r#"{ poller: { status_path: "api/system/info" } }"#);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_example_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../miner-manager.json5");
        let config = ManagerConfig::load_from_file(path).unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:5000");
        assert_eq!(config.poller.timeout_secs, 5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ManagerConfig::load_from_file("/nonexistent/miner-manager.json5").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("miner-manager.json5");
        std::fs::write(&path, r#"{ poller: { concurrency: 0 } }"#).unwrap();

        let result = ManagerConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        std::fs::write(&path, "{ server: ").unwrap();
        let err = ManagerConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Load(miner_manager_common::Error::Config(_))
        ));
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_parse_error() {
        let err = ManagerConfig::parse("{ server: ").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Load(miner_manager_common::Error::Config(_))
        ));
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
