//! Configuration management for the gateway.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::admission::AdmissionPolicy;
use crate::error::{Result, StudyhubError};

/// Prefix for environment variable overrides, e.g. `STUDYHUB__ADMISSION__LIMIT`.
const ENV_PREFIX: &str = "STUDYHUB";

/// Main configuration for the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Request admission configuration
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

/// Request admission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Maximum requests per client per window
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Rolling window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Number of table shards; must be a power of two greater than one
    #[serde(default)]
    pub shards: Option<usize>,

    /// How often idle clients are swept, in seconds (0 disables the sweeper)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Identifier used when no client address can be determined
    #[serde(default = "default_unknown_client_id")]
    pub unknown_client_id: String,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_secs: default_window_secs(),
            shards: None,
            sweep_interval_secs: default_sweep_interval(),
            trust_forwarded_for: false,
            unknown_client_id: default_unknown_client_id(),
        }
    }
}

fn default_limit() -> u32 {
    60
}

fn default_window_secs() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_unknown_client_id() -> String {
    "unknown".to_string()
}

impl AdmissionConfig {
    /// The admission policy described by this configuration.
    pub fn policy(&self) -> AdmissionPolicy {
        AdmissionPolicy::new(self.limit, Duration::from_secs(self.window_secs))
    }

    /// Sweep interval, or `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl ServiceConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration file");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ServiceConfig = serde_yaml::from_str(yaml)
            .map_err(|e| StudyhubError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Layer an optional YAML file and `STUDYHUB__*` environment variables.
    ///
    /// Environment values take precedence over the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: ServiceConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the admission table relies on.
    pub fn validate(&self) -> Result<()> {
        let admission = &self.admission;

        if admission.limit == 0 {
            return Err(StudyhubError::Config(
                "admission.limit must be at least 1".to_string(),
            ));
        }

        if admission.window_secs == 0 {
            return Err(StudyhubError::Config(
                "admission.window_secs must be at least 1".to_string(),
            ));
        }

        if let Some(shards) = admission.shards {
            if shards < 2 || !shards.is_power_of_two() {
                return Err(StudyhubError::Config(format!(
                    "admission.shards must be a power of two greater than one, got {}",
                    shards
                )));
            }
        }

        if admission.unknown_client_id.trim().is_empty() {
            return Err(StudyhubError::Config(
                "admission.unknown_client_id must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.http_addr.port(), 8000);
        assert_eq!(config.admission.limit, 60);
        assert_eq!(config.admission.window_secs, 60);
        assert_eq!(config.admission.unknown_client_id, "unknown");
        assert!(!config.admission.trust_forwarded_for);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
admission:
  limit: 3
  window_secs: 10
logging:
  format: json
"#;
        let config = ServiceConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.admission.limit, 3);
        assert_eq!(config.admission.window_secs, 10);
        assert_eq!(config.admission.sweep_interval_secs, 30);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.server.http_addr.port(), 8000);

        let policy = config.admission.policy();
        assert_eq!(policy.limit(), 3);
        assert_eq!(policy.window(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let yaml = r#"
admission:
  limit: 0
"#;
        let result = ServiceConfig::from_yaml(yaml);
        assert!(matches!(result, Err(StudyhubError::Config(_))));
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = ServiceConfig::default();
        config.admission.window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shard_count_must_be_power_of_two() {
        let mut config = ServiceConfig::default();

        config.admission.shards = Some(12);
        assert!(config.validate().is_err());

        config.admission.shards = Some(1);
        assert!(config.validate().is_err());

        config.admission.shards = Some(16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sweep_interval_disabled() {
        let mut config = AdmissionConfig::default();
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(30)));

        config.sweep_interval_secs = 0;
        assert_eq!(config.sweep_interval(), None);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = ServiceConfig::from_yaml("admission: [not, a, map]");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("studyhub-gate-{}.yaml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "server:\n  http_addr: 127.0.0.1:9000\nadmission:\n  trust_forwarded_for: true\n",
        )
        .unwrap();

        let config = ServiceConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert!(config.admission.trust_forwarded_for);
    }

    #[test]
    fn test_from_missing_file() {
        let result = ServiceConfig::from_file("/nonexistent/studyhub-gate.yaml");
        assert!(matches!(result, Err(StudyhubError::Io(_))));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ServiceConfig::load(None).unwrap();
        assert!(config.admission.limit >= 1);
    }
}
