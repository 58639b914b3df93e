//! Configuration loading and management

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_RESOURCE: &str = "/socket.io";
pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_CLOSING_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_POLLING_DURATION_MS: u64 = 20_000;

/// Serializable server settings
///
/// Function-valued settings (session id generator, authorization, custom
/// transports) are not part of this struct; pass them to `ServerBuilder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Path prefix the handler is mounted under
    pub resource: String,

    /// Heartbeat timeout advertised in the handshake, in milliseconds
    pub heartbeat_timeout_ms: u64,

    /// Closing timeout advertised in the handshake, in milliseconds
    pub closing_timeout_ms: u64,

    /// How long a long-poll waits for outbound packets, in milliseconds
    pub polling_duration_ms: u64,

    /// Enabled transports, in advertised order (None = all registered)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource: DEFAULT_RESOURCE.to_string(),
            heartbeat_timeout_ms: DEFAULT_HEARTBEAT_TIMEOUT_MS,
            closing_timeout_ms: DEFAULT_CLOSING_TIMEOUT_MS,
            polling_duration_ms: DEFAULT_POLLING_DURATION_MS,
            transports: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("heartbeat_timeout_ms", self.heartbeat_timeout_ms),
            ("closing_timeout_ms", self.closing_timeout_ms),
            ("polling_duration_ms", self.polling_duration_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resource path normalized to a leading slash and no trailing slash
    pub fn normalized_resource(&self) -> String {
        let trimmed = self.resource.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    pub fn polling_duration(&self) -> Duration {
        Duration::from_millis(self.polling_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.resource, "/socket.io");
        assert_eq!(config.heartbeat_timeout_ms, 15000);
        assert_eq!(config.closing_timeout_ms, 10000);
        assert!(config.transports.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ServerConfig::from_yaml_str("heartbeat_timeout_ms: 60000\n").unwrap();

        assert_eq!(config.heartbeat_timeout_ms, 60000);
        assert_eq!(config.closing_timeout_ms, 10000);
        assert_eq!(config.resource, "/socket.io");
    }

    #[test]
    fn test_yaml_serialization() {
        let config = ServerConfig {
            transports: Some(vec!["xhr-polling".to_string()]),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();

        let parsed = ServerConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let err = ServerConfig::from_yaml_str("closing_timeout_ms: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDuration { ref field } if field == "closing_timeout_ms"));
    }

    #[test]
    fn test_normalized_resource() {
        let mut config = ServerConfig::default();
        assert_eq!(config.normalized_resource(), "/socket.io");

        config.resource = "realtime/".to_string();
        assert_eq!(config.normalized_resource(), "/realtime");

        config.resource = "/".to_string();
        assert_eq!(config.normalized_resource(), "");
    }
}
