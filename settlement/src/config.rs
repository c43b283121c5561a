//! Configuration for the settlement service

use ledger_core::ProtocolConfig;
use serde::{Deserialize, Serialize};

/// Settlement service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Bounded mailbox size of the protocol actor
    pub mailbox_capacity: usize,

    /// Protocol constants
    pub protocol: ProtocolConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "field-settlement".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            mailbox_capacity: 1024,
            protocol: ProtocolConfig::default(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    ///
    /// Protocol constants come from `FIELD_*`, service settings from
    /// `SETTLEMENT_*`.
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config {
            protocol: ProtocolConfig::from_env()?,
            ..Config::default()
        };

        if let Ok(name) = std::env::var("SETTLEMENT_SERVICE_NAME") {
            config.service_name = name;
        }

        if let Ok(capacity) = std::env::var("SETTLEMENT_MAILBOX_CAPACITY") {
            config.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("SETTLEMENT_MAILBOX_CAPACITY: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate service settings and the embedded protocol constants
    pub fn validate(&self) -> crate::Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be positive".to_string(),
            ));
        }
        self.protocol.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_mailbox_rejected() {
        let config = Config {
            mailbox_capacity: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_from_file_with_protocol_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settlement.toml");
        std::fs::write(
            &path,
            r#"
service_name = "field-test"
mailbox_capacity = 16

[protocol.field]
max_hops = 6
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.service_name, "field-test");
        assert_eq!(config.mailbox_capacity, 16);
        assert_eq!(config.protocol.field.max_hops, 6);
        assert_eq!(config.protocol.field.max_bonds, 5);
    }

    #[test]
    fn test_from_file_propagates_protocol_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settlement.toml");
        std::fs::write(
            &path,
            r#"
[protocol.absorption_split]
stability = "0.50"
"#,
        )
        .unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }
}
