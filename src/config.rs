use std::{collections::BTreeMap, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::{
    primitive::{LOCAL, LOCAL_PERSIST, LOGOUT},
    SEPARATOR,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {source}")]
    ParseError {
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Root configuration: one entry per domain.
///
/// ```toml
/// [domains.api]
/// base_url = "https://example.com/api"
/// timeout_seconds = 10
///
/// [domains.api.headers]
/// accept = "application/json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub domains: BTreeMap<String, DomainConfig>,
}

/// Request defaults shared by every call of a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Transport timeout in seconds (default: 30).
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// When set, calls sleep this long instead of hitting the network.
    #[serde(default)]
    pub fake_delay_ms: Option<u64>,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for DomainConfig {
    fn default() -> Self {
        DomainConfig {
            base_url: None,
            headers: BTreeMap::new(),
            timeout_seconds: default_timeout_seconds(),
            fake_delay_ms: None,
        }
    }
}

impl DomainConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        DomainConfig {
            base_url: Some(base_url.into()),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn fake_delay(&self) -> Option<Duration> {
        self.fake_delay_ms.map(Duration::from_millis)
    }
}

impl ClientConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError { source: e })?;

        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_toml_str(&content)
    }

    /// Checks:
    /// - domain names are non-empty, free of the address separator and not reserved
    /// - base urls are absolute urls
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, domain) in &self.domains {
            let reserved = [LOCAL, LOCAL_PERSIST, LOGOUT].contains(&name.as_str());
            if name.is_empty() || name.contains(SEPARATOR) || reserved {
                return Err(ConfigError::ValidationError {
                    message: format!("'{name}' can't be used as a domain name"),
                });
            }

            if let Some(base_url) = &domain.base_url {
                url::Url::parse(base_url).map_err(|e| ConfigError::ValidationError {
                    message: format!("domain '{name}' has an invalid base_url '{base_url}': {e}"),
                })?;
            }
        }

        Ok(())
    }
}
