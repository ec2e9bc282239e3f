// src/config.rs

//! Manages client configuration: loading from TOML, defaults, and validation.

use crate::core::VoltError;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Connection settings for a single server node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Upper bound for dialing and logging in, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    21212
}
fn default_connect_timeout_ms() -> u64 {
    5000 // 5 seconds
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Loads and validates a configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: ClientConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a default configuration pointing at `address` (`host:port`).
    pub fn for_address(address: &str) -> Result<Self, VoltError> {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| VoltError::Resolve(address.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| VoltError::Resolve(address.to_string()))?;
        // Bracketed IPv6 literals keep their brackets in `address()`.
        let host = host.trim();
        if host.is_empty() || port == 0 {
            return Err(VoltError::Resolve(address.to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            port,
            ..Self::default()
        })
    }

    /// Checks the configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(anyhow!("connect_timeout_ms must be greater than 0"));
        }
        Ok(())
    }

    /// The `host:port` string to dial.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
