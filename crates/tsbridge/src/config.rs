// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge configuration.
//!
//! Loaded from a TOML file; every key has a default so a missing file or a
//! partial one still yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "tsbridge.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Statistics reporting interval (seconds, 0 to disable).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// MQTT broker settings.
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// InfluxDB settings.
    #[serde(default)]
    pub influxdb: InfluxDbConfig,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker address (`host:port`, optionally prefixed with `tcp://` or `mqtt://`).
    #[serde(default = "default_mqtt_address")]
    pub address: String,

    /// Client identifier presented to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Username (empty for anonymous).
    #[serde(default)]
    pub username: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Subscription filter.
    #[serde(default = "default_topic_filter")]
    pub topic: String,

    /// Subscription QoS (0, 1 or 2).
    #[serde(default = "default_qos")]
    pub qos: u8,

    /// Keep-alive interval (seconds).
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

/// InfluxDB v2 connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluxDbConfig {
    /// InfluxDB URL (e.g., "http://localhost:8086").
    #[serde(default = "default_influx_url")]
    pub url: String,

    /// Authentication token.
    #[serde(default)]
    pub token: String,

    /// Organization name new buckets are created in.
    #[serde(default = "default_org")]
    pub org: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stats_interval() -> u64 {
    60
}

fn default_mqtt_address() -> String {
    "localhost:1883".to_string()
}

fn default_client_id() -> String {
    "tsbridge".to_string()
}

fn default_topic_filter() -> String {
    "timeseries/#".to_string()
}

fn default_qos() -> u8 {
    1
}

fn default_keep_alive() -> u64 {
    30
}

fn default_influx_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_org() -> String {
    "my-org".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            stats_interval_secs: default_stats_interval(),
            mqtt: MqttConfig::default(),
            influxdb: InfluxDbConfig::default(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            address: default_mqtt_address(),
            client_id: default_client_id(),
            username: String::new(),
            password: String::new(),
            topic: default_topic_filter(),
            qos: default_qos(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

impl Default for InfluxDbConfig {
    fn default() -> Self {
        Self {
            url: default_influx_url(),
            token: String::new(),
            org: default_org(),
            timeout_secs: default_timeout(),
        }
    }
}

impl BridgeConfig {
    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.sanitize();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Pick the configuration file to use: `path` if given, otherwise
    /// [`DEFAULT_CONFIG_FILE`] in the working directory if it exists.
    pub fn resolve_path(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                fallback.exists().then(|| fallback.to_path_buf())
            }
        }
    }

    /// Load the file chosen by [`resolve_path`](Self::resolve_path), or the
    /// defaults when there is none.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::resolve_path(path) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Trim stray whitespace around string settings.
    fn sanitize(&mut self) {
        for s in [
            &mut self.log_level,
            &mut self.mqtt.address,
            &mut self.mqtt.client_id,
            &mut self.mqtt.username,
            &mut self.mqtt.password,
            &mut self.mqtt.topic,
            &mut self.influxdb.url,
            &mut self.influxdb.token,
            &mut self.influxdb.org,
        ] {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mqtt.host_port()?;

        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::Invalid("mqtt.client_id is empty".into()));
        }
        if self.mqtt.topic.is_empty() {
            return Err(ConfigError::Invalid("mqtt.topic is empty".into()));
        }
        if self.mqtt.qos > 2 {
            return Err(ConfigError::Invalid(format!(
                "mqtt.qos must be 0, 1 or 2 (got {})",
                self.mqtt.qos
            )));
        }
        if !self.influxdb.url.starts_with("http://") && !self.influxdb.url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "influxdb.url must start with http:// or https:// (got '{}')",
                self.influxdb.url
            )));
        }
        if self.influxdb.org.is_empty() {
            return Err(ConfigError::Invalid("influxdb.org is empty".into()));
        }
        if self.influxdb.timeout_secs == 0 {
            return Err(ConfigError::Invalid("influxdb.timeout_secs must be > 0".into()));
        }

        Ok(())
    }
}

impl MqttConfig {
    /// Split the broker address into host and port.
    pub fn host_port(&self) -> Result<(String, u16), ConfigError> {
        let addr = self
            .address
            .strip_prefix("tcp://")
            .or_else(|| self.address.strip_prefix("mqtt://"))
            .unwrap_or(&self.address);

        let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
            ConfigError::Invalid(format!(
                "mqtt.address '{}' is not host:port",
                self.address
            ))
        })?;
        if host.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "mqtt.address '{}' has no host",
                self.address
            )));
        }
        let port = port.parse::<u16>().map_err(|_| {
            ConfigError::Invalid(format!(
                "mqtt.address '{}' has an invalid port",
                self.address
            ))
        })?;

        Ok((host.to_string(), port))
    }

    /// Keep-alive as a duration.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl InfluxDbConfig {
    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
