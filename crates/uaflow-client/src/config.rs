// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client runtime configuration.
//!
//! [`ClientConfig`] carries the worker timing, channel capacities and the
//! protocol defaults applied when a monitoring request leaves a value unset.
//! It can be built in code or loaded from YAML, TOML or JSON.
//!
//! ```yaml
//! drive_interval: 50ms
//! drive_max_wait: 10ms
//! command_queue_capacity: 256
//! event_channel_capacity: 1024
//! subscription:
//!   publishing_interval_ms: 100.0
//!   lifetime_count: 60
//!   max_keep_alive_count: 10
//! monitoring:
//!   sampling_interval_ms: 250.0
//!   queue_size: 1
//!   discard_oldest: true
//! logging:
//!   level: info
//!   format: json
//! ```
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use uaflow_client::config::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .drive_interval(Duration::from_millis(20))
//!     .event_channel_capacity(64)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.subscription.lifetime_count, 60);
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigurationError, UaError, UaResult};
use crate::logging::LogFormat;

// =============================================================================
// ClientConfig
// =============================================================================

/// Runtime configuration of a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Period of the drive tick while connected.
    #[serde(with = "humantime_serde", default = "default_drive_interval")]
    pub drive_interval: Duration,

    /// Longest time a single drive call may block waiting for I/O.
    #[serde(with = "humantime_serde", default = "default_drive_max_wait")]
    pub drive_max_wait: Duration,

    /// Capacity of the worker command inbox.
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,

    /// Capacity of the client event broadcast channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Defaults for new subscriptions.
    #[serde(default)]
    pub subscription: SubscriptionDefaults,

    /// Defaults for new monitored items.
    #[serde(default)]
    pub monitoring: MonitoringDefaults,

    /// Logging settings used by [`LogSink::from_config`](crate::logging::LogSink::from_config).
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_drive_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_drive_max_wait() -> Duration {
    Duration::from_millis(10)
}

fn default_command_queue_capacity() -> usize {
    256
}

fn default_event_channel_capacity() -> usize {
    1024
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            drive_interval: default_drive_interval(),
            drive_max_wait: default_drive_max_wait(),
            command_queue_capacity: default_command_queue_capacity(),
            event_channel_capacity: default_event_channel_capacity(),
            subscription: SubscriptionDefaults::default(),
            monitoring: MonitoringDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> UaResult<()> {
        if self.drive_interval.is_zero() {
            return Err(invalid("drive_interval", "must be greater than zero"));
        }
        if self.drive_max_wait.is_zero() {
            return Err(invalid("drive_max_wait", "must be greater than zero"));
        }
        if self.command_queue_capacity == 0 {
            return Err(invalid("command_queue_capacity", "must be greater than zero"));
        }
        if self.event_channel_capacity == 0 {
            return Err(invalid("event_channel_capacity", "must be greater than zero"));
        }
        self.subscription.validate()?;
        self.monitoring.validate()?;
        Ok(())
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(content: &str) -> UaResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| UaError::configuration(ConfigurationError::parse("YAML", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> UaResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| UaError::configuration(ConfigurationError::parse("TOML", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(content: &str) -> UaResult<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| UaError::configuration(ConfigurationError::parse("JSON", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file, picking the format by extension.
    ///
    /// `.yaml`/`.yml`, `.toml` and `.json` are recognized.
    pub fn load(path: impl AsRef<Path>) -> UaResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading client configuration");

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let content = fs::read_to_string(path).map_err(|source| {
            UaError::configuration(ConfigurationError::Io {
                path: path.display().to_string(),
                source,
            })
        })?;

        let config = match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&content),
            "toml" => Self::from_toml_str(&content),
            "json" => Self::from_json_str(&content),
            other => Err(UaError::configuration(
                ConfigurationError::UnsupportedFormat {
                    extension: if other.is_empty() {
                        "(no extension)".to_string()
                    } else {
                        other.to_string()
                    },
                },
            )),
        }?;

        debug!(
            drive_interval = ?config.drive_interval,
            publishing_interval_ms = config.subscription.publishing_interval_ms,
            "Client configuration loaded"
        );
        Ok(config)
    }
}

fn invalid(field: &str, reason: &str) -> UaError {
    UaError::configuration(ConfigurationError::invalid_field(field, reason))
}

// =============================================================================
// SubscriptionDefaults
// =============================================================================

/// Protocol defaults for subscriptions created by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionDefaults {
    /// Publishing interval in milliseconds.
    pub publishing_interval_ms: f64,
    /// Lifetime count.
    pub lifetime_count: u32,
    /// Max keep-alive count.
    pub max_keep_alive_count: u32,
    /// Max notifications per publish (0 = unlimited).
    pub max_notifications_per_publish: u32,
    /// Relative priority.
    pub priority: u8,
}

impl Default for SubscriptionDefaults {
    fn default() -> Self {
        Self {
            publishing_interval_ms: 100.0,
            lifetime_count: 60,
            max_keep_alive_count: 10,
            max_notifications_per_publish: 0,
            priority: 0,
        }
    }
}

impl SubscriptionDefaults {
    fn validate(&self) -> UaResult<()> {
        if !(self.publishing_interval_ms.is_finite() && self.publishing_interval_ms > 0.0) {
            return Err(invalid(
                "subscription.publishing_interval_ms",
                "must be a positive number",
            ));
        }
        if self.max_keep_alive_count == 0 {
            return Err(invalid(
                "subscription.max_keep_alive_count",
                "must be greater than zero",
            ));
        }
        // Part 4 requires the lifetime to cover at least three keep-alives.
        if u64::from(self.lifetime_count) < 3 * u64::from(self.max_keep_alive_count) {
            return Err(invalid(
                "subscription.lifetime_count",
                "must be at least three times max_keep_alive_count",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// MonitoringDefaults
// =============================================================================

/// Protocol defaults for monitored items created by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringDefaults {
    /// Sampling interval in milliseconds (0 = fastest practical rate).
    pub sampling_interval_ms: f64,
    /// Server-side queue size.
    pub queue_size: u32,
    /// Discard the oldest value when the queue overflows.
    pub discard_oldest: bool,
}

impl Default for MonitoringDefaults {
    fn default() -> Self {
        Self {
            sampling_interval_ms: 250.0,
            queue_size: 1,
            discard_oldest: true,
        }
    }
}

impl MonitoringDefaults {
    fn validate(&self) -> UaResult<()> {
        if !(self.sampling_interval_ms.is_finite() && self.sampling_interval_ms >= 0.0) {
            return Err(invalid(
                "monitoring.sampling_interval_ms",
                "must be a non-negative number",
            ));
        }
        if self.queue_size == 0 {
            return Err(invalid("monitoring.queue_size", "must be greater than zero"));
        }
        Ok(())
    }
}

// =============================================================================
// LoggingConfig
// =============================================================================

/// Level and output format for an injected log sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `uaflow_client=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

// =============================================================================
// ClientConfigBuilder
// =============================================================================

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Sets the drive tick period.
    pub fn drive_interval(mut self, interval: Duration) -> Self {
        self.config.drive_interval = interval;
        self
    }

    /// Sets the maximum blocking time of one drive call.
    pub fn drive_max_wait(mut self, max_wait: Duration) -> Self {
        self.config.drive_max_wait = max_wait;
        self
    }

    /// Sets the command inbox capacity.
    pub fn command_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.command_queue_capacity = capacity;
        self
    }

    /// Sets the event channel capacity.
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    /// Sets the default publishing interval in milliseconds.
    pub fn publishing_interval_ms(mut self, interval: f64) -> Self {
        self.config.subscription.publishing_interval_ms = interval;
        self
    }

    /// Sets the default lifetime and keep-alive counts.
    pub fn lifetime(mut self, lifetime_count: u32, max_keep_alive_count: u32) -> Self {
        self.config.subscription.lifetime_count = lifetime_count;
        self.config.subscription.max_keep_alive_count = max_keep_alive_count;
        self
    }

    /// Sets the default max notifications per publish.
    pub fn max_notifications_per_publish(mut self, max: u32) -> Self {
        self.config.subscription.max_notifications_per_publish = max;
        self
    }

    /// Sets the default subscription priority.
    pub fn priority(mut self, priority: u8) -> Self {
        self.config.subscription.priority = priority;
        self
    }

    /// Sets the default sampling interval in milliseconds.
    pub fn sampling_interval_ms(mut self, interval: f64) -> Self {
        self.config.monitoring.sampling_interval_ms = interval;
        self
    }

    /// Sets the default queue size and discard policy.
    pub fn queue(mut self, queue_size: u32, discard_oldest: bool) -> Self {
        self.config.monitoring.queue_size = queue_size;
        self.config.monitoring.discard_oldest = discard_oldest;
        self
    }

    /// Sets the logging level and format.
    pub fn logging(mut self, level: impl Into<String>, format: LogFormat) -> Self {
        self.config.logging = LoggingConfig {
            level: level.into(),
            format,
        };
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> UaResult<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// humantime_serde helper
// =============================================================================

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*duration)
            .to_string()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.subscription.lifetime_count, 60);
        assert_eq!(config.subscription.max_keep_alive_count, 10);
        assert_eq!(config.subscription.max_notifications_per_publish, 0);
        assert_eq!(config.monitoring.sampling_interval_ms, 250.0);
        assert_eq!(config.monitoring.queue_size, 1);
        assert!(config.monitoring.discard_oldest);
    }

    #[test]
    fn test_builder_validation() {
        assert!(ClientConfig::builder()
            .drive_interval(Duration::ZERO)
            .build()
            .is_err());
        assert!(ClientConfig::builder()
            .event_channel_capacity(0)
            .build()
            .is_err());
        assert!(ClientConfig::builder().lifetime(20, 10).build().is_err());
        assert!(ClientConfig::builder().lifetime(30, 10).build().is_ok());
        assert!(ClientConfig::builder()
            .publishing_interval_ms(f64::NAN)
            .build()
            .is_err());
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
drive_interval: 20ms
command_queue_capacity: 8
subscription:
  publishing_interval_ms: 500.0
logging:
  level: debug
  format: json
"#;
        let config = ClientConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.drive_interval, Duration::from_millis(20));
        assert_eq!(config.drive_max_wait, Duration::from_millis(10));
        assert_eq!(config.command_queue_capacity, 8);
        assert_eq!(config.subscription.publishing_interval_ms, 500.0);
        assert_eq!(config.subscription.lifetime_count, 60);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_from_toml_str() {
        let toml = r#"
drive_interval = "1s"
event_channel_capacity = 16

[monitoring]
queue_size = 10
discard_oldest = false
"#;
        let config = ClientConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.drive_interval, Duration::from_secs(1));
        assert_eq!(config.monitoring.queue_size, 10);
        assert!(!config.monitoring.discard_oldest);
    }

    #[test]
    fn test_invalid_document_is_rejected() {
        assert!(ClientConfig::from_json_str(r#"{"command_queue_capacity": 0}"#).is_err());
        assert!(ClientConfig::from_yaml_str("drive_interval: soon").is_err());
    }

    #[test]
    fn test_load_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"drive_interval": "5ms"}}"#).unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.drive_interval, Duration::from_millis(5));

        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = ClientConfig::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            UaError::Configuration(ConfigurationError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = ClientConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("drive_interval: 50ms"));
        assert_eq!(ClientConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
