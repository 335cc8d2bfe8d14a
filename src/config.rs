//! Configuration management for Teslagram
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with support for environment variable overrides.

use crate::error::{Result, TeslagramError};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// MQTT broker connection for the TeslaMate feed
    pub mqtt: MqttConfig,

    /// Telegram bot credentials and destination chat
    pub telegram: TelegramConfig,

    /// Reverse-geocoding service
    pub geocoder: GeocoderConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Timezone used to render clock times in notifications
    pub timezone: String,

    /// Quiet period before a burst of field updates is evaluated (0 = every update)
    pub debounce_ms: u64,
}

/// MQTT connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host name
    pub host: String,

    /// Broker TCP port
    pub port: u16,

    /// TeslaMate topic prefix; updates arrive on `{prefix}/cars/{id}/{field}`
    pub topic_prefix: String,

    /// Client id; defaults to `teslamate-telegram-{hostname}`
    pub client_id: Option<String>,

    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,

    /// Optional broker credentials
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token (usually supplied through `TELEGRAM_TOKEN`)
    #[serde(skip_serializing)]
    pub token: String,

    /// Chat receiving session notifications
    pub chat_id: i64,

    /// API base URL
    pub api_base: String,

    /// Long-poll timeout for getUpdates, in seconds
    pub poll_timeout_secs: u64,
}

/// Reverse-geocoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Nominatim base URL
    pub base_url: String,

    /// User agent sent with each lookup
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file (its directory receives the daily rolled files)
    pub file: String,

    /// Number of rolled files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "mqtt".to_string(),
            port: 1883,
            topic_prefix: "teslamate".to_string(),
            client_id: None,
            keep_alive_secs: 30,
            username: None,
            password: None,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            chat_id: 0,
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 60,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("teslagram/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/teslagram.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            telegram: TelegramConfig::default(),
            geocoder: GeocoderConfig::default(),
            logging: LoggingConfig::default(),
            timezone: "UTC".to_string(),
            debounce_ms: 1000,
        }
    }
}

impl MqttConfig {
    /// Client id to present to the broker
    pub fn effective_client_id(&self) -> String {
        match &self.client_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => {
                let host = hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .filter(|h| !h.is_empty())
                    .unwrap_or_else(|| "localhost".to_string());
                format!("teslamate-telegram-{}", host)
            }
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `TESLAGRAM_CONFIG` or the default locations,
    /// then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("TESLAGRAM_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_file(path)?,
            _ => {
                let default_paths = [
                    "teslagram.yaml",
                    "/data/teslagram.yaml",
                    "/etc/teslagram/config.yaml",
                ];
                match default_paths.iter().find(|p| Path::new(p).exists()) {
                    Some(path) => Self::from_file(path)?,
                    None => Config::default(),
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `TELEGRAM_TOKEN`, `TELEGRAM_CHAT_ID` and `MQTT_HOST` overrides
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_TOKEN").filter(|t| !t.is_empty()) {
            self.telegram.token = token;
        }
        if let Some(raw) = lookup("TELEGRAM_CHAT_ID").filter(|c| !c.is_empty()) {
            self.telegram.chat_id = raw.trim().parse().map_err(|_| {
                TeslagramError::validation("TELEGRAM_CHAT_ID", "must be an integer chat id")
            })?;
        }
        if let Some(host) = lookup("MQTT_HOST").filter(|h| !h.is_empty()) {
            self.mqtt.host = host;
        }
        Ok(())
    }

    /// Render as YAML with credentials left out
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parsed display timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| TeslagramError::validation("timezone", "unknown timezone"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.host.is_empty() {
            return Err(TeslagramError::validation(
                "mqtt.host",
                "Host cannot be empty",
            ));
        }

        if self.mqtt.port == 0 {
            return Err(TeslagramError::validation(
                "mqtt.port",
                "Port must be greater than 0",
            ));
        }

        if self.mqtt.topic_prefix.trim_matches('/').is_empty() {
            return Err(TeslagramError::validation(
                "mqtt.topic_prefix",
                "Topic prefix cannot be empty",
            ));
        }

        if self.geocoder.timeout_secs == 0 {
            return Err(TeslagramError::validation(
                "geocoder.timeout_secs",
                "Must be greater than 0",
            ));
        }

        self.tz()?;
        Ok(())
    }

    /// Validation for running the bot: also requires Telegram credentials
    pub fn validate_for_bot(&self) -> Result<()> {
        self.validate()?;
        if self.telegram.token.trim().is_empty() {
            return Err(TeslagramError::validation(
                "telegram.token",
                "Set TELEGRAM_TOKEN or telegram.token",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mqtt.host, "mqtt");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic_prefix, "teslamate");
        assert_eq!(config.debounce_ms, 1000);
        assert_eq!(config.tz().unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.mqtt.host = String::new();
        assert!(config.validate().is_err());

        config = Config::default();
        config.mqtt.port = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.timezone = "Mars/Olympus_Mons".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(|key| match key {
                "TELEGRAM_TOKEN" => Some("123:abc".to_string()),
                "TELEGRAM_CHAT_ID" => Some("-10042".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.telegram.token, "123:abc");
        assert_eq!(config.telegram.chat_id, -10042);
        assert_eq!(config.mqtt.host, "mqtt");
        assert!(config.validate_for_bot().is_ok());
    }

    #[test]
    fn test_client_id() {
        let mut mqtt = MqttConfig::default();
        let id = mqtt.effective_client_id();
        let host = id.strip_prefix("teslamate-telegram-").unwrap();
        assert!(!host.is_empty());

        mqtt.client_id = Some("garage-bot".to_string());
        assert_eq!(mqtt.effective_client_id(), "garage-bot");

        mqtt.client_id = Some(String::new());
        assert_eq!(mqtt.effective_client_id(), id);
    }

    #[test]
    fn test_bad_chat_id_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(|key| (key == "TELEGRAM_CHAT_ID").then(|| "chat".to_string()))
            .unwrap_err();
        assert!(matches!(err, TeslagramError::Validation { .. }));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("timezone: Europe/London\nmqtt:\n  port: 1884\n").unwrap();
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.mqtt.host, "mqtt");
        assert_eq!(config.tz().unwrap(), chrono_tz::Europe::London);
    }
}
