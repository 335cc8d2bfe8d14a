//! Error types and handling for Teslagram
//!
//! This module defines the error types used throughout the application.
//! Telemetry parsing never produces errors; these cover configuration,
//! transports and the geocoding collaborator.

use thiserror::Error;

/// Result type alias for Teslagram operations
pub type Result<T> = std::result::Result<T, TeslagramError>;

/// Main error type for Teslagram
#[derive(Debug, Error)]
pub enum TeslagramError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// MQTT feed errors
    #[error("MQTT error: {message}")]
    Mqtt { message: String },

    /// Telegram Bot API errors
    #[error("Telegram error: {message}")]
    Telegram { message: String },

    /// Reverse-geocoding lookup errors
    #[error("Geocoding error: {message}")]
    Geocoding { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },
}

impl TeslagramError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        TeslagramError::Config {
            message: message.into(),
        }
    }

    /// Create a new MQTT error
    pub fn mqtt<S: Into<String>>(message: S) -> Self {
        TeslagramError::Mqtt {
            message: message.into(),
        }
    }

    /// Create a new Telegram error
    pub fn telegram<S: Into<String>>(message: S) -> Self {
        TeslagramError::Telegram {
            message: message.into(),
        }
    }

    /// Create a new geocoding error
    pub fn geocoding<S: Into<String>>(message: S) -> Self {
        TeslagramError::Geocoding {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        TeslagramError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        TeslagramError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        TeslagramError::Network {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for TeslagramError {
    fn from(err: std::io::Error) -> Self {
        TeslagramError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for TeslagramError {
    fn from(err: serde_yaml::Error) -> Self {
        TeslagramError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TeslagramError {
    fn from(err: serde_json::Error) -> Self {
        TeslagramError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for TeslagramError {
    fn from(err: reqwest::Error) -> Self {
        TeslagramError::network(err.to_string())
    }
}

impl From<rumqttc::ClientError> for TeslagramError {
    fn from(err: rumqttc::ClientError) -> Self {
        TeslagramError::mqtt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = TeslagramError::config("test config error");
        assert!(matches!(err, TeslagramError::Config { .. }));

        let err = TeslagramError::geocoding("lookup failed");
        assert!(matches!(err, TeslagramError::Geocoding { .. }));

        let err = TeslagramError::validation("field", "test validation error");
        assert!(matches!(err, TeslagramError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = TeslagramError::config("test error");
        assert_eq!(format!("{}", err), "Configuration error: test error");

        let err = TeslagramError::validation("mqtt.port", "must be greater than 0");
        assert_eq!(
            format!("{}", err),
            "Validation error: mqtt.port - must be greater than 0"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: TeslagramError = io.into();
        assert!(matches!(err, TeslagramError::Io { .. }));
    }
}
