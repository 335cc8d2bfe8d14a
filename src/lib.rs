//! # Teslagram - TeslaMate session notifications over Telegram
//!
//! Listens to the per-field telemetry TeslaMate publishes over MQTT, tracks
//! every car's state, detects when a charge or a drive has finished and sends
//! a short summary to a Telegram chat.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `units`: Unit conversions and derived session metrics
//! - `vehicle`: Vehicle state model and telemetry field table
//! - `session`: Charging and driving session detection
//! - `places`: Place names from geofences and reverse geocoding
//! - `notify`: Notification text
//! - `router`: Per-vehicle actors and the `status` board
//! - `mqtt`: TeslaMate MQTT ingest
//! - `telegram`: Telegram Bot API transport

pub mod config;
pub mod error;
pub mod logging;
pub mod mqtt;
pub mod notify;
pub mod places;
pub mod router;
pub mod session;
pub mod telegram;
pub mod units;
pub mod vehicle;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, TeslagramError};
pub use notify::Notifier;
pub use router::FleetRouter;
pub use vehicle::{FieldUpdate, Vehicle, VehicleSnapshot};
