//! TeslaMate MQTT ingest
//!
//! TeslaMate publishes one topic per vehicle field:
//!
//! - `{prefix}/cars/{id}/battery_level` - State of charge (%)
//! - `{prefix}/cars/{id}/charger_power` - Charger power (kW)
//! - `{prefix}/cars/{id}/shift_state` - `P`, `R`, `N`, `D`
//! - ...
//!
//! Every publish is turned into a [`FieldUpdate`] and handed to the
//! [`FleetRouter`]. The subscription is renewed on every ConnAck so it
//! survives broker restarts.

use crate::config::MqttConfig;
use crate::error::{Result, TeslagramError};
use crate::logging::{LogContext, get_logger_with_context};
use crate::router::FleetRouter;
use crate::vehicle::{FieldUpdate, VehicleId};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;

/// Pause before polling again after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Split `{prefix}/cars/{id}/{field}` into its vehicle id and field name
pub fn parse_topic<'a>(prefix: &str, topic: &'a str) -> Option<(VehicleId, &'a str)> {
    let rest = topic
        .strip_prefix(prefix.trim_end_matches('/'))?
        .strip_prefix("/cars/")?;
    let (id, field) = rest.split_once('/')?;
    let id = id.parse().ok()?;
    if field.is_empty() {
        return None;
    }
    Some((id, field))
}

/// Subscription filter covering every car under `prefix`
pub fn subscription_filter(prefix: &str) -> String {
    format!("{}/cars/#", prefix.trim_end_matches('/'))
}

/// Turn a publish into a field update
pub fn decode_publish(prefix: &str, topic: &str, payload: &[u8]) -> Option<FieldUpdate> {
    let (vehicle_id, field) = parse_topic(prefix, topic)?;
    Some(FieldUpdate::new(
        vehicle_id,
        field,
        String::from_utf8_lossy(payload),
    ))
}

/// MQTT subscriber feeding the fleet router
pub struct MqttIngest {
    config: MqttConfig,
    logger: crate::logging::StructuredLogger,
}

impl MqttIngest {
    pub fn new(config: &MqttConfig) -> Self {
        Self {
            config: config.clone(),
            logger: get_logger_with_context(
                LogContext::new("mqtt")
                    .with_field("broker", format!("{}:{}", config.host, config.port)),
            ),
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.effective_client_id(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs.max(5)));
        // Let the broker queue messages while we are offline
        options.set_clean_session(false);
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            options.set_credentials(username, password);
        }
        options
    }

    /// Run until the connection fails before ever being established.
    ///
    /// Once connected, errors are logged and the event loop reconnects.
    pub async fn run(self, mut router: FleetRouter) -> Result<()> {
        let (client, mut eventloop) = AsyncClient::new(self.options(), 100);
        let filter = subscription_filter(&self.config.topic_prefix);
        let mut connected = false;

        self.logger.info(&format!(
            "Connecting to mqtt://{}:{}",
            self.config.host, self.config.port
        ));

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    connected = true;
                    self.logger.info("Connected to mqtt");
                    client.try_subscribe(filter.as_str(), QoS::AtMostOnce)?;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic = String::from_utf8_lossy(AsRef::<[u8]>::as_ref(&publish.topic));
                    match decode_publish(&self.config.topic_prefix, &topic, &publish.payload) {
                        Some(update) => router.route(update),
                        None => self
                            .logger
                            .warn(&format!("Failed to parse topic: {}", topic)),
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    self.logger.debug(&format!("Subscribed to {}", filter));
                }
                Ok(_) => {}
                Err(e) if !connected => {
                    return Err(TeslagramError::mqtt(format!(
                        "Failed to connect to {}:{}: {}",
                        self.config.host, self.config.port, e
                    )));
                }
                Err(e) => {
                    self.logger
                        .warn(&format!("MQTT connection error: {}. Reconnecting...", e));
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_car_topics() {
        assert_eq!(
            parse_topic("teslamate", "teslamate/cars/1/battery_level"),
            Some((1, "battery_level"))
        );
        assert_eq!(
            parse_topic("teslamate/", "teslamate/cars/12/shift_state"),
            Some((12, "shift_state"))
        );
    }

    #[test]
    fn rejects_foreign_topics() {
        assert_eq!(parse_topic("teslamate", "teslamate/cars/x/odometer"), None);
        assert_eq!(parse_topic("teslamate", "teslamate/cars/1"), None);
        assert_eq!(parse_topic("teslamate", "teslamate/cars/1/"), None);
        assert_eq!(parse_topic("teslamate", "other/cars/1/odometer"), None);
        assert_eq!(parse_topic("teslamate", "teslamate/summary/1/odometer"), None);
    }

    #[test]
    fn decodes_publish_payload() {
        let update = decode_publish("teslamate", "teslamate/cars/3/geofence", b"Home").unwrap();
        assert_eq!(update, FieldUpdate::new(3, "geofence", "Home"));

        let update = decode_publish("teslamate", "teslamate/cars/3/geofence", b"").unwrap();
        assert_eq!(update.value, "");
    }

    #[test]
    fn filter_covers_all_cars() {
        assert_eq!(subscription_filter("teslamate"), "teslamate/cars/#");
    }
}
