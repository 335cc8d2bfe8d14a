//! Notification text
//!
//! Renders finished sessions and status queries into the messages sent to
//! the chat. A session that changed nothing worth reporting renders to `None`.

use crate::places::PlaceResolver;
use crate::units::{
    KM_PER_MILE, average_power_kw, efficiency_wh_per_mile, format_duration, km_to_miles,
};
use crate::vehicle::VehicleSnapshot;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Drives shorter than this many miles are not reported
pub const MIN_DRIVE_MILES: f64 = 0.1;

/// Builds notification messages, resolving place names as needed
#[derive(Clone)]
pub struct Notifier {
    places: PlaceResolver,
    tz: Tz,
}

impl Notifier {
    pub fn new(places: PlaceResolver, tz: Tz) -> Self {
        Self { places, tz }
    }

    fn clock(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format("%H:%M").to_string()
    }

    /// Summary of a finished charge, or `None` when the battery level did not move
    pub async fn format_charging_end(
        &self,
        start: &VehicleSnapshot,
        end: &VehicleSnapshot,
        peak: &VehicleSnapshot,
    ) -> Option<String> {
        let battery = end.battery_level - start.battery_level;
        if battery == 0 {
            return None;
        }

        let elapsed = end.timestamp - start.timestamp;
        let energy = end.charge_energy_added_kwh - start.charge_energy_added_kwh;
        let average = average_power_kw(energy, elapsed);
        let miles_added = km_to_miles(end.rated_range_km - start.rated_range_km);
        let place = escape_html(&self.places.resolve(start).await);

        Some(format!(
            "🔌 Charging finished at {}.\n🕗 {}→{} ({})\n🔋 {}→{}% (+ {}%)\n🚗 {:.0}→{:.0} miles (+ {:.1} miles).\n⚡ + {:.1}kWh\nAverage Power: {:.2}kW (Peak {}kW at {}%)",
            place,
            self.clock(start.timestamp),
            self.clock(end.timestamp),
            format_duration(elapsed),
            start.battery_level,
            end.battery_level,
            battery,
            km_to_miles(start.rated_range_km),
            km_to_miles(end.rated_range_km),
            miles_added,
            end.charge_energy_added_kwh,
            average,
            peak.charger_power_kw,
            peak.battery_level,
        ))
    }

    /// Summary of a finished drive, or `None` when it covered under 0.1 miles
    pub async fn format_driving_end(
        &self,
        start: &VehicleSnapshot,
        end: &VehicleSnapshot,
    ) -> Option<String> {
        let travelled_km = end.odometer_km - start.odometer_km;
        let distance = travelled_km / KM_PER_MILE;
        if distance.is_nan() || distance < MIN_DRIVE_MILES {
            return None;
        }

        let battery = end.battery_level - start.battery_level;
        let rated_used_km = start.rated_range_km - end.rated_range_km;
        let efficiency = efficiency_wh_per_mile(rated_used_km, travelled_km);
        let elapsed = end.timestamp - start.timestamp;
        let from = escape_html(&self.places.resolve(start).await);
        let to = escape_html(&self.places.resolve(end).await);

        Some(format!(
            "🚗 {}->{} <code>{:.1}</code> miles 🌡 {:.1}°C\n🕗 {}→{} ({})\n🔋 {}→{}% ({}%)\n🚘 {:.0}→{:.0} miles ({:.1} miles @ {:.0}Wh/mi)",
            from,
            to,
            distance,
            start.outside_temp_c,
            self.clock(start.timestamp),
            self.clock(end.timestamp),
            format_duration(elapsed),
            start.battery_level,
            end.battery_level,
            battery,
            km_to_miles(start.rated_range_km),
            km_to_miles(end.rated_range_km),
            km_to_miles(rated_used_km),
            efficiency,
        ))
    }
}

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Reply to the `status` command
pub fn format_status(snapshot: &VehicleSnapshot) -> String {
    format!("🔋{}%", snapshot.battery_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, TeslagramError};
    use crate::places::{Place, PlaceLookup};
    use chrono::TimeZone;
    use std::sync::Arc;

    struct NoLookup;

    #[async_trait::async_trait]
    impl PlaceLookup for NoLookup {
        async fn lookup(&self, _latitude: f64, _longitude: f64) -> Result<Place> {
            Err(TeslagramError::network("offline"))
        }
    }

    fn notifier() -> Notifier {
        Notifier::new(PlaceResolver::new(Arc::new(NoLookup)), chrono_tz::UTC)
    }

    #[tokio::test]
    async fn unchanged_battery_suppresses_charge() {
        let start = VehicleSnapshot {
            battery_level: 80,
            charge_energy_added_kwh: 0.0,
            ..Default::default()
        };
        let end = VehicleSnapshot {
            battery_level: 80,
            charge_energy_added_kwh: 0.4,
            rated_range_km: 12.0,
            ..Default::default()
        };
        assert!(notifier().format_charging_end(&start, &end, &start).await.is_none());

        let zero = VehicleSnapshot::default();
        assert!(notifier().format_charging_end(&zero, &zero, &zero).await.is_none());
    }

    #[tokio::test]
    async fn short_drive_is_suppressed() {
        let start = VehicleSnapshot {
            odometer_km: 1000.0,
            ..Default::default()
        };
        let end = VehicleSnapshot {
            odometer_km: 1000.15,
            battery_level: 10,
            ..Default::default()
        };
        assert!(notifier().format_driving_end(&start, &end).await.is_none());
        assert!(notifier().format_driving_end(&start, &start).await.is_none());
    }

    #[tokio::test]
    async fn clock_uses_configured_timezone() {
        let n = Notifier::new(
            PlaceResolver::new(Arc::new(NoLookup)),
            chrono_tz::Europe::London,
        );
        let start = VehicleSnapshot {
            timestamp: Utc.with_ymd_and_hms(2021, 7, 1, 6, 39, 0).unwrap(),
            battery_level: 40,
            ..Default::default()
        };
        let end = VehicleSnapshot {
            timestamp: Utc.with_ymd_and_hms(2021, 7, 1, 7, 0, 0).unwrap(),
            battery_level: 45,
            ..Default::default()
        };
        let text = n.format_charging_end(&start, &end, &end).await.unwrap();
        assert!(text.contains("🕗 07:39→08:00 (21m)"), "{}", text);
        assert!(text.starts_with("🔌 Charging finished at ?."));
    }

    #[tokio::test]
    async fn nan_distance_is_suppressed() {
        let start = VehicleSnapshot {
            odometer_km: f64::NAN,
            ..Default::default()
        };
        let end = VehicleSnapshot {
            odometer_km: 1000.0,
            ..Default::default()
        };
        assert!(notifier().format_driving_end(&start, &end).await.is_none());
    }

    #[tokio::test]
    async fn place_names_are_escaped() {
        let start = VehicleSnapshot {
            geofence: "B&Q <Retail>".to_string(),
            odometer_km: 100.0,
            ..Default::default()
        };
        let end = VehicleSnapshot {
            geofence: "Home".to_string(),
            odometer_km: 110.0,
            battery_level: 5,
            ..Default::default()
        };
        let text = notifier().format_driving_end(&start, &end).await.unwrap();
        assert!(
            text.starts_with("🚗 B&amp;Q &lt;Retail&gt;->Home <code>6.2</code> miles"),
            "{}",
            text
        );

        let text = notifier().format_charging_end(&start, &end, &end).await.unwrap();
        assert!(text.starts_with("🔌 Charging finished at B&amp;Q &lt;Retail&gt;."));
    }

    #[test]
    fn escapes_html_specials() {
        assert_eq!(escape_html("Tom & Jerry's <pub>"), "Tom &amp; Jerry's &lt;pub&gt;");
        assert_eq!(escape_html("Home"), "Home");
    }

    #[test]
    fn status_reports_battery() {
        let s = VehicleSnapshot {
            battery_level: 64,
            ..Default::default()
        };
        assert_eq!(format_status(&s), "🔋64%");
        assert_eq!(format_status(&VehicleSnapshot::default()), "🔋0%");
    }
}
