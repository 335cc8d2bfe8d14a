//! Unit conversions and derived session metrics
//!
//! Ranges and odometer readings arrive in kilometres; notifications report
//! miles. Energy use on a drive is derived from rated-range depletion rather
//! than from the charger's energy counter.

use chrono::TimeDelta;

/// Kilometres of rated range per kWh of usable battery
/// (61% ≈ 334.87 km of a 73.5 kWh usable pack).
pub const RATED_KM_PER_KWH: f64 = 7.47;

/// Kilometres per mile, as used for every distance in the notifications
pub const KM_PER_MILE: f64 = 1.61;

/// Convert kilometres to miles
pub fn km_to_miles(km: f64) -> f64 {
    km / KM_PER_MILE
}

/// Energy represented by an amount of rated range, in kWh
pub fn rated_km_to_kwh(rated_km: f64) -> f64 {
    rated_km / RATED_KM_PER_KWH
}

/// Watt-hours per mile between two readings.
///
/// `rated_used_km` is the rated range consumed, `odometer_delta_km` the distance
/// travelled. A zero distance yields a non-finite value; callers suppress
/// such drives before formatting.
pub fn efficiency_wh_per_mile(rated_used_km: f64, odometer_delta_km: f64) -> f64 {
    rated_km_to_kwh(rated_used_km) * 1000.0 / odometer_delta_km * KM_PER_MILE
}

/// Average charging power in kW over `elapsed`
pub fn average_power_kw(energy_added_kwh: f64, elapsed: TimeDelta) -> f64 {
    let hours = elapsed.num_milliseconds() as f64 / 3_600_000.0;
    energy_added_kwh / hours
}

/// Whole minutes in `elapsed`, rounded half away from zero; negative spans clamp to zero
pub fn rounded_minutes(elapsed: TimeDelta) -> u64 {
    let ms = elapsed.num_milliseconds();
    if ms <= 0 {
        return 0;
    }
    ((ms + 30_000) / 60_000) as u64
}

/// Render a duration as `"Xm"` below an hour and `"XhYm"` from an hour on
pub fn format_duration(elapsed: TimeDelta) -> String {
    let minutes = rounded_minutes(elapsed);
    if minutes < 60 {
        format!("{}m", minutes)
    } else {
        format!("{}h{}m", minutes / 60, minutes % 60)
    }
}
