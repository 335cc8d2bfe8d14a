//! Field table for TeslaMate telemetry topics
//!
//! Each recognised field name maps to a typed setter on [`VehicleSnapshot`].
//! Setters return `false` when the raw value does not parse; the snapshot is
//! left untouched in that case.

use super::VehicleSnapshot;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::str::FromStr;

/// Typed setter: parses `raw` into one snapshot field
pub type FieldSetter = fn(&mut VehicleSnapshot, &str) -> bool;

/// One row of the field table
pub struct FieldSpec {
    pub name: &'static str,
    pub apply: FieldSetter,
}

fn parse_into<T: FromStr>(raw: &str, slot: &mut T) -> bool {
    match raw.parse::<T>() {
        Ok(value) => {
            *slot = value;
            true
        }
        Err(_) => false,
    }
}

/// All snapshot fields understood by the tracker
pub const SNAPSHOT_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "shift_state",
        apply: |s, v| {
            s.shift_state = v.to_string();
            true
        },
    },
    FieldSpec {
        name: "geofence",
        apply: |s, v| {
            s.geofence = v.to_string();
            true
        },
    },
    FieldSpec {
        name: "charger_power",
        apply: |s, v| parse_into(v, &mut s.charger_power_kw),
    },
    FieldSpec {
        name: "charger_voltage",
        apply: |s, v| parse_into(v, &mut s.charger_voltage),
    },
    FieldSpec {
        name: "charger_actual_current",
        apply: |s, v| parse_into(v, &mut s.charger_current),
    },
    FieldSpec {
        name: "time_to_full_charge",
        apply: |s, v| parse_into(v, &mut s.time_to_full_charge_h),
    },
    FieldSpec {
        name: "charge_energy_added",
        apply: |s, v| parse_into(v, &mut s.charge_energy_added_kwh),
    },
    FieldSpec {
        name: "est_battery_range_km",
        apply: |s, v| parse_into(v, &mut s.est_range_km),
    },
    FieldSpec {
        name: "rated_battery_range_km",
        apply: |s, v| parse_into(v, &mut s.rated_range_km),
    },
    FieldSpec {
        name: "ideal_battery_range_km",
        apply: |s, v| parse_into(v, &mut s.ideal_range_km),
    },
    FieldSpec {
        name: "battery_level",
        apply: |s, v| parse_into(v, &mut s.battery_level),
    },
    FieldSpec {
        name: "odometer",
        apply: |s, v| parse_into(v, &mut s.odometer_km),
    },
    FieldSpec {
        name: "outside_temp",
        apply: |s, v| parse_into(v, &mut s.outside_temp_c),
    },
    FieldSpec {
        name: "inside_temp",
        apply: |s, v| parse_into(v, &mut s.inside_temp_c),
    },
    FieldSpec {
        name: "plugged_in",
        apply: |s, v| {
            s.plugged_in = v == "true";
            true
        },
    },
    FieldSpec {
        name: "latitude",
        apply: |s, v| parse_into(v, &mut s.latitude),
    },
    FieldSpec {
        name: "longitude",
        apply: |s, v| parse_into(v, &mut s.longitude),
    },
];

static BY_NAME: Lazy<HashMap<&'static str, FieldSetter>> = Lazy::new(|| {
    SNAPSHOT_FIELDS
        .iter()
        .map(|spec| (spec.name, spec.apply))
        .collect()
});

/// Setter for a field name, if the field is part of the snapshot
pub fn setter_for(name: &str) -> Option<FieldSetter> {
    BY_NAME.get(name).copied()
}
