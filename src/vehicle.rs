//! Vehicle state model
//!
//! A [`Vehicle`] holds the latest known telemetry for one car as a
//! [`VehicleSnapshot`] and owns the session detector for that car. Telemetry
//! fields arrive one at a time; each update overwrites a single field and the
//! snapshot's timestamp.

pub mod fields;

use crate::session::{SessionDetector, SessionEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// TeslaMate car id
pub type VehicleId = u32;

/// One telemetry event as received from the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    pub vehicle_id: VehicleId,
    pub field: String,
    pub value: String,
}

impl FieldUpdate {
    pub fn new(vehicle_id: VehicleId, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            vehicle_id,
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Point-in-time superposition of every field received so far.
///
/// Fields that have never been reported hold their zero value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    /// Time of the last field update
    pub timestamp: DateTime<Utc>,
    /// Geofence name, empty outside any named zone
    pub geofence: String,
    pub charger_power_kw: i32,
    pub charger_voltage: i32,
    pub charger_current: i32,
    pub time_to_full_charge_h: f64,
    /// Energy added during the current charge, kWh
    pub charge_energy_added_kwh: f64,
    pub est_range_km: f64,
    pub rated_range_km: f64,
    pub ideal_range_km: f64,
    /// State of charge, 0-100
    pub battery_level: i32,
    /// `P`, `R`, `N`, `D` or empty
    pub shift_state: String,
    pub odometer_km: f64,
    pub outside_temp_c: f64,
    pub inside_temp_c: f64,
    pub plugged_in: bool,
    pub latitude: f64,
    pub longitude: f64,
}

impl VehicleSnapshot {
    /// Whether the gear selector is in a driving position
    pub fn is_drive_engaged(&self) -> bool {
        matches!(self.shift_state.as_str(), "D" | "R")
    }
}

/// What happened to a single field update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    /// The value was stored
    Applied,
    /// The field is known but the value did not parse; previous value kept
    Malformed,
    /// The field name is not tracked
    Unknown,
}

/// Per-vehicle aggregate: current snapshot, metadata and session state
#[derive(Debug)]
pub struct Vehicle {
    id: VehicleId,
    display_name: String,
    state: String,
    snapshot: VehicleSnapshot,
    detector: SessionDetector,
}

impl Vehicle {
    pub fn new(id: VehicleId) -> Self {
        Self {
            id,
            display_name: String::new(),
            state: String::new(),
            snapshot: VehicleSnapshot::default(),
            detector: SessionDetector::new(),
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// Name given to the car in the Tesla app, if reported
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// TeslaMate state (`online`, `asleep`, `charging`, ...)
    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn snapshot(&self) -> &VehicleSnapshot {
        &self.snapshot
    }

    pub fn detector(&self) -> &SessionDetector {
        &self.detector
    }

    /// Apply one field update, stamping the snapshot with the current time
    pub fn apply_field_update(&mut self, field: &str, raw: &str) -> FieldOutcome {
        self.apply_field_update_at(field, raw, Utc::now())
    }

    /// Apply one field update observed at `at`.
    ///
    /// The timestamp is overwritten whatever the outcome. Malformed values and
    /// unknown fields leave the rest of the snapshot unchanged.
    pub fn apply_field_update_at(&mut self, field: &str, raw: &str, at: DateTime<Utc>) -> FieldOutcome {
        self.snapshot.timestamp = at;
        match field {
            "display_name" => {
                self.display_name = raw.to_string();
                FieldOutcome::Applied
            }
            "state" => {
                self.state = raw.to_string();
                FieldOutcome::Applied
            }
            _ => match fields::setter_for(field) {
                Some(set) if set(&mut self.snapshot, raw) => FieldOutcome::Applied,
                Some(_) => FieldOutcome::Malformed,
                None => FieldOutcome::Unknown,
            },
        }
    }

    /// Run the session detector against the current snapshot
    pub fn evaluate(&mut self) -> Vec<SessionEvent> {
        self.detector.observe(&self.snapshot)
    }
}
