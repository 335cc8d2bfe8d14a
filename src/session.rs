//! Charging and driving session detection
//!
//! Each vehicle runs two independent state machines over its snapshots. A
//! session's data (start snapshot, and for charging the peak snapshot) lives
//! only inside the `Active` state and is handed out when the session ends.

use crate::vehicle::VehicleSnapshot;
use uuid::Uuid;

/// Charging axis state
#[derive(Debug, Clone, Default)]
pub enum ChargingState {
    #[default]
    Idle,
    Active {
        session_id: String,
        start: VehicleSnapshot,
        /// Highest charger power seen so far in this session
        peak: VehicleSnapshot,
    },
}

/// Driving axis state
#[derive(Debug, Clone, Default)]
pub enum DrivingState {
    #[default]
    Idle,
    Active {
        session_id: String,
        start: VehicleSnapshot,
    },
}

/// Transition reported by [`SessionDetector::observe`]
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ChargingStarted {
        session_id: String,
        start: VehicleSnapshot,
    },
    ChargingPeak {
        session_id: String,
        peak: VehicleSnapshot,
    },
    ChargingFinished {
        session_id: String,
        start: VehicleSnapshot,
        end: VehicleSnapshot,
        peak: VehicleSnapshot,
    },
    DrivingStarted {
        session_id: String,
        start: VehicleSnapshot,
    },
    DrivingFinished {
        session_id: String,
        start: VehicleSnapshot,
        end: VehicleSnapshot,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::ChargingStarted { session_id, .. }
            | Self::ChargingPeak { session_id, .. }
            | Self::ChargingFinished { session_id, .. }
            | Self::DrivingStarted { session_id, .. }
            | Self::DrivingFinished { session_id, .. } => session_id,
        }
    }

    /// Whether this event closes a session
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::ChargingFinished { .. } | Self::DrivingFinished { .. }
        )
    }
}

/// Per-vehicle session state machine
#[derive(Debug, Clone, Default)]
pub struct SessionDetector {
    charging: ChargingState,
    driving: DrivingState,
}

impl SessionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn charging(&self) -> &ChargingState {
        &self.charging
    }

    pub fn driving(&self) -> &DrivingState {
        &self.driving
    }

    pub fn is_charging(&self) -> bool {
        matches!(self.charging, ChargingState::Active { .. })
    }

    pub fn is_driving(&self) -> bool {
        matches!(self.driving, DrivingState::Active { .. })
    }

    /// Evaluate both axes against the latest snapshot.
    ///
    /// At most one charging event and one driving event are produced per call.
    pub fn observe(&mut self, current: &VehicleSnapshot) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        events.extend(self.observe_charging(current));
        events.extend(self.observe_driving(current));
        events
    }

    fn observe_charging(&mut self, current: &VehicleSnapshot) -> Option<SessionEvent> {
        let power = current.charger_power_kw;
        match &mut self.charging {
            ChargingState::Active { .. } if power == 0 => {
                let ChargingState::Active {
                    session_id,
                    start,
                    peak,
                } = std::mem::take(&mut self.charging)
                else {
                    return None;
                };
                Some(SessionEvent::ChargingFinished {
                    session_id,
                    start,
                    end: current.clone(),
                    peak,
                })
            }
            ChargingState::Active {
                session_id, peak, ..
            } if power > peak.charger_power_kw => {
                *peak = current.clone();
                Some(SessionEvent::ChargingPeak {
                    session_id: session_id.clone(),
                    peak: current.clone(),
                })
            }
            ChargingState::Active { .. } => None,
            ChargingState::Idle if power > 0 => {
                let session_id = Uuid::new_v4().to_string();
                self.charging = ChargingState::Active {
                    session_id: session_id.clone(),
                    start: current.clone(),
                    peak: current.clone(),
                };
                Some(SessionEvent::ChargingStarted {
                    session_id,
                    start: current.clone(),
                })
            }
            ChargingState::Idle => None,
        }
    }

    fn observe_driving(&mut self, current: &VehicleSnapshot) -> Option<SessionEvent> {
        let engaged = current.is_drive_engaged();
        match &self.driving {
            DrivingState::Idle if engaged => {
                let session_id = Uuid::new_v4().to_string();
                self.driving = DrivingState::Active {
                    session_id: session_id.clone(),
                    start: current.clone(),
                };
                Some(SessionEvent::DrivingStarted {
                    session_id,
                    start: current.clone(),
                })
            }
            DrivingState::Active { .. } if !engaged => {
                let DrivingState::Active { session_id, start } = std::mem::take(&mut self.driving)
                else {
                    return None;
                };
                Some(SessionEvent::DrivingFinished {
                    session_id,
                    start,
                    end: current.clone(),
                })
            }
            _ => None,
        }
    }
}
