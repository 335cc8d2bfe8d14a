//! Per-vehicle processing
//!
//! [`FleetRouter`] demultiplexes field updates by vehicle id. Every vehicle
//! gets its own [`VehicleActor`] task that owns the vehicle's state and
//! handles its updates strictly in arrival order, so vehicles never share
//! mutable state and a slow place lookup only holds up its own vehicle.

use crate::logging::{LogContext, StructuredLogger, get_logger, get_logger_with_context};
use crate::notify::{Notifier, format_status};
use crate::session::SessionEvent;
use crate::vehicle::{FieldOutcome, FieldUpdate, Vehicle, VehicleId, VehicleSnapshot};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep_until};

/// Message bound for the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub vehicle_id: VehicleId,
    pub text: String,
}

/// Answers `status` for the default vehicle: the first one ever routed
#[derive(Clone, Default)]
pub struct StatusBoard {
    default: Arc<OnceCell<(VehicleId, watch::Receiver<VehicleSnapshot>)>>,
}

impl StatusBoard {
    /// Id of the default vehicle, once one has been seen
    pub fn default_vehicle(&self) -> Option<VehicleId> {
        self.default.get().map(|(id, _)| *id)
    }

    /// Latest snapshot of the default vehicle
    pub fn snapshot(&self) -> Option<VehicleSnapshot> {
        self.default.get().map(|(_, rx)| rx.borrow().clone())
    }

    /// Status text for the default vehicle
    pub fn status_text(&self) -> Option<String> {
        self.snapshot().map(|s| format_status(&s))
    }

    fn offer(&self, id: VehicleId, rx: watch::Receiver<VehicleSnapshot>) {
        let _ = self.default.set((id, rx));
    }
}

/// Serialized processing context for one vehicle
pub struct VehicleActor {
    vehicle: Vehicle,
    inbox: mpsc::UnboundedReceiver<FieldUpdate>,
    snapshot_tx: watch::Sender<VehicleSnapshot>,
    notifier: Arc<Notifier>,
    outbox: mpsc::UnboundedSender<Notification>,
    debounce: Duration,
    logger: StructuredLogger,
}

impl VehicleActor {
    /// Process updates until the router drops the vehicle's sender
    pub async fn run(mut self) {
        let mut deadline: Option<Instant> = None;
        loop {
            let next = match deadline {
                Some(at) => tokio::select! {
                    update = self.inbox.recv() => update,
                    () = sleep_until(at) => {
                        deadline = None;
                        self.evaluate().await;
                        continue;
                    }
                },
                None => self.inbox.recv().await,
            };

            let Some(update) = next else {
                if deadline.is_some() {
                    self.evaluate().await;
                }
                break;
            };

            self.apply(&update);
            if self.debounce.is_zero() {
                self.evaluate().await;
            } else {
                deadline = Some(Instant::now() + self.debounce);
            }
        }
        self.logger.debug("Vehicle actor stopped");
    }

    fn apply(&mut self, update: &FieldUpdate) {
        match self.vehicle.apply_field_update(&update.field, &update.value) {
            FieldOutcome::Applied => self
                .logger
                .trace(&format!("{} = {}", update.field, update.value)),
            FieldOutcome::Malformed => self.logger.trace(&format!(
                "Ignoring malformed {} value {:?}",
                update.field, update.value
            )),
            FieldOutcome::Unknown => self
                .logger
                .trace(&format!("Ignoring untracked field {}", update.field)),
        }
        self.snapshot_tx.send_replace(self.vehicle.snapshot().clone());
    }

    async fn evaluate(&mut self) {
        for event in self.vehicle.evaluate() {
            let logger = self.logger.for_session(event.session_id());
            let text = match &event {
                SessionEvent::ChargingStarted { start, .. } => {
                    logger.info(&format!(
                        "Started charging at {}kW, battery {}%",
                        start.charger_power_kw, start.battery_level
                    ));
                    None
                }
                SessionEvent::ChargingPeak { peak, .. } => {
                    logger.debug(&format!(
                        "New charging peak {}kW at {}%",
                        peak.charger_power_kw, peak.battery_level
                    ));
                    None
                }
                SessionEvent::ChargingFinished {
                    start, end, peak, ..
                } => {
                    logger.info(&format!(
                        "Finished charging, battery {}% -> {}%",
                        start.battery_level, end.battery_level
                    ));
                    self.notifier.format_charging_end(start, end, peak).await
                }
                SessionEvent::DrivingStarted { start, .. } => {
                    logger.info(&format!(
                        "Started driving in {} at {:.1}km",
                        start.shift_state, start.odometer_km
                    ));
                    None
                }
                SessionEvent::DrivingFinished { start, end, .. } => {
                    logger.info(&format!(
                        "Finished driving, odometer {:.1}km -> {:.1}km",
                        start.odometer_km, end.odometer_km
                    ));
                    self.notifier.format_driving_end(start, end).await
                }
            };

            if let Some(text) = text {
                let note = Notification {
                    vehicle_id: self.vehicle.id(),
                    text,
                };
                if self.outbox.send(note).is_err() {
                    logger.warn("Outbox closed, dropping notification");
                }
            } else if event.is_finished() {
                logger.debug("Session too small to report");
            }
        }
    }
}

struct VehicleHandle {
    tx: mpsc::UnboundedSender<FieldUpdate>,
    task: JoinHandle<()>,
}

/// Routes field updates to per-vehicle actors, spawning them on first sight
pub struct FleetRouter {
    vehicles: HashMap<VehicleId, VehicleHandle>,
    notifier: Arc<Notifier>,
    outbox: mpsc::UnboundedSender<Notification>,
    debounce: Duration,
    status: StatusBoard,
    logger: StructuredLogger,
}

impl FleetRouter {
    pub fn new(
        notifier: Arc<Notifier>,
        outbox: mpsc::UnboundedSender<Notification>,
        debounce: Duration,
    ) -> Self {
        Self {
            vehicles: HashMap::new(),
            notifier,
            outbox,
            debounce,
            status: StatusBoard::default(),
            logger: get_logger("router"),
        }
    }

    /// Shared handle for answering `status`
    pub fn status_board(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Vehicles seen so far
    pub fn known_vehicles(&self) -> Vec<VehicleId> {
        let mut ids: Vec<_> = self.vehicles.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Hand an update to its vehicle's actor. Must be called from within a Tokio runtime.
    pub fn route(&mut self, update: FieldUpdate) {
        let id = update.vehicle_id;
        if !self.vehicles.contains_key(&id) {
            self.logger.info(&format!(
                "New vehicle discovered {}: {}={}",
                id, update.field, update.value
            ));
            let handle = self.spawn_actor(id);
            self.vehicles.insert(id, handle);
        }

        if let Some(handle) = self.vehicles.get(&id)
            && handle.tx.send(update).is_err()
        {
            self.logger
                .error(&format!("Actor for vehicle {} has stopped", id));
        }
    }

    fn spawn_actor(&self, id: VehicleId) -> VehicleHandle {
        let (tx, inbox) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(VehicleSnapshot::default());
        self.status.offer(id, snapshot_rx);

        let actor = VehicleActor {
            vehicle: Vehicle::new(id),
            inbox,
            snapshot_tx,
            notifier: Arc::clone(&self.notifier),
            outbox: self.outbox.clone(),
            debounce: self.debounce,
            logger: get_logger_with_context(LogContext::new("vehicle").with_vehicle_id(id)),
        };
        VehicleHandle {
            tx,
            task: tokio::spawn(actor.run()),
        }
    }

    /// Close every actor's inbox and wait for pending evaluations to finish
    pub async fn shutdown(self) {
        let tasks: Vec<_> = self
            .vehicles
            .into_values()
            .map(|VehicleHandle { tx, task }| {
                drop(tx);
                task
            })
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                self.logger
                    .error(&format!("Vehicle actor panicked: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, TeslagramError};
    use crate::places::{Place, PlaceLookup, PlaceResolver};

    struct NoLookup;

    #[async_trait::async_trait]
    impl PlaceLookup for NoLookup {
        async fn lookup(&self, _latitude: f64, _longitude: f64) -> Result<Place> {
            Err(TeslagramError::network("offline"))
        }
    }

    fn router(debounce: Duration) -> (FleetRouter, mpsc::UnboundedReceiver<Notification>) {
        let notifier = Arc::new(Notifier::new(
            PlaceResolver::new(Arc::new(NoLookup)),
            chrono_tz::UTC,
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        (FleetRouter::new(notifier, tx, debounce), rx)
    }

    #[tokio::test]
    async fn first_vehicle_stays_default() {
        let (mut r, _rx) = router(Duration::ZERO);
        let status = r.status_board();
        assert!(status.status_text().is_none());

        r.route(FieldUpdate::new(2, "battery_level", "70"));
        r.route(FieldUpdate::new(1, "battery_level", "30"));
        assert_eq!(status.default_vehicle(), Some(2));
        assert_eq!(r.known_vehicles(), vec![1, 2]);
        r.shutdown().await;
        assert_eq!(status.status_text().as_deref(), Some("🔋70%"));
    }

    #[tokio::test]
    async fn drive_produces_one_notification() {
        let (mut r, mut rx) = router(Duration::ZERO);
        for (field, value) in [
            ("geofence", "Home"),
            ("odometer", "976"),
            ("battery_level", "50"),
            ("rated_battery_range_km", "400"),
            ("shift_state", "D"),
            ("odometer", "986"),
            ("battery_level", "48"),
            ("rated_battery_range_km", "390"),
            ("geofence", "Work"),
            ("shift_state", "P"),
            ("shift_state", "P"),
        ] {
            r.route(FieldUpdate::new(1, field, value));
        }
        r.shutdown().await;

        let note = rx.recv().await.unwrap();
        assert_eq!(note.vehicle_id, 1);
        assert!(note.text.starts_with("🚗 Home->Work <code>6.2</code> miles"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn vehicles_are_tracked_separately() {
        let (mut r, mut rx) = router(Duration::ZERO);
        r.route(FieldUpdate::new(1, "battery_level", "50"));
        r.route(FieldUpdate::new(1, "charger_power", "7"));
        // Zero power on another car must not end car 1's session
        r.route(FieldUpdate::new(2, "charger_power", "0"));
        r.route(FieldUpdate::new(1, "battery_level", "51"));
        r.route(FieldUpdate::new(1, "charger_power", "0"));
        r.shutdown().await;

        let note = rx.recv().await.unwrap();
        assert_eq!(note.vehicle_id, 1);
        assert!(note.text.contains("50→51% (+ 1%)"));
        assert!(rx.recv().await.is_none());
    }

    struct HungLookup;

    #[async_trait::async_trait]
    impl PlaceLookup for HungLookup {
        async fn lookup(&self, _latitude: f64, _longitude: f64) -> Result<Place> {
            std::future::pending().await
        }
    }

    fn drive(r: &mut FleetRouter, id: VehicleId, from: &str, to: &str) {
        for (field, value) in [
            ("geofence", from),
            ("odometer", "976"),
            ("shift_state", "D"),
            ("odometer", "986"),
            ("geofence", to),
            ("shift_state", "P"),
        ] {
            r.route(FieldUpdate::new(id, field, value));
        }
    }

    #[tokio::test]
    async fn hung_lookup_only_stalls_its_own_vehicle() {
        let notifier = Arc::new(Notifier::new(
            PlaceResolver::new(Arc::new(HungLookup)),
            chrono_tz::UTC,
        ));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut r = FleetRouter::new(notifier, tx, Duration::ZERO);

        // No geofence on either end, so vehicle 1 waits on the lookup forever
        drive(&mut r, 1, "", "");
        drive(&mut r, 2, "Home", "Work");

        let note = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("vehicle 2 was held up by vehicle 1")
            .unwrap();
        assert_eq!(note.vehicle_id, 2);
        assert!(note.text.starts_with("🚗 Home->Work <code>6.2</code> miles"));

        // Vehicle 1 keeps accepting updates while its lookup is pending
        r.route(FieldUpdate::new(2, "battery_level", "40"));
        r.route(FieldUpdate::new(1, "battery_level", "41"));
        assert_eq!(r.known_vehicles(), vec![1, 2]);
        assert!(
            tokio::time::timeout(Duration::from_millis(100), rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_coalesces_bursts() {
        let (mut r, mut rx) = router(Duration::from_secs(1));
        // Power blip that starts and ends within one burst is never seen
        r.route(FieldUpdate::new(1, "battery_level", "50"));
        r.route(FieldUpdate::new(1, "charger_power", "7"));
        r.route(FieldUpdate::new(1, "charger_power", "0"));
        tokio::time::sleep(Duration::from_secs(2)).await;

        r.route(FieldUpdate::new(1, "charger_power", "7"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        r.route(FieldUpdate::new(1, "battery_level", "60"));
        r.route(FieldUpdate::new(1, "charger_power", "0"));
        r.shutdown().await;

        let note = rx.recv().await.unwrap();
        assert!(note.text.contains("50→60% (+ 10%)"));
        assert!(rx.recv().await.is_none());
    }
}
