//! In-memory collaborators for tests: a recording notification channel and
//! an in-memory persistence gateway, both with switchable failure modes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::DispatchError;
use crate::events::DriverEvent;
use crate::fanout::NotificationChannel;
use crate::persistence::{PersistedRide, PersistenceGateway, PointsLedgerEntry};
use crate::request::{DriverId, RequestId, RequestStatus};

/// Notification channel that records every delivery, with an optional
/// failure switch for best-effort fanout tests.
#[derive(Default)]
pub struct RecordingChannel {
    delivered: Mutex<Vec<(DriverId, DriverEvent)>>,
    failing: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn deliveries(&self) -> Vec<(DriverId, DriverEvent)> {
        self.delivered.lock().expect("deliveries lock").clone()
    }

    pub fn events_for(&self, driver: &DriverId) -> Vec<DriverEvent> {
        self.deliveries()
            .into_iter()
            .filter_map(|(target, event)| (target == *driver).then_some(event))
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, target: &DriverId, event: &DriverEvent) -> anyhow::Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            anyhow::bail!("channel down");
        }
        self.delivered
            .lock()
            .expect("deliveries lock")
            .push((target.clone(), event.clone()));
        Ok(())
    }
}

/// Notification channel that always fails; pairs with [`RecordingChannel`]
/// to verify one channel's failure never blocks another.
#[derive(Default)]
pub struct FailingChannel;

#[async_trait]
impl NotificationChannel for FailingChannel {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn publish(&self, _target: &DriverId, _event: &DriverEvent) -> anyhow::Result<()> {
        anyhow::bail!("channel permanently down")
    }
}

/// In-memory persistence gateway with a switchable write-failure mode.
#[derive(Default)]
pub struct InMemoryPersistence {
    rides: DashMap<RequestId, PersistedRide>,
    ledger: Mutex<Vec<PointsLedgerEntry>>,
    fail_writes: AtomicBool,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn ride(&self, id: RequestId) -> Option<PersistedRide> {
        self.rides.get(&id).map(|entry| entry.value().clone())
    }

    pub fn ledger_entries(&self) -> Vec<PointsLedgerEntry> {
        self.ledger.lock().expect("ledger lock").clone()
    }

    fn check_writes(&self) -> Result<(), DispatchError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(DispatchError::Upstream(anyhow::anyhow!(
                "persistence gateway down"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryPersistence {
    async fn insert_ride(&self, ride: &PersistedRide) -> Result<(), DispatchError> {
        self.check_writes()?;
        self.rides.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn update_ride_status(
        &self,
        id: RequestId,
        status: RequestStatus,
    ) -> Result<(), DispatchError> {
        self.check_writes()?;
        let mut ride = self
            .rides
            .get_mut(&id)
            .ok_or(DispatchError::NotFound(id))?;
        ride.status = status;
        Ok(())
    }

    async fn fetch_ride(&self, id: RequestId) -> Result<Option<PersistedRide>, DispatchError> {
        Ok(self.rides.get(&id).map(|entry| entry.value().clone()))
    }

    async fn append_points(&self, entry: PointsLedgerEntry) -> Result<(), DispatchError> {
        self.check_writes()?;
        self.ledger.lock().expect("ledger lock").push(entry);
        Ok(())
    }
}
