//! Live request store and claim arbitration.
//!
//! The store is the single source of truth for in-flight requests and the
//! one mandatory point of atomicity: every mutation of a request happens
//! under that request's own lock, so operations on different request ids
//! proceed in parallel while claims against one id are linearized.
//!
//! No external I/O happens under an entry lock; the lifecycle controller
//! notifies and persists only after the lock is released.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;

use crate::error::DispatchError;
use crate::request::{DriverId, RequestId, RequestStatus, RideRequest};

/// Result of a claim attempt. Exactly one claim per `Open` period wins.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// This call moved the request `Open → Assigned`. Carries the other
    /// candidates so the caller can notify them the request is filled.
    Won { losers: Vec<DriverId> },
    Lost(ClaimLoss),
}

/// Why a claim did not win. A normal outcome, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimLoss {
    /// The request already left `Open` (another winner, expiry, ...).
    NotOpen(RequestStatus),
    /// The claimant was never offered this request.
    NotACandidate,
}

/// Result of a driver-cancel attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReopenOutcome {
    /// The request is `Open` again; carries the remaining candidates.
    Reopened { remaining: Vec<DriverId> },
    /// The request was not `Assigned` to this driver.
    NotAssigned,
}

#[derive(Debug, Default)]
pub struct RequestStore {
    requests: DashMap<RequestId, Arc<Mutex<RideRequest>>>,
}

/// Lock an entry, recovering from a poisoned mutex. Transitions are single
/// field writes, so a guard recovered after a panic is still consistent.
fn lock_entry(entry: &Mutex<RideRequest>) -> MutexGuard<'_, RideRequest> {
    match entry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request: RideRequest) {
        debug_assert!(request.invariant_holds(), "request invariant");
        self.requests
            .insert(request.id, Arc::new(Mutex::new(request)));
    }

    /// Clone-out snapshot of a request's current state.
    pub fn get(&self, id: RequestId) -> Option<RideRequest> {
        let entry = self.entry(id)?;
        let request = lock_entry(&entry);
        Some(request.clone())
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn entry(&self, id: RequestId) -> Option<Arc<Mutex<RideRequest>>> {
        // Clone the Arc so the shard guard is released before locking.
        self.requests.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    fn entry_or_not_found(
        &self,
        id: RequestId,
    ) -> Result<Arc<Mutex<RideRequest>>, DispatchError> {
        self.entry(id).ok_or(DispatchError::NotFound(id))
    }

    /// Atomic claim: move the request `Open → Assigned` iff it is still
    /// `Open` and the claimant is a candidate. The check and the write
    /// happen under the entry lock in one step, with no await inside.
    pub fn try_claim(
        &self,
        id: RequestId,
        driver: &DriverId,
    ) -> Result<ClaimOutcome, DispatchError> {
        let entry = self.entry_or_not_found(id)?;
        let mut request = lock_entry(&entry);

        if request.status != RequestStatus::Open {
            return Ok(ClaimOutcome::Lost(ClaimLoss::NotOpen(request.status)));
        }
        if !request.candidates.contains(driver) {
            return Ok(ClaimOutcome::Lost(ClaimLoss::NotACandidate));
        }

        request.status = RequestStatus::Assigned;
        request.assigned_driver = Some(driver.clone());
        debug_assert!(request.invariant_holds(), "request invariant");

        let losers = request
            .candidates
            .iter()
            .filter(|candidate| *candidate != driver)
            .cloned()
            .collect();
        Ok(ClaimOutcome::Won { losers })
    }

    /// Driver cancel: `Assigned → Open`, valid only for the assigned driver.
    /// The cancelling driver is removed from the candidate list and does not
    /// see the reoffer.
    pub fn reopen(
        &self,
        id: RequestId,
        driver: &DriverId,
    ) -> Result<ReopenOutcome, DispatchError> {
        let entry = self.entry_or_not_found(id)?;
        let mut request = lock_entry(&entry);

        if request.status != RequestStatus::Assigned
            || request.assigned_driver.as_ref() != Some(driver)
        {
            return Ok(ReopenOutcome::NotAssigned);
        }

        request.status = RequestStatus::Open;
        request.assigned_driver = None;
        request.candidates.retain(|candidate| candidate != driver);
        debug_assert!(request.invariant_holds(), "request invariant");

        Ok(ReopenOutcome::Reopened {
            remaining: request.candidates.clone(),
        })
    }

    /// Timer-driven expiry: `Open → Expired`. Returns the candidates to
    /// notify, or `None` when the request already left `Open` (no-op).
    pub fn expire(&self, id: RequestId) -> Result<Option<Vec<DriverId>>, DispatchError> {
        let entry = self.entry_or_not_found(id)?;
        let mut request = lock_entry(&entry);

        if request.status != RequestStatus::Open {
            return Ok(None);
        }
        request.status = RequestStatus::Expired;
        debug_assert!(request.invariant_holds(), "request invariant");
        Ok(Some(request.candidates.clone()))
    }

    /// Mark the live request `Completed` and release the driver. Returns the
    /// prior status; absent live entries are tolerated since completion is
    /// driven by the durable ride record.
    pub fn complete(&self, id: RequestId) -> Option<RequestStatus> {
        let entry = self.entry(id)?;
        let mut request = lock_entry(&entry);
        let previous = request.status;
        request.status = RequestStatus::Completed;
        request.assigned_driver = None;
        debug_assert!(request.invariant_holds(), "request invariant");
        Some(previous)
    }

    /// Drivers currently offered or driving on any live request. Best-effort
    /// scan: not atomic with concurrent claims on other requests.
    pub fn busy_drivers(&self) -> HashSet<DriverId> {
        let mut busy = HashSet::new();
        for entry in self.requests.iter() {
            let request = lock_entry(entry.value());
            if matches!(
                request.status,
                RequestStatus::Open | RequestStatus::Assigned
            ) {
                busy.extend(request.candidates.iter().cloned());
                if let Some(driver) = &request.assigned_driver {
                    busy.insert(driver.clone());
                }
            }
        }
        busy
    }

    /// Whether a driver holds an assignment on a live request other than
    /// `excluding`. Used by the strict claim recheck; must be called without
    /// any entry lock held.
    pub fn driver_assigned_elsewhere(&self, driver: &DriverId, excluding: RequestId) -> bool {
        self.requests.iter().any(|entry| {
            if *entry.key() == excluding {
                return false;
            }
            let request = lock_entry(entry.value());
            request.status == RequestStatus::Assigned
                && request.assigned_driver.as_ref() == Some(driver)
        })
    }
}
