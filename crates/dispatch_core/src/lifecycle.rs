//! Lifecycle controller: orchestrates the request state machine.
//!
//! `Open → Assigned → Completed`, `Open → Expired`, and the driver-cancel
//! loop `Assigned → Open`. Every transition goes through the request
//! store's per-entry lock and triggers a notification fanout; assignment
//! and completion additionally write through the persistence gateway.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{DispatchConfig, SelectionStrictness};
use crate::error::DispatchError;
use crate::events::DriverEvent;
use crate::fanout::NotificationFanout;
use crate::geo::GeoLocator;
use crate::persistence::{PersistedRide, PersistenceGateway, PointsLedgerEntry};
use crate::request::{DriverId, GeoPoint, RequestId, RequestStatus, RiderId, RideRequest};
use crate::selection::select_candidates;
use crate::store::{ClaimLoss, ClaimOutcome, ReopenOutcome, RequestStore};

/// Response to a successful request creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateResponse {
    pub request_id: RequestId,
    pub candidates: Vec<DriverId>,
}

/// Why an accept was rejected. A normal branch for callers, never a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyAssigned,
    Expired,
    Completed,
    Cancelled,
    NotACandidate,
    /// Strict-mode only: the driver already holds another live assignment.
    DriverBusy,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::AlreadyAssigned => "already assigned",
            RejectReason::Expired => "expired",
            RejectReason::Completed => "already completed",
            RejectReason::Cancelled => "cancelled",
            RejectReason::NotACandidate => "not a candidate for this request",
            RejectReason::DriverBusy => "driver busy on another request",
        };
        f.write_str(s)
    }
}

impl From<ClaimLoss> for RejectReason {
    fn from(loss: ClaimLoss) -> Self {
        match loss {
            ClaimLoss::NotOpen(RequestStatus::Assigned) => RejectReason::AlreadyAssigned,
            ClaimLoss::NotOpen(RequestStatus::Expired) => RejectReason::Expired,
            ClaimLoss::NotOpen(RequestStatus::Completed) => RejectReason::Completed,
            ClaimLoss::NotOpen(RequestStatus::Cancelled | RequestStatus::Open) => {
                RejectReason::Cancelled
            }
            ClaimLoss::NotACandidate => RejectReason::NotACandidate,
        }
    }
}

/// Outcome of an accept attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    Rejected { reason: RejectReason },
}

impl AcceptOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AcceptOutcome::Accepted)
    }
}

/// Outcome of a driver-cancel attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Reopened,
    /// The request was not assigned to this driver.
    NotAssigned,
}

/// Outcome of a completion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteOutcome {
    Completed,
    /// The durable ride record is already completed; no second ledger entry.
    AlreadyCompleted,
}

/// The dispatch engine. One instance serves many concurrent operations;
/// per-request linearization lives in the [`RequestStore`], everything
/// else (selection, fanout, persistence) runs outside the entry locks.
pub struct DispatchEngine {
    store: Arc<RequestStore>,
    geo: Arc<dyn GeoLocator>,
    persistence: Arc<dyn PersistenceGateway>,
    fanout: Arc<NotificationFanout>,
    config: DispatchConfig,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<RequestStore>,
        geo: Arc<dyn GeoLocator>,
        persistence: Arc<dyn PersistenceGateway>,
        fanout: Arc<NotificationFanout>,
        config: DispatchConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            geo,
            persistence,
            fanout,
            config,
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Open a new ride request: select candidates, store it `Open`, offer it
    /// to every candidate, and arm the one-shot expiration timer.
    pub async fn create_request(
        self: &Arc<Self>,
        rider: RiderId,
        pickup: GeoPoint,
    ) -> Result<CreateResponse, DispatchError> {
        let candidates =
            select_candidates(self.geo.as_ref(), &self.store, pickup, &self.config.selection)
                .await?;

        let request = RideRequest::new(rider, pickup, candidates.clone());
        let request_id = request.id;
        self.store.insert(request);
        info!(%request_id, candidates = candidates.len(), "request opened");

        let offer = DriverEvent::Offer {
            ride_id: request_id,
            lat: pickup.lat,
            lon: pickup.lon,
        };
        self.fanout.notify_all(&candidates, &offer).await;

        // One-shot timer; not cancellable once armed. Firing after the
        // request left Open is a no-op inside handle_timeout.
        let engine = Arc::clone(self);
        let ttl = self.config.expiration.offer_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            engine.handle_timeout(request_id).await;
        });

        Ok(CreateResponse {
            request_id,
            candidates,
        })
    }

    /// Driver accepts an offer. Exactly one accept per `Open` period wins;
    /// the winner's assignment is persisted and the other candidates are
    /// told the request is filled.
    pub async fn accept_ride(
        &self,
        driver: &DriverId,
        request_id: RequestId,
    ) -> Result<AcceptOutcome, DispatchError> {
        if self.config.selection.strictness == SelectionStrictness::RecheckOnClaim
            && self.store.driver_assigned_elsewhere(driver, request_id)
        {
            return Ok(AcceptOutcome::Rejected {
                reason: RejectReason::DriverBusy,
            });
        }

        let losers = match self.store.try_claim(request_id, driver)? {
            ClaimOutcome::Won { losers } => losers,
            ClaimOutcome::Lost(loss) => {
                return Ok(AcceptOutcome::Rejected {
                    reason: loss.into(),
                })
            }
        };
        info!(%request_id, %driver, "request assigned");

        let filled = DriverEvent::Filled {
            ride_id: request_id,
        };
        self.fanout.notify_all(&losers, &filled).await;

        // The durable assignment record is load-bearing for billing and
        // points; a persistence failure is surfaced, not swallowed.
        let snapshot = self
            .store
            .get(request_id)
            .ok_or(DispatchError::NotFound(request_id))?;
        self.persistence
            .insert_ride(&PersistedRide {
                id: request_id,
                rider: snapshot.rider,
                assigned_driver: driver.clone(),
                status: RequestStatus::Assigned,
                pickup: snapshot.pickup,
                created_at: snapshot.created_at,
            })
            .await?;

        Ok(AcceptOutcome::Accepted)
    }

    /// The assigned driver backs out: the request reopens, the driver is
    /// dropped from the candidate list, and the rest are reoffered. The
    /// expiration timer is not re-armed; if it already fired, the reopened
    /// request waits indefinitely for the next accept.
    pub async fn driver_cancel(
        &self,
        driver: &DriverId,
        request_id: RequestId,
    ) -> Result<CancelOutcome, DispatchError> {
        let remaining = match self.store.reopen(request_id, driver)? {
            ReopenOutcome::Reopened { remaining } => remaining,
            ReopenOutcome::NotAssigned => return Ok(CancelOutcome::NotAssigned),
        };
        info!(%request_id, %driver, "assignment cancelled, request reopened");

        let reoffer = DriverEvent::Reoffer {
            ride_id: request_id,
        };
        self.fanout.notify_all(&remaining, &reoffer).await;
        Ok(CancelOutcome::Reopened)
    }

    /// Complete a ride against its durable record: mark it completed and
    /// append exactly one points-ledger entry for the assigned puller.
    /// A second completion is rejected rather than double-crediting.
    pub async fn complete_ride(
        &self,
        request_id: RequestId,
    ) -> Result<CompleteOutcome, DispatchError> {
        let ride = self
            .persistence
            .fetch_ride(request_id)
            .await?
            .ok_or(DispatchError::NotFound(request_id))?;
        if ride.status == RequestStatus::Completed {
            return Ok(CompleteOutcome::AlreadyCompleted);
        }

        self.store.complete(request_id);
        self.persistence
            .update_ride_status(request_id, RequestStatus::Completed)
            .await?;
        self.persistence
            .append_points(PointsLedgerEntry {
                puller: ride.assigned_driver.clone(),
                ride_id: request_id,
                points: self.config.points_per_ride,
            })
            .await?;

        info!(%request_id, puller = %ride.assigned_driver, "ride completed");
        Ok(CompleteOutcome::Completed)
    }

    /// Upsert a driver's position in the geo locator and mark them online.
    pub async fn update_driver_location(
        &self,
        driver: &DriverId,
        point: GeoPoint,
    ) -> Result<(), DispatchError> {
        self.geo.set_driver_location(driver, point).await
    }

    /// Timer callback: expire the request if it is still `Open`, otherwise
    /// do nothing. Idempotent and safe to invoke at any time.
    pub async fn handle_timeout(&self, request_id: RequestId) {
        match self.store.expire(request_id) {
            Ok(Some(candidates)) => {
                info!(%request_id, "request expired unclaimed");
                let expired = DriverEvent::Expired {
                    ride_id: request_id,
                };
                self.fanout.notify_all(&candidates, &expired).await;
            }
            Ok(None) => {
                debug!(%request_id, "expiration timer fired after request left Open");
            }
            Err(_) => {
                debug!(%request_id, "expiration timer fired for unknown request");
            }
        }
    }
}
