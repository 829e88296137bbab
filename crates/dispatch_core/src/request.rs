use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a ride request, generated at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque rider identifier, issued by the surrounding service layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiderId(pub String);

impl RiderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for RiderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque driver (rickshaw puller) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriverId(pub String);

impl DriverId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Request lifecycle status.
///
/// `Open → Assigned → Completed` is the happy path; `Open → Expired` is the
/// timeout path; `Assigned → Open` loops back on a driver cancel. `Cancelled`
/// is reserved for rider-side cancellation, which the surrounding service
/// layer may drive; the engine itself never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Open,
    Assigned,
    Completed,
    Expired,
    Cancelled,
}

impl RequestStatus {
    /// Terminal statuses never leave the engine again; `Cancelled` is not
    /// terminal because a driver cancel loops the request back to `Open`.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Expired)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Open => "OPEN",
            RequestStatus::Assigned => "ASSIGNED",
            RequestStatus::Completed => "COMPLETED",
            RequestStatus::Expired => "EXPIRED",
            RequestStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Live state of a ride request. Owned by the lifecycle controller and
/// stored in the [`RequestStore`](crate::store::RequestStore); all mutation
/// goes through the store's per-request lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: RequestId,
    pub rider: RiderId,
    pub pickup: GeoPoint,
    pub status: RequestStatus,
    /// Drivers eligible to accept, nearest first. Fixed at creation except
    /// that a cancelling driver is removed.
    pub candidates: Vec<DriverId>,
    /// Set exactly once per `Assigned` period; cleared when a driver cancel
    /// reopens the request.
    pub assigned_driver: Option<DriverId>,
    pub created_at: DateTime<Utc>,
}

impl RideRequest {
    pub fn new(rider: RiderId, pickup: GeoPoint, candidates: Vec<DriverId>) -> Self {
        Self {
            id: RequestId::new(),
            rider,
            pickup,
            status: RequestStatus::Open,
            candidates,
            assigned_driver: None,
            created_at: Utc::now(),
        }
    }

    /// Structural invariant: a driver is assigned iff the request is
    /// `Assigned`, and the assignee is always one of the candidates.
    pub fn invariant_holds(&self) -> bool {
        match (&self.assigned_driver, self.status) {
            (Some(driver), RequestStatus::Assigned) => self.candidates.contains(driver),
            (None, RequestStatus::Assigned) => false,
            (Some(_), _) => false,
            (None, _) => true,
        }
    }
}
