//! Persistence gateway boundary: durable ride records and the points ledger.
//!
//! The engine writes a ride record once on assignment and updates it once on
//! completion; ledger entries are append-only. Failures here are surfaced to
//! the caller — the assignment record is load-bearing for billing/points.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::request::{DriverId, GeoPoint, RequestId, RequestStatus, RiderId};

/// Durable ride record, written when a request is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRide {
    pub id: RequestId,
    pub rider: RiderId,
    pub assigned_driver: DriverId,
    pub status: RequestStatus,
    pub pickup: GeoPoint,
    pub created_at: DateTime<Utc>,
}

/// Append-only points ledger entry, recorded at completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsLedgerEntry {
    pub puller: DriverId,
    pub ride_id: RequestId,
    pub points: i64,
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn insert_ride(&self, ride: &PersistedRide) -> Result<(), DispatchError>;

    async fn update_ride_status(
        &self,
        id: RequestId,
        status: RequestStatus,
    ) -> Result<(), DispatchError>;

    async fn fetch_ride(&self, id: RequestId) -> Result<Option<PersistedRide>, DispatchError>;

    async fn append_points(&self, entry: PointsLedgerEntry) -> Result<(), DispatchError>;
}
