//! Geo locator boundary: driver positions and nearest-driver queries.
//!
//! The engine only consumes the [`GeoLocator`] trait; [`HaversineGeoIndex`]
//! is the in-process implementation, a haversine nearest-scan over current
//! driver positions with an online flag per driver.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::DispatchError;
use crate::request::{DriverId, GeoPoint};

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points, in meters.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Geo locator consumed by candidate selection and location updates.
#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Nearest online drivers within `radius_meters` of `origin`, paired
    /// with their distance in meters, nearest first, at most `count`.
    async fn nearest_drivers(
        &self,
        origin: GeoPoint,
        radius_meters: f64,
        count: usize,
    ) -> Result<Vec<(DriverId, f64)>, DispatchError>;

    /// Upsert a driver's current position and mark them online.
    async fn set_driver_location(
        &self,
        driver: &DriverId,
        point: GeoPoint,
    ) -> Result<(), DispatchError>;

    /// Flip a driver's online flag without moving them.
    async fn set_driver_online(
        &self,
        driver: &DriverId,
        online: bool,
    ) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone, Copy)]
struct DriverPosition {
    point: GeoPoint,
    online: bool,
}

/// In-process geo index: a concurrent map of driver positions scanned with
/// the haversine distance. Suits fleets up to a few thousand drivers; swap
/// in a spatial-index-backed locator behind the same trait beyond that.
#[derive(Debug, Default)]
pub struct HaversineGeoIndex {
    drivers: DashMap<DriverId, DriverPosition>,
}

impl HaversineGeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }
}

#[async_trait]
impl GeoLocator for HaversineGeoIndex {
    async fn nearest_drivers(
        &self,
        origin: GeoPoint,
        radius_meters: f64,
        count: usize,
    ) -> Result<Vec<(DriverId, f64)>, DispatchError> {
        let mut hits: Vec<(DriverId, f64)> = self
            .drivers
            .iter()
            .filter(|entry| entry.value().online)
            .filter_map(|entry| {
                let distance = haversine_meters(origin, entry.value().point);
                (distance <= radius_meters).then(|| (entry.key().clone(), distance))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(count);
        Ok(hits)
    }

    async fn set_driver_location(
        &self,
        driver: &DriverId,
        point: GeoPoint,
    ) -> Result<(), DispatchError> {
        self.drivers.insert(
            driver.clone(),
            DriverPosition {
                point,
                online: true,
            },
        );
        Ok(())
    }

    async fn set_driver_online(
        &self,
        driver: &DriverId,
        online: bool,
    ) -> Result<(), DispatchError> {
        if let Some(mut position) = self.drivers.get_mut(driver) {
            position.online = online;
        }
        Ok(())
    }
}
