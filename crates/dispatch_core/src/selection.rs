//! Candidate selection: nearest online drivers, minus the busy ones.

use tracing::debug;

use crate::config::SelectionConfig;
use crate::error::DispatchError;
use crate::geo::GeoLocator;
use crate::request::{DriverId, GeoPoint};
use crate::store::RequestStore;

/// Select the drivers to offer a new request, nearest first, truncated to
/// `config.max_candidates`. A driver who is a candidate or assignee on any
/// live (`Open`/`Assigned`) request is excluded.
///
/// The busy scan is best-effort: it is not atomic with claims racing on
/// other requests, so a driver can slip through onto two offers. See
/// [`SelectionStrictness`](crate::config::SelectionStrictness) for the
/// stricter claim-time recheck.
pub async fn select_candidates(
    geo: &dyn GeoLocator,
    store: &RequestStore,
    pickup: GeoPoint,
    config: &SelectionConfig,
) -> Result<Vec<DriverId>, DispatchError> {
    let nearest = geo
        .nearest_drivers(pickup, config.radius_meters, config.max_candidates)
        .await?;

    let busy = store.busy_drivers();
    let candidates: Vec<DriverId> = nearest
        .into_iter()
        .map(|(driver, _distance)| driver)
        .filter(|driver| !busy.contains(driver))
        .collect();

    debug!(
        candidates = candidates.len(),
        busy = busy.len(),
        "candidate selection"
    );
    Ok(candidates)
}
