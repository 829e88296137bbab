use std::time::Duration;

/// Default offer lifetime before an unclaimed request expires.
const DEFAULT_OFFER_TTL: Duration = Duration::from_secs(60);

/// Default search radius for candidate drivers, in meters.
const DEFAULT_RADIUS_METERS: f64 = 10_000.0;

/// Default number of candidates offered per request.
const DEFAULT_MAX_CANDIDATES: usize = 5;

/// Default points credited to the puller on ride completion.
const DEFAULT_POINTS_PER_RIDE: i64 = 10;

/// How strictly candidate selection guards against double-offering a driver.
///
/// The busy-exclusion scan at selection time is not atomic with claims on
/// other requests, so a driver can be offered two requests that both later
/// try to assign them. `BestEffort` keeps that inherited behavior;
/// `RecheckOnClaim` re-runs the busy check inside the accept path and
/// rejects the claim if the driver already holds another live request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrictness {
    #[default]
    BestEffort,
    RecheckOnClaim,
}

/// Candidate selection policy.
#[derive(Debug, Clone, Copy)]
pub struct SelectionConfig {
    /// Maximum number of drivers offered a request.
    pub max_candidates: usize,
    /// Geo search radius around the pickup point, in meters.
    pub radius_meters: f64,
    /// Busy-check strictness; see [`SelectionStrictness`].
    pub strictness: SelectionStrictness,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_candidates: DEFAULT_MAX_CANDIDATES,
            radius_meters: DEFAULT_RADIUS_METERS,
            strictness: SelectionStrictness::default(),
        }
    }
}

/// Offer expiration policy.
///
/// Exactly one timer is armed per request, at creation. A request reopened
/// by a driver cancel is not re-armed; if the original timer already fired
/// it waits indefinitely for the next accept.
#[derive(Debug, Clone, Copy)]
pub struct ExpirationConfig {
    /// How long an offer stays open before expiring unclaimed.
    pub offer_ttl: Duration,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            offer_ttl: DEFAULT_OFFER_TTL,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    pub selection: SelectionConfig,
    pub expiration: ExpirationConfig,
    /// Points appended to the ledger for the assigned puller on completion.
    pub points_per_ride: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            selection: SelectionConfig::default(),
            expiration: ExpirationConfig::default(),
            points_per_ride: DEFAULT_POINTS_PER_RIDE,
        }
    }
}
