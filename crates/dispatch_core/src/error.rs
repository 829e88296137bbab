use thiserror::Error;

use crate::request::RequestId;

/// Fault taxonomy for dispatch operations.
///
/// Expected outcomes — a lost claim, a cancel by the wrong driver, a second
/// completion — are *not* errors; they come back as structured results
/// ([`AcceptOutcome`](crate::lifecycle::AcceptOutcome) and friends). These
/// variants cover the cases callers cannot treat as a normal branch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Unknown request or ride id.
    #[error("unknown request {0}")]
    NotFound(RequestId),

    /// A collaborator (geo locator, persistence gateway) failed. Channel
    /// failures during fanout are swallowed per-channel and never reach
    /// this variant.
    #[error("upstream unavailable: {0}")]
    Upstream(#[from] anyhow::Error),
}
