use serde::{Deserialize, Serialize};

use crate::request::RequestId;

/// Event delivered to drivers on every request transition.
///
/// The wire tags (`RIDE_OFFER`, `REQUEST_FILLED`, ...) are what device
/// clients already parse; do not rename them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DriverEvent {
    /// A new request this driver may claim; carries the pickup point.
    #[serde(rename = "RIDE_OFFER")]
    Offer {
        ride_id: RequestId,
        lat: f64,
        lon: f64,
    },
    /// Another driver won the request.
    #[serde(rename = "REQUEST_FILLED")]
    Filled { ride_id: RequestId },
    /// The assigned driver cancelled; the request is open again.
    #[serde(rename = "RIDE_REOFFER")]
    Reoffer { ride_id: RequestId },
    /// The request expired unclaimed.
    #[serde(rename = "EXPIRED")]
    Expired { ride_id: RequestId },
}

impl DriverEvent {
    pub fn ride_id(&self) -> RequestId {
        match self {
            DriverEvent::Offer { ride_id, .. }
            | DriverEvent::Filled { ride_id }
            | DriverEvent::Reoffer { ride_id }
            | DriverEvent::Expired { ride_id } => *ride_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DriverEvent::Offer { .. } => "RIDE_OFFER",
            DriverEvent::Filled { .. } => "REQUEST_FILLED",
            DriverEvent::Reoffer { .. } => "RIDE_REOFFER",
            DriverEvent::Expired { .. } => "EXPIRED",
        }
    }
}
