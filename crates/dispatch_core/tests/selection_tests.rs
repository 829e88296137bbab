mod support;

use dispatch_core::config::SelectionStrictness;
use dispatch_core::geo::GeoLocator;
use dispatch_core::lifecycle::{AcceptOutcome, RejectReason};
use dispatch_core::request::{GeoPoint, RiderId, RideRequest};
use support::{builder_with_three_nearby_drivers, driver, pickup, TestEngineBuilder};

#[tokio::test]
async fn selection_truncates_to_max_candidates() {
    let harness = TestEngineBuilder::new()
        .with_driver("d1", 1.001, 1.0)
        .with_driver("d2", 1.002, 1.0)
        .with_driver("d3", 1.003, 1.0)
        .with_max_candidates(2)
        .build()
        .await;

    let response = harness
        .engine
        .create_request(RiderId::new("r1"), pickup())
        .await
        .expect("create request");
    assert_eq!(response.candidates, vec![driver("d1"), driver("d2")]);
}

#[tokio::test]
async fn offline_and_distant_drivers_are_not_offered() {
    let harness = TestEngineBuilder::new()
        .with_driver("near", 1.001, 1.0)
        .with_driver("sleeping", 1.002, 1.0)
        // ~150 km away: outside the 10 km default radius.
        .with_driver("far", 2.35, 1.0)
        .build()
        .await;
    harness
        .geo
        .set_driver_online(&driver("sleeping"), false)
        .await
        .expect("set offline");

    let response = harness
        .engine
        .create_request(RiderId::new("r1"), pickup())
        .await
        .expect("create request");
    assert_eq!(response.candidates, vec![driver("near")]);
}

#[tokio::test]
async fn drivers_on_a_live_request_are_excluded_from_new_offers() {
    let harness = builder_with_three_nearby_drivers().build().await;

    // An Open offer makes all its candidates busy.
    let first = harness
        .engine
        .create_request(RiderId::new("r1"), pickup())
        .await
        .expect("create request");
    let second = harness
        .engine
        .create_request(RiderId::new("r2"), pickup())
        .await
        .expect("create request");
    assert!(second.candidates.is_empty());

    // An Assigned request keeps both its assignee and its candidates busy.
    harness
        .engine
        .accept_ride(&driver("d1"), first.request_id)
        .await
        .expect("accept");
    let third = harness
        .engine
        .create_request(RiderId::new("r3"), pickup())
        .await
        .expect("create request");
    assert!(third.candidates.is_empty());
}

#[tokio::test]
async fn expired_request_frees_its_candidates() {
    let harness = builder_with_three_nearby_drivers().build().await;
    let first = harness
        .engine
        .create_request(RiderId::new("r1"), pickup())
        .await
        .expect("create request");

    harness.engine.handle_timeout(first.request_id).await;

    let next = harness
        .engine
        .create_request(RiderId::new("r2"), pickup())
        .await
        .expect("create request");
    assert_eq!(
        next.candidates,
        vec![driver("d1"), driver("d2"), driver("d3")]
    );
}

#[tokio::test]
async fn completed_request_frees_its_driver_for_selection() {
    let harness = builder_with_three_nearby_drivers().build().await;
    let response = harness
        .engine
        .create_request(RiderId::new("r1"), pickup())
        .await
        .expect("create request");
    harness
        .engine
        .accept_ride(&driver("d1"), response.request_id)
        .await
        .expect("accept");
    harness
        .engine
        .complete_ride(response.request_id)
        .await
        .expect("complete");

    let next = harness
        .engine
        .create_request(RiderId::new("r2"), pickup())
        .await
        .expect("create request");
    assert_eq!(
        next.candidates,
        vec![driver("d1"), driver("d2"), driver("d3")]
    );
}

/// The busy scan at selection time races with claims on other requests, so
/// the same driver can end up a candidate on two offers. Strict mode
/// rejects the second claim; best-effort mode lets it win.
#[tokio::test]
async fn strict_mode_rejects_claim_by_a_driver_assigned_elsewhere() {
    let harness = builder_with_three_nearby_drivers()
        .with_strictness(SelectionStrictness::RecheckOnClaim)
        .build()
        .await;

    // Hand-build the raced state: d1 is a candidate on both requests.
    let first = RideRequest::new(
        RiderId::new("r1"),
        GeoPoint::new(1.0, 1.0),
        vec![driver("d1"), driver("d2")],
    );
    let second = RideRequest::new(
        RiderId::new("r2"),
        GeoPoint::new(1.0, 1.0),
        vec![driver("d1"), driver("d3")],
    );
    let first_id = first.id;
    let second_id = second.id;
    harness.store.insert(first);
    harness.store.insert(second);

    let won = harness
        .engine
        .accept_ride(&driver("d1"), first_id)
        .await
        .expect("accept");
    assert!(won.is_accepted());

    let rechecked = harness
        .engine
        .accept_ride(&driver("d1"), second_id)
        .await
        .expect("accept");
    assert_eq!(
        rechecked,
        AcceptOutcome::Rejected {
            reason: RejectReason::DriverBusy
        }
    );
}

#[tokio::test]
async fn best_effort_mode_allows_the_double_claim() {
    let harness = builder_with_three_nearby_drivers().build().await;

    let first = RideRequest::new(
        RiderId::new("r1"),
        GeoPoint::new(1.0, 1.0),
        vec![driver("d1"), driver("d2")],
    );
    let second = RideRequest::new(
        RiderId::new("r2"),
        GeoPoint::new(1.0, 1.0),
        vec![driver("d1"), driver("d3")],
    );
    let first_id = first.id;
    let second_id = second.id;
    harness.store.insert(first);
    harness.store.insert(second);

    assert!(harness
        .engine
        .accept_ride(&driver("d1"), first_id)
        .await
        .expect("accept")
        .is_accepted());
    assert!(harness
        .engine
        .accept_ride(&driver("d1"), second_id)
        .await
        .expect("accept")
        .is_accepted());
}
