#![allow(dead_code)]

use std::sync::Arc;

use dispatch_core::config::{DispatchConfig, SelectionStrictness};
use dispatch_core::fanout::{NotificationChannel, NotificationFanout};
use dispatch_core::geo::{GeoLocator, HaversineGeoIndex};
use dispatch_core::lifecycle::DispatchEngine;
use dispatch_core::persistence::PersistenceGateway;
use dispatch_core::request::{DriverId, GeoPoint};
use dispatch_core::store::RequestStore;
use dispatch_core::test_helpers::{InMemoryPersistence, RecordingChannel};

/// Builder for a fully wired engine backed by in-memory collaborators.
#[derive(Default)]
pub struct TestEngineBuilder {
    drivers: Vec<(String, GeoPoint)>,
    config: DispatchConfig,
    extra_channels: Vec<Arc<dyn NotificationChannel>>,
}

/// Handles onto the engine and every collaborator, for assertions.
pub struct TestEngine {
    pub engine: Arc<DispatchEngine>,
    pub store: Arc<RequestStore>,
    pub geo: Arc<HaversineGeoIndex>,
    pub persistence: Arc<InMemoryPersistence>,
    pub channel: Arc<RecordingChannel>,
}

impl TestEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver at the given position (online).
    pub fn with_driver(mut self, name: &str, lat: f64, lon: f64) -> Self {
        self.drivers.push((name.to_string(), GeoPoint::new(lat, lon)));
        self
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.config.selection.max_candidates = max;
        self
    }

    pub fn with_strictness(mut self, strictness: SelectionStrictness) -> Self {
        self.config.selection.strictness = strictness;
        self
    }

    /// Add a channel alongside the default recording channel.
    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.extra_channels.push(channel);
        self
    }

    pub async fn build(self) -> TestEngine {
        let store = Arc::new(RequestStore::new());
        let geo = Arc::new(HaversineGeoIndex::new());
        let persistence = Arc::new(InMemoryPersistence::new());
        let channel = Arc::new(RecordingChannel::new());

        let mut channels: Vec<Arc<dyn NotificationChannel>> = self.extra_channels;
        channels.push(Arc::clone(&channel) as Arc<dyn NotificationChannel>);
        let fanout = Arc::new(NotificationFanout::new(channels));

        for (name, point) in &self.drivers {
            geo.set_driver_location(&DriverId::new(name.clone()), *point)
                .await
                .expect("seed driver location");
        }

        let engine = DispatchEngine::new(
            Arc::clone(&store),
            Arc::clone(&geo) as Arc<dyn GeoLocator>,
            Arc::clone(&persistence) as Arc<dyn PersistenceGateway>,
            fanout,
            self.config,
        );

        TestEngine {
            engine,
            store,
            geo,
            persistence,
            channel,
        }
    }
}

pub fn driver(name: &str) -> DriverId {
    DriverId::new(name)
}

pub fn pickup() -> GeoPoint {
    GeoPoint::new(1.0, 1.0)
}

/// Three drivers close to [`pickup`], nearest first: d1, d2, d3.
pub fn builder_with_three_nearby_drivers() -> TestEngineBuilder {
    TestEngineBuilder::new()
        .with_driver("d1", 1.001, 1.0)
        .with_driver("d2", 1.002, 1.0)
        .with_driver("d3", 1.003, 1.0)
}
