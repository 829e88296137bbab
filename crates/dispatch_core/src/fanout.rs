//! Notification fanout: deliver transition events to drivers across every
//! configured channel.
//!
//! Delivery is at-least-once and best-effort. Each channel is attempted
//! independently; a failing channel is logged and skipped, never blocking
//! the others. There is no acknowledgment or retry loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::events::DriverEvent;
use crate::request::DriverId;

/// One delivery channel (pub/sub bus, device push, live socket, ...).
/// A driver unreachable on a channel simply misses that channel's delivery.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, target: &DriverId, event: &DriverEvent) -> anyhow::Result<()>;
}

/// Multi-channel sink the lifecycle controller notifies through.
#[derive(Default)]
pub struct NotificationFanout {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl NotificationFanout {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Attempt delivery of one event to one driver on every channel.
    pub async fn notify(&self, driver: &DriverId, event: &DriverEvent) {
        for channel in &self.channels {
            if let Err(error) = channel.publish(driver, event).await {
                warn!(
                    channel = channel.name(),
                    %driver,
                    kind = event.kind(),
                    "notification delivery failed: {error}"
                );
            }
        }
    }

    pub async fn notify_all(&self, drivers: &[DriverId], event: &DriverEvent) {
        for driver in drivers {
            self.notify(driver, event).await;
        }
    }
}

/// Write half of a live driver socket, owned by the transport layer.
pub type SocketSink = mpsc::UnboundedSender<String>;

/// Bounded registry of live driver sockets, keyed by driver id, with
/// explicit add/remove on connect/disconnect. Replacing an existing
/// connection for the same driver does not grow the count.
pub struct SocketRegistry {
    connections: DashMap<DriverId, SocketSink>,
    count: AtomicUsize,
    max_connections: usize,
}

impl SocketRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: DashMap::with_capacity(max_connections),
            count: AtomicUsize::new(0),
            max_connections,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_at_capacity(&self) -> bool {
        self.count.load(Ordering::Relaxed) >= self.max_connections
    }

    /// Register a driver's socket. Returns `false` (and drops the sink)
    /// when the registry is full and the driver is not already connected.
    /// The bound holds under concurrent connects: a slot is reserved on the
    /// counter before the sink is stored.
    pub fn insert(&self, driver: DriverId, sink: SocketSink) -> bool {
        match self.connections.entry(driver.clone()) {
            Entry::Occupied(mut occupied) => {
                // Reconnect: replace the sink without consuming a slot.
                occupied.insert(sink);
                debug!(%driver, count = self.connection_count(), "socket replaced");
                true
            }
            Entry::Vacant(vacant) => {
                let reserved = self
                    .count
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                        (count < self.max_connections).then_some(count + 1)
                    })
                    .is_ok();
                if !reserved {
                    warn!(%driver, "socket registry at capacity, connection refused");
                    return false;
                }
                vacant.insert(sink);
                debug!(%driver, count = self.connection_count(), "socket registered");
                true
            }
        }
    }

    pub fn remove(&self, driver: &DriverId) {
        if self.connections.remove(driver).is_some() {
            self.count.fetch_sub(1, Ordering::Relaxed);
            debug!(%driver, count = self.connection_count(), "socket removed");
        }
    }

    pub fn contains(&self, driver: &DriverId) -> bool {
        self.connections.contains_key(driver)
    }

    fn sink(&self, driver: &DriverId) -> Option<SocketSink> {
        self.connections.get(driver).map(|entry| entry.value().clone())
    }
}

/// Live-socket channel backed by a [`SocketRegistry`]. Events are JSON
/// encoded the way device clients already parse them.
pub struct SocketChannel {
    registry: Arc<SocketRegistry>,
}

impl SocketChannel {
    pub fn new(registry: Arc<SocketRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl NotificationChannel for SocketChannel {
    fn name(&self) -> &'static str {
        "socket"
    }

    async fn publish(&self, target: &DriverId, event: &DriverEvent) -> anyhow::Result<()> {
        let Some(sink) = self.registry.sink(target) else {
            // Not connected: the driver misses this channel's delivery.
            return Ok(());
        };
        let payload = serde_json::to_string(event)?;
        sink.send(payload)
            .map_err(|_| anyhow::anyhow!("socket closed for {target}"))?;
        Ok(())
    }
}
