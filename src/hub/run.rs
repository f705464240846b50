//! Hub loop
//!
//! A single task owns the [`Registry`] and processes one coordination event
//! at a time, so membership changes and the announcements they trigger never
//! interleave and the registry needs no lock.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::connection::ConnectionId;
use crate::envelope::{Encoded, Envelope};
use crate::stats::HubStats;

use super::config::HubConfig;
use super::handle::{HubEvent, HubHandle, Registration};
use super::registry::{FanOut, Member, Registry};

/// The hub actor
pub struct Hub {
    registry: Registry,
    events_rx: mpsc::UnboundedReceiver<HubEvent>,
    stats: HubStats,
    stats_tx: watch::Sender<HubStats>,
}

impl Hub {
    /// Create a hub and the handle used to reach it
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stats_tx, stats_rx) = watch::channel(HubStats::new());

        let hub = Self {
            registry: Registry::new(),
            events_rx,
            stats: HubStats::new(),
            stats_tx,
        };
        let handle = HubHandle::new(events_tx, stats_rx, config.outbound_capacity.max(1));

        (hub, handle)
    }

    /// Create a hub and spawn its loop on the current runtime
    pub fn spawn(config: HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(config);
        (handle, tokio::spawn(hub.run()))
    }

    /// Run the loop until every [`HubHandle`] has been dropped
    ///
    /// Events are handled strictly in arrival order.
    pub async fn run(mut self) {
        tracing::debug!("Hub started");

        while let Some(event) = self.events_rx.recv().await {
            match event {
                HubEvent::Register(registration) => self.on_register(registration),
                HubEvent::Unregister(id) => self.on_unregister(&id),
                HubEvent::Broadcast(message) => self.on_broadcast(&message),
            }

            self.publish_stats();
        }

        // Closes every remaining outbound queue so write pumps send close frames
        self.registry.clear();
        self.publish_stats();

        tracing::debug!("Hub stopped");
    }

    fn on_register(&mut self, registration: Registration) {
        let Registration {
            id,
            outbound,
            notice,
        } = registration;

        if !self.registry.insert(id.clone(), Member::new(outbound, notice)) {
            tracing::warn!(connection_id = %id, "Duplicate registration ignored");
            return;
        }

        self.stats.total_connections += 1;
        tracing::debug!(
            connection_id = %id,
            members = self.registry.len(),
            "Connection joined"
        );

        self.announce(&Envelope::joined(), Some(&id));
    }

    fn on_unregister(&mut self, id: &ConnectionId) {
        if !self.registry.remove(id) {
            tracing::trace!(connection_id = %id, "Unregister for unknown connection");
            return;
        }

        tracing::debug!(
            connection_id = %id,
            members = self.registry.len(),
            "Connection left"
        );

        self.announce(&Envelope::left(), Some(id));
    }

    fn on_broadcast(&mut self, message: &Encoded) {
        self.stats.messages_relayed += 1;
        let outcome = self.registry.fan_out(message, None);
        self.record(&outcome);

        tracing::trace!(delivered = outcome.delivered, "Message relayed");
    }

    /// Send a system envelope to everyone except `except`
    fn announce(&mut self, envelope: &Envelope, except: Option<&ConnectionId>) {
        let message = match envelope.encode() {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode announcement, skipping");
                return;
            }
        };

        let outcome = self.registry.fan_out(&message, except);
        self.record(&outcome);
    }

    fn record(&mut self, outcome: &FanOut) {
        self.stats.evictions += outcome.evicted.len() as u64;
    }

    fn publish_stats(&mut self) {
        self.stats.active_connections = self.registry.len();
        self.stats_tx.send_replace(self.stats);
    }
}
