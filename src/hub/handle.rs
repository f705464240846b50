//! Hub handle
//!
//! The only way into the hub from outside its task. Cloning a handle is
//! cheap; the hub loop keeps running until every clone is dropped.
//!
//! Register, unregister and broadcast are three typed events carried on one
//! FIFO channel, so the hub sees them in exactly the order they were sent.
//! A read pump's last broadcasts therefore always land before its own
//! unregister.

use tokio::sync::{mpsc, oneshot, watch};

use super::registry::EvictReason;
use crate::connection::ConnectionId;
use crate::envelope::Encoded;
use crate::error::{Error, Result};
use crate::stats::HubStats;

/// Receiving end of a connection's outbound queue, drained by its write pump
pub type OutboundReceiver = mpsc::Receiver<Encoded>;

/// A connection asking to be admitted into the registry
#[derive(Debug)]
pub struct Registration {
    /// Identity of the connection
    pub id: ConnectionId,
    /// Sending end of the connection's outbound queue; only the hub writes to it
    pub outbound: mpsc::Sender<Encoded>,
    /// Fired by the hub if delivery evicts the connection
    pub notice: oneshot::Sender<EvictReason>,
}

/// What a connection gets back when it asks to be admitted
#[derive(Debug)]
pub struct Admission {
    /// Messages the hub delivers to this connection
    pub outbound: OutboundReceiver,
    /// Resolves if the hub evicts this connection
    pub eviction: Eviction,
}

/// Eviction notice for one connection
#[derive(Debug)]
pub struct Eviction {
    rx: oneshot::Receiver<EvictReason>,
}

impl Eviction {
    pub(crate) fn new(rx: oneshot::Receiver<EvictReason>) -> Self {
        Self { rx }
    }

    /// Wait until the hub evicts the connection
    ///
    /// Never resolves if the connection leaves any other way (unregister,
    /// duplicate id, hub shutdown); those paths close the outbound queue
    /// instead.
    pub async fn wait(self) -> EvictReason {
        match self.rx.await {
            Ok(reason) => reason,
            Err(_) => std::future::pending().await,
        }
    }
}

/// Coordination event processed by the hub loop
#[derive(Debug)]
pub enum HubEvent {
    /// Admit a connection
    Register(Registration),
    /// Remove a connection
    Unregister(ConnectionId),
    /// Fan an encoded envelope out to every member
    Broadcast(Encoded),
}

/// Cloneable sender side of the hub's coordination channel
#[derive(Debug, Clone)]
pub struct HubHandle {
    events_tx: mpsc::UnboundedSender<HubEvent>,
    stats_rx: watch::Receiver<HubStats>,
    outbound_capacity: usize,
}

impl HubHandle {
    pub(super) fn new(
        events_tx: mpsc::UnboundedSender<HubEvent>,
        stats_rx: watch::Receiver<HubStats>,
        outbound_capacity: usize,
    ) -> Self {
        Self {
            events_tx,
            stats_rx,
            outbound_capacity,
        }
    }

    fn send(&self, event: HubEvent) -> Result<()> {
        self.events_tx.send(event).map_err(|_| Error::HubClosed)
    }

    /// Ask the hub to admit a connection
    ///
    /// Creates the connection's bounded outbound queue and eviction notice,
    /// hands the sending ends to the hub and returns the receiving ends.
    pub fn admit(&self, id: ConnectionId) -> Result<Admission> {
        let (outbound, rx) = mpsc::channel(self.outbound_capacity);
        let (notice, evicted) = oneshot::channel();
        self.send(HubEvent::Register(Registration {
            id,
            outbound,
            notice,
        }))?;
        Ok(Admission {
            outbound: rx,
            eviction: Eviction::new(evicted),
        })
    }

    /// Like [`admit`](Self::admit), for consumers that only read the queue
    ///
    /// An eviction shows up as the queue closing.
    pub fn register(&self, id: ConnectionId) -> Result<OutboundReceiver> {
        Ok(self.admit(id)?.outbound)
    }

    /// Ask the hub to remove a connection
    ///
    /// Removing a connection that is not registered is a no-op on the hub side.
    pub fn unregister(&self, id: ConnectionId) -> Result<()> {
        self.send(HubEvent::Unregister(id))
    }

    /// Queue an encoded envelope for delivery to every registered connection
    pub fn broadcast(&self, message: Encoded) -> Result<()> {
        self.send(HubEvent::Broadcast(message))
    }

    /// Watch the hub's statistics, updated after every processed event
    pub fn stats(&self) -> watch::Receiver<HubStats> {
        self.stats_rx.clone()
    }

    /// Whether the hub loop has stopped
    pub fn is_closed(&self) -> bool {
        self.events_tx.is_closed()
    }
}
