//! Connection registry and delivery
//!
//! Owned by the hub loop and never shared. Each member maps to the sending
//! end of its outbound queue; dropping that sender is what closes the queue,
//! so removing a member and closing its queue are the same operation and
//! can only happen once. A member also holds a one-shot eviction notice,
//! fired only when delivery evicts it.
//!
//! # Drop-and-evict
//!
//! Delivery never waits on a consumer. Each message is offered to a member's
//! bounded queue with `try_send`; if the queue is full (or its write pump is
//! already gone) the member is presumed dead and evicted on the spot. Other
//! members are unaffected and nobody is told about the eviction except the
//! evicted connection itself, which tears down without draining its queue.

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;

use crate::connection::ConnectionId;
use crate::envelope::Encoded;

/// Why a member was evicted during delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    /// Outbound queue was at capacity
    QueueFull,
    /// Write pump had already dropped the queue
    QueueClosed,
}

/// Outcome of one fan-out
#[derive(Debug, Default)]
pub struct FanOut {
    /// Members the message was queued for
    pub delivered: usize,
    /// Members evicted because the message could not be queued
    pub evicted: Vec<(ConnectionId, EvictReason)>,
}

/// Delivery endpoints of one registered connection
#[derive(Debug)]
pub struct Member {
    outbound: mpsc::Sender<Encoded>,
    notice: oneshot::Sender<EvictReason>,
}

impl Member {
    pub fn new(outbound: mpsc::Sender<Encoded>, notice: oneshot::Sender<EvictReason>) -> Self {
        Self { outbound, notice }
    }

    /// Close the outbound queue and tell the connection why
    fn evict(self, reason: EvictReason) {
        drop(self.outbound);
        // The connection may already be gone
        let _ = self.notice.send(reason);
    }
}

/// Set of live connections
#[derive(Debug, Default)]
pub struct Registry {
    members: HashMap<ConnectionId, Member>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a member
    ///
    /// Returns false (and drops `member`, closing its queue) if the id is
    /// already registered.
    pub fn insert(&mut self, id: ConnectionId, member: Member) -> bool {
        if self.members.contains_key(&id) {
            return false;
        }
        self.members.insert(id, member);
        true
    }

    /// Remove a member, closing its outbound queue
    ///
    /// No eviction notice is sent. Returns false if the member was not
    /// registered.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        self.members.remove(id).is_some()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.members.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Remove every member, closing all outbound queues
    pub fn clear(&mut self) {
        self.members.clear();
    }

    /// Offer `message` to every member except `except`, evicting any member
    /// whose queue cannot take it
    pub fn fan_out(&mut self, message: &Encoded, except: Option<&ConnectionId>) -> FanOut {
        let mut outcome = FanOut::default();

        for (id, member) in &self.members {
            if except == Some(id) {
                continue;
            }

            match member.outbound.try_send(message.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    outcome.evicted.push((id.clone(), EvictReason::QueueFull));
                }
                Err(TrySendError::Closed(_)) => {
                    outcome.evicted.push((id.clone(), EvictReason::QueueClosed));
                }
            }
        }

        for (id, reason) in &outcome.evicted {
            if let Some(member) = self.members.remove(id) {
                member.evict(*reason);
            }
            tracing::warn!(
                connection_id = %id,
                reason = ?reason,
                members = self.members.len(),
                "Connection evicted"
            );
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(text: &str) -> Encoded {
        text.into()
    }

    fn member(
        capacity: usize,
    ) -> (
        Member,
        mpsc::Receiver<Encoded>,
        oneshot::Receiver<EvictReason>,
    ) {
        let (outbound, rx) = mpsc::channel(capacity);
        let (evict, evicted) = oneshot::channel();
        (Member::new(outbound, evict), rx, evicted)
    }

    #[test]
    fn test_insert_remove() {
        let mut registry = Registry::new();
        let id = ConnectionId::from("a");
        let (a, mut rx, mut evicted) = member(4);

        assert!(registry.insert(id.clone(), a));
        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.is_empty());

        // Sender dropped by the removal, so the queue reports closed
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        // A plain removal is not an eviction
        assert!(matches!(
            evicted.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut registry = Registry::new();
        let id = ConnectionId::from("a");
        let (first, _first_rx, _first_evicted) = member(4);
        let (second, mut second_rx, _second_evicted) = member(4);

        assert!(registry.insert(id.clone(), first));
        assert!(!registry.insert(id, second));
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            second_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_fan_out_skips_excluded() {
        let mut registry = Registry::new();
        let (a, mut a_rx, _a_evicted) = member(4);
        let (b, mut b_rx, _b_evicted) = member(4);
        registry.insert(ConnectionId::from("a"), a);
        registry.insert(ConnectionId::from("b"), b);

        let outcome = registry.fan_out(&encoded("x"), Some(&ConnectionId::from("a")));

        assert_eq!(outcome.delivered, 1);
        assert!(outcome.evicted.is_empty());
        assert!(a_rx.try_recv().is_err());
        assert_eq!(&*b_rx.try_recv().unwrap(), "x");
    }

    #[test]
    fn test_fan_out_evicts_full_queue() {
        let mut registry = Registry::new();
        let (slow, mut slow_rx, mut slow_evicted) = member(1);
        let (fast, mut fast_rx, mut fast_evicted) = member(4);
        registry.insert(ConnectionId::from("slow"), slow);
        registry.insert(ConnectionId::from("fast"), fast);

        let first = registry.fan_out(&encoded("1"), None);
        assert_eq!(first.delivered, 2);

        let second = registry.fan_out(&encoded("2"), None);
        assert_eq!(second.delivered, 1);
        assert_eq!(
            second.evicted,
            vec![(ConnectionId::from("slow"), EvictReason::QueueFull)]
        );
        assert!(!registry.contains(&ConnectionId::from("slow")));
        assert_eq!(slow_evicted.try_recv().unwrap(), EvictReason::QueueFull);
        assert!(matches!(
            fast_evicted.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ));

        assert_eq!(&*fast_rx.try_recv().unwrap(), "1");
        assert_eq!(&*fast_rx.try_recv().unwrap(), "2");

        // The slow member still gets what was queued before eviction, then the close
        assert_eq!(&*slow_rx.try_recv().unwrap(), "1");
        assert!(matches!(
            slow_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_fan_out_evicts_closed_queue() {
        let mut registry = Registry::new();
        let (gone, rx, mut evicted) = member(4);
        registry.insert(ConnectionId::from("gone"), gone);
        drop(rx);

        let outcome = registry.fan_out(&encoded("x"), None);

        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.evicted[0].1, EvictReason::QueueClosed);
        assert!(registry.is_empty());
        assert_eq!(evicted.try_recv().unwrap(), EvictReason::QueueClosed);
    }
}
