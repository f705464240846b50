//! Read and write pumps
//!
//! ```text
//!  transport ──read_frame──► read pump ──broadcast──► hub
//!  hub ──outbound queue──► write pump ──write_text──► transport
//! ```
//!
//! The read pump always ends by unregistering its connection, exactly once,
//! whether it stops on a read error, a clean close, or by being dropped
//! mid-read. The hub answers by closing the outbound queue, which is what
//! stops the write pump.
//!
//! An eviction stops the write pump directly, even in the middle of a write
//! to a peer that has stopped reading. Nothing left in the queue is sent.

use crate::envelope::Envelope;
use crate::hub::{EvictReason, Eviction, HubHandle, OutboundReceiver};
use crate::stats::ConnectionStats;
use crate::transport::{FrameReader, FrameWriter};

use super::id::ConnectionId;
use super::CLOSE_GRACE;

/// How the write pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEnd {
    /// The hub closed the outbound queue and every message was written
    Drained,
    /// A transport write failed
    Failed,
    /// The hub evicted the connection
    Evicted(EvictReason),
}

/// Forward inbound messages to the hub until the transport stops
///
/// Counters go into `stats`, so they survive the pump being dropped.
pub async fn read_pump<R: FrameReader>(
    id: ConnectionId,
    mut reader: R,
    hub: HubHandle,
    stats: &mut ConnectionStats,
) {
    let _teardown = scopeguard::guard((hub.clone(), id.clone()), |(hub, id)| {
        if hub.unregister(id.clone()).is_err() {
            tracing::trace!(connection_id = %id, "Hub already stopped");
        }
    });

    loop {
        let content = match reader.read_frame().await {
            Ok(Some(content)) => content,
            Ok(None) => {
                tracing::debug!(connection_id = %id, "Peer closed connection");
                break;
            }
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Read failed");
                break;
            }
        };
        stats.frames_received += 1;

        let message = match Envelope::message(id.as_str(), content).encode() {
            Ok(message) => message,
            Err(e) => {
                stats.frames_skipped += 1;
                tracing::error!(
                    connection_id = %id,
                    error = %e,
                    "Failed to encode envelope, message dropped"
                );
                continue;
            }
        };

        if hub.broadcast(message).is_err() {
            tracing::debug!(connection_id = %id, "Hub stopped, ending read pump");
            break;
        }
    }
}

/// Drain the outbound queue to the transport until the hub closes it or
/// evicts the connection
pub async fn write_pump<W: FrameWriter>(
    id: ConnectionId,
    mut outbound: OutboundReceiver,
    eviction: Eviction,
    mut writer: W,
) -> (WriteEnd, ConnectionStats) {
    let mut stats = ConnectionStats::new();
    let evicted = eviction.wait();
    tokio::pin!(evicted);

    let end = loop {
        let message = tokio::select! {
            biased;
            reason = &mut evicted => break WriteEnd::Evicted(reason),
            message = outbound.recv() => message,
        };

        let Some(message) = message else {
            match tokio::time::timeout(CLOSE_GRACE, writer.write_close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(connection_id = %id, error = %e, "Failed to send close frame");
                }
                Err(_) => {
                    tracing::debug!(connection_id = %id, "Close frame timed out");
                }
            }
            break WriteEnd::Drained;
        };

        tokio::select! {
            biased;
            reason = &mut evicted => break WriteEnd::Evicted(reason),
            written = writer.write_text(&message) => {
                if let Err(e) = written {
                    tracing::debug!(connection_id = %id, error = %e, "Write failed");
                    break WriteEnd::Failed;
                }
                stats.frames_sent += 1;
            }
        }
    };

    if let WriteEnd::Evicted(reason) = end {
        tracing::info!(
            connection_id = %id,
            reason = ?reason,
            "Evicted by hub, closing transport"
        );
    }

    match tokio::time::timeout(CLOSE_GRACE, writer.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::debug!(connection_id = %id, error = %e, "Failed to close transport");
        }
        Err(_) => {
            tracing::debug!(connection_id = %id, "Transport close timed out");
        }
    }

    (end, stats)
}
