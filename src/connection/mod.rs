//! Connections
//!
//! A connection owns one transport and drives it with two pumps: the read
//! pump runs on the connection's own task, the write pump on a task of its
//! own. A connection ends when its read pump stops (peer closed, read error)
//! or its write pump stops (evicted by the hub, write error). Either way the
//! same teardown follows: unregister, outbound queue closed, transport closed.

pub mod id;
pub mod pump;
pub mod state;

use std::time::Duration;

use crate::error::Result;
use crate::hub::{Admission, HubHandle};
use crate::stats::ConnectionStats;
use crate::transport::{FrameReader, FrameWriter};

pub use id::ConnectionId;
pub use pump::{read_pump, write_pump, WriteEnd};
pub use state::ConnectionPhase;

/// How long one half of a connection may linger after the other has finished
///
/// The write pump sends a close frame on its way out; a well-behaved peer
/// answers it, which ends the read pump. Peers that don't are cut off. The
/// same bound applies to the write pump draining after the read pump ends.
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// A single client session
pub struct Connection<R, W> {
    id: ConnectionId,
    reader: R,
    writer: W,
    hub: HubHandle,
    phase: ConnectionPhase,
}

impl<R, W> Connection<R, W>
where
    R: FrameReader,
    W: FrameWriter + 'static,
{
    /// Create a connection with a fresh identity
    pub fn new(reader: R, writer: W, hub: HubHandle) -> Self {
        Self::with_id(ConnectionId::generate(), reader, writer, hub)
    }

    /// Create a connection with a caller-chosen identity
    pub fn with_id(id: ConnectionId, reader: R, writer: W, hub: HubHandle) -> Self {
        Self {
            id,
            reader,
            writer,
            hub,
            phase: ConnectionPhase::Unregistered,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Register with the hub and run both pumps until the connection is torn down
    ///
    /// Fails only if the hub has already stopped.
    pub async fn run(self) -> Result<ConnectionStats> {
        let Self {
            id,
            reader,
            writer,
            hub,
            mut phase,
        } = self;

        let Admission { outbound, eviction } = hub.admit(id.clone())?;
        phase.advance(ConnectionPhase::Registered);

        let mut stats = ConnectionStats::new();
        let mut write = tokio::spawn(write_pump(id.clone(), outbound, eviction, writer));
        let mut read = Box::pin(read_pump(id.clone(), reader, hub, &mut stats));
        phase.advance(ConnectionPhase::Active);

        tracing::info!(connection_id = %id, "Connection active");

        let written = tokio::select! {
            () = &mut read => {
                phase.advance(ConnectionPhase::Unregistering);
                // The hub closes the outbound queue in response to the unregister
                match tokio::time::timeout(CLOSE_GRACE, &mut write).await {
                    Ok(written) => Some(written),
                    Err(_) => {
                        tracing::debug!(connection_id = %id, "Write half stalled, aborting");
                        write.abort();
                        None
                    }
                }
            }
            written = &mut write => {
                phase.advance(ConnectionPhase::Unregistering);
                match &written {
                    // Stop relaying at once; the peer is not reading anyway
                    Ok((WriteEnd::Evicted(_), _)) => {}
                    _ => {
                        if tokio::time::timeout(CLOSE_GRACE, &mut read).await.is_err() {
                            tracing::debug!(
                                connection_id = %id,
                                "Peer ignored close, dropping read half"
                            );
                        }
                    }
                }
                Some(written)
            }
        };

        // Runs the read pump's unregister if it has not finished on its own
        drop(read);

        let mut end = None;
        match written {
            Some(Ok((write_end, write_stats))) => {
                stats.merge(&write_stats);
                end = Some(write_end);
            }
            Some(Err(e)) => {
                tracing::error!(connection_id = %id, error = %e, "Write pump panicked");
            }
            None => {}
        }
        phase.advance(ConnectionPhase::Removed);

        tracing::info!(
            connection_id = %id,
            phase = ?phase,
            write_end = ?end,
            frames_received = stats.frames_received,
            frames_sent = stats.frames_sent,
            duration_ms = stats.duration().as_millis() as u64,
            "Connection closed"
        );

        Ok(stats)
    }
}
