//! Statistics for the hub and its connections

use std::time::{Duration, Instant};

/// Per-connection statistics
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    /// When the connection was admitted
    pub connected_at: Instant,
    /// Frames read from the peer and forwarded to the hub
    pub frames_received: u64,
    /// Frames written to the peer
    pub frames_sent: u64,
    /// Inbound frames that could not be wrapped into an envelope
    pub frames_skipped: u64,
}

impl ConnectionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            connected_at: Instant::now(),
            frames_received: 0,
            frames_sent: 0,
            frames_skipped: 0,
        }
    }

    /// Time since the connection was admitted
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Fold the write side's counters into this one
    pub fn merge(&mut self, other: &ConnectionStats) {
        self.frames_received += other.frames_received;
        self.frames_sent += other.frames_sent;
        self.frames_skipped += other.frames_skipped;
    }
}

impl Default for ConnectionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Hub-wide statistics, published after every event the hub processes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Connections currently in the registry
    pub active_connections: usize,
    /// Connections ever registered
    pub total_connections: u64,
    /// Broadcast messages processed
    pub messages_relayed: u64,
    /// Connections dropped because their outbound queue was full or closed
    pub evictions: u64,
}

impl HubStats {
    pub fn new() -> Self {
        Self::default()
    }
}
