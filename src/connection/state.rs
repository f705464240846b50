//! Connection lifecycle
//!
//! ```text
//! Unregistered -> Registered -> Active -> Unregistering -> Removed
//! ```
//!
//! Transitions only move forward. Removed is terminal.

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionPhase {
    /// Created, not yet handed to the hub
    Unregistered,
    /// Registration sent to the hub
    Registered,
    /// Read and write pumps running
    Active,
    /// A pump stopped (read failure, peer close or eviction)
    Unregistering,
    /// Outbound queue closed, transport closed, out of the registry
    Removed,
}

impl ConnectionPhase {
    /// Move to `next` if it lies ahead of the current phase
    ///
    /// Returns false and leaves the phase unchanged otherwise.
    pub fn advance(&mut self, next: ConnectionPhase) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }

    /// Whether the connection has finished its lifecycle
    pub fn is_removed(&self) -> bool {
        *self == ConnectionPhase::Removed
    }
}

impl Default for ConnectionPhase {
    fn default() -> Self {
        ConnectionPhase::Unregistered
    }
}
