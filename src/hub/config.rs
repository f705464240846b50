//! Hub configuration

/// Default number of messages a connection's outbound queue can hold
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each connection's outbound queue
    ///
    /// A connection whose queue is full when the hub delivers to it is
    /// considered dead and evicted.
    pub outbound_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

impl HubConfig {
    /// Set the outbound queue capacity (at least 1)
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }
}
