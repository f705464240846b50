//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::hub::HubConfig;

/// Default listening port
pub const DEFAULT_PORT: u16 = 12345;

/// Default upgrade path
pub const DEFAULT_PATH: &str = "/ws";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// The only request path that may be upgraded
    pub path: String,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Upgrade handshake must complete within this time
    pub handshake_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Hub settings
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            path: DEFAULT_PATH.to_string(),
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            tcp_nodelay: true, // Chat frames are small
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the upgrade path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the per-connection outbound queue capacity
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.hub = self.hub.outbound_capacity(capacity);
        self
    }
}
