//! # ws-hub
//!
//! A real-time WebSocket broadcast hub. Every message a client sends is
//! wrapped in an [`Envelope`] and relayed to every connected client; joins
//! and departures are announced to everyone else.
//!
//! ```text
//! transport ─► read pump ─► hub ─► outbound queue ─► write pump ─► transport
//! ```
//!
//! The [`hub`] owns the connection registry on a single task. Each
//! [`connection`] runs a read pump and a write pump that bridge its
//! transport to the hub. A client that stops draining its outbound queue is
//! evicted instead of slowing everyone else down.
//!
//! # Example
//!
//! ```no_run
//! use ws_hub::{HubServer, ServerConfig};
//!
//! # async fn example() -> ws_hub::error::Result<()> {
//! let server = HubServer::new(ServerConfig::default());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod envelope;
pub mod error;
pub mod hub;
pub mod server;
pub mod stats;
pub mod transport;

pub use connection::{Connection, ConnectionId};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use hub::{Hub, HubConfig, HubHandle};
pub use server::{HubServer, ServerConfig};
