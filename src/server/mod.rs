//! WebSocket entry point
//!
//! Accepts TCP connections, upgrades requests on the configured path and
//! admits each upgraded socket into the hub.

pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::HubServer;
