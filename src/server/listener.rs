//! Hub server listener
//!
//! Handles the TCP accept loop, upgrades each socket to a WebSocket and
//! hands it to the hub as a new connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header, StatusCode};
use tokio_tungstenite::WebSocketStream;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::hub::{Hub, HubHandle};
use crate::server::config::ServerConfig;
use crate::transport::websocket;

/// WebSocket broadcast server
pub struct HubServer {
    config: ServerConfig,
    hub: HubHandle,
    hub_task: JoinHandle<()>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl HubServer {
    /// Create a new server and start its hub
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let (hub, hub_task) = Hub::spawn(config.hub.clone());

        Self {
            config,
            hub,
            hub_task,
            connection_semaphore,
        }
    }

    /// Get a handle to the hub
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            path = %self.config.path,
            "Hub server listening"
        );
        Ok(listener)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = self.bind().await?;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    /// Accept connections on an already bound listener
    ///
    /// Returns [`Error::HubClosed`] once the hub task has stopped, since no
    /// connection could be admitted after that.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            self.check_hub()?;

            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// The server holds a hub handle, so a finished hub task has failed
    fn check_hub(&self) -> Result<()> {
        if self.hub_task.is_finished() {
            tracing::error!("Hub task stopped, no longer accepting connections");
            return Err(Error::HubClosed);
        }
        Ok(())
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::warn!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let path = self.config.path.clone();
        let handshake_timeout = self.config.handshake_timeout;
        let hub = self.hub.clone();

        tokio::spawn(async move {
            let _permit = permit;

            let ws = match tokio::time::timeout(handshake_timeout, upgrade(socket, path)).await {
                Ok(Ok(ws)) => ws,
                Ok(Err(e)) => {
                    tracing::debug!(peer = %peer_addr, error = %e, "Upgrade failed");
                    return;
                }
                Err(_) => {
                    tracing::debug!(peer = %peer_addr, "Upgrade timed out");
                    return;
                }
            };

            let (reader, writer) = websocket::split(ws);
            let connection = Connection::new(reader, writer, hub);
            let id = connection.id().clone();

            tracing::debug!(connection_id = %id, peer = %peer_addr, "New connection");

            if let Err(e) = connection.run().await {
                tracing::warn!(connection_id = %id, error = %e, "Connection not admitted");
            }
        });
    }
}

/// Perform the WebSocket handshake, refusing every path but `path`
///
/// The Origin header is not checked: pages on any site can open a
/// connection. Put an origin allow-list here before exposing the server
/// beyond a trusted network.
async fn upgrade(socket: TcpStream, path: String) -> Result<WebSocketStream<TcpStream>> {
    let callback = move |request: &Request, response: Response| {
        if request.uri().path() != path {
            tracing::warn!(path = %request.uri().path(), "Upgrade rejected: unknown path");
            let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            return Err(rejection);
        }

        if let Some(origin) = request.headers().get(header::ORIGIN) {
            tracing::debug!(origin = ?origin, "Accepting upgrade from any origin");
        }

        Ok(response)
    };

    Ok(tokio_tungstenite::accept_hdr_async(socket, callback).await?)
}
