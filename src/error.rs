//! Error types
//!
//! A single crate-wide error enum. Nothing here is fatal to the process:
//! callers turn these into a torn-down connection or a skipped message.

use tokio_tungstenite::tungstenite;

/// Crate result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for hub, transport and envelope operations
#[derive(Debug)]
pub enum Error {
    /// Socket-level I/O failure
    Io(std::io::Error),
    /// WebSocket protocol or handshake failure
    Transport(tungstenite::Error),
    /// Envelope could not be serialized or parsed
    Envelope(serde_json::Error),
    /// The hub loop has stopped and no longer accepts events
    HubClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Transport(e) => write!(f, "Transport error: {}", e),
            Error::Envelope(e) => write!(f, "Envelope error: {}", e),
            Error::HubClosed => write!(f, "Hub is closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Transport(e) => Some(e),
            Error::Envelope(e) => Some(e),
            Error::HubClosed => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::Transport(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Envelope(e)
    }
}
