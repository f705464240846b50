//! Wire envelope
//!
//! Every frame the hub sends is a JSON object with three optional string
//! fields:
//!
//! ```text
//! { "sender": "<connection id>", "recipient": "<unused>", "content": "<text>" }
//! ```
//!
//! Empty fields are left out of the encoded form. `recipient` is carried for
//! wire compatibility only: the hub never routes on it, every message is a
//! broadcast. Direct messaging is not implemented.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Content of the announcement sent when a connection joins
pub const JOINED_CONTENT: &str = "/A new socket has connected.";

/// Content of the announcement sent when a connection leaves
pub const LEFT_CONTENT: &str = "/A socket has disconnected.";

/// An encoded envelope, shared by every fan-out target without copying
pub type Encoded = Arc<str>;

/// A chat envelope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Identity of the connection that produced the content (empty for system messages)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sender: String,

    /// Intended recipient; never consulted for routing
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recipient: String,

    /// Message payload
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

impl Envelope {
    /// Create a message relayed on behalf of a connection
    pub fn message(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipient: String::new(),
            content: content.into(),
        }
    }

    /// Create a system message with no sender
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// The "a connection joined" announcement
    pub fn joined() -> Self {
        Self::system(JOINED_CONTENT)
    }

    /// The "a connection left" announcement
    pub fn left() -> Self {
        Self::system(LEFT_CONTENT)
    }

    /// Whether this envelope was produced by the hub rather than a peer
    pub fn is_system(&self) -> bool {
        self.sender.is_empty()
    }

    /// Serialize to the wire form
    pub fn encode(&self) -> Result<Encoded> {
        Ok(serde_json::to_string(self)?.into())
    }

    /// Parse the wire form
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
