//! Transport seam
//!
//! A connection's transport is split into a read half, owned by its read
//! pump, and a write half, owned by its write pump. The hub never touches
//! either.

pub mod websocket;

use std::future::Future;

use crate::error::Result;

pub use websocket::{WsReader, WsWriter};

/// Read half of a message-oriented transport
pub trait FrameReader: Send {
    /// Wait for the next message
    ///
    /// Returns `Ok(None)` once the peer has closed the connection cleanly.
    fn read_frame(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// Write half of a message-oriented transport
pub trait FrameWriter: Send {
    /// Send one text message
    fn write_text(&mut self, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Tell the peer no more messages will follow
    fn write_close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Release the transport; calling this more than once is harmless
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}
