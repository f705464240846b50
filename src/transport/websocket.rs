//! WebSocket transport
//!
//! Wraps the two halves of a `tokio-tungstenite` stream. Control frames are
//! handled here so pumps only ever see chat payloads.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

use super::{FrameReader, FrameWriter};
use crate::error::Result;

/// Read half of a WebSocket connection
pub struct WsReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

/// Write half of a WebSocket connection
pub struct WsWriter<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    closed: bool,
}

/// Split an upgraded WebSocket into its read and write halves
pub fn split<S>(ws: WebSocketStream<S>) -> (WsReader<S>, WsWriter<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = ws.split();
    (
        WsReader { stream },
        WsWriter {
            sink,
            closed: false,
        },
    )
}

/// Errors that just mean the peer is gone
fn is_closed(e: &tungstenite::Error) -> bool {
    matches!(
        e,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
    )
}

impl<S> FrameReader for WsReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_frame(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(String::from_utf8_lossy(&data).into_owned()));
                }
                // tungstenite queues the pong reply itself
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    tracing::trace!(frame = ?frame, "Peer sent close frame");
                    return Ok(None);
                }
                Some(Err(e)) if is_closed(&e) => return Ok(None),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }
}

impl<S> FrameWriter for WsWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_text(&mut self, text: &str) -> Result<()> {
        self.sink.send(Message::Text(text.to_owned())).await?;
        Ok(())
    }

    async fn write_close(&mut self) -> Result<()> {
        match self.sink.send(Message::Close(None)).await {
            Err(e) if !is_closed(&e) => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.sink.close().await {
            Err(e) if !is_closed(&e) => Err(e.into()),
            _ => Ok(()),
        }
    }
}
