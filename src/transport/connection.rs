//! WebSocket frame transport and event loop.
//!
//! [`FrameTransport`] owns one socket. Its event loop handles:
//!
//! - Inbound frames, paired into command/payload messages and decoded
//! - Outbound payloads from the worker handle, sent as single binary frames
//! - Close requests from the worker handle
//!
//! Outbound commands queue on an unbounded channel and are only read once
//! the loop runs, so anything sent before the socket opened is flushed in
//! call order.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{Frame, FramePairer, InboundMessage};

// ============================================================================
// Types
// ============================================================================

/// Socket returned by [`connect`].
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Callback receiving every decoded inbound message.
pub type InboundHandler = Box<dyn Fn(InboundMessage) + Send + Sync>;

/// Commands accepted by the event loop.
pub enum TransportCommand {
    /// Send one encoded payload as a binary frame.
    Send {
        /// Encoded value.
        frame: Vec<u8>,
        /// Completed once the frame is written (or failed).
        ack: oneshot::Sender<Result<()>>,
    },
    /// Close the socket and stop the loop.
    Close {
        /// Completed once the close frame is sent.
        ack: oneshot::Sender<()>,
    },
}

/// Why the event loop stopped.
#[derive(Debug)]
pub enum TransportExit {
    /// Closed on request, or every handle was dropped.
    Closed,
    /// The remote end closed the socket.
    RemoteClosed,
    /// The socket failed.
    Failed(Error),
}

// ============================================================================
// TransportStats
// ============================================================================

/// Counters kept by the event loop for diagnostics.
#[derive(Debug, Default)]
pub struct TransportStats {
    messages_received: AtomicU64,
    frames_sent: AtomicU64,
    protocol_violations: AtomicU64,
    dropped_payloads: AtomicU64,
}

/// Point-in-time copy of [`TransportStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Inbound messages delivered to listeners.
    pub messages_received: u64,
    /// Outbound binary frames written.
    pub frames_sent: u64,
    /// Frames received out of pairing order.
    pub protocol_violations: u64,
    /// Payloads dropped because they did not decode.
    pub dropped_payloads: u64,
}

impl TransportStats {
    /// Returns the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            dropped_payloads: self.dropped_payloads.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Connect
// ============================================================================

/// Opens the socket negotiated by the bootstrap call.
///
/// Returns once the socket reports open.
///
/// # Errors
///
/// - [`Error::Timeout`] if the socket does not open within `connect_timeout`
/// - [`Error::Transport`] if the connection or upgrade fails
pub async fn connect(ws_url: &Url, connect_timeout: Duration) -> Result<WsStream> {
    debug!(%ws_url, "Opening websocket connection");

    let (stream, _response) = timeout(connect_timeout, connect_async(ws_url.as_str()))
        .await
        .map_err(|_| Error::timeout("websocket connect", connect_timeout.as_millis() as u64))?
        .map_err(|e| Error::transport(format!("websocket connect to {ws_url} failed: {e}")))?;

    debug!(%ws_url, "Websocket opened");
    Ok(stream)
}

// ============================================================================
// FrameTransport
// ============================================================================

/// One socket plus its inbound pairing state.
pub struct FrameTransport<S> {
    /// Socket.
    stream: S,
    /// Inbound pairing state.
    pairer: FramePairer,
    /// Shared counters.
    stats: Arc<TransportStats>,
}

impl<S> FrameTransport<S>
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    /// Wraps an open socket.
    pub fn new(stream: S, stats: Arc<TransportStats>) -> Self {
        Self {
            stream,
            pairer: FramePairer::new(),
            stats,
        }
    }

    /// Runs the event loop until the socket closes or fails.
    pub async fn run(
        self,
        mut commands: mpsc::UnboundedReceiver<TransportCommand>,
        handler: InboundHandler,
    ) -> TransportExit {
        let Self {
            stream,
            mut pairer,
            stats,
        } = self;
        let (mut ws_write, mut ws_read) = stream.split();

        loop {
            tokio::select! {
                // Frames from the coordinator
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            handle_frame(&mut pairer, &stats, &handler, Frame::Text(text.to_string()));
                        }

                        Some(Ok(Message::Binary(bytes))) => {
                            handle_frame(&mut pairer, &stats, &handler, Frame::Binary(bytes.to_vec()));
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            return TransportExit::RemoteClosed;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            return TransportExit::Failed(Error::WebSocket(e));
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            return TransportExit::RemoteClosed;
                        }

                        // Ping, Pong, raw frames
                        Some(Ok(_)) => {}
                    }
                }

                // Commands from the worker handle
                command = commands.recv() => {
                    match command {
                        Some(TransportCommand::Send { frame, ack }) => {
                            let len = frame.len();
                            match ws_write.send(Message::Binary(frame.into())).await {
                                Ok(()) => {
                                    stats.frames_sent.fetch_add(1, Ordering::Relaxed);
                                    trace!(len, "Payload sent");
                                    let _ = ack.send(Ok(()));
                                }
                                Err(e) => {
                                    error!(error = %e, "Failed to send payload");
                                    let _ = ack.send(Err(Error::transport(e.to_string())));
                                    return TransportExit::Failed(Error::WebSocket(e));
                                }
                            }
                        }

                        Some(TransportCommand::Close { ack }) => {
                            debug!("Close requested");
                            if let Err(e) = ws_write.close().await {
                                debug!(error = %e, "Close handshake failed");
                            }
                            let _ = ack.send(());
                            return TransportExit::Closed;
                        }

                        None => {
                            debug!("All handles dropped, closing");
                            let _ = ws_write.close().await;
                            return TransportExit::Closed;
                        }
                    }
                }
            }
        }
    }
}

/// Feeds one frame to the pairer and dispatches a completed message.
fn handle_frame(
    pairer: &mut FramePairer,
    stats: &TransportStats,
    handler: &InboundHandler,
    frame: Frame,
) {
    match pairer.push(frame) {
        Ok(Some(message)) => {
            stats.messages_received.fetch_add(1, Ordering::Relaxed);
            trace!(command = %message.command, "Message received");
            handler(message);
        }
        Ok(None) => {}
        Err(Error::Codec(e)) => {
            stats.dropped_payloads.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Dropping undecodable payload");
        }
        Err(e) => {
            stats.protocol_violations.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Protocol violation, frame discarded");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
