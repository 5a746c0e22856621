//! Transport layer: one persistent bidirectional channel to the backend.
//!
//! The connection manager never touches sockets directly. It talks to three
//! seams:
//!
//! - [`Connector`] opens a fresh transport for a given auth payload (the
//!   manager calls it again on every reconnect attempt)
//! - [`Transport`] is the write half
//! - [`TransportReceiver`] is the read pump; it forwards every inbound JSON
//!   value to the `message_rx` channel in [`TransportParts`] and returns
//!   when the channel closes
//!
//! Production uses [`WsConnector`]; tests script the same traits with
//! channel-backed fakes.

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use scenelink_protocol::AuthPayload;

use crate::error::{Error, Result};

/// Write half of a transport.
pub trait Transport: Send {
    /// Serialize and emit one message.
    fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>>;
    /// Close the transport gracefully.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Read pump of a transport. `run` resolves when the transport closes:
/// `Ok` for a clean close, `Err` for a transport fault.
pub trait TransportReceiver: Send {
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

/// The pieces handed to the connection manager for one transport instance.
pub struct TransportParts {
    pub sender: Box<dyn Transport>,
    pub receiver: Box<dyn TransportReceiver>,
    /// Inbound messages, in arrival order.
    pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Opens transports. Implemented by [`WsConnector`] in production and by
/// scripted fakes in tests.
pub trait Connector: Send + Sync {
    fn connect(&self, auth: &AuthPayload) -> BoxFuture<'_, Result<TransportParts>>;
}

/// WebSocket connector against the backend's session endpoint.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Connector for WsConnector {
    fn connect(&self, auth: &AuthPayload) -> BoxFuture<'_, Result<TransportParts>> {
        let auth = auth.clone();
        Box::pin(async move {
            let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
                .await
                .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
            tracing::debug!(url = %self.url, "websocket transport open");

            let (sink, stream) = socket.split();
            let mut sender = WsSender { sink };

            // Auth payload is the first frame on every fresh transport;
            // the backend drops connections that send anything else first.
            sender.send(serde_json::to_value(&auth)?).await?;

            let (message_tx, message_rx) = mpsc::unbounded_channel();
            let receiver = WsReceiver { stream, message_tx };

            Ok(TransportParts {
                sender: Box::new(sender),
                receiver: Box::new(receiver),
                message_rx,
            })
        })
    }
}

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsStream = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

struct WsSender {
    sink: WsSink,
}

impl Transport for WsSender {
    fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let text = serde_json::to_string(&message)?;
            self.sink
                .send(Message::Text(text))
                .await
                .map_err(|e| Error::TransportError(e.to_string()))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.sink
                .send(Message::Close(None))
                .await
                .map_err(|e| Error::TransportError(e.to_string()))
        })
    }
}

struct WsReceiver {
    stream: WsStream,
    message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for WsReceiver {
    fn run(mut self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            while let Some(frame) = self.stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Value>(&text) {
                        Ok(value) => {
                            if self.message_tx.send(value).is_err() {
                                // Consumer gone; nothing left to deliver to.
                                return Ok(());
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to parse inbound frame");
                        }
                    },
                    Ok(Message::Close(_)) => {
                        tracing::debug!("websocket closed by peer");
                        return Ok(());
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => {}
                    Ok(other) => {
                        tracing::debug!(?other, "ignoring non-text frame");
                    }
                    Err(e) => {
                        return Err(Error::TransportError(e.to_string()));
                    }
                }
            }
            Ok(())
        })
    }
}
