//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! The coordinator listens with [`WebSocketTransport`]; client stubs dial
//! with [`WebSocketConnector`]. Both sides speak binary frames carrying
//! codec-encoded envelopes.
//!
//! The read and write halves of each stream are split and locked
//! independently: a task blocked in `recv()` waiting for the peer must
//! not hold up a concurrent `send()` — coordinator pushes happen while
//! the client is idle, and stub requests happen while the stub's read
//! loop is parked in `recv()`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
///
/// Shared between accepted and dialed connections so an id is unique
/// process-wide regardless of which side opened it.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type ServerStream = WebSocketStream<TcpStream>;
type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

// ---------------------------------------------------------------------------
// Listener side
// ---------------------------------------------------------------------------

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = next_connection_id();
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            writer: Writer::Server(Arc::new(Mutex::new(sink))),
            reader: Reader::Server(Arc::new(Mutex::new(stream))),
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dialer side
// ---------------------------------------------------------------------------

/// Dials outbound WebSocket connections for client stubs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Connects to a coordinator at `host:port`.
    ///
    /// Resolution failure (bad name, refused connection, handshake error)
    /// surfaces as [`TransportError::ConnectFailed`] — the caller decides
    /// whether to retry.
    pub async fn connect(addr: &str) -> Result<WebSocketConnection, TransportError> {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let id = next_connection_id();
        tracing::debug!(%id, addr, "dialed WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            writer: Writer::Client(Arc::new(Mutex::new(sink))),
            reader: Reader::Client(Arc::new(Mutex::new(stream))),
        })
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

// Accepted and dialed streams have different concrete types in
// tungstenite; these fold the two behind one connection value.
enum Writer {
    Server(Arc<Mutex<SplitSink<ServerStream, Message>>>),
    Client(Arc<Mutex<SplitSink<ClientStream, Message>>>),
}

enum Reader {
    Server(Arc<Mutex<SplitStream<ServerStream>>>),
    Client(Arc<Mutex<SplitStream<ClientStream>>>),
}

/// A single WebSocket connection, from either side of the dial.
pub struct WebSocketConnection {
    id: ConnectionId,
    writer: Writer,
    reader: Reader,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        use futures_util::SinkExt;
        let msg = Message::Binary(data.to_vec().into());
        let result = match &self.writer {
            Writer::Server(sink) => sink.lock().await.send(msg).await,
            Writer::Client(sink) => sink.lock().await.send(msg).await,
        };
        result.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        loop {
            let msg = match &self.reader {
                Reader::Server(stream) => stream.lock().await.next().await,
                Reader::Client(stream) => stream.lock().await.next().await,
            };
            match msg {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        use futures_util::SinkExt;
        let result = match &self.writer {
            Writer::Server(sink) => sink.lock().await.close().await,
            Writer::Client(sink) => sink.lock().await.close().await,
        };
        result.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
