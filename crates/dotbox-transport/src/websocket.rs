//! WebSocket transport implementation using `tokio-tungstenite`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How long a peer may take to complete the opening handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        })
    }

    /// Sets how long [`PendingUpgrade::upgrade`] waits for the handshake.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts a TCP stream without running the WebSocket handshake.
    ///
    /// Accept loops should call this and run [`PendingUpgrade::upgrade`] in
    /// a spawned task, so a peer that never finishes its handshake cannot
    /// hold up the next accept.
    pub async fn accept_stream(&self) -> Result<PendingUpgrade, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(PendingUpgrade {
            stream,
            addr,
            timeout: self.handshake_timeout,
        })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.accept_stream().await?.upgrade().await
    }
}

/// An accepted TCP stream whose WebSocket handshake has not run yet.
pub struct PendingUpgrade {
    stream: TcpStream,
    addr: SocketAddr,
    timeout: Duration,
}

impl PendingUpgrade {
    /// The peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server side of the handshake, failing with
    /// [`io::ErrorKind::TimedOut`] if the peer does not finish in time.
    pub async fn upgrade(self) -> Result<WebSocketConnection, TransportError> {
        let Self {
            stream,
            addr,
            timeout,
        } = self;

        // The request path is the only routing input a peer gives us.
        let mut path = String::from("/");
        let callback = |req: &Request, response: Response| {
            path = req.uri().path().to_string();
            Ok(response)
        };
        let handshake = tokio_tungstenite::accept_hdr_async(stream, callback);
        let ws = tokio::time::timeout(timeout, handshake)
            .await
            .map_err(|_| {
                tracing::debug!(%addr, ?timeout, "WebSocket handshake timed out");
                TransportError::AcceptFailed(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "handshake timed out",
                ))
            })?
            .map_err(|e| {
                TransportError::AcceptFailed(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let conn = WebSocketConnection::new(ws, path);
        tracing::debug!(id = %conn.id, %addr, path = %conn.path, "accepted WebSocket connection");
        Ok(conn)
    }
}

/// A client-side connection dialed with [`connect`].
pub type ClientConnection = WebSocketConnection<MaybeTlsStream<TcpStream>>;

/// Opens a WebSocket connection to `url` (e.g. `ws://host:port/room/ABC234`).
pub async fn connect(url: &str) -> Result<ClientConnection, TransportError> {
    let (ws, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| {
            TransportError::ConnectFailed(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;
    let conn = WebSocketConnection::new(ws, url.to_string());
    tracing::debug!(id = %conn.id, url, "WebSocket connection opened");
    Ok(conn)
}

/// A single WebSocket connection.
///
/// The stream is split so that a reader parked in `recv` never blocks a
/// writer; each half has its own lock.
pub struct WebSocketConnection<S = TcpStream> {
    id: ConnectionId,
    path: String,
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(ws: WebSocketStream<S>, path: String) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id: ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            path,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    /// The request path for accepted connections, or the dialed URL for
    /// client connections.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Error = TransportError;

    /// UTF-8 payloads go out as text frames (JSON peers expect them),
    /// anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(io::Error::new(io::ErrorKind::BrokenPipe, e))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(io::Error::new(io::ErrorKind::BrokenPipe, e))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
