//! `DotboxServer` builder and accept loop.
//!
//! This is the entry point for running a Dotbox server. It ties the layers
//! together: transport → path routing → room directory → room actors.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dotbox_protocol::{Codec, JsonCodec};
use dotbox_room::{MemoryStore, RoomConfig, RoomDirectory, RoomError, RoomStore};
use dotbox_transport::{WebSocketTransport, DEFAULT_HANDSHAKE_TIMEOUT};

use crate::handler::handle_connection;
use crate::DotboxError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S: RoomStore, C: Codec> {
    pub(crate) directory: Arc<RoomDirectory<S>>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Dotbox server.
///
/// # Example
///
/// ```rust,ignore
/// use dotbox::prelude::*;
///
/// let server = DotboxServer::builder()
///     .bind("0.0.0.0:8080")
///     .store(FileStore::open("./rooms").await?)
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct DotboxServerBuilder<S: RoomStore = MemoryStore> {
    bind_addr: String,
    room_config: RoomConfig,
    handshake_timeout: Duration,
    store: S,
}

impl DotboxServerBuilder<MemoryStore> {
    /// Creates a builder with default settings and an in-memory store.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            store: MemoryStore::new(),
        }
    }
}

impl Default for DotboxServerBuilder<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RoomStore> DotboxServerBuilder<S> {
    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every room is spawned with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets how long a peer may take to finish the WebSocket handshake.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Replaces the persistence backend.
    pub fn store<T: RoomStore>(self, store: T) -> DotboxServerBuilder<T> {
        DotboxServerBuilder {
            bind_addr: self.bind_addr,
            room_config: self.room_config,
            handshake_timeout: self.handshake_timeout,
            store,
        }
    }

    /// Binds the listener and builds the server.
    ///
    /// Fails if the board size is unusable or the address cannot be bound.
    pub async fn build(self) -> Result<DotboxServer<S>, DotboxError> {
        self.room_config.initial_state().map_err(RoomError::from)?;

        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_handshake_timeout(self.handshake_timeout);
        let directory = Arc::new(RoomDirectory::new(self.room_config, self.store));
        let state = Arc::new(ServerState {
            directory,
            codec: JsonCodec,
        });

        Ok(DotboxServer { transport, state })
    }
}

/// A bound Dotbox server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DotboxServer<S: RoomStore = MemoryStore> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, JsonCodec>>,
}

impl DotboxServer<MemoryStore> {
    /// Creates a new builder.
    pub fn builder() -> DotboxServerBuilder<MemoryStore> {
        DotboxServerBuilder::new()
    }
}

impl<S: RoomStore> DotboxServer<S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The room directory, shared with every connection handler.
    pub fn directory(&self) -> Arc<RoomDirectory<S>> {
        Arc::clone(&self.state.directory)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), DotboxError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then stops every
    /// room. Persisted states are kept.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), DotboxError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Dotbox server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                // Only the TCP accept runs here; the handshake happens in
                // the connection's own task.
                accepted = self.transport.accept_stream() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let addr = pending.peer_addr();
                            let conn = match pending.upgrade().await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    tracing::debug!(%addr, error = %e, "handshake failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.state.directory.shutdown_all().await;
        tracing::info!("Dotbox server stopped");
        Ok(())
    }
}
