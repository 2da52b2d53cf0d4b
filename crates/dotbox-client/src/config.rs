//! Client configuration.

use std::time::Duration;

use dotbox_protocol::RoomCode;

/// Settings for a [`ClientSession`](crate::ClientSession).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base WebSocket URL of the server, e.g. `ws://127.0.0.1:8080`.
    pub server_url: String,
    /// Consecutive automatic reconnects before giving up.
    pub max_reconnect_attempts: u32,
    /// Pause before each automatic reconnect.
    pub reconnect_delay: Duration,
    /// Capacity of the event channel. Clamped to at least 1.
    pub event_channel_capacity: usize,
    /// How long [`ClientSession::shutdown`](crate::ClientSession::shutdown)
    /// waits for the driver task before aborting it.
    pub shutdown_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080".to_string(),
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(2),
            event_channel_capacity: 64,
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Default settings against `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    /// Sets the reconnect bound.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the event channel capacity.
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Full URL for a connection target.
    pub fn url_for(&self, target: &ConnectTarget) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), target.path())
    }
}

/// Where a connection attempt goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// Ask the server for a fresh room.
    NewRoom,
    /// Join (or rejoin) an existing room.
    Room(RoomCode),
}

impl ConnectTarget {
    /// The request path on the server.
    pub fn path(&self) -> String {
        match self {
            Self::NewRoom => "/new".to_string(),
            Self::Room(code) => format!("/room/{code}"),
        }
    }
}
