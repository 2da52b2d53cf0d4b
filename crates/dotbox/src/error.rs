//! Unified error type for the Dotbox server.

use dotbox_client::ClientError;
use dotbox_protocol::ProtocolError;
use dotbox_room::{RoomError, StoreError};
use dotbox_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DotboxError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire encoding error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (full, unavailable, bad board).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A persistence backend error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A client session error.
    #[error(transparent)]
    Client(#[from] ClientError),
}
