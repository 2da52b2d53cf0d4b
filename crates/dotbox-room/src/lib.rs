//! Room sessions for Dotbox.
//!
//! Each match runs as an isolated Tokio task (actor model) that owns the
//! authoritative game state, up to two player sockets, persistence and the
//! heartbeat cycle.
//!
//! # Key types
//!
//! - [`RoomDirectory`]: creates room codes, routes connections to rooms
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomStore`]: persistence backend ([`MemoryStore`], [`FileStore`])
//! - [`RoomConfig`]: board size, heartbeat timings, channel sizes
//!
//! # Room contract
//!
//! - Slot 1 goes to the first connection, slot 2 to the second; a third is
//!   answered with [`RoomError::RoomFull`] and never tracked.
//! - Moves are only accepted while both slots are live, from the player
//!   whose turn it is, and only if the engine accepts them.
//! - State is reloaded from the store before every admission, move and
//!   disconnect, and saved after every accepted move.

mod config;
mod directory;
mod error;
mod room;
mod store;

pub use config::RoomConfig;
pub use directory::RoomDirectory;
pub use error::{RoomError, StoreError};
pub use room::{Admission, PeerOutbound, PeerSender, RoomHandle, RoomInfo};
pub use store::{FileStore, MemoryStore, RoomStore};

pub use dotbox_protocol::RoomCode;
