//! Wire protocol for Dotbox.
//!
//! This crate defines what travels between a player's client and the room
//! session that owns their match:
//!
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): discrete JSON
//!   objects with a `type` discriminator.
//! - **Room codes** ([`RoomCode`]): short, human-transcribable identifiers.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become bytes.
//! - **Errors** ([`ProtocolError`], [`RoomCodeError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage / ServerMessage) → Room session
//! ```
//!
//! The protocol layer knows nothing about sockets or rooms; it only knows how
//! to name things and how to (de)serialize them.

mod codec;
mod error;
mod messages;
mod room_code;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{notice, ClientMessage, ServerMessage};
pub use room_code::{RoomCode, RoomCodeError, ROOM_CODE_ALPHABET};

pub use dotbox_engine::{GameState, Line, Player};
