//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The room and client layers never call `serde_json` directly; they go
//! through a [`Codec`]. Today the only codec is [`JsonCodec`], because browser
//! peers speak JSON text frames, but tests and alternative transports can
//! plug in their own.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` so a single codec value can live in shared server
/// state and be used from any connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or don't
    /// match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use dotbox_protocol::{Codec, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ServerMessage::Ping).unwrap();
/// assert_eq!(bytes, br#"{"type":"ping"}"#);
///
/// let decoded: ServerMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, ServerMessage::Ping);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
