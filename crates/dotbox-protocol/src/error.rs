//! Error types for the protocol layer.
//!
//! Each Dotbox crate defines its own error enum. A `ProtocolError` always
//! means the bytes themselves were the problem, never the game rules.

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, unknown `type`, wrong field
    /// types, or a truncated frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but makes no sense at the protocol level.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
