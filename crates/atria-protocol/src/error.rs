//! Error types for the protocol layer.
//!
//! Each crate in Atria defines its own error enum; a `ProtocolError`
//! always means a serialization/deserialization problem, never a
//! networking or coordination failure.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or a
    /// truncated message.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but violates protocol rules — e.g. a
    /// response envelope arriving where only requests are expected.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
