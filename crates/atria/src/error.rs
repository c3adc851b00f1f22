//! Unified error type for the Atria coordinator.

use atria_protocol::ProtocolError;
use atria_registry::RegistryError;
use atria_room::RoomError;
use atria_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `atria` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum AtriaError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry-level error (duplicate identity).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A room-level error (guard failure, unavailable actor).
    #[error(transparent)]
    Room(#[from] RoomError),
}
