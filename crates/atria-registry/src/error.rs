//! Error types for the registry layer.

use atria_protocol::{ParticipantId, Role};

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The (role, id) identity is already claimed by a live registration.
    #[error("identity {1} is already claimed as {0}")]
    DuplicateIdentity(Role, ParticipantId),
}
