//! Error types for the room layer.

use atria_protocol::{ParticipantId, Slot};

/// Errors that can occur during room operations.
///
/// Every variant is an authoritative guard failure: the room looked at
/// the request under its lock, refused it, and mutated nothing.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The participant already holds a live applier record on this room.
    #[error("participant {0} already applied")]
    AlreadyApplied(ParticipantId),

    /// The participant has no record on this room (or the target slot
    /// does not address a room).
    #[error("participant {0} not found")]
    NotFound(ParticipantId),

    /// The target of a Reject (or Cancel) is the current occupant.
    #[error("participant {0} is the current occupant")]
    CannotRejectOccupant(ParticipantId),

    /// The state machine guard (or an occupancy precondition) rejected
    /// the request.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The caller's handle was superseded by a newer registration for
    /// the same identity.
    #[error("stale reference for participant {0}")]
    StaleReference(ParticipantId),

    /// The room's command channel is closed — the actor is gone.
    #[error("room {0} is unavailable")]
    Unavailable(Slot),
}
