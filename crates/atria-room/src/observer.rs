//! Observer push bookkeeping.
//!
//! A room never talks to the network directly. For every attached
//! participant it holds an [`ObserverHandle`]: the participant's identity
//! plus a queue the coordinator drains toward that participant's
//! connection. Pushing is fire-and-forget — the room learns nothing about
//! the client beyond "the queue is still open".

use std::fmt;

use atria_protocol::{Notice, ParticipantId};
use tokio::sync::mpsc;

/// Identity of one attached observer handle.
///
/// Each client incarnation gets a fresh `ObserverId` (the coordinator
/// derives it from the connection). Rooms compare it to tell a live
/// handle from one that was superseded by a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Creates a new `ObserverId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs-{}", self.0)
    }
}

/// The sending end of an observer's notice queue.
pub type ObserverSender = mpsc::UnboundedSender<Notice>;

/// The receiving end of an observer's notice queue.
///
/// The coordinator holds this and forwards drained notices to the
/// observer's connection; dropping it is what makes future pushes fail
/// and flips the record offline.
pub type ObserverReceiver = mpsc::UnboundedReceiver<Notice>;

/// The push-callback handle a room holds for one attached participant.
///
/// Exposes exactly the callback contract: [`update`](Self::update) to
/// deliver a message and [`participant`](Self::participant) to identify
/// the target.
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    participant: ParticipantId,
    observer: ObserverId,
    queue: mpsc::UnboundedSender<Notice>,
}

impl ObserverHandle {
    /// Creates a handle and the receiver the coordinator drains.
    pub fn new(
        participant: ParticipantId,
        observer: ObserverId,
    ) -> (Self, ObserverReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_queue(participant, observer, tx), rx)
    }

    /// Creates a handle onto an existing queue.
    ///
    /// One connection drains a single queue; every room the connection
    /// attaches to gets its own handle sharing that queue.
    pub fn with_queue(
        participant: ParticipantId,
        observer: ObserverId,
        queue: ObserverSender,
    ) -> Self {
        Self {
            participant,
            observer,
            queue,
        }
    }

    /// The participant this handle notifies.
    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// The handle's own identity (one per client incarnation).
    pub fn observer(&self) -> ObserverId {
        self.observer
    }

    /// Delivers a notice. Returns `false` if the observer is gone
    /// (receiver dropped) — the caller records the outcome, nothing is
    /// retried.
    pub fn update(&self, notice: Notice) -> bool {
        self.queue.send(notice).is_ok()
    }
}
