//! Core protocol types for Atria's wire format.
//!
//! Everything in this module is a structure that gets serialized to bytes,
//! sent over the network, and deserialized on the other side. The
//! coordinator and the client stubs must agree on these shapes exactly —
//! a mismatch means a stub cannot parse the coordinator's replies.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a participant.
///
/// Newtype over `u64` so a participant id can never be confused with a
/// slot number or a party size in a signature. `#[serde(transparent)]`
/// keeps the wire shape a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p-{}", self.0)
    }
}

/// A network slot on the coordinator.
///
/// Slot 0 is the registry/directory; slots 1..N address individual rooms.
/// A room's slot is its stable identity for the coordinator's uptime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(pub u16);

impl Slot {
    /// The registry/directory slot.
    pub const REGISTRY: Slot = Slot(0);

    /// Returns `true` if this is the registry slot.
    pub fn is_registry(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// The capability role a participant registers under.
///
/// The registry keys its uniqueness claims on (role, id), so the same
/// numeric id may exist once as an applier and once as an approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Role {
    /// A participant requesting and using rooms.
    Applier,
    /// An approval authority granting reservations.
    Approver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applier => write!(f, "applier"),
            Self::Approver => write!(f, "approver"),
        }
    }
}

// ---------------------------------------------------------------------------
// Refusals — authoritative rejections on the wire
// ---------------------------------------------------------------------------

/// Why the coordinator refused a request.
///
/// These are *authoritative* outcomes: the coordinator was reached, looked
/// at the request, and said no. They are deliberately disjoint from
/// transport failures (timeouts, unreachable host), which never cross the
/// wire and are surfaced client-side as connection errors — the retry
/// strategy for the two differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RefusalReason {
    /// The (role, id) identity is already claimed by a live registration.
    DuplicateIdentity,
    /// The participant already holds a live applier record on this room.
    AlreadyApplied,
    /// The room's state machine guard rejected the requested transition.
    InvalidTransition,
    /// The target (slot or participant id) is absent where presence was
    /// required.
    NotFound,
    /// The target of a Reject is the current occupant.
    CannotRejectOccupant,
    /// The caller's handle was superseded by a newer registration for the
    /// same identity.
    StaleReference,
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DuplicateIdentity => "duplicate identity",
            Self::AlreadyApplied => "already applied",
            Self::InvalidTransition => "invalid transition",
            Self::NotFound => "not found",
            Self::CannotRejectOccupant => "cannot reject occupant",
            Self::StaleReference => "stale reference",
        };
        f.write_str(s)
    }
}

/// A typed rejection as it crosses the wire.
///
/// `detail` is human-readable context for logs; `reason` is what callers
/// branch on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refusal {
    /// The taxonomy variant.
    pub reason: RefusalReason,
    /// Human-readable context.
    pub detail: String,
}

impl Refusal {
    /// Builds a refusal from a reason and printable detail.
    pub fn new(reason: RefusalReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}

// ---------------------------------------------------------------------------
// Descriptors — read-only snapshots sent to clients
// ---------------------------------------------------------------------------

/// What kind of endpoint lives at a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SlotKind {
    /// The identity registry and slot directory.
    Registry,
    /// A coordinated room.
    Room,
}

/// A read-only snapshot of one room, as reported to clients.
///
/// Descriptive attributes (`name`, `kind`, `capacity`) are fixed at
/// coordinator startup; `status`, `appliers`, and `reservation` reflect
/// the room at the moment the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDescriptor {
    /// The room's network slot.
    pub slot: Slot,
    /// Display name, e.g. "Aurora".
    pub name: String,
    /// Descriptive room type label, e.g. "standard".
    pub kind: String,
    /// Seating capacity. Descriptive only — the coordinator does not
    /// enforce it against party sizes.
    pub capacity: u32,
    /// Current state label from the room's closed state set.
    pub status: String,
    /// Number of live applier records.
    pub appliers: u32,
    /// The approved-next-occupant marker, if any.
    pub reservation: Option<ParticipantId>,
}

impl fmt::Display for RoomDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" ({}, cap {}) [{}] appliers={}",
            self.slot, self.name, self.kind, self.capacity, self.status, self.appliers
        )
    }
}

/// One row of an applier listing, as reported to the approval authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplierEntry {
    /// The applier's identity.
    pub id: ParticipantId,
    /// Recorded party size.
    pub party_size: u32,
    /// Whether the last push to this applier's handle succeeded.
    pub online: bool,
}

// ---------------------------------------------------------------------------
// Request — calls into the coordinator
// ---------------------------------------------------------------------------

/// A call from a client stub to the coordinator.
///
/// Requests addressed at a room carry the target `slot`; registry
/// requests are only valid at slot 0. `#[serde(tag = "type")]` produces
/// internally tagged JSON: `{ "type": "Apply", "slot": 3, ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    // -- Naming and discovery --
    /// What lives at this slot? Refused with NotFound past the last
    /// assigned slot, which is how sequential probing terminates.
    Resolve { slot: Slot },
    /// Liveness check for one slot.
    Ping { slot: Slot },
    /// Full read-only snapshot of a room.
    Describe { slot: Slot },

    // -- Registry (slot 0) --
    /// Is this (role, id) currently claimed?
    Check { role: Role, id: ParticipantId },
    /// Atomically claim (role, id). Refused with DuplicateIdentity if
    /// already claimed.
    Claim { role: Role, id: ParticipantId },
    /// Forcibly claim (role, id), replacing any stranded claim. Only the
    /// reconnect handshake uses this.
    Reclaim { role: Role, id: ParticipantId },
    /// Release a claim. Releasing an absent claim is a no-op.
    Release { role: Role, id: ParticipantId },

    // -- Applier workflow --
    /// Apply for a room with a party of the given size. The requesting
    /// connection becomes the applier's push-callback target.
    Apply {
        slot: Slot,
        id: ParticipantId,
        party_size: u32,
    },
    /// Withdraw a pending application.
    Cancel { slot: Slot, id: ParticipantId },
    /// Take occupancy. Valid only for the reserved participant while the
    /// room is available.
    Occupy { slot: Slot, id: ParticipantId },
    /// Give up occupancy. Valid only for the current occupant.
    EndOccupying { slot: Slot, id: ParticipantId },
    /// Report the room as needing repair. Any current applier or the
    /// occupant may do this.
    ReportFault { slot: Slot, id: ParticipantId },
    /// Re-bind this connection as the push-callback target for an
    /// existing applier record.
    AttachObserver { slot: Slot, id: ParticipantId },

    // -- Approval-authority workflow --
    /// Register this connection as an approver observing the room.
    RegisterApprover { slot: Slot, id: ParticipantId },
    /// Grant the reservation to a pending applier.
    Approve { slot: Slot, id: ParticipantId },
    /// Remove a pending applier. Refused with CannotRejectOccupant for
    /// the current occupant.
    Reject { slot: Slot, id: ParticipantId },
    /// Remove a participant's record (applier or approver) from the room.
    Disconnect { slot: Slot, id: ParticipantId },

    // -- Housekeeping transitions --
    /// Occupied (with no occupant left) → Cleaning.
    BeginCleaning { slot: Slot },
    /// Cleaning → Available.
    FinishCleaning { slot: Slot },
    /// NeedsRepair → Cleaning.
    FinishRepair { slot: Slot },

    // -- Read-only queries --
    /// Does `id` currently hold an applier record (pending or occupying)?
    Applying { slot: Slot, id: ParticipantId },
    /// Number of live applier records.
    ApplierCount { slot: Slot },
    /// Recorded party size for one applier.
    PartySizeOf { slot: Slot, id: ParticipantId },
    /// Full applier listing for the approval authority.
    ApplierList { slot: Slot },
    /// Current reservation holder, if any.
    Reservation { slot: Slot },
}

// ---------------------------------------------------------------------------
// Response — replies from the coordinator
// ---------------------------------------------------------------------------

/// The coordinator's reply to a single [`Request`].
///
/// Exactly one `Response` is sent per request, correlated by the
/// envelope's `seq`. Guard failures arrive as `Refused`, never as a
/// dropped or ambiguous reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// The request succeeded and has no payload.
    Ok,
    /// Reply to `Ping`.
    Pong,
    /// Reply to `Resolve`.
    Resolved { kind: SlotKind },
    /// Reply to `Describe`.
    Descriptor { room: RoomDescriptor },
    /// Reply to `Check`.
    Claimed { claimed: bool },
    /// Reply to `Applying`.
    Applying { applying: bool },
    /// Reply to `ApplierCount`.
    Count { value: u32 },
    /// Reply to `PartySizeOf`.
    PartySize { value: u32 },
    /// Reply to `ApplierList`.
    Appliers { entries: Vec<ApplierEntry> },
    /// Reply to `Reservation`.
    ReservationHolder { id: Option<ParticipantId> },
    /// The coordinator refused the request.
    Refused { refusal: Refusal },
}

// ---------------------------------------------------------------------------
// Notice — pushes from the coordinator
// ---------------------------------------------------------------------------

/// An asynchronous push from a room to an attached observer.
///
/// Notices are sent after the triggering mutation has committed; delivery
/// outcome never affects whether the mutation stands. No ordering is
/// guaranteed across observers for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notice {
    /// The room moved to a new state.
    StatusChanged { slot: Slot, status: String },
    /// The reservation was granted to this observer's identity.
    ReservationGranted { slot: Slot, id: ParticipantId },
    /// A previously granted reservation was withdrawn.
    ReservationRevoked { slot: Slot, id: ParticipantId },
    /// This observer's application was rejected and its record removed.
    ApplicationRejected { slot: Slot, id: ParticipantId },
    /// The applier set changed (someone applied, canceled, or was
    /// removed). Sent to approvers.
    ApplierChanged { slot: Slot, appliers: u32 },
}

// ---------------------------------------------------------------------------
// Envelope — the top-level wire format
// ---------------------------------------------------------------------------

/// The content of an envelope.
///
/// `#[serde(tag = "kind", content = "body")]` produces adjacently tagged
/// JSON, so a receiver can branch on `kind` before looking at the body:
/// `{ "kind": "Request", "body": { "type": "Ping", "slot": 3 } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body")]
pub enum Payload {
    /// A call from a stub to the coordinator.
    Request(Request),
    /// The coordinator's reply to a call.
    Response(Response),
    /// An asynchronous push to an observer.
    Notice(Notice),
}

/// The top-level message wrapper. Every message on the wire is an
/// `Envelope`.
///
/// For requests, `seq` is chosen by the caller; the matching response
/// echoes it, which is how a stub correlates concurrent in-flight calls.
/// Notices carry the coordinator's own outbound counter and correlate
/// with nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation number (caller-chosen for requests, echoed in the
    /// response; coordinator-chosen for notices).
    pub seq: u64,
    /// The actual message content.
    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================
