//! The occupancy state machine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The occupancy state of a room.
///
/// The set is closed and the transitions form a cycle with a repair
/// detour:
///
/// ```text
///            Occupy              BeginCleaning
/// Available ────────→ Occupied ────────────────→ Cleaning
///     ↑                                              │
///     └──────────────── FinishCleaning ──────────────┘
///
/// Available / Occupied / Cleaning ── ReportFault ──→ NeedsRepair
/// NeedsRepair ── FinishRepair ──→ Cleaning
/// ```
///
/// - **Available**: ready for use; the only state in which a reservation
///   may be granted.
/// - **Occupied**: a participant holds active use.
/// - **Cleaning**: being turned over; passes back to Available.
/// - **NeedsRepair**: out of service; a repaired room is cleaned before
///   returning to service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Available,
    Occupied,
    Cleaning,
    NeedsRepair,
}

/// A requested state transition.
///
/// `Occupy` and `ReportFault` are issued by participants (and carry
/// participant checks at the room); the remaining three are housekeeping
/// operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Available → Occupied.
    Occupy,
    /// Occupied → Cleaning.
    BeginCleaning,
    /// Cleaning → Available.
    FinishCleaning,
    /// Available / Occupied / Cleaning → NeedsRepair.
    ReportFault,
    /// NeedsRepair → Cleaning.
    FinishRepair,
}

impl RoomStatus {
    /// Attempts a transition.
    ///
    /// Returns `Some(next)` if the transition is valid from this state,
    /// `None` if not. This is a total function of (state, transition):
    /// nothing else — not time, not the applier set — participates in
    /// the decision, and an invalid request changes nothing.
    pub fn apply(self, via: Transition) -> Option<Self> {
        match (self, via) {
            (Self::Available, Transition::Occupy) => Some(Self::Occupied),
            (Self::Occupied, Transition::BeginCleaning) => Some(Self::Cleaning),
            (Self::Cleaning, Transition::FinishCleaning) => Some(Self::Available),
            (
                Self::Available | Self::Occupied | Self::Cleaning,
                Transition::ReportFault,
            ) => Some(Self::NeedsRepair),
            (Self::NeedsRepair, Transition::FinishRepair) => Some(Self::Cleaning),
            _ => None,
        }
    }

    /// Returns `true` if the transition is valid from this state.
    pub fn permits(self, via: Transition) -> bool {
        self.apply(via).is_some()
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "Available"),
            Self::Occupied => write!(f, "Occupied"),
            Self::Cleaning => write!(f, "Cleaning"),
            Self::NeedsRepair => write!(f, "NeedsRepair"),
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Occupy => write!(f, "Occupy"),
            Self::BeginCleaning => write!(f, "BeginCleaning"),
            Self::FinishCleaning => write!(f, "FinishCleaning"),
            Self::ReportFault => write!(f, "ReportFault"),
            Self::FinishRepair => write!(f, "FinishRepair"),
        }
    }
}
