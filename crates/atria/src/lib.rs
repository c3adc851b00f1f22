//! # Atria
//!
//! Coordinator for shared physical-room occupancy across independent
//! client processes.
//!
//! Atria arbitrates which participant may occupy which room: clients
//! apply, an approval authority grants the single reservation, the
//! reserved participant occupies, and every attached observer is pushed
//! the changes as they commit. Rooms live behind stable
//! `<host>:<port>/<slot>` names — slot 0 is the identity registry,
//! slots 1..N are rooms.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use atria::prelude::*;
//!
//! # async fn run() -> Result<(), AtriaError> {
//! let coordinator = Coordinator::builder()
//!     .bind("0.0.0.0:7320")
//!     .room(RoomSpec::new("Aurora", "standard", 8))
//!     .room(RoomSpec::new("Borealis", "large", 20))
//!     .build()
//!     .await?;
//! coordinator.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::AtriaError;
pub use server::{Coordinator, CoordinatorBuilder};

/// Commonly used items, re-exported for coordinator binaries and tests.
pub mod prelude {
    pub use atria_protocol::{
        ApplierEntry, Notice, ParticipantId, Refusal, RefusalReason, Role,
        RoomDescriptor, Slot,
    };
    pub use atria_room::{RoomSpec, RoomStatus, Transition};

    pub use crate::{AtriaError, Coordinator, CoordinatorBuilder};
}
