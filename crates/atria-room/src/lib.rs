//! Room coordination for Atria.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! occupancy state machine, the single optional reservation, and the map
//! of current appliers. All mutation flows through the actor's command
//! channel, which is the per-room serialization discipline: two calls
//! against one room never interleave, and two rooms never coordinate.
//!
//! # Key types
//!
//! - [`RoomStatus`] / [`Transition`] — the closed occupancy state machine
//! - [`RoomHandle`] — send operations to a running room actor
//! - [`ObserverHandle`] — the push-callback handle a room holds per
//!   attached participant
//! - [`RoomDirectory`] — the slot-indexed room table, fixed at startup
//! - [`RoomSpec`] — descriptive attributes a room is created with

mod directory;
mod error;
mod observer;
mod room;
mod status;

pub use directory::{RoomDirectory, RoomSpec};
pub use error::RoomError;
pub use observer::{ObserverHandle, ObserverId, ObserverReceiver, ObserverSender};
pub use room::RoomHandle;
pub use status::{RoomStatus, Transition};
