//! Wire protocol for Atria.
//!
//! This crate defines the "language" that client stubs and the coordinator
//! speak:
//!
//! - **Types** ([`Envelope`], [`Request`], [`Response`], [`Notice`], etc.) —
//!   the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`], [`Refusal`]) — what can go wrong during
//!   encoding/decoding, and how authoritative rejections are represented
//!   on the wire.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the
//! coordination logic (registry + rooms). It doesn't know about
//! connections, observers, or room state — it only knows how to describe
//! and serialize the calls and pushes that cross the process boundary.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Coordinator (registry + rooms)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ApplierEntry, Envelope, Notice, ParticipantId, Payload, Refusal,
    RefusalReason, Request, Response, Role, RoomDescriptor, Slot, SlotKind,
};
