//! Room directory: the slot-indexed table of rooms.
//!
//! Rooms are created once at coordinator startup from a fixed list of
//! specs and live for the coordinator's uptime — there is no runtime
//! create/destroy. Slot 0 is reserved for the registry, so rooms occupy
//! slots 1..=N in the order their specs were given.

use std::collections::BTreeMap;

use atria_protocol::{RoomDescriptor, Slot};

use crate::RoomHandle;
use crate::room::spawn_room;

/// Descriptive attributes a room is created with.
///
/// All three are fixed for the room's lifetime; nothing in the workflow
/// mutates them.
#[derive(Debug, Clone)]
pub struct RoomSpec {
    /// Display name, e.g. "Aurora".
    pub name: String,
    /// Room type label, e.g. "standard".
    pub kind: String,
    /// Seating capacity (descriptive only).
    pub capacity: u32,
}

impl RoomSpec {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, kind: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            capacity,
        }
    }
}

/// The slot-indexed table of running room actors.
///
/// Immutable after construction: lookups never need a lock, and a
/// [`RoomHandle`] clone is all a caller keeps.
pub struct RoomDirectory {
    rooms: BTreeMap<Slot, RoomHandle>,
}

impl RoomDirectory {
    /// Spawns one room actor per spec and indexes them at slots 1..=N.
    pub fn open(specs: Vec<RoomSpec>) -> Self {
        let mut rooms = BTreeMap::new();
        for (i, spec) in specs.into_iter().enumerate() {
            let slot = Slot(i as u16 + 1);
            tracing::info!(%slot, name = %spec.name, "room created");
            rooms.insert(slot, spawn_room(slot, spec));
        }
        Self { rooms }
    }

    /// Looks up the room at a slot. `None` for slot 0 and for slots past
    /// the table — which is what terminates sequential probing.
    pub fn get(&self, slot: Slot) -> Option<&RoomHandle> {
        self.rooms.get(&slot)
    }

    /// Returns `true` if a room is assigned to this slot.
    pub fn contains(&self, slot: Slot) -> bool {
        self.rooms.contains_key(&slot)
    }

    /// Returns the number of rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Returns `true` if the directory holds no rooms.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Returns cloned handles to all rooms, in slot order.
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.values().cloned().collect()
    }

    /// Snapshots every room, in slot order. Rooms that fail to respond
    /// (actor gone) are silently skipped.
    pub async fn describe_all(&self) -> Vec<RoomDescriptor> {
        let mut out = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            if let Ok(descriptor) = handle.describe().await {
                out.push(descriptor);
            }
        }
        out
    }
}
