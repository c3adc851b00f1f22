//! Room actor: an isolated Tokio task that owns one room.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. No shared mutable state, just message
//! passing — a command is processed to completion before the next one
//! starts, which gives every operation the per-room atomicity the
//! workflow relies on.
//!
//! Observer pushes happen strictly after the triggering mutation has
//! committed, onto per-observer queues. A push that fails flips the
//! record's `online` flag and nothing else; the mutation stands.

use std::collections::HashMap;

use atria_protocol::{ApplierEntry, Notice, ParticipantId, RoomDescriptor, Slot};
use tokio::sync::{mpsc, oneshot};

use crate::{ObserverHandle, ObserverId, RoomError, RoomSpec, RoomStatus, Transition};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in each variant is the reply channel — the
/// caller sends a command and waits for the outcome on it.
pub(crate) enum RoomCommand {
    Apply {
        id: ParticipantId,
        party_size: u32,
        handle: ObserverHandle,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Cancel {
        id: ParticipantId,
        origin: ObserverId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Approve {
        id: ParticipantId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Reject {
        id: ParticipantId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Occupy {
        id: ParticipantId,
        origin: ObserverId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    EndOccupying {
        id: ParticipantId,
        origin: ObserverId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    ReportFault {
        id: ParticipantId,
        origin: ObserverId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    AttachObserver {
        id: ParticipantId,
        handle: ObserverHandle,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    RegisterApprover {
        id: ParticipantId,
        handle: ObserverHandle,
        reply: oneshot::Sender<()>,
    },
    Disconnect {
        id: ParticipantId,
        reply: oneshot::Sender<()>,
    },
    Advance {
        via: Transition,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Describe {
        reply: oneshot::Sender<RoomDescriptor>,
    },
    Applying {
        id: ParticipantId,
        reply: oneshot::Sender<bool>,
    },
    ApplierCount {
        reply: oneshot::Sender<u32>,
    },
    PartySizeOf {
        id: ParticipantId,
        reply: oneshot::Sender<Result<u32, RoomError>>,
    },
    ApplierList {
        reply: oneshot::Sender<Vec<ApplierEntry>>,
    },
    Reservation {
        reply: oneshot::Sender<Option<ParticipantId>>,
    },
}

/// Handle to a running room actor. Used to send operations to it.
///
/// Cheap to clone — it's just an `mpsc::Sender` wrapper. The
/// [`RoomDirectory`](crate::RoomDirectory) holds one of these per slot.
#[derive(Clone)]
pub struct RoomHandle {
    slot: Slot,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's slot.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.slot))?;
        reply_rx.await.map_err(|_| RoomError::Unavailable(self.slot))
    }

    /// Inserts an applier record for `id`. A record already held by a
    /// different incarnation of the same identity is superseded in
    /// place (reconnect is re-registration).
    pub async fn apply(
        &self,
        id: ParticipantId,
        party_size: u32,
        handle: ObserverHandle,
    ) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Apply {
            id,
            party_size,
            handle,
            reply,
        })
        .await?
    }

    /// Withdraws a pending application.
    pub async fn cancel(
        &self,
        id: ParticipantId,
        origin: ObserverId,
    ) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Cancel { id, origin, reply }).await?
    }

    /// Grants the reservation to a pending applier.
    pub async fn approve(&self, id: ParticipantId) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Approve { id, reply }).await?
    }

    /// Removes a pending applier's record.
    pub async fn reject(&self, id: ParticipantId) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Reject { id, reply }).await?
    }

    /// Takes occupancy as the reserved participant.
    pub async fn occupy(
        &self,
        id: ParticipantId,
        origin: ObserverId,
    ) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Occupy { id, origin, reply }).await?
    }

    /// Gives up occupancy.
    pub async fn end_occupying(
        &self,
        id: ParticipantId,
        origin: ObserverId,
    ) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::EndOccupying { id, origin, reply })
            .await?
    }

    /// Reports the room as needing repair.
    pub async fn report_fault(
        &self,
        id: ParticipantId,
        origin: ObserverId,
    ) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::ReportFault { id, origin, reply })
            .await?
    }

    /// Re-binds the push-callback handle for an existing applier record.
    pub async fn attach_observer(
        &self,
        id: ParticipantId,
        handle: ObserverHandle,
    ) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::AttachObserver { id, handle, reply })
            .await?
    }

    /// Registers (or re-registers) an approver's push-callback handle.
    pub async fn register_approver(
        &self,
        id: ParticipantId,
        handle: ObserverHandle,
    ) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::RegisterApprover { id, handle, reply })
            .await
    }

    /// Removes whatever record (applier or approver) `id` holds here.
    /// Idempotent — removing nothing is fine.
    pub async fn disconnect(&self, id: ParticipantId) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Disconnect { id, reply }).await
    }

    /// Applies a housekeeping transition (BeginCleaning, FinishCleaning,
    /// FinishRepair).
    pub async fn advance(&self, via: Transition) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Advance { via, reply }).await?
    }

    /// Returns a read-only snapshot of the room.
    pub async fn describe(&self) -> Result<RoomDescriptor, RoomError> {
        self.call(|reply| RoomCommand::Describe { reply }).await
    }

    /// Returns `true` if `id` holds an applier record (pending or
    /// occupying).
    pub async fn is_applier(&self, id: ParticipantId) -> Result<bool, RoomError> {
        self.call(|reply| RoomCommand::Applying { id, reply }).await
    }

    /// Returns the number of live applier records.
    pub async fn applier_count(&self) -> Result<u32, RoomError> {
        self.call(|reply| RoomCommand::ApplierCount { reply }).await
    }

    /// Returns the recorded party size for `id`.
    pub async fn party_size_of(&self, id: ParticipantId) -> Result<u32, RoomError> {
        self.call(|reply| RoomCommand::PartySizeOf { id, reply }).await?
    }

    /// Returns the full applier listing.
    pub async fn applier_list(&self) -> Result<Vec<ApplierEntry>, RoomError> {
        self.call(|reply| RoomCommand::ApplierList { reply }).await
    }

    /// Returns the current reservation holder, if any.
    pub async fn reservation(&self) -> Result<Option<ParticipantId>, RoomError> {
        self.call(|reply| RoomCommand::Reservation { reply }).await
    }
}

/// One applier's entry inside a room.
///
/// Owned exclusively by the room actor that holds it. Created on a
/// successful apply, removed on cancel/reject/disconnect/occupancy-end,
/// mutated (handle, online flag) on reconnect.
struct ApplierRecord {
    party_size: u32,
    handle: ObserverHandle,
    online: bool,
}

/// An approval authority's observer entry.
struct OverseerRecord {
    handle: ObserverHandle,
    online: bool,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    slot: Slot,
    // Descriptive attributes: set once at creation, read-only after.
    name: String,
    kind: String,
    capacity: u32,

    status: RoomStatus,
    /// The approved-next-occupant marker. Invariant: always references a
    /// key present in `appliers`, and is cleared the instant that key is
    /// removed.
    reservation: Option<ParticipantId>,
    appliers: HashMap<ParticipantId, ApplierRecord>,
    /// The applier currently granted active use. Invariant: set only
    /// while their record is present; `status` is `Occupied` whenever
    /// this is set.
    occupant: Option<ParticipantId>,
    overseers: HashMap<ParticipantId, OverseerRecord>,

    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop, processing commands until all handles drop.
    async fn run(mut self) {
        tracing::info!(slot = %self.slot, name = %self.name, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Apply {
                    id,
                    party_size,
                    handle,
                    reply,
                } => {
                    let _ = reply.send(self.handle_apply(id, party_size, handle));
                }
                RoomCommand::Cancel { id, origin, reply } => {
                    let _ = reply.send(self.handle_cancel(id, origin));
                }
                RoomCommand::Approve { id, reply } => {
                    let _ = reply.send(self.handle_approve(id));
                }
                RoomCommand::Reject { id, reply } => {
                    let _ = reply.send(self.handle_reject(id));
                }
                RoomCommand::Occupy { id, origin, reply } => {
                    let _ = reply.send(self.handle_occupy(id, origin));
                }
                RoomCommand::EndOccupying { id, origin, reply } => {
                    let _ = reply.send(self.handle_end_occupying(id, origin));
                }
                RoomCommand::ReportFault { id, origin, reply } => {
                    let _ = reply.send(self.handle_report_fault(id, origin));
                }
                RoomCommand::AttachObserver { id, handle, reply } => {
                    let _ = reply.send(self.handle_attach_observer(id, handle));
                }
                RoomCommand::RegisterApprover { id, handle, reply } => {
                    self.handle_register_approver(id, handle);
                    let _ = reply.send(());
                }
                RoomCommand::Disconnect { id, reply } => {
                    self.handle_disconnect(id);
                    let _ = reply.send(());
                }
                RoomCommand::Advance { via, reply } => {
                    let _ = reply.send(self.handle_advance(via));
                }
                RoomCommand::Describe { reply } => {
                    let _ = reply.send(self.describe());
                }
                RoomCommand::Applying { id, reply } => {
                    let _ = reply.send(self.appliers.contains_key(&id));
                }
                RoomCommand::ApplierCount { reply } => {
                    let _ = reply.send(self.appliers.len() as u32);
                }
                RoomCommand::PartySizeOf { id, reply } => {
                    let result = self
                        .appliers
                        .get(&id)
                        .map(|r| r.party_size)
                        .ok_or(RoomError::NotFound(id));
                    let _ = reply.send(result);
                }
                RoomCommand::ApplierList { reply } => {
                    let entries = self
                        .appliers
                        .iter()
                        .map(|(id, r)| ApplierEntry {
                            id: *id,
                            party_size: r.party_size,
                            online: r.online,
                        })
                        .collect();
                    let _ = reply.send(entries);
                }
                RoomCommand::Reservation { reply } => {
                    let _ = reply.send(self.reservation);
                }
            }
        }

        tracing::info!(slot = %self.slot, "room actor stopped");
    }

    // -- Workflow operations ----------------------------------------------

    fn handle_apply(
        &mut self,
        id: ParticipantId,
        party_size: u32,
        handle: ObserverHandle,
    ) -> Result<(), RoomError> {
        if let Some(existing) = self.appliers.get(&id) {
            if existing.handle.observer() == handle.observer() {
                return Err(RoomError::AlreadyApplied(id));
            }
            // A different handle is a newer incarnation the registry
            // already admitted: registration is keyed on the identity,
            // so the old record is superseded in place rather than
            // rejected, and a reconnect can never yield two records
            // for one id. The superseded handle sees StaleReference
            // from here on.
            tracing::info!(slot = %self.slot, %id, "applier record superseded by reconnect");
        }

        self.appliers.insert(
            id,
            ApplierRecord {
                party_size,
                handle,
                online: true,
            },
        );
        tracing::info!(
            slot = %self.slot,
            %id,
            party_size,
            appliers = self.appliers.len(),
            "application recorded"
        );

        self.notify_overseers();
        Ok(())
    }

    fn handle_cancel(
        &mut self,
        id: ParticipantId,
        origin: ObserverId,
    ) -> Result<(), RoomError> {
        let record = self.appliers.get(&id).ok_or(RoomError::NotFound(id))?;
        if record.handle.observer() != origin {
            return Err(RoomError::StaleReference(id));
        }
        if self.occupant == Some(id) {
            return Err(RoomError::CannotRejectOccupant(id));
        }

        self.appliers.remove(&id);
        self.clear_reservation_if_held_by(id);
        tracing::info!(slot = %self.slot, %id, "application canceled");

        self.notify_overseers();
        Ok(())
    }

    fn handle_approve(&mut self, id: ParticipantId) -> Result<(), RoomError> {
        if self.status != RoomStatus::Available {
            return Err(RoomError::InvalidTransition(format!(
                "cannot approve while {}",
                self.status
            )));
        }
        if !self.appliers.contains_key(&id) {
            return Err(RoomError::NotFound(id));
        }

        // A later approval supersedes an earlier one; the previous
        // holder is told their reservation is gone. Competing pending
        // appliers are NOT auto-rejected — that policy belongs to the
        // approval authority.
        let previous = self.reservation.replace(id);
        tracing::info!(slot = %self.slot, %id, "reservation granted");

        if let Some(prev) = previous.filter(|prev| *prev != id) {
            self.push_to_applier(
                prev,
                Notice::ReservationRevoked {
                    slot: self.slot,
                    id: prev,
                },
            );
        }
        self.push_to_applier(
            id,
            Notice::ReservationGranted {
                slot: self.slot,
                id,
            },
        );
        Ok(())
    }

    fn handle_reject(&mut self, id: ParticipantId) -> Result<(), RoomError> {
        if self.occupant == Some(id) {
            return Err(RoomError::CannotRejectOccupant(id));
        }
        let record = self.appliers.remove(&id).ok_or(RoomError::NotFound(id))?;
        self.clear_reservation_if_held_by(id);
        tracing::info!(slot = %self.slot, %id, "application rejected");

        // The record is gone but the handle still reaches the client.
        record.handle.update(Notice::ApplicationRejected {
            slot: self.slot,
            id,
        });
        self.notify_overseers();
        Ok(())
    }

    fn handle_occupy(
        &mut self,
        id: ParticipantId,
        origin: ObserverId,
    ) -> Result<(), RoomError> {
        let record = self.appliers.get(&id).ok_or(RoomError::NotFound(id))?;
        if record.handle.observer() != origin {
            return Err(RoomError::StaleReference(id));
        }
        if self.reservation != Some(id) {
            return Err(RoomError::InvalidTransition(format!(
                "occupancy requires the reservation (held by {})",
                self.reservation
                    .map_or_else(|| "nobody".to_string(), |r| r.to_string()),
            )));
        }
        let next = self
            .status
            .apply(Transition::Occupy)
            .ok_or_else(|| invalid(self.status, Transition::Occupy))?;

        self.status = next;
        self.occupant = Some(id);
        self.reservation = None;
        tracing::info!(slot = %self.slot, %id, "occupancy started");

        self.broadcast_status();
        Ok(())
    }

    fn handle_end_occupying(
        &mut self,
        id: ParticipantId,
        origin: ObserverId,
    ) -> Result<(), RoomError> {
        let record = self.appliers.get(&id).ok_or(RoomError::NotFound(id))?;
        if record.handle.observer() != origin {
            return Err(RoomError::StaleReference(id));
        }
        if self.occupant != Some(id) {
            return Err(RoomError::InvalidTransition(format!(
                "{id} is not the current occupant"
            )));
        }

        self.appliers.remove(&id);
        self.occupant = None;
        tracing::info!(slot = %self.slot, %id, "occupancy ended");

        // Normally Occupied → Cleaning here. If a fault was reported
        // during the stay the room is already NeedsRepair and stays
        // there; the repair flow owns the way back.
        if let Some(next) = self.status.apply(Transition::BeginCleaning) {
            self.status = next;
            self.broadcast_status();
        }
        self.notify_overseers();
        Ok(())
    }

    fn handle_report_fault(
        &mut self,
        id: ParticipantId,
        origin: ObserverId,
    ) -> Result<(), RoomError> {
        let record = self.appliers.get(&id).ok_or(RoomError::NotFound(id))?;
        if record.handle.observer() != origin {
            return Err(RoomError::StaleReference(id));
        }
        let next = self
            .status
            .apply(Transition::ReportFault)
            .ok_or_else(|| invalid(self.status, Transition::ReportFault))?;

        self.status = next;
        tracing::warn!(slot = %self.slot, %id, "fault reported");

        self.broadcast_status();
        Ok(())
    }

    fn handle_attach_observer(
        &mut self,
        id: ParticipantId,
        handle: ObserverHandle,
    ) -> Result<(), RoomError> {
        let record = self.appliers.get_mut(&id).ok_or(RoomError::NotFound(id))?;
        record.handle = handle;
        record.online = true;
        tracing::debug!(slot = %self.slot, %id, "observer handle re-bound");
        Ok(())
    }

    fn handle_register_approver(&mut self, id: ParticipantId, handle: ObserverHandle) {
        self.overseers.insert(
            id,
            OverseerRecord {
                handle,
                online: true,
            },
        );
        tracing::info!(slot = %self.slot, %id, "approver registered");
    }

    fn handle_disconnect(&mut self, id: ParticipantId) {
        if self.appliers.remove(&id).is_some() {
            self.clear_reservation_if_held_by(id);
            if self.occupant == Some(id) {
                // The occupant left without ending occupancy. The room
                // stays Occupied with nobody inside; housekeeping's
                // BeginCleaning is the recovery path.
                self.occupant = None;
                tracing::warn!(slot = %self.slot, %id, "occupant disconnected mid-stay");
            }
            tracing::info!(slot = %self.slot, %id, "applier disconnected");
            self.notify_overseers();
        } else if self.overseers.remove(&id).is_some() {
            tracing::info!(slot = %self.slot, %id, "approver disconnected");
        }
    }

    fn handle_advance(&mut self, via: Transition) -> Result<(), RoomError> {
        match via {
            Transition::Occupy | Transition::ReportFault => {
                return Err(RoomError::InvalidTransition(format!(
                    "{via} identifies a participant; use the dedicated operation"
                )));
            }
            Transition::BeginCleaning if self.occupant.is_some() => {
                return Err(RoomError::InvalidTransition(
                    "occupant still present".into(),
                ));
            }
            Transition::BeginCleaning
            | Transition::FinishCleaning
            | Transition::FinishRepair => {}
        }

        let next = self.status.apply(via).ok_or_else(|| invalid(self.status, via))?;
        self.status = next;
        tracing::info!(slot = %self.slot, %via, status = %self.status, "room advanced");

        self.broadcast_status();
        Ok(())
    }

    // -- Bookkeeping ------------------------------------------------------

    /// Upholds the reservation invariant: the marker never outlives the
    /// applier record it points at.
    fn clear_reservation_if_held_by(&mut self, id: ParticipantId) {
        if self.reservation == Some(id) {
            self.reservation = None;
            tracing::info!(slot = %self.slot, %id, "reservation cleared");
        }
    }

    fn describe(&self) -> RoomDescriptor {
        RoomDescriptor {
            slot: self.slot,
            name: self.name.clone(),
            kind: self.kind.clone(),
            capacity: self.capacity,
            status: self.status.to_string(),
            appliers: self.appliers.len() as u32,
            reservation: self.reservation,
        }
    }

    // -- Pushes (always after the mutation has committed) -----------------

    fn push_to_applier(&mut self, id: ParticipantId, notice: Notice) {
        if let Some(record) = self.appliers.get_mut(&id) {
            if !record.handle.update(notice) {
                record.online = false;
                tracing::warn!(slot = %self.slot, %id, "push failed, applier offline");
            }
        }
    }

    /// Tells every attached observer (appliers and approvers) about the
    /// new state. Delivery order across observers is unspecified.
    fn broadcast_status(&mut self) {
        let notice = Notice::StatusChanged {
            slot: self.slot,
            status: self.status.to_string(),
        };
        for (id, record) in &mut self.appliers {
            if !record.handle.update(notice.clone()) {
                record.online = false;
                tracing::warn!(slot = %self.slot, %id, "push failed, applier offline");
            }
        }
        for (id, record) in &mut self.overseers {
            if !record.handle.update(notice.clone()) {
                record.online = false;
                tracing::warn!(slot = %self.slot, %id, "push failed, approver offline");
            }
        }
    }

    /// Tells approvers the applier set changed.
    fn notify_overseers(&mut self) {
        let notice = Notice::ApplierChanged {
            slot: self.slot,
            appliers: self.appliers.len() as u32,
        };
        for (id, record) in &mut self.overseers {
            if !record.handle.update(notice.clone()) {
                record.online = false;
                tracing::warn!(slot = %self.slot, %id, "push failed, approver offline");
            }
        }
    }
}

fn invalid(from: RoomStatus, via: Transition) -> RoomError {
    RoomError::InvalidTransition(format!("{via} is not valid from {from}"))
}

/// Spawns a new room actor task and returns a handle to communicate
/// with it.
pub(crate) fn spawn_room(slot: Slot, spec: RoomSpec) -> RoomHandle {
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);

    let actor = RoomActor {
        slot,
        name: spec.name,
        kind: spec.kind,
        capacity: spec.capacity,
        status: RoomStatus::Available,
        reservation: None,
        appliers: HashMap::new(),
        occupant: None,
        overseers: HashMap::new(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { slot, sender: tx }
}
