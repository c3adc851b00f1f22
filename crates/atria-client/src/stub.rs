//! The client stub: one participant's live proxy to a coordinator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use atria_protocol::{
    ApplierEntry, Notice, ParticipantId, ProtocolError, Request, Response, Role,
    RoomDescriptor, Slot, SlotKind,
};
use tokio::sync::mpsc;

use crate::channel::Channel;
use crate::{ClientError, ConnectionError, Endpoint};

/// The stream of notices rooms push to this stub.
pub type NoticeStream = mpsc::UnboundedReceiver<Notice>;

/// A process-local proxy for one participant.
///
/// Holds the resolved connection to the coordinator (registry at slot 0
/// plus any rooms the participant registered in) and the participant's
/// identity. Not shared across processes; a reconnect tears the
/// connection down and re-registers from scratch.
pub struct ClientStub {
    authority: String,
    role: Role,
    id: ParticipantId,
    channel: Option<Arc<Channel>>,
    /// Rooms this participant has applied to, with the recorded party
    /// size — the re-registration set for reconnect.
    applications: HashMap<Slot, u32>,
    /// Rooms this participant observes as an approver.
    approvals: HashSet<Slot>,
    connected: bool,
}

impl ClientStub {
    /// Resolves the coordinator behind `endpoint` and registers the
    /// participant's identity.
    ///
    /// The endpoint's slot is ignored for dialing — all of a
    /// coordinator's slots share one authority — but the registry at
    /// slot 0 is always resolved and the identity claimed before the
    /// stub is handed back: a duplicate identity never gets as far as a
    /// room.
    ///
    /// # Errors
    /// - [`ClientError::Connection`] — the name did not resolve or the
    ///   coordinator was unreachable (retryable).
    /// - [`ClientError::Refused`] with `DuplicateIdentity` — the
    ///   identity is claimed by a live registration.
    pub async fn connect(
        endpoint: &Endpoint,
        role: Role,
        id: ParticipantId,
    ) -> Result<Self, ClientError> {
        let authority = endpoint.authority();
        let channel = Arc::new(Channel::dial(&authority).await?);

        // Slot 0 must actually be a registry before we claim anything.
        match channel.call(Request::Resolve { slot: Slot::REGISTRY }).await? {
            Response::Resolved {
                kind: SlotKind::Registry,
            } => {}
            other => return Err(unexpected(&other)),
        }
        expect_ok(channel.call(Request::Claim { role, id }).await?)?;

        tracing::info!(%role, %id, %authority, "registered with coordinator");
        Ok(Self {
            authority,
            role,
            id,
            channel: Some(channel),
            applications: HashMap::new(),
            approvals: HashSet::new(),
            connected: true,
        })
    }

    /// The participant identity this stub acts for.
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// The role the identity is registered under.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether the last resolution attempt succeeded.
    ///
    /// This reflects nothing about current liveness — there is no
    /// heartbeat. A dead coordinator is discovered by the next call
    /// failing with a [`ConnectionError`].
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Tears down the old connection (if any) and re-registers from
    /// scratch: fresh dial, forced identity reclaim, re-application in
    /// every room this stub had joined, re-registration of approver
    /// observations.
    ///
    /// This is re-registration, not session resumption — the coordinator
    /// supersedes whatever records a dead predecessor left, so a crash
    /// loop cannot accumulate live records for this identity.
    pub async fn reconnect(&mut self) -> Result<(), ClientError> {
        if let Some(old) = self.channel.take() {
            old.close().await;
        }
        self.connected = false;

        let channel = Arc::new(Channel::dial(&self.authority).await?);
        match channel.call(Request::Resolve { slot: Slot::REGISTRY }).await? {
            Response::Resolved {
                kind: SlotKind::Registry,
            } => {}
            other => return Err(unexpected(&other)),
        }
        expect_ok(
            channel
                .call(Request::Reclaim {
                    role: self.role,
                    id: self.id,
                })
                .await?,
        )?;

        for (slot, party_size) in &self.applications {
            expect_ok(
                channel
                    .call(Request::Apply {
                        slot: *slot,
                        id: self.id,
                        party_size: *party_size,
                    })
                    .await?,
            )?;
        }
        for slot in &self.approvals {
            expect_ok(
                channel
                    .call(Request::RegisterApprover {
                        slot: *slot,
                        id: self.id,
                    })
                    .await?,
            )?;
        }

        self.channel = Some(channel);
        self.connected = true;
        tracing::info!(id = %self.id, "reconnected and re-registered");
        Ok(())
    }

    /// Deregisters everywhere and closes the connection: each joined
    /// room first, the registry claim last, so a failure part-way
    /// strands as little as possible.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        let channel = self.channel()?.clone();

        let slots: Vec<Slot> = self
            .applications
            .keys()
            .copied()
            .chain(self.approvals.iter().copied())
            .collect();
        for slot in slots {
            expect_ok(
                channel
                    .call(Request::Disconnect { slot, id: self.id })
                    .await?,
            )?;
        }
        expect_ok(
            channel
                .call(Request::Release {
                    role: self.role,
                    id: self.id,
                })
                .await?,
        )?;

        self.applications.clear();
        self.approvals.clear();
        channel.close().await;
        self.channel = None;
        self.connected = false;
        tracing::info!(id = %self.id, "disconnected");
        Ok(())
    }

    /// Takes the stream of notices pushed to this stub. Yields `Some`
    /// once per connection (reconnecting creates a fresh stream).
    pub async fn updates(&self) -> Option<NoticeStream> {
        match &self.channel {
            Some(channel) => channel.take_notices().await,
            None => None,
        }
    }

    // -- Discovery ---------------------------------------------------------

    /// Probes slots 1, 2, … until the first unassigned one and returns a
    /// snapshot of every room found.
    pub async fn probe_rooms(&self) -> Result<Vec<RoomDescriptor>, ClientError> {
        let channel = self.channel()?;
        let mut rooms = Vec::new();
        for slot in 1u16.. {
            let slot = Slot(slot);
            match channel.call(Request::Resolve { slot }).await? {
                Response::Resolved {
                    kind: SlotKind::Room,
                } => {}
                Response::Refused { .. } => break,
                other => return Err(unexpected(&other)),
            }
            match channel.call(Request::Describe { slot }).await? {
                Response::Descriptor { room } => rooms.push(room),
                other => return Err(unexpected(&other)),
            }
        }
        Ok(rooms)
    }

    /// Liveness check for one slot.
    pub async fn ping(&self, slot: Slot) -> Result<(), ClientError> {
        match self.channel()?.call(Request::Ping { slot }).await? {
            Response::Pong => Ok(()),
            Response::Refused { refusal } => Err(ClientError::Refused(refusal)),
            other => Err(unexpected(&other)),
        }
    }

    /// Full read-only snapshot of one room.
    pub async fn describe(&self, slot: Slot) -> Result<RoomDescriptor, ClientError> {
        match self.channel()?.call(Request::Describe { slot }).await? {
            Response::Descriptor { room } => Ok(room),
            Response::Refused { refusal } => Err(ClientError::Refused(refusal)),
            other => Err(unexpected(&other)),
        }
    }

    /// Asks the registry whether (role, id) is currently claimed.
    pub async fn check(&self, role: Role, id: ParticipantId) -> Result<bool, ClientError> {
        match self.channel()?.call(Request::Check { role, id }).await? {
            Response::Claimed { claimed } => Ok(claimed),
            other => Err(unexpected(&other)),
        }
    }

    // -- Applier workflow ---------------------------------------------------

    /// Applies for a room. On success this connection becomes the
    /// applier's push-callback target and the room joins the stub's
    /// re-registration set.
    pub async fn apply(&mut self, slot: Slot, party_size: u32) -> Result<(), ClientError> {
        expect_ok(
            self.channel()?
                .call(Request::Apply {
                    slot,
                    id: self.id,
                    party_size,
                })
                .await?,
        )?;
        self.applications.insert(slot, party_size);
        Ok(())
    }

    /// Withdraws a pending application.
    pub async fn cancel(&mut self, slot: Slot) -> Result<(), ClientError> {
        expect_ok(
            self.channel()?
                .call(Request::Cancel { slot, id: self.id })
                .await?,
        )?;
        self.applications.remove(&slot);
        Ok(())
    }

    /// Takes occupancy of a room this participant holds the reservation
    /// for.
    pub async fn occupy(&self, slot: Slot) -> Result<(), ClientError> {
        expect_ok(
            self.channel()?
                .call(Request::Occupy { slot, id: self.id })
                .await?,
        )
    }

    /// Ends this participant's occupancy.
    pub async fn end_occupying(&mut self, slot: Slot) -> Result<(), ClientError> {
        expect_ok(
            self.channel()?
                .call(Request::EndOccupying { slot, id: self.id })
                .await?,
        )?;
        self.applications.remove(&slot);
        Ok(())
    }

    /// Reports the room as needing repair.
    pub async fn report_fault(&self, slot: Slot) -> Result<(), ClientError> {
        expect_ok(
            self.channel()?
                .call(Request::ReportFault { slot, id: self.id })
                .await?,
        )
    }

    /// Re-binds this connection as the push target for an existing
    /// record (after the record survived a reconnect, say).
    pub async fn attach_observer(&self, slot: Slot) -> Result<(), ClientError> {
        expect_ok(
            self.channel()?
                .call(Request::AttachObserver { slot, id: self.id })
                .await?,
        )
    }

    // -- Approval-authority workflow ----------------------------------------

    /// Registers this stub as an approver observing a room.
    pub async fn register_approver(&mut self, slot: Slot) -> Result<(), ClientError> {
        expect_ok(
            self.channel()?
                .call(Request::RegisterApprover { slot, id: self.id })
                .await?,
        )?;
        self.approvals.insert(slot);
        Ok(())
    }

    /// Grants the room's reservation to a pending applier.
    pub async fn approve(&self, slot: Slot, id: ParticipantId) -> Result<(), ClientError> {
        expect_ok(self.channel()?.call(Request::Approve { slot, id }).await?)
    }

    /// Removes a pending applier.
    pub async fn reject(&self, slot: Slot, id: ParticipantId) -> Result<(), ClientError> {
        expect_ok(self.channel()?.call(Request::Reject { slot, id }).await?)
    }

    /// Applies a housekeeping transition: Occupied → Cleaning.
    pub async fn begin_cleaning(&self, slot: Slot) -> Result<(), ClientError> {
        expect_ok(self.channel()?.call(Request::BeginCleaning { slot }).await?)
    }

    /// Applies a housekeeping transition: Cleaning → Available.
    pub async fn finish_cleaning(&self, slot: Slot) -> Result<(), ClientError> {
        expect_ok(self.channel()?.call(Request::FinishCleaning { slot }).await?)
    }

    /// Applies a housekeeping transition: NeedsRepair → Cleaning.
    pub async fn finish_repair(&self, slot: Slot) -> Result<(), ClientError> {
        expect_ok(self.channel()?.call(Request::FinishRepair { slot }).await?)
    }

    // -- Read-only queries ---------------------------------------------------

    /// Whether `id` currently holds an applier record (pending or
    /// occupying) on a room.
    pub async fn is_applying(
        &self,
        slot: Slot,
        id: ParticipantId,
    ) -> Result<bool, ClientError> {
        match self.channel()?.call(Request::Applying { slot, id }).await? {
            Response::Applying { applying } => Ok(applying),
            Response::Refused { refusal } => Err(ClientError::Refused(refusal)),
            other => Err(unexpected(&other)),
        }
    }

    /// Number of live applier records on a room.
    pub async fn applier_count(&self, slot: Slot) -> Result<u32, ClientError> {
        match self.channel()?.call(Request::ApplierCount { slot }).await? {
            Response::Count { value } => Ok(value),
            Response::Refused { refusal } => Err(ClientError::Refused(refusal)),
            other => Err(unexpected(&other)),
        }
    }

    /// Recorded party size for one applier.
    pub async fn party_size_of(
        &self,
        slot: Slot,
        id: ParticipantId,
    ) -> Result<u32, ClientError> {
        match self.channel()?.call(Request::PartySizeOf { slot, id }).await? {
            Response::PartySize { value } => Ok(value),
            Response::Refused { refusal } => Err(ClientError::Refused(refusal)),
            other => Err(unexpected(&other)),
        }
    }

    /// Full applier listing for a room.
    pub async fn applier_list(&self, slot: Slot) -> Result<Vec<ApplierEntry>, ClientError> {
        match self.channel()?.call(Request::ApplierList { slot }).await? {
            Response::Appliers { entries } => Ok(entries),
            Response::Refused { refusal } => Err(ClientError::Refused(refusal)),
            other => Err(unexpected(&other)),
        }
    }

    /// The room's current reservation holder, if any.
    pub async fn reservation(&self, slot: Slot) -> Result<Option<ParticipantId>, ClientError> {
        match self.channel()?.call(Request::Reservation { slot }).await? {
            Response::ReservationHolder { id } => Ok(id),
            Response::Refused { refusal } => Err(ClientError::Refused(refusal)),
            other => Err(unexpected(&other)),
        }
    }

    // -- Internals -----------------------------------------------------------

    fn channel(&self) -> Result<&Arc<Channel>, ClientError> {
        self.channel
            .as_ref()
            .ok_or_else(|| ConnectionError::Closed.into())
    }
}

/// Folds a unit-reply response: `Ok` passes, a refusal becomes the typed
/// rejection, anything else is a protocol violation.
fn expect_ok(response: Response) -> Result<(), ClientError> {
    match response {
        Response::Ok => Ok(()),
        Response::Refused { refusal } => Err(ClientError::Refused(refusal)),
        other => Err(unexpected(&other)),
    }
}

fn unexpected(response: &Response) -> ClientError {
    ClientError::Protocol(ProtocolError::InvalidMessage(format!(
        "unexpected response: {response:?}"
    )))
}
