//! Per-connection handler: request dispatch and push forwarding.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The flow is:
//!
//!   1. Spawn a forwarder task draining this connection's notice queue
//!      to the socket (rooms push into the queue, never into the socket).
//!   2. Loop: receive envelopes → dispatch requests → reply with the
//!      same `seq`.
//!
//! There is deliberately no cleanup of registry claims or applier
//! records when the connection drops: a crash that skips the explicit
//! Disconnect/Release calls leaves records stranded, and the rooms
//! discover that on their next push attempt. Reconnecting clients
//! recover the identity through the reclaim/upsert path.

use std::sync::Arc;

use atria_protocol::{
    Codec, Envelope, Payload, Refusal, RefusalReason, Request, Response, Slot,
    SlotKind,
};
use atria_room::{
    ObserverHandle, ObserverId, ObserverSender, RoomError, RoomHandle, Transition,
};
use atria_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::AtriaError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), AtriaError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    // Rooms identify this client incarnation by its connection.
    let observer = ObserverId::new(conn_id.into_inner());
    tracing::debug!(%conn_id, "handling new connection");

    // One notice queue per connection; every room handle this connection
    // registers shares it. The forwarder is the only writer of pushes to
    // the socket, so a slow client stalls its own forwarder, never a room.
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
    let forwarder = {
        let state = Arc::clone(&state);
        let conn = Arc::clone(&conn);
        tokio::spawn(async move {
            let mut seq: u64 = 0;
            while let Some(notice) = notice_rx.recv().await {
                seq += 1;
                let envelope = Envelope {
                    seq,
                    payload: Payload::Notice(notice),
                };
                let bytes = match state.codec.encode(&envelope) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode notice");
                        continue;
                    }
                };
                if conn.send(&bytes).await.is_err() {
                    break;
                }
            }
        })
    };

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                continue;
            }
        };

        let request = match envelope.payload {
            Payload::Request(request) => request,
            _ => {
                tracing::debug!(%conn_id, "ignoring non-request envelope");
                continue;
            }
        };

        let response = dispatch(&state, observer, &notice_tx, request).await;
        let reply = Envelope {
            seq: envelope.seq,
            payload: Payload::Response(response),
        };
        let bytes = state.codec.encode(&reply)?;
        conn.send(&bytes).await.map_err(AtriaError::Transport)?;
    }

    // Dropping the queue is what lets rooms discover this incarnation is
    // gone: their next push fails and flips the record offline.
    forwarder.abort();
    Ok(())
}

/// Dispatches one request to the registry or a room and builds the reply.
///
/// Every guard failure comes back as `Response::Refused` with the typed
/// reason — an authoritative no, distinct from any transport failure.
async fn dispatch<C: Codec>(
    state: &Arc<ServerState<C>>,
    observer: ObserverId,
    notice_tx: &ObserverSender,
    request: Request,
) -> Response {
    match request {
        // -- Naming and discovery -----------------------------------------
        Request::Resolve { slot } => {
            if slot.is_registry() {
                Response::Resolved {
                    kind: SlotKind::Registry,
                }
            } else if state.directory.contains(slot) {
                Response::Resolved {
                    kind: SlotKind::Room,
                }
            } else {
                refuse_unassigned(slot)
            }
        }
        Request::Ping { slot } => {
            if slot.is_registry() || state.directory.contains(slot) {
                Response::Pong
            } else {
                refuse_unassigned(slot)
            }
        }
        Request::Describe { slot } => match room(state, slot) {
            Ok(handle) => reply(handle.describe().await.map(|room| {
                Response::Descriptor { room }
            })),
            Err(response) => response,
        },

        // -- Registry -----------------------------------------------------
        Request::Check { role, id } => Response::Claimed {
            claimed: state.registry.lock().await.check(role, id),
        },
        Request::Claim { role, id } => {
            match state.registry.lock().await.claim(role, id) {
                Ok(()) => Response::Ok,
                Err(e) => Response::Refused {
                    refusal: Refusal::new(
                        RefusalReason::DuplicateIdentity,
                        e.to_string(),
                    ),
                },
            }
        }
        Request::Reclaim { role, id } => {
            state.registry.lock().await.reclaim(role, id);
            Response::Ok
        }
        Request::Release { role, id } => {
            state.registry.lock().await.release(role, id);
            Response::Ok
        }

        // -- Applier workflow ----------------------------------------------
        Request::Apply {
            slot,
            id,
            party_size,
        } => match room(state, slot) {
            Ok(handle) => {
                let observer_handle =
                    ObserverHandle::with_queue(id, observer, notice_tx.clone());
                reply(
                    handle
                        .apply(id, party_size, observer_handle)
                        .await
                        .map(|()| Response::Ok),
                )
            }
            Err(response) => response,
        },
        Request::Cancel { slot, id } => match room(state, slot) {
            Ok(handle) => {
                reply(handle.cancel(id, observer).await.map(|()| Response::Ok))
            }
            Err(response) => response,
        },
        Request::Occupy { slot, id } => match room(state, slot) {
            Ok(handle) => {
                reply(handle.occupy(id, observer).await.map(|()| Response::Ok))
            }
            Err(response) => response,
        },
        Request::EndOccupying { slot, id } => match room(state, slot) {
            Ok(handle) => reply(
                handle
                    .end_occupying(id, observer)
                    .await
                    .map(|()| Response::Ok),
            ),
            Err(response) => response,
        },
        Request::ReportFault { slot, id } => match room(state, slot) {
            Ok(handle) => reply(
                handle
                    .report_fault(id, observer)
                    .await
                    .map(|()| Response::Ok),
            ),
            Err(response) => response,
        },
        Request::AttachObserver { slot, id } => match room(state, slot) {
            Ok(handle) => {
                let observer_handle =
                    ObserverHandle::with_queue(id, observer, notice_tx.clone());
                reply(
                    handle
                        .attach_observer(id, observer_handle)
                        .await
                        .map(|()| Response::Ok),
                )
            }
            Err(response) => response,
        },

        // -- Approval-authority workflow ------------------------------------
        Request::RegisterApprover { slot, id } => match room(state, slot) {
            Ok(handle) => {
                let observer_handle =
                    ObserverHandle::with_queue(id, observer, notice_tx.clone());
                reply(
                    handle
                        .register_approver(id, observer_handle)
                        .await
                        .map(|()| Response::Ok),
                )
            }
            Err(response) => response,
        },
        Request::Approve { slot, id } => match room(state, slot) {
            Ok(handle) => reply(handle.approve(id).await.map(|()| Response::Ok)),
            Err(response) => response,
        },
        Request::Reject { slot, id } => match room(state, slot) {
            Ok(handle) => reply(handle.reject(id).await.map(|()| Response::Ok)),
            Err(response) => response,
        },
        Request::Disconnect { slot, id } => match room(state, slot) {
            Ok(handle) => {
                reply(handle.disconnect(id).await.map(|()| Response::Ok))
            }
            Err(response) => response,
        },

        // -- Housekeeping transitions ---------------------------------------
        Request::BeginCleaning { slot } => {
            advance(state, slot, Transition::BeginCleaning).await
        }
        Request::FinishCleaning { slot } => {
            advance(state, slot, Transition::FinishCleaning).await
        }
        Request::FinishRepair { slot } => {
            advance(state, slot, Transition::FinishRepair).await
        }

        // -- Read-only queries ----------------------------------------------
        Request::Applying { slot, id } => match room(state, slot) {
            Ok(handle) => reply(
                handle
                    .is_applier(id)
                    .await
                    .map(|applying| Response::Applying { applying }),
            ),
            Err(response) => response,
        },
        Request::ApplierCount { slot } => match room(state, slot) {
            Ok(handle) => reply(
                handle
                    .applier_count()
                    .await
                    .map(|value| Response::Count { value }),
            ),
            Err(response) => response,
        },
        Request::PartySizeOf { slot, id } => match room(state, slot) {
            Ok(handle) => reply(
                handle
                    .party_size_of(id)
                    .await
                    .map(|value| Response::PartySize { value }),
            ),
            Err(response) => response,
        },
        Request::ApplierList { slot } => match room(state, slot) {
            Ok(handle) => reply(
                handle
                    .applier_list()
                    .await
                    .map(|entries| Response::Appliers { entries }),
            ),
            Err(response) => response,
        },
        Request::Reservation { slot } => match room(state, slot) {
            Ok(handle) => reply(
                handle
                    .reservation()
                    .await
                    .map(|id| Response::ReservationHolder { id }),
            ),
            Err(response) => response,
        },
    }
}

/// Looks up the room at a slot, or the refusal to send back.
fn room<C: Codec>(
    state: &Arc<ServerState<C>>,
    slot: Slot,
) -> Result<&RoomHandle, Response> {
    state.directory.get(slot).ok_or_else(|| refuse_unassigned(slot))
}

async fn advance<C: Codec>(
    state: &Arc<ServerState<C>>,
    slot: Slot,
    via: Transition,
) -> Response {
    match room(state, slot) {
        Ok(handle) => reply(handle.advance(via).await.map(|()| Response::Ok)),
        Err(response) => response,
    }
}

fn refuse_unassigned(slot: Slot) -> Response {
    Response::Refused {
        refusal: Refusal::new(
            RefusalReason::NotFound,
            format!("no room at {slot}"),
        ),
    }
}

/// Folds a room outcome into the wire response.
fn reply(result: Result<Response, RoomError>) -> Response {
    match result {
        Ok(response) => response,
        Err(e) => Response::Refused {
            refusal: refusal_of(&e),
        },
    }
}

/// Maps a room guard failure to its wire taxonomy variant.
fn refusal_of(error: &RoomError) -> Refusal {
    let reason = match error {
        RoomError::AlreadyApplied(_) => RefusalReason::AlreadyApplied,
        RoomError::NotFound(_) => RefusalReason::NotFound,
        RoomError::CannotRejectOccupant(_) => RefusalReason::CannotRejectOccupant,
        RoomError::InvalidTransition(_) => RefusalReason::InvalidTransition,
        RoomError::StaleReference(_) => RefusalReason::StaleReference,
        // A room actor being gone means its slot is effectively dark;
        // clients see the same shape as an unassigned slot.
        RoomError::Unavailable(_) => RefusalReason::NotFound,
    };
    Refusal::new(reason, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atria_protocol::ParticipantId;

    #[test]
    fn test_refusal_of_maps_each_guard_failure() {
        let cases = [
            (
                RoomError::AlreadyApplied(ParticipantId(1)),
                RefusalReason::AlreadyApplied,
            ),
            (
                RoomError::NotFound(ParticipantId(1)),
                RefusalReason::NotFound,
            ),
            (
                RoomError::CannotRejectOccupant(ParticipantId(1)),
                RefusalReason::CannotRejectOccupant,
            ),
            (
                RoomError::InvalidTransition("x".into()),
                RefusalReason::InvalidTransition,
            ),
            (
                RoomError::StaleReference(ParticipantId(1)),
                RefusalReason::StaleReference,
            ),
            (RoomError::Unavailable(Slot(2)), RefusalReason::NotFound),
        ];
        for (error, expected) in cases {
            assert_eq!(refusal_of(&error).reason, expected);
        }
    }
}
