//! Integration tests for the room workflow against a live room actor.
//!
//! Each test opens a directory with real actor tasks and drives the
//! apply/approve/occupy lifecycle through `RoomHandle`, the same surface
//! the coordinator uses.

use atria_protocol::{Notice, ParticipantId, Slot};
use atria_room::{
    ObserverHandle, ObserverId, ObserverReceiver, RoomDirectory, RoomError,
    RoomHandle, RoomSpec, Transition,
};

// =========================================================================
// Helpers
// =========================================================================

fn pid(id: u64) -> ParticipantId {
    ParticipantId(id)
}

fn obs(id: u64) -> ObserverId {
    ObserverId::new(id)
}

/// Opens a single-room directory ("Aurora", capacity 20) and returns the
/// room's handle. The directory is dropped; the cloned handle keeps the
/// actor alive.
fn open_room() -> RoomHandle {
    let directory =
        RoomDirectory::open(vec![RoomSpec::new("Aurora", "standard", 20)]);
    directory
        .get(Slot(1))
        .expect("room should exist at slot 1")
        .clone()
}

/// Builds an observer handle for participant `id`, using `id` as the
/// observer identity too (each test participant is one incarnation).
fn observer(id: u64) -> (ObserverHandle, ObserverReceiver) {
    ObserverHandle::new(pid(id), obs(id))
}

/// Applies for the room as participant `id` with the given party size,
/// returning the receiver the room will push notices into.
async fn apply(room: &RoomHandle, id: u64, party_size: u32) -> ObserverReceiver {
    let (handle, rx) = observer(id);
    room.apply(pid(id), party_size, handle)
        .await
        .expect("apply should succeed");
    rx
}

/// Drains every notice currently queued on a receiver.
fn drain(rx: &mut ObserverReceiver) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}

// =========================================================================
// Apply / Cancel — applier-count bookkeeping
// =========================================================================

#[tokio::test]
async fn test_applier_count_tracks_applies_and_cancels() {
    let room = open_room();

    assert_eq!(room.applier_count().await.unwrap(), 0);

    let _rx1 = apply(&room, 1, 2).await;
    let _rx2 = apply(&room, 2, 4).await;
    let _rx3 = apply(&room, 3, 1).await;
    assert_eq!(room.applier_count().await.unwrap(), 3);

    room.cancel(pid(2), obs(2)).await.unwrap();
    assert_eq!(room.applier_count().await.unwrap(), 2);

    room.cancel(pid(1), obs(1)).await.unwrap();
    room.cancel(pid(3), obs(3)).await.unwrap();
    assert_eq!(room.applier_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_apply_twice_from_same_handle_returns_already_applied() {
    let room = open_room();
    let (handle, _rx) = observer(1);
    room.apply(pid(1), 2, handle.clone()).await.unwrap();

    let result = room.apply(pid(1), 2, handle).await;

    assert!(
        matches!(result, Err(RoomError::AlreadyApplied(p)) if p == pid(1)),
        "double apply from one incarnation must be rejected"
    );
    assert_eq!(room.applier_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_apply_from_new_incarnation_supersedes_record() {
    // Reconnect is re-registration: a fresh handle for the same identity
    // replaces the old record instead of piling up a second one.
    let room = open_room();
    let (old_handle, old_rx) = ObserverHandle::new(pid(1), obs(10));
    room.apply(pid(1), 2, old_handle).await.unwrap();
    drop(old_rx); // old incarnation is gone

    let (new_handle, _new_rx) = ObserverHandle::new(pid(1), obs(11));
    room.apply(pid(1), 3, new_handle)
        .await
        .expect("re-registration should upsert, not reject");

    assert_eq!(room.applier_count().await.unwrap(), 1, "still one record");
    assert_eq!(room.party_size_of(pid(1)).await.unwrap(), 3);
}

#[tokio::test]
async fn test_cancel_unknown_id_returns_not_found() {
    let room = open_room();

    let result = room.cancel(pid(9), obs(9)).await;

    assert!(matches!(result, Err(RoomError::NotFound(p)) if p == pid(9)));
}

#[tokio::test]
async fn test_cancel_from_superseded_handle_returns_stale_reference() {
    let room = open_room();
    let (old_handle, _old_rx) = ObserverHandle::new(pid(1), obs(10));
    room.apply(pid(1), 2, old_handle).await.unwrap();
    let (new_handle, _new_rx) = ObserverHandle::new(pid(1), obs(11));
    room.apply(pid(1), 2, new_handle).await.unwrap();

    // The old incarnation keeps calling; it must not act for the new one.
    let result = room.cancel(pid(1), obs(10)).await;
    assert!(matches!(result, Err(RoomError::StaleReference(p)) if p == pid(1)));

    // The live incarnation still works.
    room.cancel(pid(1), obs(11)).await.unwrap();
    assert_eq!(room.applier_count().await.unwrap(), 0);
}

// =========================================================================
// Approve
// =========================================================================

#[tokio::test]
async fn test_approve_sets_reservation_without_touching_state() {
    let room = open_room();
    let mut rx = apply(&room, 101, 5).await;

    room.approve(pid(101)).await.expect("approve should succeed");

    assert_eq!(room.reservation().await.unwrap(), Some(pid(101)));
    let descriptor = room.describe().await.unwrap();
    assert_eq!(descriptor.status, "Available", "approval is not a transition");

    // The approved applier is told, after the reservation committed.
    let notices = drain(&mut rx);
    assert!(notices.contains(&Notice::ReservationGranted {
        slot: Slot(1),
        id: pid(101),
    }));
}

#[tokio::test]
async fn test_approve_unknown_id_returns_not_found() {
    let room = open_room();

    let result = room.approve(pid(7)).await;

    assert!(matches!(result, Err(RoomError::NotFound(p)) if p == pid(7)));
    assert_eq!(room.reservation().await.unwrap(), None);
}

#[tokio::test]
async fn test_approve_while_occupied_is_refused() {
    let room = open_room();
    let _rx1 = apply(&room, 1, 2).await;
    let _rx2 = apply(&room, 2, 2).await;
    room.approve(pid(1)).await.unwrap();
    room.occupy(pid(1), obs(1)).await.unwrap();

    let result = room.approve(pid(2)).await;

    assert!(matches!(result, Err(RoomError::InvalidTransition(_))));
    assert_eq!(room.reservation().await.unwrap(), None);
}

#[tokio::test]
async fn test_approve_supersedes_previous_reservation_and_notifies() {
    let room = open_room();
    let mut rx1 = apply(&room, 1, 2).await;
    let _rx2 = apply(&room, 2, 2).await;

    room.approve(pid(1)).await.unwrap();
    drain(&mut rx1);
    room.approve(pid(2)).await.unwrap();

    assert_eq!(room.reservation().await.unwrap(), Some(pid(2)));
    let notices = drain(&mut rx1);
    assert!(
        notices.contains(&Notice::ReservationRevoked {
            slot: Slot(1),
            id: pid(1),
        }),
        "previous holder must learn the reservation moved on"
    );
}

#[tokio::test]
async fn test_approve_leaves_other_appliers_in_place() {
    // Approval does not auto-reject competitors; that policy belongs to
    // the approval authority.
    let room = open_room();
    let _rx1 = apply(&room, 1, 2).await;
    let _rx2 = apply(&room, 2, 2).await;
    let _rx3 = apply(&room, 3, 2).await;

    room.approve(pid(2)).await.unwrap();

    assert_eq!(room.applier_count().await.unwrap(), 3);
}

// =========================================================================
// Reject
// =========================================================================

#[tokio::test]
async fn test_reject_pending_applier_removes_record_and_notifies() {
    let room = open_room();
    let mut rx = apply(&room, 1, 2).await;

    room.reject(pid(1)).await.expect("reject should succeed");

    assert_eq!(room.applier_count().await.unwrap(), 0);
    let notices = drain(&mut rx);
    assert!(notices.contains(&Notice::ApplicationRejected {
        slot: Slot(1),
        id: pid(1),
    }));
}

#[tokio::test]
async fn test_reject_reserved_applier_clears_reservation() {
    let room = open_room();
    let _rx = apply(&room, 1, 2).await;
    room.approve(pid(1)).await.unwrap();

    room.reject(pid(1)).await.unwrap();

    // The reservation must never dangle once its record is gone.
    assert_eq!(room.reservation().await.unwrap(), None);
}

#[tokio::test]
async fn test_reject_occupant_returns_cannot_reject_occupant() {
    let room = open_room();
    let _rx = apply(&room, 1, 2).await;
    room.approve(pid(1)).await.unwrap();
    room.occupy(pid(1), obs(1)).await.unwrap();

    let result = room.reject(pid(1)).await;

    assert!(
        matches!(result, Err(RoomError::CannotRejectOccupant(p)) if p == pid(1))
    );
    assert_eq!(room.applier_count().await.unwrap(), 1, "occupant record stays");
}

#[tokio::test]
async fn test_reject_absent_id_returns_not_found() {
    // Removal of a non-existent id is an error, consistently — the
    // authority acts on listings and should see its races.
    let room = open_room();

    let result = room.reject(pid(9)).await;

    assert!(matches!(result, Err(RoomError::NotFound(p)) if p == pid(9)));
}

// =========================================================================
// Occupy / EndOccupying
// =========================================================================

#[tokio::test]
async fn test_occupy_without_reservation_is_refused() {
    let room = open_room();
    let _rx = apply(&room, 1, 2).await;

    let result = room.occupy(pid(1), obs(1)).await;

    assert!(matches!(result, Err(RoomError::InvalidTransition(_))));
    let descriptor = room.describe().await.unwrap();
    assert_eq!(descriptor.status, "Available");
}

#[tokio::test]
async fn test_occupy_by_non_reserved_applier_is_refused() {
    let room = open_room();
    let _rx1 = apply(&room, 1, 2).await;
    let _rx2 = apply(&room, 2, 2).await;
    room.approve(pid(1)).await.unwrap();

    let result = room.occupy(pid(2), obs(2)).await;

    assert!(matches!(result, Err(RoomError::InvalidTransition(_))));
    assert_eq!(room.reservation().await.unwrap(), Some(pid(1)));
}

#[tokio::test]
async fn test_end_occupying_by_non_occupant_is_refused() {
    let room = open_room();
    let _rx1 = apply(&room, 1, 2).await;
    let _rx2 = apply(&room, 2, 2).await;
    room.approve(pid(1)).await.unwrap();
    room.occupy(pid(1), obs(1)).await.unwrap();

    let result = room.end_occupying(pid(2), obs(2)).await;

    assert!(matches!(result, Err(RoomError::InvalidTransition(_))));
    assert_eq!(room.applier_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_end_occupying_after_fault_keeps_needs_repair() {
    // A fault reported mid-stay outranks the cleaning turnover: ending
    // occupancy removes the record but the room stays out of service.
    let room = open_room();
    let _rx = apply(&room, 1, 2).await;
    room.approve(pid(1)).await.unwrap();
    room.occupy(pid(1), obs(1)).await.unwrap();
    room.report_fault(pid(1), obs(1)).await.unwrap();

    room.end_occupying(pid(1), obs(1)).await.unwrap();

    assert_eq!(room.applier_count().await.unwrap(), 0);
    let descriptor = room.describe().await.unwrap();
    assert_eq!(descriptor.status, "NeedsRepair");
}

// =========================================================================
// Fault reporting and housekeeping
// =========================================================================

#[tokio::test]
async fn test_report_fault_requires_a_record() {
    let room = open_room();

    let result = room.report_fault(pid(1), obs(1)).await;

    assert!(matches!(result, Err(RoomError::NotFound(p)) if p == pid(1)));
}

#[tokio::test]
async fn test_report_fault_twice_second_is_refused_without_mutation() {
    let room = open_room();
    let _rx = apply(&room, 1, 2).await;
    room.report_fault(pid(1), obs(1)).await.unwrap();

    let result = room.report_fault(pid(1), obs(1)).await;

    assert!(matches!(result, Err(RoomError::InvalidTransition(_))));
    let descriptor = room.describe().await.unwrap();
    assert_eq!(descriptor.status, "NeedsRepair", "state untouched by the refusal");
}

#[tokio::test]
async fn test_non_reserved_applier_may_report_fault() {
    // Holding the reservation is not required for fault reporting.
    let room = open_room();
    let _rx1 = apply(&room, 1, 2).await;
    let _rx2 = apply(&room, 2, 2).await;
    room.approve(pid(1)).await.unwrap();

    room.report_fault(pid(2), obs(2))
        .await
        .expect("any applier may report a fault");

    let descriptor = room.describe().await.unwrap();
    assert_eq!(descriptor.status, "NeedsRepair");
}

#[tokio::test]
async fn test_advance_rejects_participant_transitions() {
    let room = open_room();

    let result = room.advance(Transition::Occupy).await;
    assert!(matches!(result, Err(RoomError::InvalidTransition(_))));

    let result = room.advance(Transition::ReportFault).await;
    assert!(matches!(result, Err(RoomError::InvalidTransition(_))));
}

#[tokio::test]
async fn test_repair_flow_returns_room_to_service() {
    let room = open_room();
    let _rx = apply(&room, 1, 2).await;
    room.report_fault(pid(1), obs(1)).await.unwrap();

    room.advance(Transition::FinishRepair).await.unwrap();
    room.advance(Transition::FinishCleaning).await.unwrap();

    let descriptor = room.describe().await.unwrap();
    assert_eq!(descriptor.status, "Available");
}

#[tokio::test]
async fn test_begin_cleaning_with_occupant_present_is_refused() {
    let room = open_room();
    let _rx = apply(&room, 1, 2).await;
    room.approve(pid(1)).await.unwrap();
    room.occupy(pid(1), obs(1)).await.unwrap();

    let result = room.advance(Transition::BeginCleaning).await;

    assert!(matches!(result, Err(RoomError::InvalidTransition(_))));
}

// =========================================================================
// Disconnect
// =========================================================================

#[tokio::test]
async fn test_disconnect_removes_record_and_reservation() {
    let room = open_room();
    let _rx = apply(&room, 1, 2).await;
    room.approve(pid(1)).await.unwrap();

    room.disconnect(pid(1)).await.unwrap();

    assert_eq!(room.applier_count().await.unwrap(), 0);
    assert_eq!(room.reservation().await.unwrap(), None);
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let room = open_room();

    room.disconnect(pid(9)).await.expect("no-op disconnect is fine");
    room.disconnect(pid(9)).await.expect("and stays fine");
}

#[tokio::test]
async fn test_disconnect_of_occupant_leaves_room_for_housekeeping() {
    // An occupant vanishing mid-stay strands the room in Occupied;
    // housekeeping's BeginCleaning is the recovery path.
    let room = open_room();
    let _rx = apply(&room, 1, 2).await;
    room.approve(pid(1)).await.unwrap();
    room.occupy(pid(1), obs(1)).await.unwrap();

    room.disconnect(pid(1)).await.unwrap();

    let descriptor = room.describe().await.unwrap();
    assert_eq!(descriptor.status, "Occupied");
    assert_eq!(descriptor.appliers, 0);

    room.advance(Transition::BeginCleaning)
        .await
        .expect("housekeeping recovers the stranded room");
    let descriptor = room.describe().await.unwrap();
    assert_eq!(descriptor.status, "Cleaning");
}

// =========================================================================
// Pushes
// =========================================================================

#[tokio::test]
async fn test_status_change_is_pushed_to_all_observers() {
    let room = open_room();
    let mut rx1 = apply(&room, 1, 2).await;
    let mut rx2 = apply(&room, 2, 2).await;
    let (approver_handle, mut approver_rx) = ObserverHandle::new(pid(50), obs(50));
    room.register_approver(pid(50), approver_handle).await.unwrap();

    room.approve(pid(1)).await.unwrap();
    drain(&mut rx1);
    room.occupy(pid(1), obs(1)).await.unwrap();

    let expected = Notice::StatusChanged {
        slot: Slot(1),
        status: "Occupied".into(),
    };
    assert!(drain(&mut rx1).contains(&expected));
    assert!(drain(&mut rx2).contains(&expected));
    assert!(drain(&mut approver_rx).contains(&expected));
}

#[tokio::test]
async fn test_applier_changes_are_pushed_to_approver() {
    let room = open_room();
    let (approver_handle, mut approver_rx) = ObserverHandle::new(pid(50), obs(50));
    room.register_approver(pid(50), approver_handle).await.unwrap();

    let _rx = apply(&room, 1, 2).await;
    room.cancel(pid(1), obs(1)).await.unwrap();

    let notices = drain(&mut approver_rx);
    assert!(notices.contains(&Notice::ApplierChanged {
        slot: Slot(1),
        appliers: 1,
    }));
    assert!(notices.contains(&Notice::ApplierChanged {
        slot: Slot(1),
        appliers: 0,
    }));
}

#[tokio::test]
async fn test_failed_push_marks_applier_offline_and_commits_anyway() {
    let room = open_room();
    let rx1 = apply(&room, 1, 2).await;
    drop(rx1); // participant 1's incarnation is gone
    let _rx2 = apply(&room, 2, 2).await;

    // Approving 1 pushes to a dead queue: the reservation must still be
    // granted, and the record flagged offline.
    room.approve(pid(1)).await.expect("delivery outcome never undoes a commit");
    assert_eq!(room.reservation().await.unwrap(), Some(pid(1)));

    let listing = room.applier_list().await.unwrap();
    let entry1 = listing.iter().find(|e| e.id == pid(1)).unwrap();
    let entry2 = listing.iter().find(|e| e.id == pid(2)).unwrap();
    assert!(!entry1.online, "failed push flips the online flag");
    assert!(entry2.online);
}

// =========================================================================
// Queries and directory
// =========================================================================

#[tokio::test]
async fn test_party_size_of_returns_recorded_size_or_not_found() {
    let room = open_room();
    let _rx = apply(&room, 1, 6).await;

    assert_eq!(room.party_size_of(pid(1)).await.unwrap(), 6);
    let result = room.party_size_of(pid(2)).await;
    assert!(matches!(result, Err(RoomError::NotFound(p)) if p == pid(2)));
}

#[tokio::test]
async fn test_is_applier_covers_pending_and_occupying() {
    let room = open_room();
    assert!(!room.is_applier(pid(1)).await.unwrap());

    let _rx = apply(&room, 1, 2).await;
    assert!(room.is_applier(pid(1)).await.unwrap(), "pending counts");

    room.approve(pid(1)).await.unwrap();
    room.occupy(pid(1), obs(1)).await.unwrap();
    assert!(room.is_applier(pid(1)).await.unwrap(), "occupying counts");

    room.end_occupying(pid(1), obs(1)).await.unwrap();
    assert!(!room.is_applier(pid(1)).await.unwrap());
}

#[tokio::test]
async fn test_directory_assigns_slots_in_order() {
    let directory = RoomDirectory::open(vec![
        RoomSpec::new("Aurora", "standard", 8),
        RoomSpec::new("Borealis", "large", 20),
        RoomSpec::new("Cirrus", "standard", 8),
    ]);

    assert_eq!(directory.len(), 3);
    assert!(directory.get(Slot(0)).is_none(), "slot 0 is never a room");
    assert!(directory.contains(Slot(1)));
    assert!(directory.contains(Slot(3)));
    assert!(!directory.contains(Slot(4)));

    let descriptors = directory.describe_all().await;
    let names: Vec<&str> =
        descriptors.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Aurora", "Borealis", "Cirrus"]);
    assert!(descriptors.iter().all(|d| d.status == "Available"));
}

// =========================================================================
// Full lifecycle
// =========================================================================

#[tokio::test]
async fn test_full_occupancy_lifecycle() {
    // Room starts Available. 101 applies with a party of 5, is approved,
    // occupies, ends the stay; the room passes through Cleaning and is
    // turned over back to Available.
    let room = open_room();

    let _rx = apply(&room, 101, 5).await;
    assert_eq!(room.applier_count().await.unwrap(), 1);

    room.approve(pid(101)).await.unwrap();
    assert_eq!(room.reservation().await.unwrap(), Some(pid(101)));
    assert_eq!(room.describe().await.unwrap().status, "Available");

    room.occupy(pid(101), obs(101)).await.unwrap();
    assert_eq!(room.describe().await.unwrap().status, "Occupied");
    assert_eq!(room.reservation().await.unwrap(), None);

    room.end_occupying(pid(101), obs(101)).await.unwrap();
    assert_eq!(room.applier_count().await.unwrap(), 0);
    assert_eq!(room.describe().await.unwrap().status, "Cleaning");

    room.advance(Transition::FinishCleaning).await.unwrap();
    assert_eq!(room.describe().await.unwrap().status, "Available");
}
