//! Front-desk demo: a coordinator plus two scripted participants.
//!
//! Starts an in-process coordinator with a small room table, then plays
//! through a full stay — apply, approve, occupy, end, turn over —
//! printing every notice the coordinator pushes along the way. Run with
//! `RUST_LOG=info` to see the coordinator's side of it too.

use atria::prelude::*;
use atria_client::{ClientStub, Endpoint};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // -- Coordinator ------------------------------------------------------
    let coordinator = Coordinator::builder()
        .bind("127.0.0.1:0")
        .room(RoomSpec::new("Aurora", "standard", 8))
        .room(RoomSpec::new("Borealis", "standard", 8))
        .room(RoomSpec::new("Cirrus", "large", 20))
        .build()
        .await?;
    let authority = coordinator.local_addr()?.to_string();
    tokio::spawn(coordinator.run());
    println!("coordinator up at {authority} (slot 0 = registry)");

    // -- Participants -----------------------------------------------------
    let registry: Endpoint = format!("{authority}/0").parse()?;
    let mut guest =
        ClientStub::connect(&registry, Role::Applier, ParticipantId(101)).await?;
    let mut guest_updates = guest.updates().await.expect("fresh stub has a stream");
    let mut desk =
        ClientStub::connect(&registry, Role::Approver, ParticipantId(900)).await?;

    // Echo every push the guest receives.
    let printer = tokio::spawn(async move {
        while let Some(notice) = guest_updates.recv().await {
            println!("  [push to guest] {notice:?}");
        }
    });

    // -- Discovery --------------------------------------------------------
    println!("\nprobing rooms:");
    for room in guest.probe_rooms().await? {
        println!("  {room}");
    }

    // -- A full stay in Cirrus (slot 3) -----------------------------------
    let cirrus = Slot(3);
    desk.register_approver(cirrus).await?;

    println!("\nguest 101 applies for Cirrus, party of 5");
    guest.apply(cirrus, 5).await?;
    println!("  appliers now: {}", desk.applier_count(cirrus).await?);

    println!("front desk approves guest 101");
    desk.approve(cirrus, ParticipantId(101)).await?;
    println!("  reservation: {:?}", desk.reservation(cirrus).await?);

    println!("guest 101 occupies");
    guest.occupy(cirrus).await?;
    println!("  {}", guest.describe(cirrus).await?);

    println!("guest 101 ends the stay");
    guest.end_occupying(cirrus).await?;
    println!("  {}", guest.describe(cirrus).await?);

    println!("housekeeping turns the room over");
    desk.finish_cleaning(cirrus).await?;
    println!("  {}", guest.describe(cirrus).await?);

    // -- Clean exit --------------------------------------------------------
    guest.disconnect().await?;
    desk.disconnect().await?;
    printer.abort();
    println!("\ndone");
    Ok(())
}
