//! `Coordinator` builder and accept loop.
//!
//! This is the entry point for running an Atria coordinator. It ties
//! together all the layers: transport → protocol → registry → rooms.

use std::sync::Arc;

use atria_protocol::{Codec, JsonCodec};
use atria_registry::Registry;
use atria_room::{RoomDirectory, RoomSpec};
use atria_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::AtriaError;
use crate::handler::handle_connection;

/// Shared coordinator state passed to each connection handler task.
///
/// The registry sits behind one mutex, which is what makes its
/// check-and-claim a single critical section. The room directory is
/// immutable after startup — rooms serialize their own mutations through
/// their actor channels, so no further locking happens here.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) directory: RoomDirectory,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a coordinator.
///
/// Rooms are declared up front and created once at startup; there is no
/// runtime create/destroy.
pub struct CoordinatorBuilder {
    bind_addr: String,
    rooms: Vec<RoomSpec>,
}

impl CoordinatorBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:7320".to_string(),
            rooms: Vec::new(),
        }
    }

    /// Sets the address to bind the coordinator to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Adds one room to the startup table. Rooms take slots 1..N in
    /// declaration order.
    pub fn room(mut self, spec: RoomSpec) -> Self {
        self.rooms.push(spec);
        self
    }

    /// Replaces the whole room table.
    pub fn rooms(mut self, specs: Vec<RoomSpec>) -> Self {
        self.rooms = specs;
        self
    }

    /// Binds the transport, spawns the room actors, and returns the
    /// ready-to-run coordinator.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport` as defaults.
    pub async fn build(self) -> Result<Coordinator<JsonCodec>, AtriaError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(Registry::new()),
            directory: RoomDirectory::open(self.rooms),
            codec: JsonCodec,
        });

        Ok(Coordinator { transport, state })
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Atria coordinator.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct Coordinator<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl Coordinator<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }
}

impl<C: Codec> Coordinator<C> {
    /// Returns the local address the coordinator is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the coordinator accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each,
    /// so calls from different clients dispatch onto independent
    /// execution contexts. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), AtriaError> {
        tracing::info!(rooms = self.state.directory.len(), "Atria coordinator running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
