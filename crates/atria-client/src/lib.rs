//! Client stub for the Atria coordinator.
//!
//! A [`ClientStub`] is the process-local proxy for one participant: it
//! resolves the coordinator by name, claims the participant's identity
//! at the registry, issues workflow calls against rooms, and receives
//! the notices rooms push back.
//!
//! # Failure semantics
//!
//! Every call either completes with the coordinator's authoritative
//! answer (possibly a typed [`Refusal`](atria_protocol::Refusal)) or
//! fails with a [`ConnectionError`] — unresolved name, transport
//! failure, or timeout. The two are never conflated: a refusal means
//! "the coordinator said no, don't retry", a connection error means
//! "the coordinator wasn't heard from, retrying may help" (usually via
//! [`ClientStub::reconnect`]).
//!
//! Reconnecting is re-registration, not session resumption: the stub
//! dials a fresh connection, forcibly reclaims its identity, and
//! re-registers in every room it was participating in. The coordinator
//! treats the new incarnation as the identity's single claimant and
//! supersedes any record a dead predecessor left behind.

mod channel;
mod endpoint;
mod error;
mod stub;

pub use endpoint::{Endpoint, EndpointError};
pub use error::{ClientError, ConnectionError};
pub use stub::{ClientStub, NoticeStream};
