//! Error types for the client stub.

use atria_protocol::{ProtocolError, Refusal};

use crate::EndpointError;

/// The coordinator could not be reached, or did not answer in time.
///
/// These are retryable: nothing authoritative was decided. The usual
/// recovery is [`ClientStub::reconnect`](crate::ClientStub::reconnect).
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The coordinator name did not resolve or the dial failed.
    #[error("unresolved: {0}")]
    Unresolved(String),

    /// The call did not complete within the call timeout. The request
    /// may or may not have been processed — the caller only knows it
    /// heard nothing back.
    #[error("call timed out")]
    Timeout,

    /// The connection closed while a call was in flight.
    #[error("connection closed")]
    Closed,

    /// Sending on the connection failed.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Errors surfaced by the client stub.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The coordinator was not reached — retryable.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The coordinator was reached and refused the request — an
    /// authoritative, typed no. Not retryable as-is.
    #[error("refused: {0}")]
    Refused(Refusal),

    /// The reply could not be understood (codec failure or a response
    /// shape that doesn't match the request).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    /// Returns `true` if retrying (typically after a reconnect) can
    /// help. Refusals are authoritative and retrying them verbatim
    /// cannot change the answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns the refusal if this is an authoritative rejection.
    pub fn refusal(&self) -> Option<&Refusal> {
        match self {
            Self::Refused(refusal) => Some(refusal),
            _ => None,
        }
    }
}

impl From<EndpointError> for ClientError {
    fn from(e: EndpointError) -> Self {
        Self::Connection(ConnectionError::Unresolved(e.to_string()))
    }
}
