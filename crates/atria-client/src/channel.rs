//! The stub's connection to a coordinator: one dialed socket, a read
//! loop, and seq-based correlation of in-flight calls.
//!
//! A channel multiplexes two flows over the one connection:
//!
//! - **Calls**: `call()` assigns a fresh `seq`, parks a oneshot in the
//!   pending map, and the read loop completes it when the response with
//!   that `seq` arrives.
//! - **Notices**: pushes from rooms have no correlation; the read loop
//!   funnels them into a queue the owner drains.
//!
//! Every call is bounded by [`CALL_TIMEOUT`]; an expired call surfaces
//! as a retryable [`ConnectionError::Timeout`], never as a refusal.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use atria_protocol::{Codec, Envelope, JsonCodec, Notice, Payload, Request, Response};
use atria_transport::{Connection, WebSocketConnection, WebSocketConnector};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{ClientError, ConnectionError};

/// How long a call waits for its response before giving up.
pub(crate) const CALL_TIMEOUT: Duration = Duration::from_secs(5);

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

/// One live connection to a coordinator.
pub(crate) struct Channel {
    conn: Arc<WebSocketConnection>,
    codec: JsonCodec,
    next_seq: AtomicU64,
    pending: Pending,
    notices: Mutex<Option<mpsc::UnboundedReceiver<Notice>>>,
    reader: JoinHandle<()>,
}

impl Channel {
    /// Dials `authority` (`host:port`) and starts the read loop.
    pub(crate) async fn dial(authority: &str) -> Result<Self, ClientError> {
        let conn = WebSocketConnector::connect(authority)
            .await
            .map_err(|e| ConnectionError::Unresolved(e.to_string()))?;
        let conn = Arc::new(conn);
        let codec = JsonCodec;

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let reader = {
            let conn = Arc::clone(&conn);
            let pending = Arc::clone(&pending);
            tokio::spawn(async move {
                read_loop(conn, codec, pending, notice_tx).await;
            })
        };

        Ok(Self {
            conn,
            codec,
            next_seq: AtomicU64::new(1),
            pending,
            notices: Mutex::new(Some(notice_rx)),
            reader,
        })
    }

    /// Sends one request and waits for its correlated response.
    pub(crate) async fn call(&self, request: Request) -> Result<Response, ClientError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().await.insert(seq, reply_tx);

        let envelope = Envelope {
            seq,
            payload: Payload::Request(request),
        };
        let bytes = self.codec.encode(&envelope)?;
        if let Err(e) = self.conn.send(&bytes).await {
            self.pending.lock().await.remove(&seq);
            return Err(ConnectionError::Transport(e.to_string()).into());
        }

        match tokio::time::timeout(CALL_TIMEOUT, reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            // Read loop gone — the connection died under the call.
            Ok(Err(_)) => Err(ConnectionError::Closed.into()),
            Err(_) => {
                self.pending.lock().await.remove(&seq);
                Err(ConnectionError::Timeout.into())
            }
        }
    }

    /// Takes the notice stream. Yields `Some` exactly once per channel.
    pub(crate) async fn take_notices(&self) -> Option<mpsc::UnboundedReceiver<Notice>> {
        self.notices.lock().await.take()
    }

    /// Closes the connection.
    pub(crate) async fn close(&self) {
        let _ = self.conn.close().await;
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Routes inbound envelopes until the connection ends. Responses
/// complete their pending call; notices go to the owner's queue.
async fn read_loop(
    conn: Arc<WebSocketConnection>,
    codec: JsonCodec,
    pending: Pending,
    notices: mpsc::UnboundedSender<Notice>,
) {
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!("coordinator closed the connection");
                break;
            }
            Err(e) => {
                tracing::debug!(error = %e, "recv error");
                break;
            }
        };

        let envelope: Envelope = match codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(error = %e, "failed to decode envelope");
                continue;
            }
        };

        match envelope.payload {
            Payload::Response(response) => {
                if let Some(reply) = pending.lock().await.remove(&envelope.seq) {
                    let _ = reply.send(response);
                } else {
                    tracing::debug!(seq = envelope.seq, "response with no pending call");
                }
            }
            Payload::Notice(notice) => {
                // Owner may have dropped the stream; pushes are then lost
                // here, which is fine — delivery is best-effort by design.
                let _ = notices.send(notice);
            }
            Payload::Request(_) => {
                tracing::debug!("ignoring request envelope from coordinator");
            }
        }
    }

    // Dropping the pending map's senders wakes every in-flight call with
    // a Closed error.
    pending.lock().await.clear();
}
