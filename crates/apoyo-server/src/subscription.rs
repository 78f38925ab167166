//! Lifecycle of one live WebSocket subscription.
//!
//! ```text
//! Admitting --upgrade ok--> Active --close/error/shutdown--> Closing --> Terminated
//!     \--upgrade failed--> Failed
//! ```
//!
//! Admission happens in the HTTP layer; a failed upgrade never touches the
//! registry. Once upgraded, [`run`] registers the connection through a
//! [`Registration`] guard whose `Drop` performs the deregistration, so the
//! Terminated transition happens exactly once on every exit path, including
//! panics and task cancellation.
//!
//! The server never acts on client frames. The read side exists only to
//! notice termination, see [`wait_for_close`].

use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Message as WsMessage;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::{ConnectionId, Subscriber, SubscriberRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Admitting,
    Active,
    Closing,
    Terminated,
    Failed,
}

/// What moved a subscription out of Active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame.
    ClientClosed,
    /// The inbound stream ended without a close frame.
    StreamEnded,
    /// Reading from the connection failed.
    ReadError(String),
    /// Writing a frame to the connection failed.
    WriteFailed,
    /// The server is shutting down.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::ClientClosed => write!(f, "client closed"),
            CloseReason::StreamEnded => write!(f, "stream ended"),
            CloseReason::ReadError(e) => write!(f, "read error: {e}"),
            CloseReason::WriteFailed => write!(f, "write failed"),
            CloseReason::Shutdown => write!(f, "server shutdown"),
        }
    }
}

/// Registry membership of one connection. Dropping it unregisters.
pub struct Registration {
    registry: SubscriberRegistry,
    group_id: i64,
    id: ConnectionId,
    state: SubscriptionState,
}

impl Registration {
    /// Register a fresh connection in `group_id` and return the guard plus
    /// the receiving end of its outbound frame queue.
    pub fn activate(
        registry: &SubscriberRegistry,
        group_id: i64,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = ConnectionId::new();
        registry.register(group_id, Subscriber::new(id, tx));
        info!(
            group_id,
            conn = %id,
            subscribers = registry.subscriber_count(group_id),
            "WebSocket subscriber connected"
        );
        (
            Self {
                registry: registry.clone(),
                group_id,
                id,
                state: SubscriptionState::Active,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Unregister now. Idempotent; also runs on drop.
    pub fn terminate(&mut self) {
        if self.state == SubscriptionState::Terminated {
            return;
        }
        self.state = SubscriptionState::Closing;
        self.registry.unregister(self.group_id, self.id);
        self.state = SubscriptionState::Terminated;
        info!(
            group_id = self.group_id,
            conn = %self.id,
            subscribers = self.registry.subscriber_count(self.group_id),
            "WebSocket subscriber disconnected"
        );
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Read and discard inbound frames until the connection terminates.
pub async fn wait_for_close<S, E>(stream: &mut S) -> CloseReason
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: fmt::Display,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Close(_)) => return CloseReason::ClientClosed,
            Ok(_) => {}
            Err(e) => return CloseReason::ReadError(e.to_string()),
        }
    }
    CloseReason::StreamEnded
}

async fn forward_frames<K>(rx: &mut mpsc::Receiver<Arc<str>>, sink: &mut K) -> CloseReason
where
    K: Sink<WsMessage> + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if sink.send(WsMessage::Text(frame.as_ref().into())).await.is_err() {
            return CloseReason::WriteFailed;
        }
    }
    // The registry holds the sender until we unregister, so this is only
    // reached if the queue was torn down underneath us.
    CloseReason::WriteFailed
}

/// Drive one admitted connection from Active to Terminated.
pub async fn run<K, S, E>(
    registry: SubscriberRegistry,
    group_id: i64,
    capacity: usize,
    shutdown: CancellationToken,
    mut sink: K,
    mut stream: S,
) -> CloseReason
where
    K: Sink<WsMessage> + Unpin,
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: fmt::Display,
{
    let (mut registration, mut rx) = Registration::activate(&registry, group_id, capacity);

    let reason = tokio::select! {
        reason = wait_for_close(&mut stream) => reason,
        reason = forward_frames(&mut rx, &mut sink) => reason,
        _ = shutdown.cancelled() => CloseReason::Shutdown,
    };

    registration.terminate();
    debug!(
        group_id,
        conn = %registration.id(),
        state = ?registration.state(),
        reason = %reason,
        "Subscription closed"
    );

    if reason != CloseReason::WriteFailed {
        // Best effort: the peer may already be gone.
        let _ = sink.send(WsMessage::Close(None)).await;
    }

    reason
}
