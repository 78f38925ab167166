//! Fan-out of persisted messages to live subscribers.
//!
//! The ingestion pipeline hands each persisted message to a [`Broadcaster`]
//! handle. A single worker task drains the queue, takes a registry snapshot
//! for the message's group, serializes the message once and pushes the frame
//! to every subscriber independently. Failed pushes are logged and counted in
//! the [`DeliveryReport`]; they never unregister the connection (that is the
//! subscription task's job) and never reach the submitter.

use std::sync::Arc;

use apoyo_store::Message;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::registry::{PushError, SubscriberRegistry};

/// Per-broadcast outcome, one entry per subscriber in the snapshot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub recipients: usize,
    pub delivered: usize,
    pub full: usize,
    pub closed: usize,
}

impl DeliveryReport {
    pub fn failed(&self) -> usize {
        self.full + self.closed
    }
}

/// Push one message to every current subscriber of its group.
pub fn deliver(registry: &SubscriberRegistry, message: &Message) -> DeliveryReport {
    let group_id = message.group_id;
    let subscribers = registry.snapshot(group_id);
    let mut report = DeliveryReport {
        recipients: subscribers.len(),
        ..Default::default()
    };
    if subscribers.is_empty() {
        return report;
    }

    let frame: Arc<str> = match serde_json::to_string(message) {
        Ok(json) => Arc::from(json),
        Err(e) => {
            warn!(message_id = message.id, error = %e, "Failed to serialize message for broadcast");
            return report;
        }
    };

    for subscriber in &subscribers {
        match subscriber.push(Arc::clone(&frame)) {
            Ok(()) => report.delivered += 1,
            Err(PushError::Full) => {
                report.full += 1;
                warn!(
                    group_id,
                    message_id = message.id,
                    conn = %subscriber.id(),
                    "Dropping message for slow subscriber"
                );
            }
            Err(PushError::Closed) => {
                report.closed += 1;
                debug!(
                    group_id,
                    message_id = message.id,
                    conn = %subscriber.id(),
                    "Subscriber already closed"
                );
            }
        }
    }

    debug!(
        group_id,
        message_id = message.id,
        recipients = report.recipients,
        delivered = report.delivered,
        failed = report.failed(),
        "Broadcast message"
    );
    report
}

/// Cheap, cloneable handle for queueing broadcasts.
#[derive(Clone)]
pub struct Broadcaster {
    tx: mpsc::UnboundedSender<Message>,
}

impl Broadcaster {
    /// Spawn the broadcast worker. It exits once every handle is dropped.
    pub fn spawn(registry: SubscriberRegistry) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let worker = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                deliver(&registry, &message);
            }
            debug!("Broadcast worker stopped");
        });
        (Self { tx }, worker)
    }

    /// Queue a persisted message for fan-out. Never waits.
    pub fn publish(&self, message: Message) {
        let message_id = message.id;
        if self.tx.send(message).is_err() {
            warn!(message_id, "Broadcast worker is gone; message not delivered live");
        }
    }
}
