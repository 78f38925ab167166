//! Message ingestion: validate, moderate, persist, then hand off to the
//! broadcaster.
//!
//! The broadcast is queued only after the store has returned the persisted
//! record, so a subscriber can never observe a message without a stable id.
//! Queueing never waits, so the HTTP response is not held up by subscribers.

use std::sync::Arc;

use apoyo_shared::{ContentClassifier, SendMessageRequest};
use apoyo_store::Message;
use tracing::{error, info};

use crate::broadcast::Broadcaster;
use crate::error::ServerError;
use crate::store::MessageStore;

#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn MessageStore>,
    classifier: Arc<dyn ContentClassifier>,
    broadcaster: Broadcaster,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        classifier: Arc<dyn ContentClassifier>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            store,
            classifier,
            broadcaster,
        }
    }

    /// Run one submission through the pipeline and return the stored message.
    pub async fn submit(&self, request: SendMessageRequest) -> Result<Message, ServerError> {
        // 1. Validate
        let submission = request.validate()?;

        // 2. Moderate (annotate only)
        let is_moderated = self.classifier.is_flagged(&submission.content);

        // 3. Persist
        let message = self
            .store
            .insert(
                submission.group_id,
                &submission.username,
                &submission.content,
                is_moderated,
            )
            .await
            .map_err(|e| {
                error!(group_id = submission.group_id, error = %e, "Failed to persist message");
                ServerError::Storage(e.to_string())
            })?;

        if message.is_moderated {
            info!(
                group_id = message.group_id,
                message_id = message.id,
                username = %message.username,
                "Moderated message detected"
            );
        }

        // 4 + 5. Queue the broadcast; the caller responds with `message`.
        self.broadcaster.publish(message.clone());

        Ok(message)
    }
}
