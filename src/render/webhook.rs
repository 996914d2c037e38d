use serde_json::Value;
use tracing::{debug, warn};

use super::BatchCallback;
use crate::notification::Notification;
use crate::outbound::{OutboundQueue, OutboundRequest};

/// Batch callback POSTing the new notifications as a JSON array
pub struct WebhookCallback {
    url: String,
    queue: OutboundQueue,
}

impl WebhookCallback {
    pub fn new(url: impl Into<String>, queue: OutboundQueue) -> Self {
        Self {
            url: url.into(),
            queue,
        }
    }
}

impl BatchCallback for WebhookCallback {
    fn on_batch(&self, batch: &[Notification]) {
        let body = match serde_json::to_value(batch) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to serialize batch for {}: {}", self.url, e);
                return;
            }
        };
        debug!("Queueing callback with {} notifications to {}", batch.len(), self.url);
        self.queue.enqueue(OutboundRequest::json(&self.url, body));
    }
}
