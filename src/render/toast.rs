use serde_json::{json, Map, Value};
use tracing::debug;

use super::RenderSink;
use crate::config::ToastOptions;
use crate::notification::Notification;
use crate::outbound::{OutboundQueue, OutboundRequest};

/// Toast renderer publishing each notification to an ntfy topic
///
/// Uses ntfy's JSON publishing: the configured settings table goes into the
/// body untouched, then the per-notification fields are set on top.
pub struct NtfyToastSink {
    server_url: String,
    topic: String,
    auth_token: Option<String>,
    settings: Map<String, Value>,
    queue: OutboundQueue,
}

impl NtfyToastSink {
    pub fn new(options: &ToastOptions, queue: OutboundQueue) -> Self {
        Self {
            server_url: options.server_url.trim_end_matches('/').to_string(),
            topic: options.topic.clone(),
            auth_token: options.auth_token.clone(),
            settings: options.settings.clone(),
            queue,
        }
    }

    /// JSON body published for one notification
    pub fn message_body(&self, notification: &Notification) -> Value {
        let mut body = self.settings.clone();
        body.insert("topic".to_string(), json!(self.topic));
        body.insert("message".to_string(), json!(notification.message));
        if !notification.title.is_empty() {
            body.insert("title".to_string(), json!(notification.title));
        }
        if !notification.kind.is_empty() {
            body.insert("tags".to_string(), json!([notification.kind]));
        }
        Value::Object(body)
    }
}

impl RenderSink for NtfyToastSink {
    fn render(&self, notification: &Notification) {
        debug!("Queueing toast for notification {} to topic {}", notification.id, self.topic);
        let request = OutboundRequest::json(&self.server_url, self.message_body(notification))
            .with_bearer(self.auth_token.clone());
        self.queue.enqueue(request);
    }
}
