//! Mapping raw batch items into canonical notifications

use serde_json::Value;
use tracing::trace;

use crate::config::PayloadSchema;
use crate::notification::{Notification, RawBatch, Timestamp};
use crate::store::DeduplicationStore;

pub struct PayloadNormalizer {
    schema: PayloadSchema,
}

impl PayloadNormalizer {
    pub fn new(schema: PayloadSchema) -> Self {
        Self { schema }
    }

    /// Build the notification for one raw item
    ///
    /// Both `title` and `message` come from the configured message field;
    /// `title_field` is carried in the schema but not consulted.
    pub fn to_notification(&self, id: impl Into<String>, item: &Value) -> Notification {
        let message = field_text(item.get(&self.schema.message_field));
        Notification {
            id: id.into(),
            title: message.clone(),
            message,
            kind: field_text(item.get(&self.schema.type_field)),
            timestamp: Timestamp::from_value(item.get(&self.schema.timestamp_field)),
        }
    }

    /// Lazily yield the unseen notifications of a batch, in batch order
    ///
    /// An id already in `store` is skipped before anything is built. Every
    /// yielded notification has been marked seen before it is handed out.
    pub fn normalize<'a>(
        &'a self,
        batch: RawBatch,
        store: &'a dyn DeduplicationStore,
    ) -> impl Iterator<Item = Notification> + 'a {
        batch.into_iter().filter_map(move |(id, item)| {
            if store.has(&id) {
                trace!("Skipping already delivered notification {}", id);
                return None;
            }
            let notification = self.to_notification(id, &item);
            store.mark_seen(&notification.id, &notification);
            Some(notification)
        })
    }
}

fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
